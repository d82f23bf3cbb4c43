//! Command execution over SSH
//!
//! Provides the `ExecResult` struct and `execute`, which runs one command on
//! one channel and waits for the channel to close.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::driver::RemoteDriver;
use super::sanitize::redact_secrets;
use super::transport::{ChannelEvent, ChannelHook};
use crate::error::{ProvisionError, Result};

/// Completion status of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    /// Exit status (if the server sent one)
    pub exit_status: Option<u32>,

    /// Name of the signal that terminated the command (e.g. `KILL`)
    pub exit_signal: Option<String>,
}

impl ExecResult {
    /// Exit status 0 and no signal
    pub fn success(&self) -> bool {
        self.exit_status == Some(0) && self.exit_signal.is_none()
    }
}

impl RemoteDriver {
    /// Execute a command on its own channel
    ///
    /// This method:
    /// 1. Opens a session channel and requests exec of `command`
    /// 2. Once the server accepts, hands the channel to `hook` (if any) so it
    ///    can feed stdin
    /// 3. Records `exit-status` / `exit-signal` until the channel closes
    ///
    /// # Arguments
    /// * `command` - Shell command text, sent verbatim
    /// * `require_success` - Fail unless the command exits 0 without a signal
    /// * `hook` - Optional channel interaction run before completion
    ///
    /// # Returns
    /// * `Ok(ExecResult)` - Captured status and signal
    /// * `Err(ProvisionError::ExecutionStart)` - Exec request rejected (only with `require_success`)
    /// * `Err(ProvisionError::ExecutionFailed)` - Nonzero status or signal (only with `require_success`)
    pub async fn execute(
        &self,
        command: &str,
        require_success: bool,
        mut hook: Option<&mut dyn ChannelHook>,
    ) -> Result<ExecResult> {
        let shown = redact_secrets(command);
        info!("{} $ {}", self.host.name, shown);

        let mut channel = self.conn.open_channel().await?;
        channel.request_exec(command).await?;

        let mut result = ExecResult::default();

        while let Some(event) = channel.next_event().await {
            match event {
                ChannelEvent::Accepted => {
                    if let Some(hook) = hook.take() {
                        hook.on_ready(channel.as_input()).await?;
                    }
                }
                ChannelEvent::Rejected => {
                    if require_success {
                        return Err(ProvisionError::ExecutionStart {
                            host: self.host.name.clone(),
                            command: shown,
                        });
                    }
                    warn!("exec request rejected on {}: {:?}", self.host.name, shown);
                }
                ChannelEvent::ExitStatus(status) => {
                    result.exit_status = Some(status);
                }
                ChannelEvent::ExitSignal(signal) => {
                    result.exit_signal = Some(signal);
                }
                ChannelEvent::Close => break,
                ChannelEvent::Stdout(_) | ChannelEvent::Stderr(_) | ChannelEvent::Eof => {}
            }
        }

        debug!(
            "Command completed on {}: exit_status={:?}, exit_signal={:?}",
            self.host.name, result.exit_status, result.exit_signal
        );

        if require_success && !result.success() {
            return Err(ProvisionError::ExecutionFailed {
                host: self.host.name.clone(),
                command: shown,
                status: result.exit_status,
                signal: result.exit_signal,
            });
        }

        Ok(result)
    }
}
