//! Directory synchronization and scoped deployment
//!
//! `deploy` mirrors the driver's local base directory to the remote host
//! with rsync, runs the caller's body, then removes the remote copy.

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use super::driver::RemoteDriver;
use super::guard::ensure;
use super::host::ssh_command;
use super::shell::quote;
use crate::error::{ProvisionError, Result};

/// Flags passed to rsync before `--rsh`
pub const RSYNC_FLAGS: &[&str] = &[
    "-az",
    "--copy-links",
    "--copy-unsafe-links",
    "--delete",
    "--exclude=.git",
];

/// One-way copy of a local tree to `hostname:remote_dir`
#[async_trait]
pub trait Mirror: Send + Sync {
    /// Mirror `source` to `hostname:remote_dir`, tunnelling through
    /// `ssh` with the given option lines.
    ///
    /// # Errors
    /// `ProvisionError::Sync` if the copy did not complete.
    async fn mirror(
        &self,
        source: &Path,
        hostname: &str,
        remote_dir: &str,
        ssh_options: &[String],
    ) -> Result<()>;
}

/// [`Mirror`] backed by the local `rsync` binary
#[derive(Debug, Clone)]
pub struct RsyncMirror {
    program: String,
}

impl RsyncMirror {
    pub fn new() -> Self {
        Self {
            program: "rsync".to_string(),
        }
    }

    /// Use a different rsync executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments after the program name
    pub fn args(hostname: &str, remote_dir: &str, ssh_options: &[String]) -> Vec<String> {
        RSYNC_FLAGS
            .iter()
            .map(|flag| flag.to_string())
            .chain([
                "--rsh".to_string(),
                ssh_command(ssh_options),
                ".".to_string(),
                format!("{}:{}", hostname, remote_dir),
            ])
            .collect()
    }
}

impl Default for RsyncMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Mirror for RsyncMirror {
    async fn mirror(
        &self,
        source: &Path,
        hostname: &str,
        remote_dir: &str,
        ssh_options: &[String],
    ) -> Result<()> {
        let args = Self::args(hostname, remote_dir, ssh_options);
        let shown = format!("{} {:?}", self.program, args);
        info!("=> $ {} (in {})", shown, source.display());

        let status = Command::new(&self.program)
            .args(&args)
            .current_dir(source)
            .status()
            .await
            .map_err(|e| {
                warn!("Failed to spawn {}: {}", self.program, e);
                ProvisionError::Sync {
                    status: None,
                    command: shown.clone(),
                }
            })?;

        if !status.success() {
            return Err(ProvisionError::Sync {
                status: status.code(),
                command: shown,
            });
        }

        Ok(())
    }
}

impl RemoteDriver {
    /// Mirror the base directory to the host and run `body` against it
    ///
    /// The remote directory is `deploy_dir` if given (and then recorded as
    /// this driver's deploy directory), otherwise `<workspace>/deploy`.
    /// After `body` finishes, successfully or not, the remote directory is
    /// removed with `rm -rf` unless it was given explicitly and the driver
    /// keeps synced files. Removal failures are logged and ignored.
    ///
    /// # Errors
    /// * `ProvisionError::Sync` - rsync failed; `body` is not run
    /// * whatever `body` returns
    pub async fn deploy<F, Fut, T>(&self, deploy_dir: Option<&str>, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(dir) = deploy_dir {
            *self.deploy_dir_override.lock().await = Some(dir.to_string());
        }
        let dir = self.deploy_dir().await?;

        self.mirror
            .mirror(
                &self.base_dir,
                &self.host.hostname,
                &dir,
                &self.host.ssh_options,
            )
            .await?;

        let remove = deploy_dir.is_none() || !self.keep_synced_files;
        ensure(body(), async {
            if remove {
                self.remove_quietly(&format!("rm -rf {}", quote(&dir))).await;
            }
            Ok(())
        })
        .await
    }

    /// Best-effort removal; the outcome is logged, never returned
    pub(crate) async fn remove_quietly(&self, command: &str) {
        match self.execute(command, false, None).await {
            Ok(result) if result.success() => {}
            Ok(result) => warn!(
                "cleanup on {} did not succeed (status={:?}, signal={:?}): {}",
                self.host.name, result.exit_status, result.exit_signal, command
            ),
            Err(e) => warn!("cleanup on {} failed: {}: {}", self.host.name, command, e),
        }
    }
}
