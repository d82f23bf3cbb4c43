//! Transport abstraction
//!
//! The driver only needs a handful of channel primitives from the SSH
//! session: open a channel, request exec, watch the events that come back,
//! and optionally push stdin. [`SshConnection`](super::connection::SshConnection)
//! implements these over russh.

use async_trait::async_trait;

use crate::error::{ProvisionError, Result};

/// Event observed on a command channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The server accepted the exec request
    Accepted,
    /// The server rejected the exec request
    Rejected,
    /// Bytes on standard output
    Stdout(Vec<u8>),
    /// Bytes on standard error
    Stderr(Vec<u8>),
    /// `exit-status` request
    ExitStatus(u32),
    /// `exit-signal` request, carrying the signal name (e.g. `KILL`)
    ExitSignal(String),
    /// Remote side closed its output
    Eof,
    /// Channel closed
    Close,
}

/// Write side of a channel, handed to [`ChannelHook`]s
#[async_trait]
pub trait ChannelInput: Send {
    /// Send bytes to the remote command's standard input
    async fn data(&mut self, bytes: &[u8]) -> Result<()>;

    /// Signal end of input
    async fn eof(&mut self) -> Result<()>;
}

/// One command channel on a connection
#[async_trait]
pub trait RemoteChannel: ChannelInput {
    /// Request execution of `command` (with want-reply set)
    async fn request_exec(&mut self, command: &str) -> Result<()>;

    /// Next event on the channel, `None` once the channel is gone
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// This channel's write side
    fn as_input(&mut self) -> &mut dyn ChannelInput;
}

/// A live session able to open independent command channels
#[async_trait]
pub trait Connection: Send + Sync {
    /// Hostname this connection talks to
    fn host(&self) -> &str;

    /// Open a new session channel
    async fn open_channel(&self) -> Result<Box<dyn RemoteChannel>>;

    /// Run `command` and return everything it wrote to stdout
    async fn capture(&self, command: &str) -> Result<String> {
        let mut channel = self.open_channel().await?;
        channel.request_exec(command).await?;

        let mut stdout = Vec::new();
        while let Some(event) = channel.next_event().await {
            match event {
                ChannelEvent::Rejected => {
                    return Err(ProvisionError::transport(format!(
                        "exec request rejected: {}",
                        command
                    )));
                }
                ChannelEvent::Stdout(data) => stdout.extend_from_slice(&data),
                ChannelEvent::Close => break,
                _ => {}
            }
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Caller logic run against a channel once the exec request was accepted
#[async_trait]
pub trait ChannelHook: Send {
    async fn on_ready(&mut self, input: &mut dyn ChannelInput) -> Result<()>;
}

/// Hook that uploads a fixed payload on stdin, then closes input
#[derive(Clone)]
pub struct StdinPayload {
    bytes: Vec<u8>,
}

impl StdinPayload {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl std::fmt::Debug for StdinPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // payloads may embed secrets
        f.debug_struct("StdinPayload")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[async_trait]
impl ChannelHook for StdinPayload {
    async fn on_ready(&mut self, input: &mut dyn ChannelInput) -> Result<()> {
        input.data(&self.bytes).await?;
        input.eof().await
    }
}
