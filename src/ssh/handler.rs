//! SSH client handler implementation
//!
//! Implements the `russh::client::Handler` trait to handle SSH connection events.

/// SSH client handler for russh
///
/// Accepts all server keys. Host key policy belongs to whoever provisions
/// the connection; the driver itself only runs commands over it.
#[derive(Debug, Clone, Default)]
pub struct SshHandler;

impl SshHandler {
    /// Create a new SSH handler
    pub fn new() -> Self {
        Self
    }
}

impl russh::client::Handler for SshHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}
