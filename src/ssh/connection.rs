//! SSH connection over russh
//!
//! Connects and authenticates one session, then serves command channels
//! to the driver through the [`Connection`] / [`RemoteChannel`] traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh::{Channel, ChannelMsg, Sig};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::config::{Credential, SshConfig};
use super::handler::SshHandler;
use super::transport::{ChannelEvent, ChannelInput, Connection, RemoteChannel};
use crate::config::CONNECTION_TIMEOUT_SECS;
use crate::error::{ProvisionError, Result};

/// One authenticated SSH session
pub struct SshConnection {
    /// Remote hostname
    host: String,

    /// Active SSH session handle (taken on close)
    session: Mutex<Option<Handle<SshHandler>>>,
}

impl SshConnection {
    /// Connect and authenticate
    ///
    /// Offers the configured credentials in order. Fails after
    /// `CONNECTION_TIMEOUT_SECS` if the server does not answer.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        info!(
            "Connecting to SSH server {}:{}...",
            config.host, config.port
        );

        let ssh_config = Arc::new(client::Config::default());
        let addr = config.address();

        let connect_result = timeout(
            Duration::from_secs(CONNECTION_TIMEOUT_SECS),
            client::connect(ssh_config, addr.as_str(), SshHandler::new()),
        )
        .await;

        let mut session = match connect_result {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("SSH connection failed: {}", e);
                return Err(ProvisionError::connection(e.to_string()));
            }
            Err(_) => {
                error!("SSH connection timeout after {}s", CONNECTION_TIMEOUT_SECS);
                return Err(ProvisionError::connection(format!(
                    "Connection timeout after {}s",
                    CONNECTION_TIMEOUT_SECS
                )));
            }
        };

        authenticate(&mut session, config).await?;

        info!(
            "Successfully connected to {}@{}:{}",
            config.username, config.host, config.port
        );

        Ok(Self {
            host: config.host.clone(),
            session: Mutex::new(Some(session)),
        })
    }

    /// Close the SSH connection
    pub async fn close(&self) {
        let mut session_guard = self.session.lock().await;
        if let Some(session) = session_guard.take() {
            let _ = session
                .disconnect(russh::Disconnect::ByApplication, "", "")
                .await;
        }
        info!("SSH connection to {} closed", self.host);
    }
}

/// Authenticate with the SSH server
///
/// Credentials are tried in order; the first one accepted wins.
async fn authenticate(session: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
    if config.credentials().is_empty() {
        return Err(ProvisionError::auth(
            "No authentication method available (require password or private_key)",
        ));
    }

    for credential in config.credentials() {
        debug!(
            "Attempting {} authentication for user '{}'",
            credential.method(),
            config.username
        );

        let accepted = match credential {
            Credential::Password(_) => session
                .authenticate_password(&config.username, credential.secret())
                .await
                .map_err(|e| ProvisionError::auth(e.to_string()))?
                .success(),
            Credential::PrivateKey(_) => {
                let key = russh::keys::PrivateKey::from_openssh(credential.secret().as_bytes())
                    .map_err(|e| {
                        ProvisionError::auth(format!("Failed to parse private key: {}", e))
                    })?;

                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .ok()
                    .flatten()
                    .flatten();
                let key_with_alg = PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg);

                session
                    .authenticate_publickey(&config.username, key_with_alg)
                    .await
                    .map_err(|e| ProvisionError::auth(e.to_string()))?
                    .success()
            }
        };

        if accepted {
            info!("{} authentication successful", credential.method());
            return Ok(());
        }
        warn!("{} authentication rejected", credential.method());
    }

    Err(ProvisionError::auth("All authentication methods rejected"))
}

#[async_trait]
impl Connection for SshConnection {
    fn host(&self) -> &str {
        &self.host
    }

    async fn open_channel(&self) -> Result<Box<dyn RemoteChannel>> {
        let session_guard = self.session.lock().await;
        let session = session_guard
            .as_ref()
            .ok_or_else(|| ProvisionError::connection("SSH connection not established"))?;

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| ProvisionError::connection(format!("Failed to open channel: {}", e)))?;

        Ok(Box::new(SshChannel { channel }))
    }
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

/// Session channel on an [`SshConnection`]
struct SshChannel {
    channel: Channel<client::Msg>,
}

#[async_trait]
impl ChannelInput for SshChannel {
    async fn data(&mut self, bytes: &[u8]) -> Result<()> {
        self.channel
            .data(bytes)
            .await
            .map_err(|e| ProvisionError::transport(format!("Failed to send data: {}", e)))
    }

    async fn eof(&mut self) -> Result<()> {
        self.channel
            .eof()
            .await
            .map_err(|e| ProvisionError::transport(format!("Failed to send eof: {}", e)))
    }
}

#[async_trait]
impl RemoteChannel for SshChannel {
    async fn request_exec(&mut self, command: &str) -> Result<()> {
        self.channel
            .exec(true, command)
            .await
            .map_err(|e| ProvisionError::transport(format!("Failed to exec command: {}", e)))
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        loop {
            let event = match self.channel.wait().await? {
                ChannelMsg::Success => ChannelEvent::Accepted,
                ChannelMsg::Failure => ChannelEvent::Rejected,
                ChannelMsg::Data { data } => ChannelEvent::Stdout(data.to_vec()),
                ChannelMsg::ExtendedData { data, ext } => {
                    // ext == 1 is stderr
                    if ext == 1 {
                        ChannelEvent::Stderr(data.to_vec())
                    } else {
                        ChannelEvent::Stdout(data.to_vec())
                    }
                }
                ChannelMsg::ExitStatus { exit_status } => ChannelEvent::ExitStatus(exit_status),
                ChannelMsg::ExitSignal {
                    signal_name,
                    core_dumped,
                    error_message,
                    ..
                } => {
                    debug!(
                        "exit-signal {:?} (core dumped: {}): {}",
                        signal_name, core_dumped, error_message
                    );
                    ChannelEvent::ExitSignal(signal_to_name(&signal_name))
                }
                ChannelMsg::Eof => ChannelEvent::Eof,
                ChannelMsg::Close => ChannelEvent::Close,
                _ => continue,
            };
            return Some(event);
        }
    }

    fn as_input(&mut self) -> &mut dyn ChannelInput {
        self
    }
}

/// Signal name as sent on the wire, without the `SIG` prefix
fn signal_to_name(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_to_name() {
        assert_eq!(signal_to_name(&Sig::KILL), "KILL");
        assert_eq!(signal_to_name(&Sig::TERM), "TERM");
        assert_eq!(signal_to_name(&Sig::Custom("WINCH".to_string())), "WINCH");
    }

    #[tokio::test]
    async fn test_connect_without_credentials_fails_before_auth() {
        // refused before authentication is reached
        let config = SshConfig::new("127.0.0.1", "nobody").with_port(1);
        let err = SshConnection::connect(&config).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Connection(_)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // port 1 on localhost is not an sshd
        let config = SshConfig::new("127.0.0.1", "nobody")
            .with_port(1)
            .with_password("x");
        let err = SshConnection::connect(&config).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Connection(_)));
    }
}
