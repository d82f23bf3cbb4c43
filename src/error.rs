//! Error types for ssh-provision

use thiserror::Error;

/// Main error type for remote execution, elevation and deployment
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Missing or invalid configuration (e.g. sudo password required but absent)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The local mirroring step did not complete
    #[error("failed to rsync (status={status:?}): {command}")]
    Sync {
        /// Exit code of rsync, if it ran and exited normally
        status: Option<i32>,
        /// The rsync invocation as it was spawned
        command: String,
    },

    /// The server rejected the exec request on the channel
    #[error("execution failed on {host}: {command:?}")]
    ExecutionStart {
        /// Display name of the host
        host: String,
        /// Command text
        command: String,
    },

    /// A required command finished with a nonzero status or a signal
    #[error("execution failed on {host} (status={status:?}, signal={signal:?}): {command:?}")]
    ExecutionFailed {
        /// Display name of the host
        host: String,
        /// Command text
        command: String,
        /// Reported exit status
        status: Option<u32>,
        /// Reported exit signal name
        signal: Option<String>,
    },

    /// mktemp returned something that is not a path under the expected root
    #[error("Failed to mktemp {command:?} -> {output:?}")]
    Workspace {
        /// The mktemp command that was run
        command: String,
        /// What the remote shell printed
        output: String,
    },

    /// SSH connection failed
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Channel level I/O failed
    #[error("SSH transport error: {0}")]
    Transport(String),

    /// Local encryption or decryption of the sudo password failed
    #[error("Cipher error: {0}")]
    Cipher(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using ProvisionError
pub type Result<T> = std::result::Result<T, ProvisionError>;

impl ProvisionError {
    /// Create a configuration error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        ProvisionError::Configuration(msg.into())
    }

    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        ProvisionError::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        ProvisionError::Authentication(msg.into())
    }

    /// Create a transport error from a string
    pub fn transport(msg: impl Into<String>) -> Self {
        ProvisionError::Transport(msg.into())
    }

    /// Create a cipher error from a string
    pub fn cipher(msg: impl Into<String>) -> Self {
        ProvisionError::Cipher(msg.into())
    }
}
