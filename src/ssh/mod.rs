//! Remote execution over SSH
//!
//! This module provides the command executor, the per-driver remote
//! workspace, sudo elevation through an encrypted askpass helper, and
//! rsync-based scoped deployment, together with the russh transport they
//! run over.

pub mod cipher;
pub mod command;
pub mod config;
pub mod connection;
pub mod deploy;
pub mod driver;
pub mod elevation;
pub mod guard;
pub mod handler;
pub mod host;
pub mod payload;
pub mod sanitize;
pub mod shell;
pub mod transport;
pub mod workspace;

// Re-exports
pub use command::ExecResult;
pub use config::{Credential, SshConfig};
pub use connection::SshConnection;
pub use deploy::{Mirror, RsyncMirror};
pub use driver::RemoteDriver;
pub use elevation::Elevation;
pub use guard::ensure;
pub use handler::SshHandler;
pub use host::Host;
pub use transport::{ChannelEvent, ChannelHook, ChannelInput, Connection, RemoteChannel, StdinPayload};
