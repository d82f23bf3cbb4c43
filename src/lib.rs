//! ssh-provision - run provisioning commands on a remote host over SSH
//!
//! This crate drives a single remote machine over one SSH connection. It
//! executes commands and reports their exit status or signal, mirrors a
//! local directory into a remote workspace with rsync, uploads JSON
//! payloads, and runs commands under `sudo` without the sudo password ever
//! touching the remote disk or a command line in plaintext.
//!
//! # Features
//!
//! - Single-command execution with optional stdin injection
//! - Lazily created per-driver remote temp workspace
//! - `sudo -A` elevation through a short-lived, encrypted askpass helper
//! - Scoped deployment that always removes what it created
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! ssh-provision --host=192.168.1.100 --user=deploy --key=~/.ssh/id_ed25519 \
//!   --sudo-password=secret --dir=./recipes -- ./bootstrap.sh
//! ```
//!
//! # Example Usage (library)
//!
//! ```no_run
//! use std::sync::Arc;
//! use ssh_provision::ssh::{Host, RemoteDriver, SshConfig, SshConnection};
//!
//! # async fn run() -> ssh_provision::Result<()> {
//! let conn = SshConnection::connect(&SshConfig::new("web-1", "deploy").with_password("pw")).await?;
//! let host = Host::new("web-1").with_sudo_password("secret");
//! let driver = RemoteDriver::new(host, Arc::new(conn)).with_base_dir("./recipes");
//! let driver = &driver;
//!
//! driver
//!     .deploy(None, || async {
//!         let dir = driver.deploy_dir().await?;
//!         driver
//!             .with_elevation(|sudo| async move {
//!                 let command = sudo.command(&format!("cd {} && ./bootstrap.sh", dir));
//!                 driver.execute(&command, true, None).await
//!             })
//!             .await
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ssh;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::{Args, Config};
pub use error::{ProvisionError, Result};
pub use ssh::{ExecResult, Host, RemoteDriver, SshConfig, SshConnection};
