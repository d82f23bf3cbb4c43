//! Remote driver
//!
//! Holds one connection to one host plus the per-session state the driver
//! operations share. The operations themselves live next to their concerns:
//! - [`execute`](RemoteDriver::execute) in `command.rs`
//! - [`workspace_root`](RemoteDriver::workspace_root) in `workspace.rs`
//! - [`with_elevation`](RemoteDriver::with_elevation) in `elevation.rs`
//! - [`deploy`](RemoteDriver::deploy) in `deploy.rs`
//! - [`with_payload`](RemoteDriver::with_payload) in `payload.rs`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use super::deploy::{Mirror, RsyncMirror};
use super::host::Host;
use super::transport::Connection;

/// Driver for a single host over a single connection
///
/// Commands issued by one driver run strictly one after another. The driver
/// is not meant to be shared between concurrent operations.
pub struct RemoteDriver {
    /// Host descriptor
    pub(crate) host: Host,

    /// Live connection
    pub(crate) conn: Arc<dyn Connection>,

    /// Local tree mirrored by `deploy`
    pub(crate) base_dir: PathBuf,

    /// Keep an explicitly given deploy directory after `deploy` returns
    pub(crate) keep_synced_files: bool,

    /// Deploy directory recorded by `deploy` when given explicitly
    pub(crate) deploy_dir_override: Mutex<Option<String>>,

    /// Remote temp directory, created on first use
    pub(crate) tmpdir: OnceCell<String>,

    /// Local-to-remote mirroring backend
    pub(crate) mirror: Box<dyn Mirror>,
}

impl RemoteDriver {
    /// Create a driver mirroring the current directory with rsync
    pub fn new(host: Host, conn: Arc<dyn Connection>) -> Self {
        Self {
            host,
            conn,
            base_dir: PathBuf::from("."),
            keep_synced_files: false,
            deploy_dir_override: Mutex::new(None),
            tmpdir: OnceCell::new(),
            mirror: Box::new(RsyncMirror::new()),
        }
    }

    /// Set the local directory `deploy` mirrors
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Keep an explicitly given deploy directory after `deploy`
    pub fn with_keep_synced_files(mut self, keep: bool) -> Self {
        self.keep_synced_files = keep;
        self
    }

    /// Replace the mirroring backend
    pub fn with_mirror(mut self, mirror: impl Mirror + 'static) -> Self {
        self.mirror = Box::new(mirror);
        self
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl std::fmt::Debug for RemoteDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteDriver")
            .field("host", &self.host)
            .field("base_dir", &self.base_dir)
            .field("keep_synced_files", &self.keep_synced_files)
            .field("tmpdir", &self.tmpdir.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;

    #[test]
    fn test_driver_creation() {
        let conn = Arc::new(MockConnection::new("web-1"));
        let driver = RemoteDriver::new(Host::new("web-1"), conn.clone())
            .with_base_dir("/srv/cookbooks")
            .with_keep_synced_files(true);

        assert_eq!(driver.host().name, "web-1");
        assert_eq!(driver.base_dir(), Path::new("/srv/cookbooks"));
        assert!(driver.keep_synced_files);
        assert!(driver.tmpdir.get().is_none());
        assert_eq!(conn.opened(), 0);
    }

    #[test]
    fn test_debug_hides_secret() {
        let conn = Arc::new(MockConnection::new("web-1"));
        let driver = RemoteDriver::new(Host::new("web-1").with_sudo_password("s3cret"), conn);
        assert!(!format!("{:?}", driver).contains("s3cret"));
    }
}
