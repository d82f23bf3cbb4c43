//! Remote temporary workspace
//!
//! One temp directory per driver, created lazily with `mktemp -d` and cached
//! for the life of the driver.

use std::future::Future;

use tracing::debug;

use super::driver::RemoteDriver;
use super::guard::ensure;
use super::shell::{join, quote};
use crate::error::{ProvisionError, Result};

/// `mktemp` template for the workspace directory
pub const WORKSPACE_TEMPLATE: &str = "ssh-provision-XXXXXXXXX";

/// Default root when the host does not override `TMPDIR`
pub const DEFAULT_TMP_ROOT: &str = "/tmp";

/// Deploy directory name under the workspace
pub const DEPLOY_DIR_NAME: &str = "deploy";

/// Configuration payload file name under the workspace
pub const PAYLOAD_FILE_NAME: &str = "node.json";

impl RemoteDriver {
    /// Remote temp directory for this driver
    ///
    /// The first call runs `mktemp -d -t ssh-provision-XXXXXXXXX` (with
    /// `TMPDIR` set when the host overrides it); later calls return the cached
    /// path without touching the connection.
    ///
    /// # Errors
    /// `ProvisionError::Workspace` if mktemp prints anything other than an
    /// absolute path under the expected root.
    pub async fn workspace_root(&self) -> Result<&str> {
        let path = self
            .tmpdir
            .get_or_try_init(|| self.create_workspace())
            .await?;
        Ok(path.as_str())
    }

    async fn create_workspace(&self) -> Result<String> {
        let mut command = join(["mktemp", "-d", "-t", WORKSPACE_TEMPLATE]);
        if let Some(ref tmpdir) = self.host.tmpdir {
            command.insert_str(0, &format!("TMPDIR={} ", quote(tmpdir)));
        }

        let output = self.conn.capture(&command).await?;
        let root = self.host.tmpdir.as_deref().unwrap_or(DEFAULT_TMP_ROOT);
        let path = output.trim_end();

        if !is_under(path, root) {
            return Err(ProvisionError::Workspace { command, output });
        }

        debug!("Workspace on {}: {}", self.host.name, path);
        Ok(path.to_string())
    }

    /// Run `body`, then remove the workspace root if it exists
    ///
    /// The root is removed with `rm -rf` exactly once, whether `body`
    /// succeeded or not, and only if something created it. Removal failures
    /// are logged and ignored. The driver must not touch the workspace after
    /// this returns.
    pub async fn with_workspace<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        ensure(body(), async {
            if let Some(root) = self.tmpdir.get() {
                self.remove_quietly(&format!("rm -rf {}", quote(root))).await;
            }
            Ok(())
        })
        .await
    }

    /// Deploy directory: the one recorded by `deploy`, or `<workspace>/deploy`
    pub async fn deploy_dir(&self) -> Result<String> {
        if let Some(dir) = self.deploy_dir_override.lock().await.clone() {
            return Ok(dir);
        }
        Ok(format!("{}/{}", self.workspace_root().await?, DEPLOY_DIR_NAME))
    }

    /// Path the configuration payload is uploaded to
    pub async fn payload_path(&self) -> Result<String> {
        Ok(format!("{}/{}", self.workspace_root().await?, PAYLOAD_FILE_NAME))
    }
}

/// `path` is a single-line absolute path strictly below `root`
fn is_under(path: &str, root: &str) -> bool {
    let root = root.trim_end_matches('/');
    path.starts_with('/')
        && !path.contains('\n')
        && path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}
