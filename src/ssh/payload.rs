//! Configuration payload upload
//!
//! Writes a JSON document to `<workspace>/node.json` for the duration of a
//! scoped body.

use std::future::Future;

use super::driver::RemoteDriver;
use super::guard::ensure;
use super::shell::quote;
use super::transport::StdinPayload;
use crate::error::Result;

impl RemoteDriver {
    /// Upload `payload` and run `body` with its remote path
    ///
    /// The file is created under `umask 0077` and removed after `body`
    /// returns, whatever the outcome. Removal failures are only logged.
    pub async fn with_payload<F, Fut, T>(&self, payload: &serde_json::Value, body: F) -> Result<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let path = self.payload_path().await?;
        let mut contents = serde_json::to_string(payload)?;
        contents.push('\n');

        let mut upload = StdinPayload::new(contents);
        self.execute(
            &format!("umask 0077 && cat > {}", quote(&path)),
            true,
            Some(&mut upload),
        )
        .await?;

        ensure(body(path.clone()), async {
            self.remove_quietly(&format!("rm {}", quote(&path))).await;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::error::ProvisionError;
    use crate::ssh::host::Host;
    use crate::testing::{MockConnection, Reply};

    const WORKSPACE: &str = "/tmp/ssh-provision-eeeeeeeee";

    fn setup() -> (Arc<MockConnection>, RemoteDriver) {
        let conn = Arc::new(MockConnection::new("web-1"));
        conn.reply("mktemp -d", Reply::ok().stdout(&format!("{}\n", WORKSPACE)));
        let driver = RemoteDriver::new(Host::new("web-1"), conn.clone());
        (conn, driver)
    }

    #[tokio::test]
    async fn test_payload_uploaded_and_removed() {
        let (conn, driver) = setup();
        let payload = json!({"run_list": ["recipe[nginx]"]});

        let seen = driver
            .with_payload(&payload, |path| async move { Ok(path) })
            .await
            .unwrap();

        let path = format!("{}/node.json", WORKSPACE);
        assert_eq!(seen, path);

        let upload = format!("umask 0077 && cat > {}", path);
        assert_eq!(
            conn.stdin_for(&upload),
            Some(b"{\"run_list\":[\"recipe[nginx]\"]}\n".to_vec())
        );
        assert_eq!(conn.count_matching(&format!("rm {}", path)), 1);
    }

    #[tokio::test]
    async fn test_payload_removed_when_body_fails() {
        let (conn, driver) = setup();

        let err = driver
            .with_payload(&json!({}), |_| async {
                Err::<(), _>(ProvisionError::config("recipe failed"))
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Configuration(_)));
        assert_eq!(conn.count_matching("rm "), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_skips_body() {
        let (conn, driver) = setup();
        conn.reply("umask", Reply::status(1));
        let mut called = false;

        let err = driver
            .with_payload(&json!({}), |_| {
                called = true;
                async { Ok(()) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ExecutionFailed { .. }));
        assert!(!called);
        assert_eq!(conn.count_matching("rm "), 0);
    }
}
