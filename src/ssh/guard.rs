//! Unconditional cleanup for scoped remote resources

use std::future::Future;

use tracing::warn;

use crate::error::Result;

/// Await `body`, then always await `cleanup`.
///
/// If `body` failed, its error is returned and a cleanup failure is only
/// logged. If `body` succeeded, a cleanup failure is returned instead.
pub async fn ensure<T, B, C>(body: B, cleanup: C) -> Result<T>
where
    B: Future<Output = Result<T>>,
    C: Future<Output = Result<()>>,
{
    let result = body.await;
    let cleaned = cleanup.await;

    match (result, cleaned) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(cleanup_err)) => {
            warn!("cleanup failed after error ({}): {}", e, cleanup_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ProvisionError;

    #[tokio::test]
    async fn test_cleanup_runs_on_success() {
        let runs = AtomicUsize::new(0);
        let result = ensure(async { Ok(42) }, async {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_runs_on_error_and_body_error_wins() {
        let runs = AtomicUsize::new(0);
        let result: Result<()> = ensure(async { Err(ProvisionError::config("body")) }, async {
            runs.fetch_add(1, Ordering::SeqCst);
            Err(ProvisionError::transport("cleanup"))
        })
        .await;

        assert!(matches!(result, Err(ProvisionError::Configuration(ref m)) if m == "body"));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cleanup_error_surfaces_after_success() {
        let result = ensure(async { Ok(()) }, async {
            Err(ProvisionError::transport("cleanup"))
        })
        .await;

        assert!(matches!(result, Err(ProvisionError::Transport(_))));
    }
}
