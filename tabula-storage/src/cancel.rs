//! Shutdown signal and deadline helpers shared by sync and browse.

use std::future::Future;
use std::time::Duration;
use tabula_core::{CatalogError, TabulaResult};
use tokio::sync::watch;

/// Resolve once the watched flag turns `true`.
///
/// A dropped sender can never signal, so the future then stays pending.
pub async fn wait_for_shutdown(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Race `fut` against a shutdown signal. An already raised signal wins.
pub async fn cancellable<F, T>(
    operation: &str,
    fut: F,
    mut shutdown_rx: watch::Receiver<bool>,
) -> TabulaResult<T>
where
    F: Future<Output = TabulaResult<T>>,
{
    tokio::select! {
        biased;

        _ = wait_for_shutdown(&mut shutdown_rx) => {
            tracing::info!(operation, "Cancelled by shutdown signal");
            Err(CatalogError::Cancelled {
                operation: operation.to_string(),
            }
            .into())
        }
        result = fut => result,
    }
}

/// Bound `fut` by `deadline`.
pub async fn with_deadline<F, T>(operation: &str, fut: F, deadline: Duration) -> TabulaResult<T>
where
    F: Future<Output = TabulaResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, deadline_ms = deadline.as_millis() as u64, "Deadline exceeded");
            Err(CatalogError::DeadlineExceeded {
                operation: operation.to_string(),
                after: deadline,
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tabula_core::TabulaError;

    #[tokio::test]
    async fn test_raised_signal_wins() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let result: TabulaResult<u32> = cancellable("ping", async { Ok(1) }, rx).await;
        assert!(matches!(
            result,
            Err(TabulaError::Catalog(CatalogError::Cancelled { .. }))
        ));
    }

    #[tokio::test]
    async fn test_completes_without_signal() {
        let (_tx, rx) = watch::channel(false);
        let result = cancellable("ping", async { Ok(7) }, rx).await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_dropped_sender_never_cancels() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let result = cancellable("ping", async { Ok("done") }, rx).await;
        assert_eq!(result, Ok("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let result: TabulaResult<()> = with_deadline(
            "slow",
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            },
            Duration::from_secs(1),
        )
        .await;

        match result {
            Err(TabulaError::Catalog(CatalogError::DeadlineExceeded { operation, after })) => {
                assert_eq!(operation, "slow");
                assert_eq!(after, Duration::from_secs(1));
            }
            other => panic!("expected deadline error, got {:?}", other),
        }
    }
}
