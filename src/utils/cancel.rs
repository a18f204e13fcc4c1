use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::types::Result;

/// Run a fallible vendor call, returning promptly with [`Error::Cancelled`]
/// once `ctx` fires.
pub async fn cancellable<T, F>(ctx: &CancellationToken, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if ctx.is_cancelled() {
        return Err(Error::cancelled(operation));
    }

    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(Error::cancelled(operation)),
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_passes_result_through() {
        let ctx = CancellationToken::new();
        let value = cancellable(&ctx, "noop", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_call() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let ctx = CancellationToken::new();
        ctx.cancel();
        let polled = AtomicBool::new(false);
        let result: Result<()> = cancellable(&ctx, "list", async {
            polled.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_cancelled());
        assert!(!polled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_call() {
        let ctx = CancellationToken::new();
        let trigger = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: Result<()> = cancellable(&ctx, "slow", async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
