//! Bounded task pool
//!
//! Runs at most `capacity` task bodies at once. Every submission gets a
//! [`TaskHandle`] that resolves to the task's output, or to `None` when the
//! submission was cancelled.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::types::Result;

/// Output types the pool can synthesise when a task body panics
pub trait TaskOutput: Send + 'static {
    fn from_panic(message: String) -> Self;
}

impl<T: Send + 'static> TaskOutput for Result<T> {
    fn from_panic(message: String) -> Self {
        Err(Error::Internal(format!("task panicked: {}", message)))
    }
}

/// Single-value future for one submission
///
/// Resolves to `Some(output)` when the task completed and its submission was
/// not cancelled, `None` otherwise.
#[derive(Debug)]
pub struct TaskHandle<O> {
    receiver: oneshot::Receiver<O>,
}

impl<O> Future for TaskHandle<O> {
    type Output = Option<O>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| result.ok())
    }
}

/// Fixed-capacity executor
#[derive(Debug, Clone)]
pub struct TaskPool {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl TaskPool {
    /// Create a pool running at most `capacity` tasks at a time
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("task pool capacity must be positive".into()));
        }

        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots not currently held by a running task
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Queue `task(input)` behind a free slot
    ///
    /// Returns immediately. If `ctx` fires before a slot is acquired the task
    /// never runs. If it fires while the task runs, the task finishes but its
    /// output is dropped. Must be called from within a Tokio runtime.
    pub fn submit<I, O, F, Fut>(&self, ctx: &CancellationToken, task: F, input: I) -> TaskHandle<O>
    where
        I: Send + 'static,
        O: TaskOutput,
        F: FnOnce(I) -> Fut + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let slots = self.slots.clone();
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    trace!("Submission cancelled before a slot was free");
                    return;
                }
                permit = slots.acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let output = match AssertUnwindSafe(async move { task(input).await })
                .catch_unwind()
                .await
            {
                Ok(output) => output,
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!(panic = %message, "Pooled task panicked");
                    O::from_panic(message)
                }
            };

            if ctx.is_cancelled() {
                debug!("Discarding output of a cancelled submission");
                return;
            }

            // The caller may have dropped its handle; nothing to do then
            let _ = sender.send(output);
        });

        TaskHandle { receiver }
    }

    /// Submit one task per input, handles in input order
    pub fn submit_all<I, O, F, Fut>(
        &self,
        ctx: &CancellationToken,
        task: F,
        inputs: impl IntoIterator<Item = I>,
    ) -> Vec<TaskHandle<O>>
    where
        I: Send + 'static,
        O: TaskOutput,
        F: Fn(I) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = O> + Send + 'static,
    {
        inputs
            .into_iter()
            .map(|input| self.submit(ctx, task.clone(), input))
            .collect()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(TaskPool::new(0), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_capacity() {
        let pool = TaskPool::new(3).unwrap();
        let ctx = CancellationToken::new();
        let gate = Arc::new(Semaphore::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles = pool.submit_all(
            &ctx,
            {
                let gate = gate.clone();
                let running = running.clone();
                let peak = peak.clone();
                move |n: usize| {
                    let gate = gate.clone();
                    let running = running.clone();
                    let peak = peak.clone();
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        let permit = gate.acquire().await.map_err(|e| Error::Internal(e.to_string()))?;
                        permit.forget();
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, Error>(n)
                    }
                }
            },
            0..10,
        );

        wait_until(|| running.load(Ordering::SeqCst) == 3).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(running.load(Ordering::SeqCst), 3);
        assert_eq!(pool.available_slots(), 0);

        gate.add_permits(10);

        let mut outputs = Vec::new();
        for handle in handles {
            outputs.push(handle.await.expect("task delivered").unwrap());
        }
        assert_eq!(outputs, (0..10).collect::<Vec<_>>());
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.available_slots(), 3);
    }

    #[tokio::test]
    async fn test_cancel_before_start_never_runs() {
        let pool = TaskPool::new(1).unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let first_started = Arc::new(AtomicBool::new(false));
        let second_started = Arc::new(AtomicBool::new(false));

        let blocker = {
            let gate = gate.clone();
            let started = first_started.clone();
            pool.submit(
                &CancellationToken::new(),
                move |_: ()| async move {
                    started.store(true, Ordering::SeqCst);
                    let _ = gate.acquire().await;
                    Ok::<_, Error>("first")
                },
                (),
            )
        };
        wait_until(|| first_started.load(Ordering::SeqCst)).await;

        let ctx = CancellationToken::new();
        let queued = {
            let started = second_started.clone();
            pool.submit(
                &ctx,
                move |_: ()| async move {
                    started.store(true, Ordering::SeqCst);
                    Ok::<_, Error>("second")
                },
                (),
            )
        };

        ctx.cancel();
        gate.add_permits(1);

        assert_eq!(blocker.await.unwrap().unwrap(), "first");
        assert!(queued.await.is_none());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!second_started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancel_after_start_discards_output() {
        let pool = TaskPool::new(1).unwrap();
        let ctx = CancellationToken::new();
        let gate = Arc::new(Semaphore::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let handle = {
            let gate = gate.clone();
            let finished = finished.clone();
            pool.submit(
                &ctx,
                move |_: ()| async move {
                    let _ = gate.acquire().await;
                    finished.store(true, Ordering::SeqCst);
                    Ok::<_, Error>(())
                },
                (),
            )
        };

        wait_until(|| pool.available_slots() == 0).await;
        ctx.cancel();
        gate.add_permits(1);

        assert!(handle.await.is_none());
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panic_becomes_error_output() {
        let pool = TaskPool::new(1).unwrap();
        let ctx = CancellationToken::new();

        let crashed = pool.submit(
            &ctx,
            |code: u32| async move {
                if code > 0 {
                    panic!("vendor exploded with {}", code);
                }
                Ok::<_, Error>(code)
            },
            7,
        );
        let err = crashed.await.expect("panic converted to output").unwrap_err();
        assert!(err.to_string().contains("vendor exploded with 7"));

        let healthy = pool.submit(&ctx, |code: u32| async move { Ok::<_, Error>(code) }, 0);
        assert_eq!(healthy.await.unwrap().unwrap(), 0);
    }
}
