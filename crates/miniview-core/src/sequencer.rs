//! Async operation sequencer
//!
//! A [`Sequencer`] runs submitted operations strictly one after another, in
//! the order `enqueue` was called. Operations are pushed onto an unbounded
//! queue that a single worker task drains; each item carries its own
//! completion channel so the caller only ever observes its own result.
//!
//! ```ignore
//! let lock = Sequencer::new("model");
//! let first = lock.enqueue(|| async { fetch("a.glb").await });
//! let second = lock.enqueue(|| async { fetch("b.glb").await });
//! // `second` starts only after `first` has settled, even if it failed.
//! ```

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::error::SequencerError;

type Job = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

/// Serializes async operations submitted over its lifetime
pub struct Sequencer {
    name: &'static str,
    tx: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
}

impl Sequencer {
    /// Create a sequencer and spawn its worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(name: &'static str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));

        tokio::spawn(Self::worker_loop(name, rx, pending.clone()));

        Self { name, tx, pending }
    }

    /// Number of operations submitted but not yet settled
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Queue an operation behind everything submitted before it.
    ///
    /// The position in the queue is fixed by this call; the returned handle
    /// does not need to be polled for the operation to run, and dropping it
    /// does not cancel the operation.
    pub fn enqueue<F, Fut, T>(&self, op: F) -> Sequenced<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let pending = self.pending.clone();

        let job: Job = Box::new(move || {
            async move {
                let result = op().await;
                pending.fetch_sub(1, Ordering::SeqCst);
                // Caller may have dropped the handle
                let _ = done_tx.send(result);
            }
            .boxed()
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(sequencer = self.name, "Enqueue on a stopped sequencer");
            return Sequenced { rx: None };
        }

        trace!(sequencer = self.name, pending = self.pending(), "Operation queued");
        Sequenced { rx: Some(done_rx) }
    }

    async fn worker_loop(
        name: &'static str,
        mut rx: mpsc::UnboundedReceiver<Job>,
        pending: Arc<AtomicUsize>,
    ) {
        while let Some(job) = rx.recv().await {
            // Each operation gets its own task so a panic only loses that
            // operation's result, not the worker.
            if let Err(e) = tokio::spawn(job()).await {
                warn!(sequencer = name, error = %e, "Sequenced operation did not complete");
                pending.fetch_sub(1, Ordering::SeqCst);
            }
        }
        debug!(sequencer = name, "Sequencer worker stopped");
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

/// Completion handle for one enqueued operation
#[must_use = "dropping the handle discards the operation's result"]
pub struct Sequenced<T> {
    rx: Option<oneshot::Receiver<T>>,
}

impl<T> Future for Sequenced<T> {
    type Output = Result<T, SequencerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            None => Poll::Ready(Err(SequencerError::Closed)),
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|r| r.map_err(|_| SequencerError::Abandoned)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_runs_in_submission_order_not_completion_order() {
        let lock = Sequencer::new("test");
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = [50u64, 10, 30]
            .into_iter()
            .enumerate()
            .map(|(i, delay)| {
                let log = log.clone();
                lock.enqueue(move || async move {
                    log.lock().unwrap().push(format!("start {}", i));
                    sleep(Duration::from_millis(delay)).await;
                    log.lock().unwrap().push(format!("end {}", i));
                    i
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results, vec![0, 1, 2]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start 0", "end 0", "start 1", "end 1", "start 2", "end 2"]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_block_next_operation() {
        let lock = Sequencer::new("test");

        let failing = lock.enqueue(|| async { Err::<u32, String>("boom".to_string()) });
        let ok = lock.enqueue(|| async { Ok::<u32, String>(7) });

        assert_eq!(failing.await.unwrap(), Err("boom".to_string()));
        assert_eq!(ok.await.unwrap(), Ok(7));
    }

    #[tokio::test]
    async fn test_panic_is_reported_to_its_own_handle_only() {
        let lock = Sequencer::new("test");

        let panicking = lock.enqueue(|| async {
            if true {
                panic!("operation blew up");
            }
            1u32
        });
        let next = lock.enqueue(|| async { 2u32 });

        assert_eq!(panicking.await, Err(SequencerError::Abandoned));
        assert_eq!(next.await, Ok(2));
    }

    #[tokio::test]
    async fn test_reentrant_enqueue_appends_after_tail() {
        let lock = Arc::new(Sequencer::new("test"));
        let log = Arc::new(Mutex::new(Vec::new()));
        let (inner_tx, inner_rx) = oneshot::channel();

        let outer = {
            let lock_inner = lock.clone();
            let log = log.clone();
            lock.enqueue(move || async move {
                log.lock().unwrap().push("outer");
                let log = log.clone();
                let inner = lock_inner.enqueue(move || async move {
                    log.lock().unwrap().push("inner");
                });
                let _ = inner_tx.send(inner);
            })
        };
        let second = {
            let log = log.clone();
            lock.enqueue(move || async move {
                log.lock().unwrap().push("second");
            })
        };

        outer.await.unwrap();
        second.await.unwrap();
        inner_rx.await.unwrap().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["outer", "second", "inner"]);
    }

    #[tokio::test]
    async fn test_dropped_handle_still_runs() {
        let lock = Sequencer::new("test");
        let ran = Arc::new(AtomicUsize::new(0));

        {
            let ran = ran.clone();
            drop(lock.enqueue(move || async move {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        lock.enqueue(|| async {}).await.unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(lock.pending(), 0);
    }

    #[tokio::test]
    async fn test_pending_counts_unsettled_operations() {
        let lock = Sequencer::new("test");
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let blocked = lock.enqueue(move || async move {
            let _ = release_rx.await;
        });
        let queued = lock.enqueue(|| async {});
        assert_eq!(lock.pending(), 2);

        release_tx.send(()).unwrap();
        blocked.await.unwrap();
        queued.await.unwrap();
        assert_eq!(lock.pending(), 0);
    }
}
