//! Single-flight transaction queue.
//!
//! ```text
//!  caller A ──┐  job + oneshot   ┌──────────────┐
//!  caller B ──┼────────────────► │ mpsc (FIFO)  │ ──► worker thread ──► ctx
//!  caller C ──┘                  └──────────────┘     (one job at a time)
//! ```
//!
//! Jobs are enqueued synchronously when submitted, so call order is
//! execution order even if the returned futures are awaited out of order.
//! The worker owns the context (backing store + CRDT engine) exclusively;
//! no job ever observes another job half-done.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};

use crate::error::PersistenceError;

type Job<Ctx> = Box<dyn FnOnce(&mut Ctx) + Send + 'static>;

/// Result of a queued operation.
///
/// Dropping a `Pending` does not cancel the operation: it still runs in
/// queue order, its result is discarded.
#[must_use = "queued operations report their result through the returned future"]
pub struct Pending<T> {
    rx: Option<oneshot::Receiver<Result<T, PersistenceError>>>,
    label: &'static str,
}

impl<T> Future for Pending<T> {
    type Output = Result<T, PersistenceError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let label = self.label;
        match self.rx.as_mut() {
            None => Poll::Ready(Err(PersistenceError::Closed)),
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(PersistenceError::Aborted(label)))),
        }
    }
}

/// FIFO queue feeding one dedicated worker thread.
///
/// Dropping the queue blocks the dropping thread until every queued job has
/// run and the worker exited.
pub struct TransactionQueue<Ctx> {
    tx: Option<mpsc::UnboundedSender<Job<Ctx>>>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<QueueStats>,
}

/// Queue counters, readable from any thread.
#[derive(Debug, Default)]
pub struct QueueStats {
    completed: AtomicU64,
    failed: AtomicU64,
}

impl QueueStats {
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

impl<Ctx: Send + 'static> TransactionQueue<Ctx> {
    /// Move `ctx` onto a new worker thread named `name`.
    pub fn spawn(name: &str, mut ctx: Ctx) -> Result<Self, PersistenceError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<Ctx>>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    job(&mut ctx);
                }
                log::debug!("Transaction queue drained, worker exiting");
            })
            .map_err(|e| PersistenceError::WorkerSpawn(e.to_string()))?;

        Ok(Self {
            tx: Some(tx),
            worker: Some(worker),
            stats: Arc::new(QueueStats::default()),
        })
    }

    /// Enqueue `f`. It runs after every previously submitted job settled.
    ///
    /// Errors are logged here and also returned to the caller. A panic in
    /// `f` is caught so later jobs still run; the caller sees
    /// [`PersistenceError::Aborted`].
    pub fn submit<T, F>(&self, label: &'static str, f: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Ctx) -> Result<T, PersistenceError> + Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let stats = self.stats.clone();
        let job: Job<Ctx> = Box::new(move |ctx: &mut Ctx| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(ctx)));
            let result = match outcome {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    log::error!("Transaction '{label}' failed: {e}");
                    Err(e)
                }
                Err(_) => {
                    log::error!("Transaction '{label}' panicked");
                    Err(PersistenceError::Aborted(label))
                }
            };
            let counter = if result.is_ok() { &stats.completed } else { &stats.failed };
            counter.fetch_add(1, Ordering::Relaxed);
            // The caller may have dropped its future
            let _ = done_tx.send(result);
        });

        let sent = self.tx.as_ref().is_some_and(|tx| tx.send(job).is_ok());
        Pending {
            rx: sent.then_some(done_rx),
            label,
        }
    }

    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl<Ctx> Drop for TransactionQueue<Ctx> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit;
        // joining guarantees the context (and its store lock) is released.
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Transaction queue worker panicked");
            }
        }
    }
}
