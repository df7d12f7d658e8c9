//! Batched work queue with main-context execution affinity.
//!
//! Arbitrary callers enqueue zero-argument actions with a cancellation
//! token and get back a completion handle. Items are coalesced for a short
//! batch delay, cancelled items are discarded without execution, and the
//! survivors run in FIFO submission order on the serial main context: one
//! context switch per batch, none at all when the whole batch was cancelled.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::metrics::metrics;
use crate::scheduler::main_context::MainContext;

/// Terminal state of a queued action's completion handle.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkError {
    #[error("work item was cancelled")]
    Cancelled,
    #[error("work queue is closed")]
    QueueClosed,
    #[error("queued action failed: {0}")]
    Failed(String),
}

/// How a work item leaves the queue. Each item sees exactly one disposition.
enum Disposition {
    Run,
    Cancel,
    Close,
}

struct WorkItem {
    token: CancellationToken,
    settle: Box<dyn FnOnce(Disposition) + Send>,
}

/// Completion handle for an enqueued action.
///
/// Resolves exactly once: success, `Cancelled`, `Failed`, or `QueueClosed`.
/// If the queue infrastructure drops the item without settling it (main
/// context torn down mid-batch), the handle resolves `Cancelled` rather
/// than staying pending forever.
pub struct WorkHandle<T> {
    rx: oneshot::Receiver<Result<T, WorkError>>,
}

impl<T> WorkHandle<T> {
    /// Non-blocking probe. Returns `Some` when the handle has settled, which
    /// is always the case for fast-path (already-on-main) enqueues.
    pub fn try_result(&mut self) -> Option<Result<T, WorkError>> {
        self.rx.try_recv().ok()
    }
}

impl<T> Future for WorkHandle<T> {
    type Output = Result<T, WorkError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|settled| settled.unwrap_or(Err(WorkError::Cancelled)))
    }
}

struct QueueState {
    pending: Vec<WorkItem>,
    /// True while a drain is scheduled or running. Held from the moment a
    /// drain is claimed until its batch has been handed to the serial main
    /// context, so a later batch can never overtake an earlier snapshot.
    drain_claimed: bool,
    disposed: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    main: MainContext,
    batch_delay: Duration,
}

#[derive(Clone)]
pub struct AffinityWorkQueue {
    inner: Arc<QueueInner>,
}

impl AffinityWorkQueue {
    pub fn new(main: MainContext, batch_delay: Duration) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    pending: Vec::new(),
                    drain_claimed: false,
                    disposed: false,
                }),
                main,
                batch_delay,
            }),
        }
    }

    /// Disposes the queue when the host's shutdown token fires.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind_shutdown(&self, shutdown: CancellationToken) {
        let queue = self.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            queue.dispose();
        });
    }

    /// Enqueues `action` for batched execution on the main context.
    ///
    /// Fast path: a caller already physically on the main context runs the
    /// action immediately and synchronously (callers like the initial
    /// synchronous open of a document must block on main) and receives an
    /// already-settled handle.
    ///
    /// Must be called from within a tokio runtime unless on the fast path.
    pub fn enqueue<T, F>(&self, action: F, token: CancellationToken) -> WorkHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let handle = WorkHandle { rx };
        metrics().record_enqueue();

        if self.inner.main.is_current() {
            let settled = if self.inner.state.lock().disposed {
                Err(WorkError::QueueClosed)
            } else if token.is_cancelled() {
                metrics().record_cancelled();
                Err(WorkError::Cancelled)
            } else {
                metrics().record_fast_path();
                metrics().record_executed();
                run_settled(action)
            };
            let _ = tx.send(settled);
            return handle;
        }

        let settle: Box<dyn FnOnce(Disposition) + Send> =
            Box::new(move |disposition: Disposition| {
                let settled = match disposition {
                    Disposition::Run => {
                        metrics().record_executed();
                        run_settled(action)
                    }
                    Disposition::Cancel => {
                        metrics().record_cancelled();
                        Err(WorkError::Cancelled)
                    }
                    Disposition::Close => Err(WorkError::QueueClosed),
                };
                let _ = tx.send(settled);
            });

        let schedule = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                drop(state);
                settle(Disposition::Close);
                return handle;
            }
            state.pending.push(WorkItem { token, settle });
            let schedule = !state.drain_claimed;
            if schedule {
                state.drain_claimed = true;
            }
            schedule
        };
        if schedule {
            self.spawn_drain();
        }
        handle
    }

    fn spawn_drain(&self) {
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(queue.inner.batch_delay).await;
            queue.drain().await;
        });
    }

    /// Takes a snapshot of the pending batch and executes its live items on
    /// the main context in FIFO submission order.
    async fn drain(&self) {
        metrics().record_drain();
        let batch = {
            let mut state = self.inner.state.lock();
            std::mem::take(&mut state.pending)
        };

        // Partition without invoking anything; items cancelled since enqueue
        // settle here, before any context switch.
        let (live, stale): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|item| !item.token.is_cancelled());
        let stale_count = stale.len();
        for item in stale {
            (item.settle)(Disposition::Cancel);
        }

        if live.is_empty() {
            // Nothing to run: skip the main-context switch entirely.
            trace!(cancelled = stale_count, "drain had no live items");
            self.release_drain_claim();
            return;
        }

        trace!(live = live.len(), cancelled = stale_count, "draining batch to main context");
        let job = Box::new(move || {
            for item in live {
                // Time has passed since the snapshot; re-check each token
                // immediately before execution.
                if item.token.is_cancelled() {
                    (item.settle)(Disposition::Cancel);
                } else {
                    (item.settle)(Disposition::Run);
                }
            }
        });
        let done = self.inner.main.submit(job);

        // The claim is released only after the batch is in the main context's
        // FIFO channel; a follow-up drain submitted now cannot overtake it.
        self.release_drain_claim();
        let _ = done.await;
    }

    fn release_drain_claim(&self) {
        let respawn = {
            let mut state = self.inner.state.lock();
            if state.disposed || state.pending.is_empty() {
                state.drain_claimed = false;
                false
            } else {
                // Items arrived while draining; keep the claim and go again.
                true
            }
        };
        if respawn {
            self.spawn_drain();
        }
    }

    /// Terminal: force-cancels all pending items and rejects further
    /// enqueues. Idempotent. A batch already snapshotted keeps running; its
    /// items' tokens are the backstop there.
    pub fn dispose(&self) {
        let drained = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.pending)
        };
        debug!(pending = drained.len(), "work queue disposed");
        for item in drained {
            (item.settle)(Disposition::Cancel);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Handle to the underlying main context.
    pub fn main_context(&self) -> &MainContext {
        &self.inner.main
    }
}

fn run_settled<T, F>(action: F) -> Result<T, WorkError>
where
    F: FnOnce() -> T,
{
    catch_unwind(AssertUnwindSafe(action)).map_err(|payload| {
        let message = panic_message(payload);
        warn!("queued action panicked: {message}");
        metrics().record_failed();
        WorkError::Failed(message)
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "queued action panicked".to_string()
    }
}
