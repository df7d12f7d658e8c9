//! The designated serial execution context ("main").
//!
//! Side-effecting, UI-adjacent work must run on exactly one logical thread.
//! Rather than relying on an implicit language feature, the switch is an
//! explicit scheduling primitive: one dedicated OS thread draining boxed
//! jobs from a channel in FIFO order. `AffinityWorkQueue` is the only
//! internal submitter, but hosts may also submit directly during startup.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

/// A unit of work executed on the main context.
pub type MainJob = Box<dyn FnOnce() + Send + 'static>;

struct MainContextInner {
    sender: Mutex<Option<mpsc::Sender<MainJob>>>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
    thread_id: ThreadId,
    submissions: AtomicU64,
}

/// Cloneable handle to the serial main execution context.
#[derive(Clone)]
pub struct MainContext {
    inner: Arc<MainContextInner>,
}

impl MainContext {
    /// Spawns the main-context thread. Thread-spawn failure is a fatal
    /// resource error and panics.
    pub fn new() -> Self {
        let (job_tx, job_rx) = mpsc::channel::<MainJob>();
        let (id_tx, id_rx) = mpsc::channel();

        let join = thread::Builder::new()
            .name("codenav-main".into())
            .spawn(move || {
                let _ = id_tx.send(thread::current().id());
                while let Ok(job) = job_rx.recv() {
                    job();
                }
                trace!("main context thread exiting");
            })
            .expect("failed to spawn main context thread");

        let thread_id = id_rx
            .recv()
            .expect("main context thread terminated before reporting its id");

        Self {
            inner: Arc::new(MainContextInner {
                sender: Mutex::new(Some(job_tx)),
                join: Mutex::new(Some(join)),
                thread_id,
                submissions: AtomicU64::new(0),
            }),
        }
    }

    /// Whether the calling thread is physically the main context.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Submits a job for FIFO execution on the main context.
    ///
    /// The returned receiver resolves once the job has run. If the context
    /// has shut down, the job is dropped and the receiver resolves with a
    /// recv error; callers treat that as cancellation.
    pub fn submit(&self, job: MainJob) -> oneshot::Receiver<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let guard = self.inner.sender.lock();
        if let Some(sender) = guard.as_ref() {
            self.inner.submissions.fetch_add(1, Ordering::Relaxed);
            let wrapped: MainJob = Box::new(move || {
                job();
                let _ = done_tx.send(());
            });
            let _ = sender.send(wrapped);
        }
        done_rx
    }

    /// Number of jobs submitted so far. Lets callers (and tests) verify that
    /// empty batches never paid for a context switch.
    pub fn submissions(&self) -> u64 {
        self.inner.submissions.load(Ordering::Relaxed)
    }

    /// Closes the job channel and joins the thread.
    ///
    /// Jobs already queued still run; later submissions are dropped.
    /// Idempotent. Joining is skipped when called from the main context
    /// itself, since a thread cannot join itself.
    pub fn shutdown(&self) {
        let sender = self.inner.sender.lock().take();
        if sender.is_none() {
            return;
        }
        drop(sender);
        debug!("main context shut down");

        if self.is_current() {
            return;
        }
        if let Some(join) = self.inner.join.lock().take() {
            let _ = join.join();
        }
    }
}

impl Default for MainContext {
    fn default() -> Self {
        Self::new()
    }
}
