//! Quiescence-window debouncing for interactive triggers.
//!
//! Caret movement and keystrokes arrive far faster than derived results are
//! worth computing. Each schedule call replaces the previously pending
//! firing and restarts the wait, so exactly one firing happens per burst:
//! the last schedule before the window elapses wins.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

pub struct DebounceTimer {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Schedules `work` to run once `delay` has elapsed without another
    /// schedule call on this timer.
    ///
    /// The firing is suppressed when `token` is cancelled before the window
    /// elapses, or when `is_active` (probed at fire time, not schedule time)
    /// reports the enclosing subscription deactivated. Work always runs on a
    /// spawned task, never reentrantly in the caller, even for a zero delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_after_quiescence<A, F, Fut>(
        &self,
        delay: Duration,
        token: CancellationToken,
        is_active: A,
        work: F,
    ) where
        A: Fn() -> bool + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let mut pending = self.pending.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
            trace!("debounce window restarted");
        }
        *pending = Some(tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    trace!("debounced work cancelled before quiescence");
                }
                _ = tokio::time::sleep(delay) => {
                    if token.is_cancelled() {
                        return;
                    }
                    if !is_active() {
                        trace!("subscription deactivated; dropping debounced work");
                        return;
                    }
                    work().await;
                }
            }
        }));
    }

    /// Aborts any pending firing without re-arming.
    pub fn cancel(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new()
    }
}
