//! Per-session cancellation ownership.
//!
//! Each logical request stream (one view's caret session, one search session)
//! owns a gate. New input supersedes the stream: the previous token is
//! cancelled irreversibly and a fresh one is minted, both under a single
//! lock so racing callers always leave exactly the last-issued token live.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::trace;

struct GateState {
    token: CancellationToken,
    generation: u64,
}

pub struct CancellationGate {
    state: Mutex<GateState>,
}

impl CancellationGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                token: CancellationToken::new(),
                generation: 0,
            }),
        }
    }

    /// Cancels the previously issued token and returns a freshly minted one.
    ///
    /// Later callers always win: whatever interleaving concurrent supersedes
    /// take, every token but the last handed out ends up cancelled.
    pub fn supersede(&self) -> CancellationToken {
        let mut state = self.state.lock();
        state.token.cancel();
        state.token = CancellationToken::new();
        state.generation += 1;
        trace!(generation = state.generation, "session superseded");
        state.token.clone()
    }

    /// Clone of the currently live token.
    pub fn current(&self) -> CancellationToken {
        self.state.lock().token.clone()
    }

    /// Cancels the current token without minting a replacement. Used on
    /// detach and shutdown, where no further work is expected.
    pub fn cancel_current(&self) {
        self.state.lock().token.cancel();
    }

    /// Monotonic count of supersede calls.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }
}

impl Default for CancellationGate {
    fn default() -> Self {
        Self::new()
    }
}
