//! Per-subscriber control flow for the definition view.
//!
//! Wires one subscriber through the whole pipeline: caret input supersedes
//! the session, the debounce timer waits out the quiescence window, the
//! resolver runs off-main, and the ordered locations are handed to the
//! work queue so the presenter executes on the main context under the
//! latest token. Transient stale or empty results during the debounce are
//! expected; the next resolution silently replaces them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::models::{DocumentHandle, Position};
use crate::navigation::collaborators::DefinitionPresenter;
use crate::navigation::resolver::{ContextResolver, ResolveError};
use crate::scheduler::subscription::{SubscriberId, Subscription, SubscriptionRegistry};
use crate::scheduler::work_queue::{AffinityWorkQueue, WorkError};

pub struct DefinitionTracker {
    subscription: Arc<Subscription>,
    registry: SubscriptionRegistry,
    resolver: Arc<ContextResolver>,
    queue: AffinityWorkQueue,
    presenter: Arc<dyn DefinitionPresenter>,
    quiescence: Duration,
}

impl DefinitionTracker {
    /// Attaches a new subscriber to `registry` and tracks caret movement
    /// for it until detach.
    pub fn new(
        registry: &SubscriptionRegistry,
        resolver: Arc<ContextResolver>,
        queue: AffinityWorkQueue,
        presenter: Arc<dyn DefinitionPresenter>,
        quiescence: Duration,
    ) -> Self {
        Self {
            subscription: registry.attach(),
            registry: registry.clone(),
            resolver,
            queue,
            presenter,
            quiescence,
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscription.id()
    }

    /// Caret moved (or the document changed under the caret).
    ///
    /// Supersedes the current session immediately, so in-flight work for
    /// the old position starts observing its cancelled token right away,
    /// and schedules resolution after the quiescence window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn caret_moved(&self, document: DocumentHandle, position: Position) {
        if !self.subscription.is_active() {
            return;
        }
        let token = self.subscription.gate().supersede();

        let resolver = self.resolver.clone();
        let queue = self.queue.clone();
        let presenter = self.presenter.clone();
        let registry = self.registry.clone();
        let id = self.subscription.id();

        self.subscription.debounce().schedule_after_quiescence(
            self.quiescence,
            token.clone(),
            move || registry.is_active(&id),
            move || async move {
                match resolver.resolve(&document, position, &token).await {
                    Ok(locations) => {
                        trace!(document = %document.id, %position, count = locations.len(),
                               "resolution complete; presenting on main context");
                        let handle =
                            queue.enqueue(move || presenter.present(locations), token.clone());
                        match handle.await {
                            Ok(()) => {}
                            Err(WorkError::Failed(error)) => {
                                warn!("definition presentation failed: {error}");
                            }
                            // Superseded or shutting down; nothing to show.
                            Err(WorkError::Cancelled) | Err(WorkError::QueueClosed) => {}
                        }
                    }
                    Err(ResolveError::Cancelled) => {
                        trace!(document = %document.id, %position, "resolution superseded");
                    }
                }
            },
        );
    }

    /// Detaches the subscriber: pending timers and the current session are
    /// cancelled, and further caret input is ignored.
    pub fn detach(&self) {
        self.registry.detach(&self.subscription.id());
    }
}

impl Drop for DefinitionTracker {
    fn drop(&mut self) {
        self.detach();
    }
}
