//! Subscriber lifecycle: attaching and detaching views from the scheduling
//! machinery.
//!
//! Each attached subscriber (typically one editor view) owns a cancellation
//! gate and a debounce timer. Detach deactivates the subscription, cancels
//! its pending timer and current session token, and removes it from the
//! registry; no new sessions are created for it afterwards. A host-wide
//! shutdown token deactivates everything at once.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::scheduler::debounce::DebounceTimer;
use crate::scheduler::gate::CancellationGate;

/// Opaque identity of an attached subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-subscriber scheduling state.
pub struct Subscription {
    id: SubscriberId,
    active: AtomicBool,
    gate: CancellationGate,
    debounce: DebounceTimer,
}

impl Subscription {
    fn new(active: bool) -> Self {
        Self {
            id: SubscriberId::new(),
            active: AtomicBool::new(active),
            gate: CancellationGate::new(),
            debounce: DebounceTimer::new(),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// The subscriber's session gate. Superseding it is how new input
    /// invalidates in-flight work.
    pub fn gate(&self) -> &CancellationGate {
        &self.gate
    }

    pub fn debounce(&self) -> &DebounceTimer {
        &self.debounce
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
        self.debounce.cancel();
        self.gate.cancel_current();
    }
}

struct RegistryInner {
    subscriptions: DashMap<SubscriberId, Arc<Subscription>>,
    shutdown: CancellationToken,
}

/// Registry of live subscriptions, keyed by subscriber identity.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    /// Creates the registry bound to the host's shutdown token. When the
    /// token fires, every subscription is deactivated and no new ones
    /// activate.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(shutdown: CancellationToken) -> Self {
        let registry = Self {
            inner: Arc::new(RegistryInner {
                subscriptions: DashMap::new(),
                shutdown: shutdown.clone(),
            }),
        };
        let watcher = registry.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            watcher.shutdown_all();
        });
        registry
    }

    /// Attaches a new subscriber. During shutdown the returned subscription
    /// is already deactivated, so callers observe it the same way they
    /// observe a detach.
    pub fn attach(&self) -> Arc<Subscription> {
        let active = !self.inner.shutdown.is_cancelled();
        let subscription = Arc::new(Subscription::new(active));
        if active {
            self.inner
                .subscriptions
                .insert(subscription.id(), subscription.clone());
        }
        debug!(id = %subscription.id(), active, "subscriber attached");
        subscription
    }

    /// Detaches a subscriber: deactivates it, cancels its pending timer and
    /// session token, removes it from the registry. No-op for unknown ids.
    pub fn detach(&self, id: &SubscriberId) {
        if let Some((_, subscription)) = self.inner.subscriptions.remove(id) {
            subscription.deactivate();
            debug!(id = %id, "subscriber detached");
        }
    }

    pub fn is_active(&self, id: &SubscriberId) -> bool {
        self.inner
            .subscriptions
            .get(id)
            .map(|subscription| subscription.is_active())
            .unwrap_or(false)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.subscriptions.is_empty()
    }

    fn shutdown_all(&self) {
        let ids: Vec<SubscriberId> = self
            .inner
            .subscriptions
            .iter()
            .map(|entry| *entry.key())
            .collect();
        info!(count = ids.len(), "shutting down all subscriptions");
        for id in ids {
            self.detach(&id);
        }
    }
}
