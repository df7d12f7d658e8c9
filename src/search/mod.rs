//! Cancellable, streaming navigate-to search sessions.
//!
//! One session per search UI. Starting a search always stops the prior one
//! first, results stream incrementally through the callback, and the
//! terminal `done()` fires exactly once per start regardless of how the
//! search ends: completion, cancellation or provider failure.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::metrics::metrics;
use crate::models::Location;
use crate::scheduler::gate::CancellationGate;

/// Kind of result a search provider yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Types,
    Members,
    Files,
}

/// One streamed search match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub name: String,
    pub kind: SearchKind,
    pub location: Location,
}

/// Receives streamed results. `item_found` may fire many times;
/// `done` fires exactly once per started search.
pub trait SearchCallback: Send + Sync {
    fn item_found(&self, item: SearchItem);
    fn done(&self);
}

/// Search-result source for one supported content kind.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn kind(&self) -> SearchKind;

    /// Streams matches for `query` into `sink`, returning early once
    /// `token` is cancelled. A closed sink also means the session is gone.
    async fn search(
        &self,
        query: &str,
        token: &CancellationToken,
        sink: mpsc::Sender<SearchItem>,
    ) -> anyhow::Result<()>;
}

pub struct SearchSession {
    providers: Vec<Arc<dyn SearchProvider>>,
    gate: CancellationGate,
    current: Mutex<Option<JoinHandle<()>>>,
    channel_capacity: usize,
}

impl SearchSession {
    pub fn new(providers: Vec<Arc<dyn SearchProvider>>, channel_capacity: usize) -> Self {
        Self {
            providers,
            gate: CancellationGate::new(),
            current: Mutex::new(None),
            channel_capacity,
        }
    }

    /// Starts a search, stopping any prior one first.
    ///
    /// An empty or whitespace-only query signals `done()` immediately with
    /// zero `item_found` calls. Only providers matching `kinds` run.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, query: &str, kinds: &[SearchKind], callback: Arc<dyn SearchCallback>) {
        // The slot lock is held across supersede and spawn, so racing starts
        // serialize and at most one task per session is ever live: each
        // caller cancels whatever token was minted before it took the lock.
        let mut current = self.current.lock();
        let token = self.gate.supersede();
        current.take();

        let query = query.trim().to_string();
        if query.is_empty() {
            trace!("empty search query; signalling done immediately");
            callback.done();
            return;
        }

        metrics().record_search_started();
        let providers: Vec<Arc<dyn SearchProvider>> = self
            .providers
            .iter()
            .filter(|provider| kinds.contains(&provider.kind()))
            .cloned()
            .collect();
        debug!(%query, providers = providers.len(), "search started");

        let (sink, results) = mpsc::channel(self.channel_capacity);
        let consumer_token = token.clone();
        let handle = tokio::spawn(async move {
            // done() must fire exactly once, on every exit path out of this
            // task, including cancellation dropping it mid-await.
            let terminal = scopeguard::guard(callback.clone(), |callback| callback.done());

            let producer = tokio::spawn(async move {
                for provider in providers {
                    if token.is_cancelled() {
                        break;
                    }
                    if let Err(error) = provider.search(&query, &token, sink.clone()).await {
                        warn!(kind = ?provider.kind(), "search provider failed: {error:#}");
                    }
                }
                // sink drops here, ending the result stream
            });

            let mut results = ReceiverStream::new(results);
            loop {
                tokio::select! {
                    _ = consumer_token.cancelled() => {
                        trace!("search cancelled");
                        break;
                    }
                    item = results.next() => match item {
                        Some(item) => callback.item_found(item),
                        None => break,
                    },
                }
            }
            producer.abort();
            drop(terminal);
        });
        *current = Some(handle);
    }

    /// Cancels the current search token and replaces it with a fresh one.
    /// Idempotent: with no active search this only rotates the token.
    pub fn stop(&self) {
        let mut current = self.current.lock();
        self.gate.supersede();
        // The cancelled token winds the task down and fires its done()
        // guard; the handle is merely dropped.
        current.take();
    }
}
