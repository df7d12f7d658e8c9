//! Streaming, cancellation and terminal-callback behavior of search sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use codenav_scheduler::models::{Location, Span};
use codenav_scheduler::search::{
    SearchCallback, SearchItem, SearchKind, SearchProvider, SearchSession,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingCallback {
    items: Mutex<Vec<SearchItem>>,
    done: AtomicU32,
}

impl SearchCallback for RecordingCallback {
    fn item_found(&self, item: SearchItem) {
        self.items.lock().push(item);
    }

    fn done(&self) {
        self.done.fetch_add(1, Ordering::SeqCst);
    }
}

impl RecordingCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn done_count(&self) -> u32 {
        self.done.load(Ordering::SeqCst)
    }

    fn item_count(&self) -> usize {
        self.items.lock().len()
    }
}

fn item(name: &str, kind: SearchKind) -> SearchItem {
    SearchItem {
        name: name.to_string(),
        kind,
        location: Location::new(name, format!("src/{name}.rs"), Span::Offsets {
            start: 0,
            end: name.len(),
        }),
    }
}

struct StaticProvider {
    kind: SearchKind,
    names: Vec<&'static str>,
}

#[async_trait]
impl SearchProvider for StaticProvider {
    fn kind(&self) -> SearchKind {
        self.kind
    }

    async fn search(
        &self,
        query: &str,
        token: &CancellationToken,
        sink: mpsc::Sender<SearchItem>,
    ) -> anyhow::Result<()> {
        for name in &self.names {
            if token.is_cancelled() {
                break;
            }
            if name.contains(query) {
                let _ = sink.send(item(name, self.kind)).await;
            }
        }
        Ok(())
    }
}

struct FailingProvider;

#[async_trait]
impl SearchProvider for FailingProvider {
    fn kind(&self) -> SearchKind {
        SearchKind::Members
    }

    async fn search(
        &self,
        _query: &str,
        _token: &CancellationToken,
        sink: mpsc::Sender<SearchItem>,
    ) -> anyhow::Result<()> {
        let _ = sink.send(item("partial", SearchKind::Members)).await;
        anyhow::bail!("index corrupted")
    }
}

/// Emits slowly until cancelled, like a crawl over a large workspace.
struct SlowProvider;

#[async_trait]
impl SearchProvider for SlowProvider {
    fn kind(&self) -> SearchKind {
        SearchKind::Types
    }

    async fn search(
        &self,
        _query: &str,
        token: &CancellationToken,
        sink: mpsc::Sender<SearchItem>,
    ) -> anyhow::Result<()> {
        for i in 0..1000 {
            if token.is_cancelled() {
                break;
            }
            let _ = sink.send(item("slow", SearchKind::Types)).await;
            let _ = i;
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn empty_and_whitespace_queries_signal_done_immediately() {
    let session = SearchSession::new(
        vec![Arc::new(StaticProvider {
            kind: SearchKind::Types,
            names: vec!["Widget"],
        })],
        16,
    );

    let callback = RecordingCallback::new();
    session.start("", &[SearchKind::Types], callback.clone());
    assert_eq!(callback.done_count(), 1);
    assert_eq!(callback.item_count(), 0);

    session.start("   ", &[SearchKind::Types], callback.clone());
    assert_eq!(callback.done_count(), 2);
    assert_eq!(callback.item_count(), 0);
}

#[tokio::test]
async fn results_stream_incrementally_then_done_fires_once() {
    let session = SearchSession::new(
        vec![Arc::new(StaticProvider {
            kind: SearchKind::Types,
            names: vec!["Widget", "WidgetFactory", "Unrelated"],
        })],
        16,
    );

    let callback = RecordingCallback::new();
    session.start("Widget", &[SearchKind::Types], callback.clone());
    settle().await;

    assert_eq!(callback.item_count(), 2);
    assert_eq!(callback.done_count(), 1);
}

#[tokio::test]
async fn kinds_filter_which_providers_run() {
    let session = SearchSession::new(
        vec![
            Arc::new(StaticProvider {
                kind: SearchKind::Types,
                names: vec!["Widget"],
            }),
            Arc::new(StaticProvider {
                kind: SearchKind::Files,
                names: vec!["Widget.rs"],
            }),
        ],
        16,
    );

    let callback = RecordingCallback::new();
    session.start("Widget", &[SearchKind::Files], callback.clone());
    settle().await;

    let items = callback.items.lock().clone();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].kind, SearchKind::Files);
}

#[tokio::test]
async fn stop_is_idempotent() {
    let session = SearchSession::new(
        vec![Arc::new(StaticProvider {
            kind: SearchKind::Types,
            names: vec!["Widget"],
        })],
        16,
    );

    let callback = RecordingCallback::new();
    session.start("Widget", &[SearchKind::Types], callback.clone());
    settle().await;
    assert_eq!(callback.done_count(), 1);

    session.stop();
    session.stop();
    settle().await;
    assert_eq!(callback.done_count(), 1);
}

#[tokio::test]
async fn starting_a_new_search_stops_the_prior_one() {
    let session = SearchSession::new(
        vec![
            Arc::new(SlowProvider) as Arc<dyn SearchProvider>,
            Arc::new(StaticProvider {
                kind: SearchKind::Files,
                names: vec!["Widget.rs"],
            }),
        ],
        16,
    );

    let slow_callback = RecordingCallback::new();
    session.start("slow", &[SearchKind::Types], slow_callback.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let fast_callback = RecordingCallback::new();
    session.start("Widget", &[SearchKind::Files], fast_callback.clone());
    settle().await;

    // The superseded search terminated and reported done exactly once.
    assert_eq!(slow_callback.done_count(), 1);
    let stalled = slow_callback.item_count();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(slow_callback.item_count(), stalled);

    assert_eq!(fast_callback.item_count(), 1);
    assert_eq!(fast_callback.done_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_leave_at_most_one_live_search() {
    let session = Arc::new(SearchSession::new(
        vec![Arc::new(SlowProvider) as Arc<dyn SearchProvider>],
        16,
    ));

    let callbacks: Vec<Arc<RecordingCallback>> =
        (0..4).map(|_| RecordingCallback::new()).collect();
    let starts: Vec<_> = callbacks
        .iter()
        .map(|callback| {
            let session = session.clone();
            let callback = callback.clone();
            tokio::spawn(async move {
                session.start("slow", &[SearchKind::Types], callback);
            })
        })
        .collect();
    for start in starts {
        start.await.unwrap();
    }
    settle().await;

    // Exactly one task survived the racing starts and is still streaming.
    let before: Vec<usize> = callbacks
        .iter()
        .map(|callback| callback.item_count())
        .collect();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let live = callbacks
        .iter()
        .zip(&before)
        .filter(|&(ref callback, &count)| callback.item_count() > count)
        .count();
    assert_eq!(live, 1);

    // Every superseded start reported done exactly once; the survivor only
    // reports once an explicit stop winds it down.
    let done: u32 = callbacks.iter().map(|callback| callback.done_count()).sum();
    assert_eq!(done, 3);

    session.stop();
    settle().await;
    let done: u32 = callbacks.iter().map(|callback| callback.done_count()).sum();
    assert_eq!(done, 4);
}

#[tokio::test]
async fn provider_failure_still_signals_done_exactly_once() {
    let session = SearchSession::new(vec![Arc::new(FailingProvider) as Arc<dyn SearchProvider>], 16);

    let callback = RecordingCallback::new();
    session.start("anything", &[SearchKind::Members], callback.clone());
    settle().await;

    assert_eq!(callback.item_count(), 1);
    assert_eq!(callback.done_count(), 1);
}
