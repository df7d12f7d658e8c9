//! Performance metrics for the scheduling core.
//!
//! Lightweight in-memory counters to monitor queue and resolution behavior
//! in production. Hosts can poll a snapshot periodically or dump it on
//! shutdown.
//!
//! ## Design
//!
//! - Lock-free atomic counters for high-frequency operations
//! - DashMap for low-contention timing storage
//! - Minimal overhead per update

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rustc_hash::FxHashMap;

/// Global metrics registry (singleton)
static METRICS: once_cell::sync::Lazy<Arc<Metrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(Metrics::new()));

/// Get the global metrics instance
pub fn metrics() -> &'static Arc<Metrics> {
    &METRICS
}

#[derive(Debug)]
pub struct Metrics {
    // Work queue counters
    items_enqueued: AtomicU64,
    items_executed: AtomicU64,
    items_cancelled: AtomicU64,
    items_failed: AtomicU64,
    /// Subset of `items_executed` that ran synchronously on the caller.
    fast_path_runs: AtomicU64,
    drains: AtomicU64,

    // Feature counters
    resolutions: AtomicU64,
    searches_started: AtomicU64,

    // Timings (operation name -> durations in microseconds)
    operation_timings: DashMap<String, Vec<u64>>,
}

impl Metrics {
    fn new() -> Self {
        Self {
            items_enqueued: AtomicU64::new(0),
            items_executed: AtomicU64::new(0),
            items_cancelled: AtomicU64::new(0),
            items_failed: AtomicU64::new(0),
            fast_path_runs: AtomicU64::new(0),
            drains: AtomicU64::new(0),
            resolutions: AtomicU64::new(0),
            searches_started: AtomicU64::new(0),
            operation_timings: DashMap::new(),
        }
    }

    pub fn record_enqueue(&self) {
        self.items_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_executed(&self) {
        self.items_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.items_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fast_path(&self) {
        self.fast_path_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drain(&self) {
        self.drains.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_search_started(&self) {
        self.searches_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the duration of a named operation.
    pub fn record_timing(&self, operation: &str, duration: Duration) {
        self.operation_timings
            .entry(operation.to_string())
            .or_default()
            .push(duration.as_micros() as u64);
    }

    /// Point-in-time copy of all counters and timing aggregates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut timings = FxHashMap::default();
        for entry in self.operation_timings.iter() {
            let samples = entry.value();
            if samples.is_empty() {
                continue;
            }
            let total: u64 = samples.iter().sum();
            timings.insert(
                entry.key().clone(),
                TimingStats {
                    count: samples.len() as u64,
                    mean_us: total / samples.len() as u64,
                    max_us: samples.iter().copied().max().unwrap_or(0),
                },
            );
        }
        MetricsSnapshot {
            items_enqueued: self.items_enqueued.load(Ordering::Relaxed),
            items_executed: self.items_executed.load(Ordering::Relaxed),
            items_cancelled: self.items_cancelled.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            fast_path_runs: self.fast_path_runs.load(Ordering::Relaxed),
            drains: self.drains.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            searches_started: self.searches_started.load(Ordering::Relaxed),
            timings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingStats {
    pub count: u64,
    pub mean_us: u64,
    pub max_us: u64,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub items_enqueued: u64,
    pub items_executed: u64,
    pub items_cancelled: u64,
    pub items_failed: u64,
    pub fast_path_runs: u64,
    pub drains: u64,
    pub resolutions: u64,
    pub searches_started: u64,
    pub timings: FxHashMap<String, TimingStats>,
}
