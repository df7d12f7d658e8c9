//! Tuning knobs for the scheduling core.
//!
//! Hosts usually run with the defaults; the struct is deserializable so a
//! host can load overrides from its own settings file.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Quiescence window after the last triggering input before a feature
    /// commits to computing, in milliseconds.
    pub quiescence_ms: u64,
    /// Delay between the first enqueue of a batch and its drain, in
    /// milliseconds. Near-immediate, but long enough to coalesce same-tick
    /// enqueues.
    pub batch_delay_ms: u64,
    /// Capacity of the channel streaming search results back to the callback.
    pub search_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            quiescence_ms: 300,
            batch_delay_ms: 10,
            search_channel_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn quiescence(&self) -> Duration {
        Duration::from_millis(self.quiescence_ms)
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    /// Parses a config from the host's JSON settings blob.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
