use std::path::PathBuf;
use std::time::Duration;

use recordkit_core::StoreKind;
use serde::{Deserialize, Serialize};

/// Configuration of the store behind a [`StoreContext`](super::StoreContext).
///
/// Controls which durable backend is opened and how the mutation queue runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreConfig {
    /// Which backend to open.
    pub kind: StoreKind,
    /// Database file for the durable kind.
    pub path: Option<PathBuf>,
    /// Interval between automatic `persist()` runs in milliseconds. 0 = off.
    pub auto_persist_interval_ms: u64,
    /// Capacity of the mutation queue's task channel.
    pub mutation_queue_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::InMemory,
            path: None,
            auto_persist_interval_ms: 0,
            mutation_queue_capacity: 256,
        }
    }
}

impl StoreConfig {
    /// Durable store at `path`.
    #[must_use]
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: StoreKind::Durable,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn auto_persist_interval(&self) -> Option<Duration> {
        (self.auto_persist_interval_ms > 0)
            .then(|| Duration::from_millis(self.auto_persist_interval_ms))
    }
}

/// Configuration of a [`RequestProcessor`](super::RequestProcessor).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Minimum number of attempts for every request.
    pub default_retries: u32,
    /// Timeout per attempt in milliseconds. 0 = no timeout.
    pub request_timeout_ms: u64,
    /// Buffer size of change-stream event channels.
    pub event_channel_capacity: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            default_retries: 1,
            request_timeout_ms: 30_000,
            event_channel_capacity: 64,
        }
    }
}
