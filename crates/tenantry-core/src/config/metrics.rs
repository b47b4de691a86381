//! Request metrics configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Request metrics tracking and persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether requests are tracked at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum number of distinct `"METHOD path"` keys tracked.
    #[serde(default = "default_max_endpoints")]
    pub max_endpoints: usize,
    /// Number of recent response times kept for the rolling average.
    #[serde(default = "default_max_response_times")]
    pub max_response_times: usize,
    /// Interval between stale-endpoint cleanups in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
    /// Interval between snapshot persists in seconds.
    #[serde(default = "default_persist_interval")]
    pub persist_interval_seconds: u64,
    /// Whether snapshots are written to the persistence store.
    #[serde(default)]
    pub enable_persistence: bool,
    /// Upper bound on a single persist call in seconds.
    #[serde(default = "default_persist_timeout")]
    pub persist_timeout_seconds: u64,
    /// Age in days after which persisted snapshots are purged.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl MetricsConfig {
    /// Cleanup interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    /// Persist interval as a [`Duration`].
    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_seconds)
    }

    /// Persist timeout as a [`Duration`].
    pub fn persist_timeout(&self) -> Duration {
        Duration::from_secs(self.persist_timeout_seconds)
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_endpoints: default_max_endpoints(),
            max_response_times: default_max_response_times(),
            cleanup_interval_seconds: default_cleanup_interval(),
            persist_interval_seconds: default_persist_interval(),
            enable_persistence: false,
            persist_timeout_seconds: default_persist_timeout(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_endpoints() -> usize {
    100
}

fn default_max_response_times() -> usize {
    1000
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_persist_interval() -> u64 {
    120
}

fn default_persist_timeout() -> u64 {
    10
}

fn default_retention_days() -> u32 {
    30
}
