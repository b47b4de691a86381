//! Request metrics snapshot models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Per-endpoint counters at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    /// Requests served.
    pub requests: u64,
    /// Requests answered with status >= 400.
    pub errors: u64,
    /// Mean response time in milliseconds.
    pub avg_response_ms: f64,
    /// Last time the endpoint was hit.
    pub last_access: DateTime<Utc>,
}

/// Footprint of the metrics registry itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Distinct endpoint keys currently tracked.
    pub tracked_endpoints: u64,
    /// Response-time samples currently retained.
    pub response_samples: u64,
    /// Rough byte estimate of the tracked data.
    pub estimated_bytes: u64,
}

/// A point-in-time copy of the request metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct MetricsSnapshot {
    /// Snapshot identifier.
    pub id: String,
    /// When the snapshot was taken.
    pub recorded_at: DateTime<Utc>,
    /// Tenant the snapshot belongs to, if scoped.
    pub tenant_id: Option<String>,
    /// Process uptime in seconds.
    pub uptime_seconds: i64,
    /// Requests in flight.
    pub active_requests: i64,
    /// Requests served since start.
    pub total_requests: i64,
    /// Failed requests since start.
    pub total_errors: i64,
    /// Percentage of failed requests.
    pub error_rate: f64,
    /// Per-endpoint counters keyed by `"METHOD path"`.
    #[sqlx(json)]
    pub endpoints: BTreeMap<String, EndpointSnapshot>,
    /// Registry footprint.
    #[sqlx(json)]
    pub memory_usage: MemoryUsage,
}

/// Bucket width for aggregated metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsInterval {
    Hour,
    Day,
    Month,
}

impl MetricsInterval {
    /// The PostgreSQL `date_trunc` unit.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Month => "month",
        }
    }
}

/// Snapshot averages grouped into one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AggregatedMetrics {
    /// Start of the bucket.
    pub bucket: DateTime<Utc>,
    /// Snapshots in the bucket.
    pub snapshots: i64,
    pub avg_total_requests: f64,
    pub avg_total_errors: f64,
    pub avg_error_rate: f64,
    pub avg_active_requests: f64,
}
