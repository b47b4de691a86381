//! # tenantry-metrics
//!
//! In-process request metrics. [`MetricsRegistry`] counts requests per
//! endpoint and produces [`MetricsSnapshot`](tenantry_entity::MetricsSnapshot)s;
//! a [`MetricsPersister`] stores them; the jobs in [`jobs`] persist, prune
//! idle endpoints, and enforce snapshot retention.

pub mod jobs;
pub mod persister;
pub mod registry;

pub use jobs::{MetricsCleanupJob, MetricsRetentionJob, PersistMetricsJob};
pub use persister::{MemoryMetricsPersister, MetricsPersister};
pub use registry::{InFlight, MetricsRegistry};
