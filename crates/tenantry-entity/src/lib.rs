//! # tenantry-entity
//!
//! Record models. The history and metrics structs map to table rows and
//! derive `sqlx::FromRow` (JSON columns use `#[sqlx(json)]`); [`Customer`]
//! is a document stored through the repository pipeline.

pub mod customer;
pub mod history;
pub mod metrics;

pub use customer::Customer;
pub use history::HistoryEntry;
pub use metrics::{AggregatedMetrics, EndpointSnapshot, MemoryUsage, MetricsInterval, MetricsSnapshot};
