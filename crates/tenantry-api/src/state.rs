//! Application state shared across handlers and middleware.

use std::sync::Arc;

use uuid::Uuid;

use tenantry_core::config::AppConfig;
use tenantry_entity::Customer;
use tenantry_metrics::{MetricsPersister, MetricsRegistry};
use tenantry_repository::Pipeline;

/// Shared dependencies, cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Live request metrics.
    pub metrics: Arc<MetricsRegistry>,
    /// Snapshot storage backing the metrics history routes.
    pub metrics_persister: Arc<dyn MetricsPersister>,
    /// The customer resource pipeline.
    pub customers: Pipeline<Customer, Uuid>,
}
