//! Periodic metrics housekeeping.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use tenantry_core::lifecycle::PeriodicJob;

use crate::persister::MetricsPersister;
use crate::registry::MetricsRegistry;

/// How often expired snapshots are purged.
pub const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Snapshots the registry and saves it, bounded by a timeout.
#[derive(Debug)]
pub struct PersistMetricsJob {
    registry: Arc<MetricsRegistry>,
    persister: Arc<dyn MetricsPersister>,
}

impl PersistMetricsJob {
    pub fn new(registry: Arc<MetricsRegistry>, persister: Arc<dyn MetricsPersister>) -> Self {
        Self {
            registry,
            persister,
        }
    }
}

#[async_trait]
impl PeriodicJob for PersistMetricsJob {
    fn name(&self) -> &str {
        "metrics-persist"
    }

    fn interval(&self) -> Duration {
        self.registry.config().persist_interval()
    }

    async fn run_once(&self) {
        let snapshot = self.registry.snapshot(None);
        let timeout = self.registry.config().persist_timeout();

        match tokio::time::timeout(timeout, self.persister.save(&snapshot)).await {
            Ok(Ok(())) => debug!(
                snapshot_id = %snapshot.id,
                total_requests = snapshot.total_requests,
                "Persisted metrics snapshot"
            ),
            Ok(Err(e)) => warn!(error = %e, "Failed to persist metrics snapshot"),
            Err(_) => warn!(
                timeout_secs = timeout.as_secs(),
                "Metrics snapshot persistence timed out"
            ),
        }
    }
}

/// Drops endpoints that have been idle for two cleanup intervals.
#[derive(Debug)]
pub struct MetricsCleanupJob {
    registry: Arc<MetricsRegistry>,
}

impl MetricsCleanupJob {
    pub fn new(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl PeriodicJob for MetricsCleanupJob {
    fn name(&self) -> &str {
        "metrics-cleanup"
    }

    fn interval(&self) -> Duration {
        self.registry.config().cleanup_interval()
    }

    async fn run_once(&self) {
        let removed = self.registry.cleanup(Utc::now());
        if removed > 0 {
            debug!(removed, "Removed idle metrics endpoints");
        }
    }
}

/// Deletes persisted snapshots past the retention window.
#[derive(Debug)]
pub struct MetricsRetentionJob {
    persister: Arc<dyn MetricsPersister>,
    retention_days: u32,
}

impl MetricsRetentionJob {
    pub fn new(persister: Arc<dyn MetricsPersister>, retention_days: u32) -> Self {
        Self {
            persister,
            retention_days,
        }
    }
}

#[async_trait]
impl PeriodicJob for MetricsRetentionJob {
    fn name(&self) -> &str {
        "metrics-retention"
    }

    fn interval(&self) -> Duration {
        RETENTION_SWEEP_INTERVAL
    }

    async fn run_once(&self) {
        match self.persister.purge_older_than(self.retention_days).await {
            Ok(0) => {}
            Ok(purged) => info!(
                purged,
                retention_days = self.retention_days,
                "Purged expired metrics snapshots"
            ),
            Err(e) => warn!(error = %e, "Failed to purge expired metrics snapshots"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use tenantry_core::config::metrics::MetricsConfig;
    use tenantry_core::result::AppResult;
    use tenantry_entity::metrics::{AggregatedMetrics, MetricsInterval, MetricsSnapshot};

    use crate::persister::MemoryMetricsPersister;

    fn registry() -> Arc<MetricsRegistry> {
        Arc::new(MetricsRegistry::new(MetricsConfig {
            persist_timeout_seconds: 1,
            ..MetricsConfig::default()
        }))
    }

    #[tokio::test]
    async fn test_persist_job_saves_snapshot() {
        let registry = registry();
        registry.start_request();
        registry.finish_request("GET", "/x", 200, Duration::from_millis(3));
        let persister = Arc::new(MemoryMetricsPersister::new());

        PersistMetricsJob::new(registry, persister.clone())
            .run_once()
            .await;

        let latest = persister.latest(None, 10).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].total_requests, 1);
    }

    #[derive(Debug)]
    struct StuckPersister;

    #[async_trait]
    impl MetricsPersister for StuckPersister {
        async fn save(&self, _snapshot: &MetricsSnapshot) -> AppResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn history(
            &self,
            _tenant_id: Option<&str>,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> AppResult<Vec<MetricsSnapshot>> {
            Ok(Vec::new())
        }

        async fn latest(&self, _tenant_id: Option<&str>, _limit: u32) -> AppResult<Vec<MetricsSnapshot>> {
            Ok(Vec::new())
        }

        async fn purge_older_than(&self, _days: u32) -> AppResult<u64> {
            Ok(0)
        }

        async fn aggregate(
            &self,
            _tenant_id: Option<&str>,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
            _interval: MetricsInterval,
        ) -> AppResult<Vec<AggregatedMetrics>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_job_gives_up_after_timeout() {
        let job = PersistMetricsJob::new(registry(), Arc::new(StuckPersister));
        let started = tokio::time::Instant::now();

        job.run_once().await;

        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retention_job_purges_old_snapshots() {
        let persister = Arc::new(MemoryMetricsPersister::new());
        let mut old = registry().snapshot(None);
        old.recorded_at = Utc::now() - TimeDelta::days(31);
        persister.save(&old).await.unwrap();
        persister.save(&registry().snapshot(None)).await.unwrap();

        MetricsRetentionJob::new(persister.clone(), 30).run_once().await;
        assert_eq!(persister.len().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_job_uses_configured_interval() {
        let registry = registry();
        let job = MetricsCleanupJob::new(registry.clone());
        assert_eq!(job.interval(), Duration::from_secs(300));
        job.run_once().await;
        assert_eq!(registry.tracked_endpoints(), 0);
    }
}
