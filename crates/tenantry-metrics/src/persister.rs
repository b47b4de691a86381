//! Snapshot persistence.

use std::collections::BTreeMap;
use std::fmt::Debug;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, DurationRound, TimeDelta, TimeZone, Utc};
use tokio::sync::RwLock;

use tenantry_core::result::AppResult;
use tenantry_entity::metrics::{AggregatedMetrics, MetricsInterval, MetricsSnapshot};

/// Storage for [`MetricsSnapshot`]s.
///
/// A `None` tenant means "all tenants" on every read.
#[async_trait]
pub trait MetricsPersister: Send + Sync + Debug + 'static {
    async fn save(&self, snapshot: &MetricsSnapshot) -> AppResult<()>;

    /// Snapshots recorded within `[from, to]`, newest first.
    async fn history(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<MetricsSnapshot>>;

    /// The `limit` most recent snapshots.
    async fn latest(&self, tenant_id: Option<&str>, limit: u32) -> AppResult<Vec<MetricsSnapshot>>;

    /// Deletes snapshots older than `days` days. Returns how many were removed.
    async fn purge_older_than(&self, days: u32) -> AppResult<u64>;

    /// Per-bucket averages within `[from, to]`, oldest bucket first.
    async fn aggregate(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: MetricsInterval,
    ) -> AppResult<Vec<AggregatedMetrics>>;
}

/// Start of the bucket containing `at`.
pub fn bucket_start(at: DateTime<Utc>, interval: MetricsInterval) -> DateTime<Utc> {
    match interval {
        MetricsInterval::Hour => at.duration_trunc(TimeDelta::hours(1)).unwrap_or(at),
        MetricsInterval::Day => at.duration_trunc(TimeDelta::days(1)).unwrap_or(at),
        MetricsInterval::Month => Utc
            .with_ymd_and_hms(at.year(), at.month(), 1, 0, 0, 0)
            .single()
            .unwrap_or(at),
    }
}

fn tenant_matches(snapshot: &MetricsSnapshot, tenant_id: Option<&str>) -> bool {
    tenant_id.is_none_or(|tenant| snapshot.tenant_id.as_deref() == Some(tenant))
}

/// In-memory persister for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryMetricsPersister {
    snapshots: RwLock<Vec<MetricsSnapshot>>,
}

impl MemoryMetricsPersister {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn newest_first(mut snapshots: Vec<MetricsSnapshot>) -> Vec<MetricsSnapshot> {
        snapshots.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        snapshots
    }
}

#[async_trait]
impl MetricsPersister for MemoryMetricsPersister {
    async fn save(&self, snapshot: &MetricsSnapshot) -> AppResult<()> {
        self.snapshots.write().await.push(snapshot.clone());
        Ok(())
    }

    async fn history(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<MetricsSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let found = snapshots
            .iter()
            .filter(|s| tenant_matches(s, tenant_id))
            .filter(|s| s.recorded_at >= from && s.recorded_at <= to)
            .cloned()
            .collect();
        Ok(Self::newest_first(found))
    }

    async fn latest(&self, tenant_id: Option<&str>, limit: u32) -> AppResult<Vec<MetricsSnapshot>> {
        let snapshots = self.snapshots.read().await;
        let found = snapshots
            .iter()
            .filter(|s| tenant_matches(s, tenant_id))
            .cloned()
            .collect();
        let mut newest = Self::newest_first(found);
        newest.truncate(limit as usize);
        Ok(newest)
    }

    async fn purge_older_than(&self, days: u32) -> AppResult<u64> {
        let cutoff = Utc::now() - TimeDelta::days(i64::from(days));
        let mut snapshots = self.snapshots.write().await;
        let before = snapshots.len();
        snapshots.retain(|s| s.recorded_at >= cutoff);
        Ok((before - snapshots.len()) as u64)
    }

    async fn aggregate(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: MetricsInterval,
    ) -> AppResult<Vec<AggregatedMetrics>> {
        let snapshots = self.snapshots.read().await;
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<&MetricsSnapshot>> = BTreeMap::new();
        for snapshot in snapshots
            .iter()
            .filter(|s| tenant_matches(s, tenant_id))
            .filter(|s| s.recorded_at >= from && s.recorded_at <= to)
        {
            buckets
                .entry(bucket_start(snapshot.recorded_at, interval))
                .or_default()
                .push(snapshot);
        }

        Ok(buckets
            .into_iter()
            .map(|(bucket, members)| {
                let n = members.len() as f64;
                let avg = |f: fn(&MetricsSnapshot) -> f64| members.iter().map(|s| f(s)).sum::<f64>() / n;
                AggregatedMetrics {
                    bucket,
                    snapshots: members.len() as i64,
                    avg_total_requests: avg(|s| s.total_requests as f64),
                    avg_total_errors: avg(|s| s.total_errors as f64),
                    avg_error_rate: avg(|s| s.error_rate),
                    avg_active_requests: avg(|s| s.active_requests as f64),
                }
            })
            .collect())
    }
}
