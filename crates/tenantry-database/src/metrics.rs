//! PostgreSQL-backed metrics snapshot persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use tenantry_core::error::{AppError, ErrorKind};
use tenantry_core::result::AppResult;
use tenantry_entity::metrics::{AggregatedMetrics, MetricsInterval, MetricsSnapshot};
use tenantry_metrics::MetricsPersister;

const SNAPSHOT_COLUMNS: &str = "id, recorded_at, tenant_id, uptime_seconds, active_requests, \
     total_requests, total_errors, error_rate, endpoints, memory_usage";

/// Stores snapshots in `metrics_snapshots`. A `None` tenant reads every tenant.
#[derive(Debug, Clone)]
pub struct PgMetricsPersister {
    pool: PgPool,
}

impl PgMetricsPersister {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetricsPersister for PgMetricsPersister {
    async fn save(&self, snapshot: &MetricsSnapshot) -> AppResult<()> {
        sqlx::query(&format!(
            "INSERT INTO metrics_snapshots ({SNAPSHOT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(&snapshot.id)
        .bind(snapshot.recorded_at)
        .bind(&snapshot.tenant_id)
        .bind(snapshot.uptime_seconds)
        .bind(snapshot.active_requests)
        .bind(snapshot.total_requests)
        .bind(snapshot.total_errors)
        .bind(snapshot.error_rate)
        .bind(sqlx::types::Json(&snapshot.endpoints))
        .bind(sqlx::types::Json(&snapshot.memory_usage))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save metrics snapshot", e))?;
        Ok(())
    }

    async fn history(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<MetricsSnapshot>> {
        sqlx::query_as::<_, MetricsSnapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metrics_snapshots \
             WHERE ($1::text IS NULL OR tenant_id = $1) AND recorded_at BETWEEN $2 AND $3 \
             ORDER BY recorded_at DESC"
        ))
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load metrics history", e))
    }

    async fn latest(&self, tenant_id: Option<&str>, limit: u32) -> AppResult<Vec<MetricsSnapshot>> {
        sqlx::query_as::<_, MetricsSnapshot>(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM metrics_snapshots \
             WHERE ($1::text IS NULL OR tenant_id = $1) \
             ORDER BY recorded_at DESC LIMIT $2"
        ))
        .bind(tenant_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load latest metrics", e))
    }

    async fn purge_older_than(&self, days: u32) -> AppResult<u64> {
        let result = sqlx::query(
            "DELETE FROM metrics_snapshots WHERE recorded_at < now() - make_interval(days => $1)",
        )
        .bind(i32::try_from(days).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to purge metrics snapshots", e))?;
        Ok(result.rows_affected())
    }

    async fn aggregate(
        &self,
        tenant_id: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        interval: MetricsInterval,
    ) -> AppResult<Vec<AggregatedMetrics>> {
        sqlx::query_as::<_, AggregatedMetrics>(
            "SELECT date_trunc($1, recorded_at, 'UTC') AS bucket, \
                    COUNT(*) AS snapshots, \
                    AVG(total_requests)::float8 AS avg_total_requests, \
                    AVG(total_errors)::float8 AS avg_total_errors, \
                    AVG(error_rate)::float8 AS avg_error_rate, \
                    AVG(active_requests)::float8 AS avg_active_requests \
             FROM metrics_snapshots \
             WHERE ($2::text IS NULL OR tenant_id = $2) AND recorded_at BETWEEN $3 AND $4 \
             GROUP BY bucket \
             ORDER BY bucket",
        )
        .bind(interval.as_str())
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to aggregate metrics", e))
    }
}
