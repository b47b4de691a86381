//! PostgreSQL-backed change history log.

use async_trait::async_trait;
use sqlx::PgPool;

use tenantry_core::error::{AppError, ErrorKind};
use tenantry_core::result::AppResult;
use tenantry_entity::history::HistoryEntry;
use tenantry_repository::HistoryStore;

/// Appends to and reads from the `entity_history` table.
#[derive(Debug, Clone)]
pub struct PgHistoryStore {
    pool: PgPool,
}

impl PgHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PgHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO entity_history \
             (id, entity_id, entity_type, tenant_id, trigger_name, trigger_at, trigger_by, changes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.id)
        .bind(&entry.entity_id)
        .bind(&entry.entity_type)
        .bind(&entry.tenant_id)
        .bind(&entry.trigger_name)
        .bind(entry.trigger_at)
        .bind(&entry.trigger_by)
        .bind(sqlx::types::Json(&entry.changes))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to append history entry", e))?;
        Ok(())
    }

    async fn find_by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        tenant_id: Option<&str>,
    ) -> AppResult<Vec<HistoryEntry>> {
        sqlx::query_as::<_, HistoryEntry>(
            "SELECT id, entity_id, entity_type, tenant_id, trigger_name, trigger_at, trigger_by, changes \
             FROM entity_history \
             WHERE entity_type = $1 AND entity_id = $2 AND tenant_id IS NOT DISTINCT FROM $3 \
             ORDER BY trigger_at DESC, seq DESC",
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load entity history", e))
    }
}
