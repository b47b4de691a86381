//! Append-only history log.

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tenantry_core::result::AppResult;
use tenantry_entity::history::HistoryEntry;

/// Storage for [`HistoryEntry`] records.
///
/// Entries are never mutated or deleted through this trait.
#[async_trait]
pub trait HistoryStore: Send + Sync + Debug {
    /// Appends one entry.
    async fn append(&self, entry: HistoryEntry) -> AppResult<()>;

    /// Entries for one entity within one tenant, newest first.
    ///
    /// `tenant_id` matches exactly: `None` only finds entries recorded
    /// without a tenant.
    async fn find_by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        tenant_id: Option<&str>,
    ) -> AppResult<Vec<HistoryEntry>>;
}

/// Vector-backed history log. Ties on `trigger_at` list the later append first.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all entities.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn append(&self, entry: HistoryEntry) -> AppResult<()> {
        self.entries.write().await.push(entry);
        Ok(())
    }

    async fn find_by_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        tenant_id: Option<&str>,
    ) -> AppResult<Vec<HistoryEntry>> {
        let entries = self.entries.read().await;
        let mut found: Vec<HistoryEntry> = entries
            .iter()
            .rev()
            .filter(|e| {
                e.entity_type == entity_type
                    && e.entity_id == entity_id
                    && e.tenant_id.as_deref() == tenant_id
            })
            .cloned()
            .collect();

        // Stable sort keeps the reversed append order for equal timestamps.
        found.sort_by(|a, b| b.trigger_at.cmp(&a.trigger_at));
        Ok(found)
    }
}
