//! History decorator.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use tenantry_core::context::TenantContext;
use tenantry_core::diff::{DiffView, Diffable};
use tenantry_core::result::AppResult;
use tenantry_core::traits::repository::{EntityId, Repository};
use tenantry_core::types::filter::Filters;
use tenantry_core::types::pipeline::PipelineStage;
use tenantry_entity::history::HistoryEntry;

use super::store::HistoryStore;

/// Read access to the change log of one entity type.
#[async_trait]
pub trait EntityHistory<Id>: Send + Sync + 'static
where
    Id: Send + Sync + 'static,
{
    /// History of `id` within the context tenant, newest first.
    async fn get_history(&self, ctx: &TenantContext, id: &Id) -> AppResult<Vec<HistoryEntry>>;
}

/// Records a [`HistoryEntry`] for every update that changes at least one field.
///
/// The record is read before the update and diffed against the value the
/// wrapped store returns. Recording is best effort: a failed pre-read skips
/// the diff and a failed append is logged, neither fails the update. The
/// read and the update are not atomic, so concurrent writers can produce a
/// stale "before" value.
///
/// Every other operation passes straight through.
#[derive(Debug, Clone)]
pub struct HistoryRepository<R> {
    inner: R,
    store: Arc<dyn HistoryStore>,
    entity_type: String,
}

impl<R> HistoryRepository<R> {
    pub fn new(inner: R, store: Arc<dyn HistoryStore>, entity_type: impl Into<String>) -> Self {
        Self {
            inner,
            store,
            entity_type: entity_type.into(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    async fn record<T: Diffable>(&self, ctx: &TenantContext, id: String, before: &T, after: &T) {
        let changes = DiffView::changes(&before.diff_view(), &after.diff_view());
        if changes.is_empty() {
            debug!(entity_type = %self.entity_type, entity_id = %id, "Update changed no tracked fields");
            return;
        }

        let fields = changes.len();
        let entry = HistoryEntry::update(ctx, &self.entity_type, id, changes);
        let entity_id = entry.entity_id.clone();
        match self.store.append(entry).await {
            Ok(()) => debug!(
                entity_type = %self.entity_type,
                entity_id = %entity_id,
                fields,
                "Recorded change history"
            ),
            Err(e) => warn!(
                entity_type = %self.entity_type,
                entity_id = %entity_id,
                error = %e,
                "Failed to record change history"
            ),
        }
    }
}

#[async_trait]
impl<R, T, Id> Repository<T, Id> for HistoryRepository<R>
where
    R: Repository<T, Id>,
    T: Diffable + Send + Sync + 'static,
    Id: EntityId,
{
    async fn create(&self, ctx: &TenantContext, entity: T) -> AppResult<T> {
        self.inner.create(ctx, entity).await
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: &Id) -> AppResult<T> {
        self.inner.get_by_id(ctx, id).await
    }

    async fn get_first(&self, ctx: &TenantContext, filters: Filters) -> AppResult<T> {
        self.inner.get_first(ctx, filters).await
    }

    async fn update(&self, ctx: &TenantContext, id: &Id, entity: T) -> AppResult<T> {
        let before = match self.inner.get_by_id(ctx, id).await {
            Ok(before) => Some(before),
            Err(e) => {
                debug!(
                    entity_type = %self.entity_type,
                    entity_id = %id,
                    error = %e,
                    "Skipping history, current record could not be read"
                );
                None
            }
        };

        let updated = self.inner.update(ctx, id, entity).await?;

        if let Some(before) = before {
            self.record(ctx, id.to_string(), &before, &updated).await;
        }
        Ok(updated)
    }

    async fn delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        self.inner.delete(ctx, id).await
    }

    async fn get_all(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        self.inner.get_all(ctx, filters).await
    }

    async fn get_all_skip_take(
        &self,
        ctx: &TenantContext,
        filters: Filters,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<T>> {
        self.inner.get_all_skip_take(ctx, filters, skip, take).await
    }

    async fn list(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        self.inner.list(ctx, filters).await
    }

    async fn aggregate(
        &self,
        ctx: &TenantContext,
        pipeline: &[PipelineStage],
    ) -> AppResult<Vec<T>> {
        self.inner.aggregate(ctx, pipeline).await
    }
}

#[async_trait]
impl<R, Id> EntityHistory<Id> for HistoryRepository<R>
where
    R: Send + Sync + 'static,
    Id: EntityId,
{
    async fn get_history(&self, ctx: &TenantContext, id: &Id) -> AppResult<Vec<HistoryEntry>> {
        self.store
            .find_by_entity(&self.entity_type, &id.to_string(), ctx.tenant_id())
            .await
    }
}
