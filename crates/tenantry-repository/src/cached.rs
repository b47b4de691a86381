//! Cache-aside decorator.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use tenantry_cache::keys;
use tenantry_core::audit::Auditable;
use tenantry_core::context::TenantContext;
use tenantry_core::result::AppResult;
use tenantry_core::traits::cache::CacheProvider;
use tenantry_core::traits::repository::{EntityId, Repository};
use tenantry_core::types::filter::Filters;
use tenantry_core::types::pipeline::PipelineStage;
use tenantry_entity::history::HistoryEntry;

use crate::history::EntityHistory;

/// Memoizes point lookups and unfiltered tenant lists.
///
/// Keys come from [`keys::entity_by_id`] and [`keys::tenant_list`]. List
/// results are cached only when the call carries no filters and the context
/// has a tenant; everything else goes straight to the wrapped store. Writes
/// delegate first and invalidate afterwards.
///
/// Item keys carry no tenant, so a cached record is only served when it
/// belongs to the context tenant. Otherwise the lookup falls through to the
/// wrapped store, which applies its own scoping.
///
/// The cache is advisory. Read errors and undecodable payloads count as
/// misses, write and delete errors are logged.
#[derive(Debug, Clone)]
pub struct CachedRepository<R> {
    inner: R,
    cache: Arc<dyn CacheProvider>,
    ttl: Duration,
    type_name: String,
}

impl<R> CachedRepository<R> {
    /// `ttl` of zero defers to the provider's default TTL.
    pub fn new(
        inner: R,
        cache: Arc<dyn CacheProvider>,
        type_name: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            ttl,
            type_name: type_name.into(),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn item_key(&self, id: &impl std::fmt::Display) -> String {
        keys::entity_by_id(&self.type_name, id)
    }

    fn list_key(&self, ctx: &TenantContext, filters: &Filters) -> Option<String> {
        if !filters.is_empty() {
            return None;
        }
        ctx.tenant_id()
            .map(|tenant| keys::tenant_list(&self.type_name, tenant))
    }

    async fn read<V: DeserializeOwned>(&self, key: &str) -> Option<V> {
        let payload = match self.cache.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&payload) {
            Ok(value) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                self.invalidate(key).await;
                None
            }
        }
    }

    async fn write<V: Serialize + ?Sized>(&self, key: &str, value: &V) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => Bytes::from(payload),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, payload, self.ttl).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }

    async fn invalidate(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            warn!(key = %key, error = %e, "Cache invalidation failed");
        }
    }

    fn owned_by_context<T: Auditable>(ctx: &TenantContext, entity: &T) -> bool {
        match ctx.tenant_id() {
            Some(tenant) => entity.owner_tenant() == Some(tenant),
            None => true,
        }
    }

    async fn invalidate_list(&self, ctx: &TenantContext) {
        if let Some(tenant) = ctx.tenant_id() {
            self.invalidate(&keys::tenant_list(&self.type_name, tenant))
                .await;
        }
    }
}

#[async_trait]
impl<R, T, Id> Repository<T, Id> for CachedRepository<R>
where
    R: Repository<T, Id>,
    T: Auditable + Serialize + DeserializeOwned + Send + Sync + 'static,
    Id: EntityId,
{
    async fn create(&self, ctx: &TenantContext, entity: T) -> AppResult<T> {
        let created = self.inner.create(ctx, entity).await?;
        self.invalidate_list(ctx).await;
        Ok(created)
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: &Id) -> AppResult<T> {
        let key = self.item_key(id);
        if let Some(hit) = self.read::<T>(&key).await {
            if Self::owned_by_context(ctx, &hit) {
                return Ok(hit);
            }
            debug!(key = %key, "Cached record belongs to another tenant, bypassing");
        }

        let entity = self.inner.get_by_id(ctx, id).await?;
        self.write(&key, &entity).await;
        Ok(entity)
    }

    async fn get_first(&self, ctx: &TenantContext, filters: Filters) -> AppResult<T> {
        self.inner.get_first(ctx, filters).await
    }

    async fn update(&self, ctx: &TenantContext, id: &Id, entity: T) -> AppResult<T> {
        let updated = self.inner.update(ctx, id, entity).await?;
        self.invalidate(&self.item_key(id)).await;
        self.invalidate_list(ctx).await;
        Ok(updated)
    }

    async fn delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        self.inner.delete(ctx, id).await?;
        self.invalidate(&self.item_key(id)).await;
        self.invalidate_list(ctx).await;
        Ok(())
    }

    async fn get_all(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        let Some(key) = self.list_key(ctx, &filters) else {
            return self.inner.get_all(ctx, filters).await;
        };
        if let Some(hit) = self.read(&key).await {
            return Ok(hit);
        }

        let items = self.inner.get_all(ctx, filters).await?;
        self.write(&key, &items).await;
        Ok(items)
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
        let Some(key) = self.list_key(ctx, &filters) else {
            return self.inner.list(ctx, filters).await;
        };
        if let Some(hit) = self.read(&key).await {
            return Ok(hit);
        }

        let items = self.inner.list(ctx, filters).await?;
        self.write(&key, &items).await;
        Ok(items)
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
impl<R, Id> EntityHistory<Id> for CachedRepository<R>
where
    R: EntityHistory<Id>,
    Id: EntityId,
{
    async fn get_history(&self, ctx: &TenantContext, id: &Id) -> AppResult<Vec<HistoryEntry>> {
        self.inner.get_history(ctx, id).await
    }
}
