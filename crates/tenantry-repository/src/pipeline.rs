//! Assembles the decorator stack for one entity type.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use tenantry_core::audit::Auditable;
use tenantry_core::diff::Diffable;
use tenantry_core::traits::cache::CacheProvider;
use tenantry_core::traits::repository::{EntityId, Identified, Repository};

use crate::audit::AuditRepository;
use crate::cached::CachedRepository;
use crate::history::{EntityHistory, HistoryRepository, HistoryStore};

/// An assembled stack.
pub struct Pipeline<T, Id> {
    /// The outermost layer. All CRUD goes through here.
    pub repository: Arc<dyn Repository<T, Id>>,
    /// Change-log reader, present when history recording is enabled.
    pub history: Option<Arc<dyn EntityHistory<Id>>>,
}

impl<T, Id> Clone for Pipeline<T, Id> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            history: self.history.clone(),
        }
    }
}

/// Builds `Cache -> History -> Audit -> base` around a base store.
///
/// Audit is always applied. History and cache are added only when configured.
///
/// ```ignore
/// let customers = PipelineBuilder::<Customer, Uuid>::new("Customer")
///     .with_history(history_store)
///     .with_cache(cache.provider(), Duration::ZERO)
///     .build(MemoryRepository::new());
/// ```
pub struct PipelineBuilder<T, Id> {
    entity_type: String,
    history: Option<Arc<dyn HistoryStore>>,
    cache: Option<(Arc<dyn CacheProvider>, Duration)>,
    _marker: PhantomData<fn() -> (T, Id)>,
}

impl<T, Id> PipelineBuilder<T, Id>
where
    T: Auditable
        + Identified<Id>
        + Diffable
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
    Id: EntityId,
{
    /// `entity_type` names the type in cache keys and history entries.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            history: None,
            cache: None,
            _marker: PhantomData,
        }
    }

    /// Records field diffs on update into `store`.
    pub fn with_history(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(store);
        self
    }

    /// Caches point lookups and tenant lists. A zero `ttl` uses the provider default.
    pub fn with_cache(mut self, cache: Arc<dyn CacheProvider>, ttl: Duration) -> Self {
        self.cache = Some((cache, ttl));
        self
    }

    /// Wraps `base` and returns the outermost layer.
    pub fn build<B>(self, base: B) -> Pipeline<T, Id>
    where
        B: Repository<T, Id>,
    {
        let mut repository: Arc<dyn Repository<T, Id>> = Arc::new(AuditRepository::new(base));
        let mut history: Option<Arc<dyn EntityHistory<Id>>> = None;

        if let Some(store) = self.history {
            let layer = Arc::new(HistoryRepository::new(
                repository,
                store,
                self.entity_type.clone(),
            ));
            history = Some(layer.clone() as Arc<dyn EntityHistory<Id>>);
            repository = layer;
        }

        if let Some((cache, ttl)) = self.cache {
            repository = Arc::new(CachedRepository::new(
                repository,
                cache,
                self.entity_type.clone(),
                ttl,
            ));
        }

        info!(
            entity_type = %self.entity_type,
            history = history.is_some(),
            "Repository pipeline assembled"
        );

        Pipeline {
            repository,
            history,
        }
    }
}
