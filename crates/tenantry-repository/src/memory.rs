//! Map-backed repository used for tests and as the no-database fallback.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use tenantry_core::context::TenantContext;
use tenantry_core::error::AppError;
use tenantry_core::result::AppResult;
use tenantry_core::traits::repository::{EntityId, Identified, Repository};
use tenantry_core::types::filter::Filters;
use tenantry_core::types::pagination::SkipTake;
use tenantry_core::types::pipeline::PipelineStage;

use crate::matcher;

#[derive(Debug)]
struct Slot<T> {
    seq: u64,
    entity: T,
}

#[derive(Debug)]
struct State<Id, T> {
    next_seq: u64,
    records: HashMap<Id, Slot<T>>,
}

/// In-memory repository.
///
/// Records are kept in insertion order for listings. Filters are evaluated
/// against each entity's JSON form (see [`matcher`]). Delete is physical;
/// soft-delete comes from wrapping this store in an
/// [`AuditRepository`](crate::AuditRepository).
#[derive(Debug)]
pub struct MemoryRepository<T, Id> {
    state: RwLock<State<Id, T>>,
}

impl<T, Id> MemoryRepository<T, Id>
where
    T: Identified<Id> + Serialize + Clone + Send + Sync + 'static,
    Id: EntityId,
{
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State {
                next_seq: 0,
                records: HashMap::new(),
            }),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn matching(&self, filters: &Filters) -> AppResult<Vec<T>> {
        let state = self.state.read().await;
        let mut slots: Vec<&Slot<T>> = state.records.values().collect();
        slots.sort_by_key(|slot| slot.seq);

        let mut out = Vec::new();
        for slot in slots {
            if filters.is_empty() || matcher::matches(&serde_json::to_value(&slot.entity)?, filters)
            {
                out.push(slot.entity.clone());
            }
        }
        Ok(out)
    }
}

impl<T, Id> Default for MemoryRepository<T, Id>
where
    T: Identified<Id> + Serialize + Clone + Send + Sync + 'static,
    Id: EntityId,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T, Id> Repository<T, Id> for MemoryRepository<T, Id>
where
    T: Identified<Id> + Serialize + Clone + Send + Sync + 'static,
    Id: EntityId,
{
    #[instrument(skip_all)]
    async fn create(&self, _ctx: &TenantContext, mut entity: T) -> AppResult<T> {
        let mut id = entity.id();
        if id.is_unset() {
            id = Id::generate();
            entity.set_id(id.clone());
        }

        let mut state = self.state.write().await;
        if state.records.contains_key(&id) {
            return Err(AppError::conflict("A record with this id already exists"));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.records.insert(
            id.clone(),
            Slot {
                seq,
                entity: entity.clone(),
            },
        );

        debug!(id = %id, "Created in-memory record");
        Ok(entity)
    }

    async fn get_by_id(&self, _ctx: &TenantContext, id: &Id) -> AppResult<T> {
        self.state
            .read()
            .await
            .records
            .get(id)
            .map(|slot| slot.entity.clone())
            .ok_or_else(|| AppError::not_found("Record not found"))
    }

    async fn get_first(&self, _ctx: &TenantContext, filters: Filters) -> AppResult<T> {
        self.matching(&filters)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("No record matches the filters"))
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn update(&self, _ctx: &TenantContext, id: &Id, mut entity: T) -> AppResult<T> {
        let mut state = self.state.write().await;
        let slot = state
            .records
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Record not found"))?;

        entity.set_id(id.clone());
        slot.entity = entity.clone();
        Ok(entity)
    }

    async fn delete(&self, _ctx: &TenantContext, id: &Id) -> AppResult<()> {
        match self.state.write().await.records.remove(id) {
            Some(_) => {
                debug!(id = %id, "Removed in-memory record");
                Ok(())
            }
            None => Err(AppError::not_found("Record not found")),
        }
    }

    async fn get_all(&self, _ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        self.matching(&filters).await
    }

    async fn get_all_skip_take(
        &self,
        _ctx: &TenantContext,
        filters: Filters,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<T>> {
        let page = SkipTake::new(skip, take)?;
        Ok(page.apply(self.matching(&filters).await?))
    }

    async fn list(&self, _ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        self.matching(&filters).await
    }

    async fn aggregate(
        &self,
        _ctx: &TenantContext,
        _pipeline: &[PipelineStage],
    ) -> AppResult<Vec<T>> {
        Err(AppError::internal(
            "Aggregate is not supported by the in-memory repository",
        ))
    }
}
