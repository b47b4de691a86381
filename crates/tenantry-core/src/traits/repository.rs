//! Generic repository contract shared by base stores and decorators.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::context::TenantContext;
use crate::error::AppError;
use crate::result::AppResult;
use crate::types::filter::Filters;
use crate::types::pipeline::PipelineStage;

/// Identifier types usable as repository keys.
pub trait EntityId: Clone + Eq + Hash + Display + Debug + Send + Sync + 'static {
    /// Produces a fresh identifier for a record created without one.
    fn generate() -> Self;

    /// Whether this is the zero value that asks the store to generate one.
    fn is_unset(&self) -> bool;
}

impl EntityId for Uuid {
    fn generate() -> Self {
        Uuid::new_v4()
    }

    fn is_unset(&self) -> bool {
        self.is_nil()
    }
}

impl EntityId for String {
    fn generate() -> Self {
        Uuid::new_v4().to_string()
    }

    fn is_unset(&self) -> bool {
        self.is_empty()
    }
}

/// Entities exposing a stable identity.
pub trait Identified<Id> {
    fn id(&self) -> Id;
    fn set_id(&mut self, id: Id);
}

/// Generic CRUD contract over an entity type and its identifier.
///
/// Base stores implement it against memory or the document database;
/// decorators implement it by wrapping another `Repository` and adding a
/// single concern. No implementation retries internally.
#[async_trait]
pub trait Repository<T, Id>: Send + Sync + 'static
where
    T: Send + Sync + 'static,
    Id: Send + Sync + 'static,
{
    /// Persists a new record. A zero-value ID is replaced by a generated one.
    async fn create(&self, ctx: &TenantContext, entity: T) -> AppResult<T>;

    /// Fetches one record, or `NotFound`.
    async fn get_by_id(&self, ctx: &TenantContext, id: &Id) -> AppResult<T>;

    /// Fetches any record matching every filter, or `NotFound`.
    async fn get_first(&self, ctx: &TenantContext, filters: Filters) -> AppResult<T>;

    /// Replaces the stored record, or `NotFound`.
    async fn update(&self, ctx: &TenantContext, id: &Id, entity: T) -> AppResult<T>;

    /// Removes the record (soft-delete for audited stacks), or `NotFound`.
    async fn delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()>;

    async fn get_all(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>>;

    /// Paginated listing. `skip < 0`, `take < 0` or `take > 1000` is a validation error.
    async fn get_all_skip_take(
        &self,
        ctx: &TenantContext,
        filters: Filters,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<T>>;

    async fn list(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>>;

    /// Runs a store-specific aggregation. Unsupported unless overridden.
    async fn aggregate(
        &self,
        _ctx: &TenantContext,
        _pipeline: &[PipelineStage],
    ) -> AppResult<Vec<T>> {
        Err(AppError::internal(
            "Aggregate is not supported by this repository",
        ))
    }
}

#[async_trait]
impl<T, Id, R> Repository<T, Id> for Arc<R>
where
    T: Send + Sync + 'static,
    Id: Send + Sync + 'static,
    R: Repository<T, Id> + ?Sized,
{
    async fn create(&self, ctx: &TenantContext, entity: T) -> AppResult<T> {
        (**self).create(ctx, entity).await
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: &Id) -> AppResult<T> {
        (**self).get_by_id(ctx, id).await
    }

    async fn get_first(&self, ctx: &TenantContext, filters: Filters) -> AppResult<T> {
        (**self).get_first(ctx, filters).await
    }

    async fn update(&self, ctx: &TenantContext, id: &Id, entity: T) -> AppResult<T> {
        (**self).update(ctx, id, entity).await
    }

    async fn delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        (**self).delete(ctx, id).await
    }

    async fn get_all(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        (**self).get_all(ctx, filters).await
    }

    async fn get_all_skip_take(
        &self,
        ctx: &TenantContext,
        filters: Filters,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<T>> {
        (**self).get_all_skip_take(ctx, filters, skip, take).await
    }

    async fn list(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        (**self).list(ctx, filters).await
    }

    async fn aggregate(
        &self,
        ctx: &TenantContext,
        pipeline: &[PipelineStage],
    ) -> AppResult<Vec<T>> {
        (**self).aggregate(ctx, pipeline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_id_zero_value() {
        assert!(Uuid::nil().is_unset());
        assert!(!Uuid::generate().is_unset());
    }

    #[test]
    fn test_string_id_zero_value() {
        assert!(String::new().is_unset());
        let generated = String::generate();
        assert!(Uuid::parse_str(&generated).is_ok());
    }
}
