//! Repository over the JSONB `documents` table.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use tenantry_core::context::TenantContext;
use tenantry_core::error::{AppError, ErrorKind};
use tenantry_core::result::AppResult;
use tenantry_core::traits::repository::{EntityId, Identified, Repository};
use tenantry_core::types::filter::Filters;
use tenantry_core::types::pagination::SkipTake;
use tenantry_core::types::pipeline::PipelineStage;

use super::query::{self, Deleted, Query, QueryArg};
use super::sanitize::sanitize_filters;

macro_rules! bind_args {
    ($statement:expr, $query:expr) => {{
        let mut statement = $statement;
        for arg in $query.args.iter().cloned() {
            statement = match arg {
                QueryArg::Text(v) => statement.bind(v),
                QueryArg::Uuid(v) => statement.bind(v),
                QueryArg::NullableUuid(v) => statement.bind(v),
                QueryArg::Json(v) => statement.bind(v),
                QueryArg::TextArray(v) => statement.bind(v),
                QueryArg::BigInt(v) => statement.bind(v),
            };
        }
        statement
    }};
}

/// Document store for one collection.
///
/// Reads exclude soft-deleted documents and are scoped to the context tenant,
/// which must be a UUID. Delete is physical.
#[derive(Debug)]
pub struct DocumentStore<T, Id> {
    pool: PgPool,
    collection: String,
    _marker: PhantomData<fn() -> (T, Id)>,
}

impl<T, Id> Clone for DocumentStore<T, Id> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            collection: self.collection.clone(),
            _marker: PhantomData,
        }
    }
}

/// Parses the context tenant into the column type.
fn tenant_uuid(ctx: &TenantContext) -> AppResult<Option<Uuid>> {
    ctx.tenant_id()
        .map(|tenant| {
            Uuid::parse_str(tenant).map_err(|_| AppError::validation("Invalid tenant ID"))
        })
        .transpose()
}

fn storage_error(action: &str, e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return AppError::conflict(format!("Failed to {action}: document already exists"));
        }
    }
    AppError::with_source(ErrorKind::Database, format!("Failed to {action}"), e)
}

fn encode<T: Serialize>(entity: &T) -> AppResult<Value> {
    serde_json::to_value(entity)
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to encode document", e))
}

fn decode<T: DeserializeOwned>(doc: Value) -> AppResult<T> {
    serde_json::from_value(doc)
        .map_err(|e| AppError::with_source(ErrorKind::Internal, "Failed to decode document", e))
}

impl<T, Id> DocumentStore<T, Id>
where
    T: Serialize + DeserializeOwned + Identified<Id> + Send + Sync + 'static,
    Id: EntityId,
{
    pub fn new(pool: PgPool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn not_found(&self, id: &Id) -> AppError {
        AppError::not_found(format!("{} {id} not found", self.collection))
    }

    async fn fetch_all(&self, query: Query, action: &str) -> AppResult<Vec<T>> {
        let docs: Vec<Value> = bind_args!(sqlx::query_scalar::<_, Value>(&query.sql), query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(action, e))?;
        docs.into_iter().map(decode).collect()
    }

    async fn fetch_optional(&self, query: Query, action: &str) -> AppResult<Option<T>> {
        bind_args!(sqlx::query_scalar::<_, Value>(&query.sql), query)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error(action, e))?
            .map(decode)
            .transpose()
    }

    async fn execute(&self, query: Query, action: &str) -> AppResult<u64> {
        bind_args!(sqlx::query(&query.sql), query)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected())
            .map_err(|e| storage_error(action, e))
    }

    async fn select(
        &self,
        ctx: &TenantContext,
        deleted: Deleted,
        filters: Filters,
        page: Option<SkipTake>,
    ) -> AppResult<Vec<T>> {
        let tenant = tenant_uuid(ctx)?;
        let filters = sanitize_filters(&filters)?;
        let query = query::select(&self.collection, tenant, deleted, &filters, page);
        self.fetch_all(query, "list documents").await
    }

    /// Lists documents regardless of soft-delete state.
    pub async fn get_all_including_deleted(
        &self,
        ctx: &TenantContext,
        filters: Filters,
    ) -> AppResult<Vec<T>> {
        ctx.run(
            "get_all_including_deleted",
            self.select(ctx, Deleted::Include, filters, None),
        )
        .await
    }

    /// Lists only soft-deleted documents.
    pub async fn get_deleted(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        ctx.run("get_deleted", self.select(ctx, Deleted::Only, filters, None))
            .await
    }

    /// Physically removes a document, deleted or not.
    pub async fn hard_delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        ctx.run("hard_delete", async {
            let tenant = tenant_uuid(ctx)?;
            let query = query::delete(&self.collection, tenant, &id.to_string());
            if self.execute(query, "delete document").await? == 0 {
                return Err(self.not_found(id));
            }
            debug!(collection = %self.collection, id = %id, "Hard-deleted document");
            Ok(())
        })
        .await
    }

    /// Clears the soft-delete markers of a deleted document.
    ///
    /// `NotFound` when the document is missing or not deleted.
    pub async fn restore(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        ctx.run("restore", async {
            let tenant = tenant_uuid(ctx)?;
            let query = query::restore(&self.collection, tenant, &id.to_string());
            if self.execute(query, "restore document").await? == 0 {
                return Err(self.not_found(id));
            }
            debug!(collection = %self.collection, id = %id, "Restored document");
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl<T, Id> Repository<T, Id> for DocumentStore<T, Id>
where
    T: Serialize + DeserializeOwned + Identified<Id> + Send + Sync + 'static,
    Id: EntityId,
{
    async fn create(&self, ctx: &TenantContext, mut entity: T) -> AppResult<T> {
        ctx.run("create", async {
            let tenant = tenant_uuid(ctx)?;
            if entity.id().is_unset() {
                entity.set_id(Id::generate());
            }
            let id = entity.id().to_string();
            let query = query::insert(&self.collection, &id, tenant, encode(&entity)?);
            let created = self
                .fetch_optional(query, "insert document")
                .await?
                .ok_or_else(|| AppError::internal("Insert returned no document"))?;
            debug!(collection = %self.collection, id = %id, "Inserted document");
            Ok(created)
        })
        .await
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: &Id) -> AppResult<T> {
        ctx.run("get_by_id", async {
            let tenant = tenant_uuid(ctx)?;
            let query = query::select_by_id(&self.collection, tenant, &id.to_string());
            self.fetch_optional(query, "fetch document")
                .await?
                .ok_or_else(|| self.not_found(id))
        })
        .await
    }

    async fn get_first(&self, ctx: &TenantContext, filters: Filters) -> AppResult<T> {
        ctx.run("get_first", async {
            let page = SkipTake { skip: 0, take: 1 };
            self.select(ctx, Deleted::Exclude, filters, Some(page))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    AppError::not_found(format!("No {} matches the filters", self.collection))
                })
        })
        .await
    }

    async fn update(&self, ctx: &TenantContext, id: &Id, mut entity: T) -> AppResult<T> {
        ctx.run("update", async {
            let tenant = tenant_uuid(ctx)?;
            entity.set_id(id.clone());
            let query = query::update(&self.collection, tenant, &id.to_string(), encode(&entity)?);
            self.fetch_optional(query, "update document")
                .await?
                .ok_or_else(|| self.not_found(id))
        })
        .await
    }

    async fn delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        self.hard_delete(ctx, id).await
    }

    async fn get_all(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        ctx.run("get_all", self.select(ctx, Deleted::Exclude, filters, None))
            .await
    }

    async fn get_all_skip_take(
        &self,
        ctx: &TenantContext,
        filters: Filters,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<T>> {
        let page = SkipTake::new(skip, take)?;
        ctx.run(
            "get_all_skip_take",
            self.select(ctx, Deleted::Exclude, filters, Some(page)),
        )
        .await
    }

    async fn list(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        ctx.run("list", self.select(ctx, Deleted::Exclude, filters, None))
            .await
    }

    async fn aggregate(&self, ctx: &TenantContext, pipeline: &[PipelineStage]) -> AppResult<Vec<T>> {
        ctx.run("aggregate", async {
            let tenant = tenant_uuid(ctx)?;
            let stages = pipeline
                .iter()
                .map(|stage| match stage {
                    PipelineStage::Match(filters) => sanitize_filters(filters).map(PipelineStage::Match),
                    other => Ok(other.clone()),
                })
                .collect::<AppResult<Vec<_>>>()?;
            let query = query::aggregate(&self.collection, tenant, &stages)?;
            self.fetch_all(query, "aggregate documents").await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_must_be_uuid() {
        let ctx = TenantContext::now().with_tenant("<script>alert(1)</script>");
        let err = tenant_uuid(&ctx).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "Invalid tenant ID");

        let id = Uuid::new_v4();
        let ctx = TenantContext::now().with_tenant(id.to_string());
        assert_eq!(tenant_uuid(&ctx).unwrap(), Some(id));

        assert_eq!(tenant_uuid(&TenantContext::now()).unwrap(), None);
    }

    #[test]
    fn test_non_unique_errors_map_to_database() {
        let err = storage_error("insert document", sqlx::Error::RowNotFound);
        assert_eq!(err.kind, ErrorKind::Database);
        assert!(err.message.contains("insert document"));
    }

    #[test]
    fn test_decode_failure_is_internal() {
        let err = decode::<tenantry_entity::Customer>(serde_json::json!({"name": 42})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Internal);
    }
}
