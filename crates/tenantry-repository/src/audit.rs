//! Audit decorator: stamps actor, time, and tenant on writes and scopes reads.

use async_trait::async_trait;
use tracing::debug;

use tenantry_core::audit::{AuditHooks, AuditShape, Auditable, TENANT_FIELD};
use tenantry_core::context::TenantContext;
use tenantry_core::error::AppError;
use tenantry_core::result::AppResult;
use tenantry_core::traits::repository::{EntityId, Identified, Repository};
use tenantry_core::types::filter::{FilterValue, Filters};
use tenantry_core::types::pipeline::PipelineStage;

/// Wraps a repository with audit stamping and tenant scoping.
///
/// - Create stamps `created` and `updated`, sets the tenant, marks the record
///   active and assigns an ID when missing.
/// - Update stamps `updated`, re-stamps the tenant and carries the stored
///   creation stamp over, so payloads cannot rewrite either.
/// - Delete is a soft delete issued as an update. Unaudited entities fall
///   through to the wrapped store's physical delete.
/// - Read paths add the tenant filter (when a tenant is present) and exclude
///   soft-deleted records.
///
/// `get_by_id` hides soft-deleted records but does not check the tenant;
/// point lookups are scoped by the document store or by the caller.
#[derive(Debug, Clone)]
pub struct AuditRepository<R> {
    inner: R,
}

impl<R> AuditRepository<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// The wrapped repository.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Lists tenant-scoped records, soft-deleted ones included.
    pub async fn get_all_including_deleted<T, Id>(
        &self,
        ctx: &TenantContext,
        mut filters: Filters,
    ) -> AppResult<Vec<T>>
    where
        R: Repository<T, Id>,
        T: Send + Sync + 'static,
        Id: Send + Sync + 'static,
    {
        if let Some(tenant) = ctx.tenant_id() {
            filters.insert(TENANT_FIELD, tenant);
        }
        self.inner.get_all(ctx, filters).await
    }
}

/// Adds tenant scoping and the soft-delete exclusion for `shape`.
fn scope_filters(ctx: &TenantContext, shape: AuditShape, mut filters: Filters) -> Filters {
    if let Some(tenant) = ctx.tenant_id() {
        filters.insert(TENANT_FIELD, tenant);
    }
    if let Some(field) = shape.soft_delete_field() {
        filters.insert(field, FilterValue::Null);
    }
    filters
}

fn tenant_mismatch<T: Auditable>(ctx: &TenantContext, stored: &T) -> bool {
    match ctx.tenant_id() {
        Some(tenant) if T::SHAPE.is_audited() => stored.owner_tenant() != Some(tenant),
        _ => false,
    }
}

fn stamp_created<T: Auditable>(ctx: &TenantContext, entity: &mut T) {
    let tenant = ctx.tenant_id().map(str::to_string);
    match entity.audit_hooks() {
        AuditHooks::Rich(hooks) => {
            let stamp = ctx.audit_stamp(true);
            hooks.set_created(stamp.clone());
            hooks.set_updated(stamp);
            hooks.set_active(true);
            hooks.set_tenant_id(tenant);
        }
        AuditHooks::Legacy(hooks) => {
            let actor = ctx.actor_label().to_string();
            hooks.set_created_at(ctx.action_at());
            hooks.set_updated_at(ctx.action_at());
            hooks.set_created_by(actor.clone());
            hooks.set_updated_by(actor);
            hooks.set_tenant_id(tenant);
        }
        AuditHooks::Unaudited => {}
    }
}

fn stamp_updated<T: Auditable>(ctx: &TenantContext, entity: &mut T, stored: &mut T) {
    let tenant = ctx.tenant_id().map(str::to_string);
    match (entity.audit_hooks(), stored.audit_hooks()) {
        (AuditHooks::Rich(hooks), AuditHooks::Rich(previous)) => {
            if let Some(created) = previous.created() {
                hooks.set_created(created.clone());
            }
            hooks.set_updated(ctx.audit_stamp(true));
            hooks.set_active(true);
            hooks.set_tenant_id(tenant.or_else(|| previous.tenant_id().map(str::to_string)));
        }
        (AuditHooks::Legacy(hooks), AuditHooks::Legacy(previous)) => {
            if let Some(at) = previous.created_at() {
                hooks.set_created_at(at);
            }
            if let Some(by) = previous.created_by() {
                hooks.set_created_by(by.to_string());
            }
            hooks.set_updated_at(ctx.action_at());
            hooks.set_updated_by(ctx.actor_label().to_string());
            hooks.set_tenant_id(tenant.or_else(|| previous.tenant_id().map(str::to_string)));
        }
        _ => {}
    }
}

fn stamp_deleted<T: Auditable>(ctx: &TenantContext, entity: &mut T) {
    match entity.audit_hooks() {
        AuditHooks::Rich(hooks) => {
            hooks.set_deleted(ctx.audit_stamp(false));
            hooks.set_active(false);
        }
        AuditHooks::Legacy(hooks) => {
            hooks.set_deleted_at(ctx.action_at());
            hooks.set_deleted_by(ctx.actor_label().to_string());
        }
        AuditHooks::Unaudited => {}
    }
}

impl<R> AuditRepository<R> {
    /// Loads the stored record as seen by a write: live and within the tenant.
    async fn load_for_write<T, Id>(&self, ctx: &TenantContext, id: &Id) -> AppResult<T>
    where
        R: Repository<T, Id>,
        T: Auditable + Send + Sync + 'static,
        Id: Send + Sync + 'static,
    {
        let stored = self.inner.get_by_id(ctx, id).await?;
        if stored.is_soft_deleted() || tenant_mismatch(ctx, &stored) {
            return Err(AppError::not_found("Record not found"));
        }
        Ok(stored)
    }
}

#[async_trait]
impl<R, T, Id> Repository<T, Id> for AuditRepository<R>
where
    R: Repository<T, Id>,
    T: Auditable + Identified<Id> + Send + Sync + 'static,
    Id: EntityId,
{
    async fn create(&self, ctx: &TenantContext, mut entity: T) -> AppResult<T> {
        if entity.id().is_unset() {
            entity.set_id(Id::generate());
        }
        stamp_created(ctx, &mut entity);
        self.inner.create(ctx, entity).await
    }

    async fn get_by_id(&self, ctx: &TenantContext, id: &Id) -> AppResult<T> {
        let entity = self.inner.get_by_id(ctx, id).await?;
        if entity.is_soft_deleted() {
            return Err(AppError::not_found("Record not found"));
        }
        Ok(entity)
    }

    async fn get_first(&self, ctx: &TenantContext, filters: Filters) -> AppResult<T> {
        self.inner
            .get_first(ctx, scope_filters(ctx, T::SHAPE, filters))
            .await
    }

    async fn update(&self, ctx: &TenantContext, id: &Id, mut entity: T) -> AppResult<T> {
        if !T::SHAPE.is_audited() {
            return self.inner.update(ctx, id, entity).await;
        }

        let mut stored: T = self.load_for_write(ctx, id).await?;
        stamp_updated(ctx, &mut entity, &mut stored);
        entity.set_id(id.clone());
        self.inner.update(ctx, id, entity).await
    }

    async fn delete(&self, ctx: &TenantContext, id: &Id) -> AppResult<()> {
        if !T::SHAPE.is_audited() {
            return self.inner.delete(ctx, id).await;
        }

        let mut entity: T = self.load_for_write(ctx, id).await?;
        stamp_deleted(ctx, &mut entity);
        self.inner.update(ctx, id, entity).await?;

        debug!(id = %id, "Soft-deleted record");
        Ok(())
    }

    async fn get_all(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        self.inner
            .get_all(ctx, scope_filters(ctx, T::SHAPE, filters))
            .await
    }

    async fn get_all_skip_take(
        &self,
        ctx: &TenantContext,
        filters: Filters,
        skip: i64,
        take: i64,
    ) -> AppResult<Vec<T>> {
        self.inner
            .get_all_skip_take(ctx, scope_filters(ctx, T::SHAPE, filters), skip, take)
            .await
    }

    async fn list(&self, ctx: &TenantContext, filters: Filters) -> AppResult<Vec<T>> {
        self.inner
            .list(ctx, scope_filters(ctx, T::SHAPE, filters))
            .await
    }

    async fn aggregate(
        &self,
        ctx: &TenantContext,
        pipeline: &[PipelineStage],
    ) -> AppResult<Vec<T>> {
        self.inner.aggregate(ctx, pipeline).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use serde::{Deserialize, Serialize};
    use tenantry_core::audit::LegacyAuditable;
    use uuid::Uuid;

    use crate::memory::MemoryRepository;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Ticket {
        id: Uuid,
        title: String,
        tenant_id: Option<String>,
        created_at: Option<DateTime<Utc>>,
        created_by: Option<String>,
        updated_at: Option<DateTime<Utc>>,
        updated_by: Option<String>,
        deleted_at: Option<DateTime<Utc>>,
        deleted_by: Option<String>,
    }

    impl Identified<Uuid> for Ticket {
        fn id(&self) -> Uuid {
            self.id
        }
        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
    }

    impl LegacyAuditable for Ticket {
        fn created_at(&self) -> Option<DateTime<Utc>> {
            self.created_at
        }
        fn created_by(&self) -> Option<&str> {
            self.created_by.as_deref()
        }
        fn set_created_at(&mut self, at: DateTime<Utc>) {
            self.created_at = Some(at);
        }
        fn set_created_by(&mut self, by: String) {
            self.created_by = Some(by);
        }
        fn set_updated_at(&mut self, at: DateTime<Utc>) {
            self.updated_at = Some(at);
        }
        fn set_updated_by(&mut self, by: String) {
            self.updated_by = Some(by);
        }
        fn deleted_at(&self) -> Option<DateTime<Utc>> {
            self.deleted_at
        }
        fn set_deleted_at(&mut self, at: DateTime<Utc>) {
            self.deleted_at = Some(at);
        }
        fn set_deleted_by(&mut self, by: String) {
            self.deleted_by = Some(by);
        }
        fn tenant_id(&self) -> Option<&str> {
            self.tenant_id.as_deref()
        }
        fn set_tenant_id(&mut self, tenant_id: Option<String>) {
            self.tenant_id = tenant_id;
        }
    }

    tenantry_core::legacy_auditable!(Ticket);

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Setting {
        id: Uuid,
        value: String,
    }

    impl Identified<Uuid> for Setting {
        fn id(&self) -> Uuid {
            self.id
        }
        fn set_id(&mut self, id: Uuid) {
            self.id = id;
        }
    }

    tenantry_core::unaudited!(Setting);

    fn ticket(title: &str) -> Ticket {
        Ticket {
            title: title.to_string(),
            ..Ticket::default()
        }
    }

    fn ctx(tenant: &str) -> TenantContext {
        TenantContext::now()
            .with_tenant(tenant)
            .with_actor("u1", "Ana")
    }

    #[tokio::test]
    async fn test_legacy_create_and_update_stamps() {
        let repo = AuditRepository::new(MemoryRepository::<Ticket, Uuid>::new());
        let t0 = Utc::now();
        let create_ctx = TenantContext::new(t0).with_tenant("t1").with_actor("u1", "Ana");

        let created = repo.create(&create_ctx, ticket("a")).await.unwrap();
        assert!(!created.id.is_nil());
        assert_eq!(created.created_at, Some(t0));
        assert_eq!(created.updated_at, Some(t0));
        assert_eq!(created.created_by.as_deref(), Some("Ana"));
        assert_eq!(created.tenant_id.as_deref(), Some("t1"));

        let t1 = t0 + Duration::seconds(5);
        let update_ctx = TenantContext::new(t1).with_tenant("t1").with_actor("u2", "Bia");
        let mut payload = ticket("b");
        payload.created_at = Some(t1);
        payload.tenant_id = Some("t2".into());

        let updated = repo.update(&update_ctx, &created.id, payload).await.unwrap();
        assert_eq!(updated.created_at, Some(t0));
        assert_eq!(updated.created_by.as_deref(), Some("Ana"));
        assert_eq!(updated.updated_at, Some(t1));
        assert_eq!(updated.updated_by.as_deref(), Some("Bia"));
        assert_eq!(updated.tenant_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_legacy_soft_delete_hides_record() {
        let repo = AuditRepository::new(MemoryRepository::<Ticket, Uuid>::new());
        let ctx = ctx("t1");
        let created = repo.create(&ctx, ticket("a")).await.unwrap();

        repo.delete(&ctx, &created.id).await.unwrap();

        assert!(repo.get_by_id(&ctx, &created.id).await.unwrap_err().is_not_found());
        assert!(repo.get_all(&ctx, Filters::new()).await.unwrap().is_empty());
        assert!(repo.delete(&ctx, &created.id).await.unwrap_err().is_not_found());

        let all = repo
            .get_all_including_deleted::<Ticket, Uuid>(&ctx, Filters::new())
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].deleted_by.as_deref(), Some("Ana"));
    }

    #[tokio::test]
    async fn test_reads_are_tenant_scoped() {
        let repo = AuditRepository::new(MemoryRepository::<Ticket, Uuid>::new());
        repo.create(&ctx("t1"), ticket("a")).await.unwrap();
        repo.create(&ctx("t2"), ticket("b")).await.unwrap();

        let t1 = repo.list(&ctx("t1"), Filters::new()).await.unwrap();
        assert_eq!(t1.len(), 1);
        assert_eq!(t1[0].title, "a");

        // A caller-supplied tenant filter cannot widen the scope.
        let spoofed = repo
            .get_all(&ctx("t1"), Filters::new().with("tenant_id", "t2"))
            .await
            .unwrap();
        assert_eq!(spoofed.len(), 1);
        assert_eq!(spoofed[0].title, "a");

        let unscoped = repo.get_all(&TenantContext::now(), Filters::new()).await.unwrap();
        assert_eq!(unscoped.len(), 2);
    }

    #[tokio::test]
    async fn test_get_by_id_does_not_check_tenant() {
        let repo = AuditRepository::new(MemoryRepository::<Ticket, Uuid>::new());
        let created = repo.create(&ctx("t1"), ticket("a")).await.unwrap();

        let fetched = repo.get_by_id(&ctx("t2"), &created.id).await.unwrap();
        assert_eq!(fetched.title, "a");
    }

    #[tokio::test]
    async fn test_writes_across_tenants_are_not_found() {
        let repo = AuditRepository::new(MemoryRepository::<Ticket, Uuid>::new());
        let created = repo.create(&ctx("t1"), ticket("a")).await.unwrap();

        let err = repo
            .update(&ctx("t2"), &created.id, ticket("x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(repo.delete(&ctx("t2"), &created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unaudited_entities_pass_through() {
        let repo = AuditRepository::new(MemoryRepository::<Setting, Uuid>::new());
        let ctx = ctx("t1");
        let created = repo
            .create(&ctx, Setting { id: Uuid::nil(), value: "on".into() })
            .await
            .unwrap();
        assert!(!created.id.is_nil());

        repo.delete(&ctx, &created.id).await.unwrap();
        assert!(repo.inner().is_empty().await);
    }
}
