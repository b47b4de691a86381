//! Integration tests against a live PostgreSQL database.
//!
//! Set `TENANTRY_TEST_DATABASE_URL` to run them; otherwise each test returns early.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use uuid::Uuid;

use tenantry_core::config::database::DatabaseConfig;
use tenantry_core::context::TenantContext;
use tenantry_core::error::ErrorKind;
use tenantry_core::traits::repository::Repository;
use tenantry_core::types::filter::Filters;
use tenantry_core::types::pipeline::PipelineStage;
use tenantry_database::migration::run_migrations;
use tenantry_database::{DatabasePool, DocumentStore, PgHistoryStore, PgMetricsPersister};
use tenantry_entity::Customer;
use tenantry_entity::metrics::MetricsInterval;
use tenantry_metrics::{MetricsPersister, MetricsRegistry};
use tenantry_repository::{EntityHistory, PipelineBuilder};

async fn database() -> Option<DatabasePool> {
    let url = std::env::var("TENANTRY_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url: Some(url),
        ..DatabaseConfig::default()
    };
    let pool = DatabasePool::connect(&config)
        .await
        .expect("Failed to connect to test database");
    run_migrations(pool.pool())
        .await
        .expect("Failed to run migrations");
    Some(pool)
}

/// A fresh collection per test keeps runs independent.
fn store(pool: &DatabasePool) -> DocumentStore<Customer, Uuid> {
    DocumentStore::new(pool.pool().clone(), format!("customers_{}", Uuid::new_v4().simple()))
}

fn ctx(tenant: Uuid) -> TenantContext {
    TenantContext::now()
        .with_tenant(tenant.to_string())
        .with_actor("u1", "Ana")
}

#[tokio::test]
async fn test_pipeline_over_document_store() {
    let Some(pool) = database().await else {
        return;
    };
    let store = store(&pool);
    let pipeline = PipelineBuilder::<Customer, Uuid>::new("Customer")
        .with_history(Arc::new(PgHistoryStore::new(pool.pool().clone())))
        .build(store.clone());
    let repo = pipeline.repository;
    let history = pipeline.history.expect("history enabled");
    let ctx = ctx(Uuid::new_v4());

    let created = repo.create(&ctx, Customer::new("Ana")).await.unwrap();
    assert_eq!(repo.get_by_id(&ctx, &created.id).await.unwrap().name, "Ana");

    let mut changed = created.clone();
    changed.name = "Ana Maria".into();
    repo.update(&ctx, &created.id, changed).await.unwrap();
    let entries = history.get_history(&ctx, &created.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].changes.contains_key("name"));

    repo.delete(&ctx, &created.id).await.unwrap();
    assert!(repo.get_by_id(&ctx, &created.id).await.unwrap_err().is_not_found());
    assert_eq!(store.get_deleted(&ctx, Filters::new()).await.unwrap().len(), 1);
    assert_eq!(
        store
            .get_all_including_deleted(&ctx, Filters::new())
            .await
            .unwrap()
            .len(),
        1
    );

    store.restore(&ctx, &created.id).await.unwrap();
    let restored = repo.get_by_id(&ctx, &created.id).await.unwrap();
    assert!(restored.deleted.is_none());
    assert!(restored.active);
    assert!(store.restore(&ctx, &created.id).await.unwrap_err().is_not_found());

    store.hard_delete(&ctx, &created.id).await.unwrap();
    assert!(store
        .get_all_including_deleted(&ctx, Filters::new())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_tenant_scope_and_validation() {
    let Some(pool) = database().await else {
        return;
    };
    let store = store(&pool);
    let t1 = ctx(Uuid::new_v4());
    let t2 = ctx(Uuid::new_v4());

    let created = store.create(&t1, Customer::new("Ana")).await.unwrap();
    assert!(store.get_by_id(&t2, &created.id).await.unwrap_err().is_not_found());
    assert!(store.get_all(&t2, Filters::new()).await.unwrap().is_empty());

    let bad = TenantContext::now().with_tenant("acme");
    let err = store.get_all(&bad, Filters::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);

    let err = store.create(&t1, created.clone()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
}

#[tokio::test]
async fn test_filters_and_aggregate() {
    let Some(pool) = database().await else {
        return;
    };
    let store = store(&pool);
    let ctx = ctx(Uuid::new_v4());
    for (name, status) in [("Ana", "vip"), ("Bia", "vip"), ("Caio", "basic")] {
        let mut customer = Customer::new(name);
        customer.status = Some(status.into());
        store.create(&ctx, customer).await.unwrap();
    }

    let vip = store
        .get_all(&ctx, Filters::new().with("status", "vip").with("$where", "1"))
        .await
        .unwrap();
    assert_eq!(vip.len(), 2);

    let page = store
        .get_all_skip_take(&ctx, Filters::new(), 1, 1)
        .await
        .unwrap();
    assert_eq!(page[0].name, "Bia");

    let stages = vec![
        PipelineStage::Match(Filters::new().with("status", "vip")),
        PipelineStage::Sort {
            field: "name".into(),
            descending: true,
        },
        PipelineStage::Limit(1),
    ];
    let top = store.aggregate(&ctx, &stages).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].name, "Bia");
}

#[tokio::test]
async fn test_metrics_persister_round_trip() {
    let Some(pool) = database().await else {
        return;
    };
    let persister = PgMetricsPersister::new(pool.pool().clone());
    let registry = MetricsRegistry::new(Default::default());
    let tenant = Uuid::new_v4().to_string();

    registry.start_request();
    registry.finish_request("GET", "/api/customers", 200, std::time::Duration::from_millis(4));
    let snapshot = registry.snapshot(Some(&tenant));
    persister.save(&snapshot).await.unwrap();

    let latest = persister.latest(Some(&tenant), 5).await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].endpoints, snapshot.endpoints);

    let now = Utc::now();
    let buckets = persister
        .aggregate(
            Some(&tenant),
            now - TimeDelta::hours(1),
            now + TimeDelta::hours(1),
            MetricsInterval::Hour,
        )
        .await
        .unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].snapshots, 1);

    let mut stale = registry.snapshot(Some(&tenant));
    stale.id = Uuid::now_v7().to_string();
    stale.recorded_at = now - TimeDelta::days(45);
    persister.save(&stale).await.unwrap();
    assert!(persister.purge_older_than(30).await.unwrap() >= 1);
}
