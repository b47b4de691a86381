//! HTTP envelope and status behavior over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use tenantry_api::{AppState, build_router};
use tenantry_cache::memory::MemoryCacheProvider;
use tenantry_core::config::AppConfig;
use tenantry_core::config::cache::MemoryCacheConfig;
use tenantry_entity::Customer;
use tenantry_metrics::{MemoryMetricsPersister, MetricsRegistry};
use tenantry_repository::{MemoryHistoryStore, MemoryRepository, PipelineBuilder};

const TENANT: &str = "6f1c2a52-9f58-4c5e-9a55-0c1c3b7d2e10";

fn app() -> Router {
    let config = AppConfig::default();
    let cache = Arc::new(MemoryCacheProvider::new(
        &MemoryCacheConfig::default(),
        Duration::from_secs(600),
        "test:",
    ));
    let customers = PipelineBuilder::<Customer, Uuid>::new("Customer")
        .with_history(Arc::new(MemoryHistoryStore::new()))
        .with_cache(cache, Duration::ZERO)
        .build(MemoryRepository::new());

    build_router(AppState {
        metrics: Arc::new(MetricsRegistry::new(config.metrics.clone())),
        metrics_persister: Arc::new(MemoryMetricsPersister::new()),
        config: Arc::new(config),
        customers,
    })
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Tenant-ID", TENANT)
        .header("X-User-ID", "u1")
        .header("X-User-Name", "Ana");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn create_customer(app: &Router, name: &str) -> Value {
    let (status, body) = send(
        app,
        request("POST", "/api/customers", Some(json!({"name": name}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["data"].clone()
}

#[tokio::test]
async fn test_create_returns_201_envelope_with_audit_stamps() {
    let app = app();
    let created = create_customer(&app, "Ana").await;

    assert_eq!(created["name"], "Ana");
    assert_eq!(created["tenant_id"], TENANT);
    assert_eq!(created["created"]["by_name"], "Ana");
    assert_eq!(created["created"]["by_id"], "u1");
    assert_eq!(created["active"], true);
}

#[tokio::test]
async fn test_crud_round_trip() {
    let app = app();
    let created = create_customer(&app, "Ana").await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, request("GET", &format!("/api/customers/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Ana");

    let (status, body) = send(
        &app,
        request(
            "PUT",
            &format!("/api/customers/{id}"),
            Some(json!({"name": "Ana Maria"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Ana Maria");

    let (status, body) = send(&app, request("GET", &format!("/api/customers/{id}/history"), None)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["changes"]["name"]["before"], "Ana");
    assert_eq!(entries[0]["changes"]["name"]["after"], "Ana Maria");

    let (status, body) = send(&app, request("DELETE", &format!("/api/customers/{id}"), None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = send(&app, request("GET", &format!("/api/customers/{id}"), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_pagination_and_filters() {
    let app = app();
    for name in ["Ana", "Bia", "Caio"] {
        create_customer(&app, name).await;
    }

    let (status, body) = send(&app, request("GET", "/api/customers", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = send(&app, request("GET", "/api/customers?skip=1&take=1", None)).await;
    let page = body["data"].as_array().unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["name"], "Bia");

    let (_, body) = send(&app, request("GET", "/api/customers?skip=2", None)).await;
    let rest = body["data"].as_array().unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["name"], "Caio");

    let (_, body) = send(&app, request("GET", "/api/customers?name=Caio", None)).await;
    let found = body["data"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "Caio");
}

#[tokio::test]
async fn test_take_over_limit_is_400() {
    let app = app();
    let (status, body) = send(&app, request("GET", "/api/customers?take=1001", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION");

    let (status, _) = send(&app, request("GET", "/api/customers?take=1000", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_body_is_400() {
    let app = app();
    let (status, body) = send(
        &app,
        request("POST", "/api/customers", Some(json!({"name": ""}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &app,
        request("POST", "/api/customers", Some(json!({"name": 7, "email": "<b>x</b>"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body");
}

#[tokio::test]
async fn test_rejections_do_not_echo_input() {
    let app = app();
    let (status, body) = send(&app, request("GET", "/api/customers?take=%3Cscript%3E", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query");

    let (status, body) = send(&app, request("GET", "/api/customers/%3Cscript%3E", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body["message"].as_str().unwrap().contains("script"));

    let (status, body) = send(&app, request("GET", "/metrics/latest?limit=%3Cscript%3E", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid query");
}

#[tokio::test]
async fn test_malformed_id_is_400() {
    let app = app();
    let (status, body) = send(&app, request("GET", "/api/customers/not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "VALIDATION");
}

#[tokio::test]
async fn test_other_tenant_sees_nothing() {
    let app = app();
    let created = create_customer(&app, "Ana").await;
    let id = created["id"].as_str().unwrap();

    let other = Request::builder()
        .uri("/api/customers")
        .header("X-Tenant-ID", "9d3b8f7e-0000-4000-8000-000000000002")
        .body(Body::empty())
        .unwrap();
    let (_, body) = send(&app, other).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let spoof = Request::builder()
        .method("PUT")
        .uri(format!("/api/customers/{id}"))
        .header("X-Tenant-ID", "9d3b8f7e-0000-4000-8000-000000000002")
        .header("content-type", "application/json")
        .body(Body::from(json!({"name": "Mallory"}).to_string()))
        .unwrap();
    let (status, _) = send(&app, spoof).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_track_route_templates() {
    let app = app();
    let created = create_customer(&app, "Ana").await;
    let id = created["id"].as_str().unwrap();
    send(&app, request("GET", &format!("/api/customers/{id}"), None)).await;
    send(&app, request("GET", &format!("/api/customers/{}", Uuid::new_v4()), None)).await;

    let (status, body) = send(&app, request("GET", "/metrics", None)).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot = &body["data"];
    assert_eq!(snapshot["total_requests"], 3);
    assert_eq!(snapshot["total_errors"], 1);
    assert_eq!(snapshot["endpoints"]["GET /api/customers/{id}"]["requests"], 2);
    assert_eq!(snapshot["endpoints"]["POST /api/customers"]["requests"], 1);
}

#[tokio::test]
async fn test_metrics_history_is_empty_without_persistence() {
    let app = app();
    let (status, body) = send(&app, request("GET", "/metrics/history", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, request("GET", "/metrics/latest?limit=0", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
