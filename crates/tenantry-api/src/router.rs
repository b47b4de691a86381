//! Route definitions for the Tenantry HTTP API.
//!
//! Resources are mounted under `/api`; metrics and health at the root.

use axum::{Router, middleware as axum_middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Builds the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new().nest(
        "/customers",
        handlers::resource::resource_routes(state.customers.clone()),
    );

    Router::new()
        .nest("/api", api_routes)
        .merge(metrics_routes())
        .route("/health", get(handlers::health::health))
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .layer(axum_middleware::from_fn_with_state(
            state.metrics.clone(),
            middleware::metrics::track_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn metrics_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(handlers::metrics::current))
        .route("/metrics/history", get(handlers::metrics::history))
        .route("/metrics/latest", get(handlers::metrics::latest))
        .route("/metrics/aggregate", get(handlers::metrics::aggregate))
}
