//! Request metrics tracking middleware.

use std::sync::Arc;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use tokio::time::Instant;

use tenantry_metrics::MetricsRegistry;

use crate::extractors::RequestArrival;

/// Records the request in the registry and stamps its arrival time.
///
/// Endpoints are keyed by the matched route template so IDs in the path do
/// not create new keys.
pub async fn track_metrics(
    State(registry): State<Arc<MetricsRegistry>>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(RequestArrival(Utc::now()));
    if !registry.config().enabled {
        return next.run(request).await;
    }

    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();

    let in_flight = registry.begin();
    let response = next.run(request).await;
    in_flight.finish(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
