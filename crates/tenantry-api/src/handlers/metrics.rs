//! Request metrics handlers.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use chrono::Utc;
use validator::Validate;

use tenantry_core::error::AppError;
use tenantry_entity::metrics::{AggregatedMetrics, MetricsSnapshot};
use tenantry_metrics::MetricsPersister;

use crate::dto::request::{LatestQuery, MetricsRangeQuery};
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::Tenant;
use crate::state::AppState;

fn query<Q>(query: Result<Query<Q>, QueryRejection>) -> Result<Q, ApiError> {
    query
        .map(|Query(q)| q)
        .map_err(|_| ApiError::bad_request("Invalid query"))
}

/// GET /metrics
pub async fn current(
    State(state): State<AppState>,
    Tenant(ctx): Tenant,
) -> ApiResponse<MetricsSnapshot> {
    ApiResponse::ok(state.metrics.snapshot(ctx.tenant_id()))
}

/// GET /metrics/history?from&to
pub async fn history(
    State(state): State<AppState>,
    Tenant(ctx): Tenant,
    params: Result<Query<MetricsRangeQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<MetricsSnapshot>>, ApiError> {
    let params = query(params)?;
    let (from, to) = params.window(Utc::now());
    let snapshots = state
        .metrics_persister
        .history(ctx.tenant_id(), from, to)
        .await?;
    Ok(ApiResponse::ok(snapshots))
}

/// GET /metrics/latest?limit
pub async fn latest(
    State(state): State<AppState>,
    Tenant(ctx): Tenant,
    params: Result<Query<LatestQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<MetricsSnapshot>>, ApiError> {
    let params = query(params)?;
    params.validate().map_err(AppError::from)?;
    let snapshots = state
        .metrics_persister
        .latest(ctx.tenant_id(), params.limit)
        .await?;
    Ok(ApiResponse::ok(snapshots))
}

/// GET /metrics/aggregate?interval&from&to
pub async fn aggregate(
    State(state): State<AppState>,
    Tenant(ctx): Tenant,
    params: Result<Query<MetricsRangeQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<AggregatedMetrics>>, ApiError> {
    let params = query(params)?;
    let (from, to) = params.window(Utc::now());
    let buckets = state
        .metrics_persister
        .aggregate(ctx.tenant_id(), from, to, params.interval())
        .await?;
    Ok(ApiResponse::ok(buckets))
}
