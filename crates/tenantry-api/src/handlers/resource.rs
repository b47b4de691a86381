//! Generic CRUD routes over a repository pipeline.

use std::collections::HashMap;

use axum::Json;
use axum::Router;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use serde::Serialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use tenantry_core::error::AppError;
use tenantry_core::traits::repository::{EntityId, Repository};
use tenantry_entity::history::HistoryEntry;
use tenantry_repository::{EntityHistory, Pipeline};

use crate::dto::request::{ListQuery, filters_from_query};
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::Tenant;

/// Record types servable as a resource.
pub trait Resource: Serialize + DeserializeOwned + Validate + Send + Sync + 'static {}

impl<T> Resource for T where T: Serialize + DeserializeOwned + Validate + Send + Sync + 'static {}

/// Identifier types accepted in the `{id}` path segment.
pub trait ResourceId: EntityId + DeserializeOwned {}

impl<Id> ResourceId for Id where Id: EntityId + DeserializeOwned {}

/// `GET /`, `POST /`, `GET|PUT|DELETE /{id}` and `GET /{id}/history`.
pub fn resource_routes<T, Id, S>(pipeline: Pipeline<T, Id>) -> Router<S>
where
    T: Resource,
    Id: ResourceId,
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/", get(list::<T, Id>).post(create::<T, Id>))
        .route(
            "/{id}",
            get(get_one::<T, Id>)
                .put(update::<T, Id>)
                .delete(remove::<T, Id>),
        )
        .route("/{id}/history", get(history::<T, Id>))
        .with_state(pipeline)
}

fn path_id<Id>(path: Result<Path<Id>, PathRejection>) -> Result<Id, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::bad_request("Invalid path parameter"))
}

fn body<T: Validate>(json: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    let Json(entity) = json.map_err(|_| ApiError::bad_request("Invalid request body"))?;
    entity.validate().map_err(AppError::from)?;
    Ok(entity)
}

/// GET /
async fn list<T: Resource, Id: ResourceId>(
    State(pipeline): State<Pipeline<T, Id>>,
    Tenant(ctx): Tenant,
    page: Result<Query<ListQuery>, QueryRejection>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<ApiResponse<Vec<T>>, ApiError> {
    let Query(page) = page.map_err(|_| ApiError::bad_request("Invalid query"))?;
    page.validate().map_err(AppError::from)?;
    let filters = filters_from_query(params);

    let items = match page.take {
        Some(take) => {
            pipeline
                .repository
                .get_all_skip_take(&ctx, filters, page.skip, take)
                .await?
        }
        None => {
            let skip = usize::try_from(page.skip).unwrap_or(usize::MAX);
            let items = pipeline.repository.list(&ctx, filters).await?;
            items.into_iter().skip(skip).collect()
        }
    };
    Ok(ApiResponse::ok(items))
}

/// GET /{id}
async fn get_one<T: Resource, Id: ResourceId>(
    State(pipeline): State<Pipeline<T, Id>>,
    Tenant(ctx): Tenant,
    id: Result<Path<Id>, PathRejection>,
) -> Result<ApiResponse<T>, ApiError> {
    let id = path_id(id)?;
    let entity = pipeline.repository.get_by_id(&ctx, &id).await?;
    Ok(ApiResponse::ok(entity))
}

/// POST /
async fn create<T: Resource, Id: ResourceId>(
    State(pipeline): State<Pipeline<T, Id>>,
    Tenant(ctx): Tenant,
    json: Result<Json<T>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<T>>), ApiError> {
    let entity = body(json)?;
    let created = pipeline.repository.create(&ctx, entity).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /{id}
async fn update<T: Resource, Id: ResourceId>(
    State(pipeline): State<Pipeline<T, Id>>,
    Tenant(ctx): Tenant,
    id: Result<Path<Id>, PathRejection>,
    json: Result<Json<T>, JsonRejection>,
) -> Result<ApiResponse<T>, ApiError> {
    let id = path_id(id)?;
    let entity = body(json)?;
    let updated = pipeline.repository.update(&ctx, &id, entity).await?;
    Ok(ApiResponse::ok(updated))
}

/// DELETE /{id}
async fn remove<T: Resource, Id: ResourceId>(
    State(pipeline): State<Pipeline<T, Id>>,
    Tenant(ctx): Tenant,
    id: Result<Path<Id>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = path_id(id)?;
    pipeline.repository.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /{id}/history
async fn history<T: Resource, Id: ResourceId>(
    State(pipeline): State<Pipeline<T, Id>>,
    Tenant(ctx): Tenant,
    id: Result<Path<Id>, PathRejection>,
) -> Result<ApiResponse<Vec<HistoryEntry>>, ApiError> {
    let id = path_id(id)?;
    let reader = pipeline
        .history
        .as_ref()
        .ok_or_else(|| AppError::not_found("History is not recorded for this resource"))?;
    let entries = reader.get_history(&ctx, &id).await?;
    Ok(ApiResponse::ok(entries))
}
