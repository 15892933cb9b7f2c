// Courses and reviews share one set of handlers, parameterised by kind

use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::filter::AdvancedResults;
use crate::middleware::{ApiResponse, ApiResult, JsonDocument};
use crate::services::{ChildKind, ChildService};
use crate::state::AppState;
use crate::types::Document;

/// GET /api/v1/{courses,reviews} - Listing with the bootcamp summary embedded
pub async fn list(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AdvancedResults>, ApiError> {
    let results = ChildService::new(&state, kind).list(&params, None).await?;
    Ok(Json(results))
}

/// GET /api/v1/bootcamps/:id/{courses,reviews}
pub async fn list_for_bootcamp(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    Path(bootcamp_id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AdvancedResults>, ApiError> {
    let results = ChildService::new(&state, kind)
        .list(&params, Some(&bootcamp_id))
        .await?;
    Ok(Json(results))
}

pub async fn show(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Document> {
    let record = ChildService::new(&state, kind).get(&id).await?;
    Ok(ApiResponse::success(record))
}

/// POST /api/v1/bootcamps/:id/{courses,reviews}
pub async fn create(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    user: AuthUser,
    Path(bootcamp_id): Path<String>,
    JsonDocument(payload): JsonDocument,
) -> ApiResult<Document> {
    let record = ChildService::new(&state, kind)
        .create(&user, &bootcamp_id, payload)
        .await?;
    Ok(ApiResponse::created(record))
}

pub async fn update(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonDocument(patch): JsonDocument,
) -> ApiResult<Document> {
    let record = ChildService::new(&state, kind).update(&user, &id, patch).await?;
    Ok(ApiResponse::success(record))
}

pub async fn delete(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    ChildService::new(&state, kind).delete(&user, &id).await?;
    Ok(ApiResponse::success(json!({})))
}

/// DELETE /api/v1/bootcamps/:id/{courses,reviews}
pub async fn delete_for_bootcamp(
    kind: &'static ChildKind,
    State(state): State<AppState>,
    user: AuthUser,
    Path(bootcamp_id): Path<String>,
) -> ApiResult<Value> {
    let deleted = ChildService::new(&state, kind)
        .delete_for_bootcamp(&user, &bootcamp_id)
        .await?;
    Ok(ApiResponse::success(json!({ "deleted": deleted })))
}
