use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::filter::AdvancedResults;
use crate::middleware::{ApiResponse, ApiResult, JsonDocument};
use crate::services::BootcampService;
use crate::state::AppState;
use crate::types::Document;

/// GET /api/v1/bootcamps - Filtered, sorted and paginated listing
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AdvancedResults>, ApiError> {
    let results = BootcampService::new(&state).list(&params).await?;
    Ok(Json(results))
}

/// GET /api/v1/bootcamps/:id
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Document> {
    let bootcamp = BootcampService::new(&state).get(&id).await?;
    Ok(ApiResponse::success(bootcamp))
}

/// POST /api/v1/bootcamps - Publishers and admins
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    JsonDocument(payload): JsonDocument,
) -> ApiResult<Document> {
    let bootcamp = BootcampService::new(&state).create(&user, payload).await?;
    Ok(ApiResponse::created(bootcamp))
}

/// PUT /api/v1/bootcamps/:id - Owner or admin
pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonDocument(patch): JsonDocument,
) -> ApiResult<Document> {
    let bootcamp = BootcampService::new(&state).update(&user, &id, patch).await?;
    Ok(ApiResponse::success(bootcamp))
}

/// DELETE /api/v1/bootcamps/:id - Owner or admin; removes courses and reviews too
pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    BootcampService::new(&state).delete(&user, &id).await?;
    Ok(ApiResponse::success(json!({})))
}
