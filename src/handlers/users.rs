use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::filter::AdvancedResults;
use crate::middleware::{ApiResponse, ApiResult, JsonDocument};
use crate::services::UserService;
use crate::state::AppState;
use crate::types::Document;

// Admin only; the role check lives in UserService

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<AdvancedResults>, ApiError> {
    Ok(Json(UserService::new(&state).list(&user, &params).await?))
}

pub async fn show(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> ApiResult<Document> {
    Ok(ApiResponse::success(UserService::new(&state).get(&user, &id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    JsonDocument(payload): JsonDocument,
) -> ApiResult<Document> {
    Ok(ApiResponse::created(UserService::new(&state).create(&user, payload).await?))
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    JsonDocument(patch): JsonDocument,
) -> ApiResult<Document> {
    Ok(ApiResponse::success(UserService::new(&state).update(&user, &id, patch).await?))
}

pub async fn delete(State(state): State<AppState>, user: AuthUser, Path(id): Path<String>) -> ApiResult<Value> {
    UserService::new(&state).delete(&user, &id).await?;
    Ok(ApiResponse::success(json!({})))
}
