use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, JsonDocument};
use crate::services::AuthService;
use crate::state::AppState;
use crate::types::{doc_str, Document};

fn token_response(token: String) -> Json<Value> {
    Json(json!({ "success": true, "token": token }))
}

/// POST /api/v1/auth/register
pub async fn register(
    State(state): State<AppState>,
    JsonDocument(payload): JsonDocument,
) -> Result<Json<Value>, ApiError> {
    let token = AuthService::new(&state).register(payload).await?;
    Ok(token_response(token))
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    JsonDocument(payload): JsonDocument,
) -> Result<Json<Value>, ApiError> {
    let token = AuthService::new(&state)
        .login(doc_str(&payload, "email"), doc_str(&payload, "password"))
        .await?;
    Ok(token_response(token))
}

/// GET /api/v1/auth/me
pub async fn me(State(state): State<AppState>, user: AuthUser) -> ApiResult<Document> {
    Ok(ApiResponse::success(AuthService::new(&state).me(&user).await?))
}

/// PUT /api/v1/auth/updatedetails
pub async fn update_details(
    State(state): State<AppState>,
    user: AuthUser,
    JsonDocument(payload): JsonDocument,
) -> ApiResult<Document> {
    Ok(ApiResponse::success(
        AuthService::new(&state).update_details(&user, payload).await?,
    ))
}

/// PUT /api/v1/auth/updatepassword
pub async fn update_password(
    State(state): State<AppState>,
    user: AuthUser,
    JsonDocument(payload): JsonDocument,
) -> Result<Json<Value>, ApiError> {
    let (Some(current), Some(new_password)) =
        (doc_str(&payload, "currentPassword"), doc_str(&payload, "newPassword"))
    else {
        return Err(ApiError::bad_request("Please provide currentPassword and newPassword"));
    };
    let token = AuthService::new(&state)
        .update_password(&user, current, new_password)
        .await?;
    Ok(token_response(token))
}
