use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::services::CreatePort;

/// GET /api/ports - the caller's ports, newest first
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
) -> ApiResult<Value> {
    let ports = state
        .ports
        .list(&user.user_id)
        .await
        .map_err(|e| ApiError::from_port_error(e, "Failed to fetch ports"))?;

    tracing::debug!("Listed {} ports for {}", ports.len(), user.user_id);
    Ok(ApiResponse::success(json!({ "ports": ports })))
}

/// POST /api/ports - create a port owned by the caller
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    payload: Result<Json<CreatePort>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(input) = payload?;

    let port = state
        .ports
        .create(&user.user_id, input)
        .await
        .map_err(|e| ApiError::from_port_error(e, "Failed to create port"))?;

    Ok(ApiResponse::created(json!({ "port": port })))
}
