use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, SessionUser};
use crate::services::UpdatePort;

/// GET /api/ports/:id
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let port = state
        .ports
        .get(&user.user_id, &id)
        .await
        .map_err(|e| ApiError::from_port_error(e, "Failed to fetch port"))?;

    Ok(ApiResponse::success(json!({ "port": port })))
}

/// PUT /api/ports/:id - partial update; absent fields are left alone
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePort>, JsonRejection>,
) -> ApiResult<Value> {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => {
            // Existence and ownership are reported before body problems
            state
                .ports
                .get(&user.user_id, &id)
                .await
                .map_err(|e| ApiError::from_port_error(e, "Failed to update port"))?;
            return Err(rejection.into());
        }
    };

    let port = state
        .ports
        .update(&user.user_id, &id, input)
        .await
        .map_err(|e| ApiError::from_port_error(e, "Failed to update port"))?;

    Ok(ApiResponse::success(json!({ "port": port })))
}

/// DELETE /api/ports/:id
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<SessionUser>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state
        .ports
        .delete(&user.user_id, &id)
        .await
        .map_err(|e| ApiError::from_port_error(e, "Failed to delete port"))?;

    Ok(ApiResponse::success(json!({ "message": "Port deleted successfully" })))
}
