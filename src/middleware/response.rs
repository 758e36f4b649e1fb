use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::json;

/// Successful JSON response with an explicit status code. The payload is
/// serialized as-is, without an envelope, since clients read `ports`, `port`
/// and `message` at the top level.
#[derive(Debug)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub status_code: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    /// 200 OK
    pub fn success(data: T) -> Self {
        Self::with_status(data, StatusCode::OK)
    }

    pub fn with_status(data: T, status_code: StatusCode) -> Self {
        Self { data, status_code }
    }

    /// 201 Created
    pub fn created(data: T) -> Self {
        Self::with_status(data, StatusCode::CREATED)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.data) {
            Ok(value) => (self.status_code, Json(value)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response data: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "success": false,
                        "error": format!("Failed to serialize response data: {}", e),
                        "code": "INTERNAL_SERVER_ERROR"
                    })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, crate::error::ApiError>;
