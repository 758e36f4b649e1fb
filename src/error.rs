// HTTP API Error Types
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::services::chain_service::ChainError;
use crate::services::port_service::PortError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get client-facing error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["field_errors"] = json!(field_errors);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn validation_error(
        message: impl Into<String>,
        field_errors: Option<HashMap<String, String>>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation failure attributed to a single request field
    pub fn field_error(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.to_string(), message.clone());
        ApiError::validation_error(message, Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    /// Map a port operation failure, prefixing unexpected failures with `context`
    pub fn from_port_error(err: PortError, context: &str) -> Self {
        match err {
            PortError::NotFound(_) => ApiError::not_found("Port not found"),
            PortError::Forbidden { .. } => ApiError::forbidden("Unauthorized"),
            PortError::Validation { field, message } => ApiError::field_error(field, message),
            PortError::Store(e) => {
                tracing::error!("{}: {}", context, e);
                ApiError::internal_server_error(format!("{}: {}", context, e))
            }
        }
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::InvalidChain
            | ChainError::MissingApiKey
            | ChainError::InvalidEmail(_)
            | ChainError::InvalidHost(_) => {
                ApiError::validation_error(err.to_string(), None)
            }
            ChainError::MissingUser => ApiError::unauthorized(err.to_string()),
            other => {
                tracing::error!("Error creating endpoint: {}", other);
                ApiError::internal_server_error(format!("Failed to create endpoint: {}", other))
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(ApiError::unauthorized("x").status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::invalid_json("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::validation_error("x", None).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::service_unavailable("x").status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn json_body_carries_error_message() {
        let body = ApiError::field_error("portNumber", "Port number must be between 1 and 65535").to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Port number must be between 1 and 65535");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["field_errors"]["portNumber"], "Port number must be between 1 and 65535");
    }

    #[test]
    fn store_failures_interpolate_context() {
        let err = PortError::Store(DatabaseError::ConfigMissing("DATABASE_URL"));
        let api = ApiError::from_port_error(err, "Failed to fetch ports");
        assert_eq!(api.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), "Failed to fetch ports: Missing configuration: DATABASE_URL");
    }

    #[test]
    fn chain_errors_map_to_expected_statuses() {
        assert_eq!(ApiError::from(ChainError::InvalidChain).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ChainError::MissingApiKey).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ChainError::MissingUser).status_code(), StatusCode::UNAUTHORIZED);
    }
}
