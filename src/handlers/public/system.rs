use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Redirect},
};
use serde_json::json;

use crate::app::AppState;
use crate::error::ApiError;

/// GET / - permanent redirect to the default page
pub async fn root(State(state): State<AppState>) -> Redirect {
    Redirect::permanent(&state.config.server.root_redirect)
}

/// GET /health - port store reachability; 503 when the store is down
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.ports.store().ping().await.map_err(|e| {
        tracing::warn!("Health check failed: {}", e);
        ApiError::service_unavailable(format!("database unavailable: {}", e))
    })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp": chrono::Utc::now(),
            "database": "ok",
            "documents": state.chains.documents().backend(),
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::database::models::{Port, PortChanges};
    use crate::database::{DatabaseError, PortStore};
    use crate::documents::MemoryDocumentStore;

    /// Store whose every call fails as if the database were unreachable
    struct DownStore;

    #[async_trait]
    impl PortStore for DownStore {
        async fn list_by_owner(&self, _: &str) -> Result<Vec<Port>, DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
        async fn find_by_id(&self, _: &str) -> Result<Option<Port>, DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
        async fn insert(&self, _: &Port) -> Result<Port, DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
        async fn update(&self, _: &str, _: &PortChanges, _: DateTime<Utc>) -> Result<Option<Port>, DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
        async fn delete(&self, _: &str) -> Result<bool, DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
        async fn ping(&self) -> Result<(), DatabaseError> {
            Err(DatabaseError::ConfigMissing("DATABASE_URL"))
        }
    }

    #[tokio::test]
    async fn health_is_unavailable_when_store_is_down() {
        let state = AppState::new(
            AppConfig::in_memory("secret"),
            Arc::new(DownStore),
            Arc::new(MemoryDocumentStore::new()),
        );

        let err = health(State(state)).await.err().expect("health should fail");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let body = err.to_json();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
        assert!(body["error"].as_str().unwrap_or_default().starts_with("database unavailable"));
    }
}
