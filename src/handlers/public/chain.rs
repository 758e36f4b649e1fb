use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::CreateEndpointRequest;

/// POST /api/create-endpoint - persist a chain and return its invocation URLs.
/// URLs are built against the request's Host header.
pub async fn create_endpoint(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateEndpointRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(request) = payload?;
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());

    let endpoint = state.chains.create_endpoint(request, host).await?;

    Ok(ApiResponse::success(json!({
        "id": endpoint.id,
        "endpointUrl": endpoint.endpoint_url,
        "simplifiedApiUrl": endpoint.simplified_api_url,
        "portNumber": endpoint.port_number,
        "userName": endpoint.user_name,
        "message": "Chain endpoint created successfully",
    })))
}
