use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{verify_session_token, SessionClaims};
use crate::error::ApiError;

/// Authenticated caller extracted from the session token
#[derive(Clone, Debug)]
pub struct SessionUser {
    pub user_id: String,
    pub email: Option<String>,
}

impl From<SessionClaims> for SessionUser {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
        }
    }
}

/// Session middleware: verifies the caller's token and injects `SessionUser`.
/// Any missing or invalid token is a 401 before the handler runs.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = &state.config.session;

    let token = extract_session_token(request.headers(), &session.cookie_name).ok_or_else(|| {
        tracing::debug!("Request without session token: {}", request.uri().path());
        ApiError::unauthorized("Unauthorized")
    })?;

    let claims = verify_session_token(&session.secret, &token).map_err(|e| {
        tracing::warn!("Session verification failed: {}", e);
        ApiError::unauthorized("Unauthorized")
    })?;

    request.extensions_mut().insert(SessionUser::from(claims));

    Ok(next.run(request).await)
}

/// Bearer token from the Authorization header, falling back to the session cookie
fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(value) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
