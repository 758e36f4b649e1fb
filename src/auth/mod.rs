use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claims carried by a session token. `sub` is the user identifier that
/// scopes every port operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl SessionClaims {
    /// Fails when `expiry_hours` puts `exp` beyond what a timestamp can hold
    pub fn new(sub: impl Into<String>, email: Option<String>, expiry_hours: u64) -> Result<Self, SessionError> {
        let now = Utc::now();
        let exp = i64::try_from(expiry_hours)
            .ok()
            .and_then(Duration::try_hours)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .ok_or(SessionError::InvalidExpiry(expiry_hours))?;

        Ok(Self {
            sub: sub.into(),
            email,
            name: None,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session secret not configured")]
    MissingSecret,

    #[error("Session lifetime of {0} hours is out of range")]
    InvalidExpiry(u64),

    #[error("Session token has no subject")]
    MissingSubject,

    #[error("Invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

/// Sign a session token with the shared HS256 secret
pub fn issue_session_token(secret: &str, claims: &SessionClaims) -> Result<String, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    Ok(encode(&Header::default(), claims, &encoding_key)?)
}

/// Verify signature and expiry, and require a non-empty subject
pub fn verify_session_token(secret: &str, token: &str) -> Result<SessionClaims, SessionError> {
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<SessionClaims>(token, &decoding_key, &Validation::default())?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(SessionError::MissingSubject);
    }

    Ok(token_data.claims)
}
