use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::DocumentError;
use crate::config::DocumentConfig;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

/// Service-account identity used to obtain Firestore access tokens
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Inline env credentials first, then the service-account JSON file
    pub fn from_config(config: &DocumentConfig) -> Result<Self, DocumentError> {
        if let (Some(project_id), Some(client_email), Some(private_key)) =
            (&config.project_id, &config.client_email, &config.private_key)
        {
            return Ok(Self {
                project_id: project_id.clone(),
                client_email: client_email.clone(),
                private_key: private_key.clone(),
                token_uri: default_token_uri(),
            });
        }

        if let Some(file) = &config.credentials_file {
            let raw = std::fs::read_to_string(file).map_err(|e| {
                DocumentError::Credentials(format!("cannot read {}: {}", file, e))
            })?;
            let mut account = Self::from_json(&raw)?;
            if let Some(project_id) = &config.project_id {
                account.project_id = project_id.clone();
            }
            return Ok(account);
        }

        Err(DocumentError::Credentials(
            "set FIREBASE_PROJECT_ID, FIREBASE_CLIENT_EMAIL and FIREBASE_PRIVATE_KEY, \
             or GOOGLE_APPLICATION_CREDENTIALS"
                .to_string(),
        ))
    }

    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(raw)
            .map_err(|e| DocumentError::Credentials(format!("invalid service account JSON: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

/// Exchanges signed service-account assertions for OAuth access tokens and
/// caches the current token until shortly before expiry.
pub struct TokenSource {
    account: ServiceAccount,
    key: EncodingKey,
    http: reqwest::Client,
    cached: RwLock<Option<AccessToken>>,
}

impl TokenSource {
    /// Fails if the private key is not a usable RSA PEM
    pub fn new(account: ServiceAccount, http: reqwest::Client) -> Result<Self, DocumentError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| DocumentError::Credentials(format!("invalid private key: {}", e)))?;

        Ok(Self {
            account,
            key,
            http,
            cached: RwLock::new(None),
        })
    }

    pub async fn access_token(&self) -> Result<String, DocumentError> {
        // Fast path: cached token still valid
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
                return Ok(token.token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn signed_assertion(&self, now: DateTime<Utc>) -> Result<String, DocumentError> {
        let claims = AssertionClaims {
            iss: &self.account.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.account.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| DocumentError::Auth(format!("cannot sign assertion: {}", e)))
    }

    async fn fetch(&self) -> Result<AccessToken, DocumentError> {
        let now = Utc::now();
        let assertion = self.signed_assertion(now)?;

        let response = self
            .http
            .post(&self.account.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DocumentError::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let body: TokenResponse = response.json().await?;
        tracing::debug!("Obtained access token for {}", self.account.client_email);

        Ok(AccessToken {
            token: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TEST_KEY: &str = include_str!("../../tests/fixtures/service-account-key.pem");
    const TEST_PUB: &str = include_str!("../../tests/fixtures/service-account-pub.pem");

    fn account(token_uri: &str) -> ServiceAccount {
        ServiceAccount {
            project_id: "demo-chainport".to_string(),
            client_email: "svc@demo-chainport.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            token_uri: token_uri.to_string(),
        }
    }

    /// Token endpoint that counts hits and checks the assertion signature
    async fn spawn_token_endpoint(hits: Arc<AtomicUsize>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token_uri = format!("http://{}/token", listener.local_addr().unwrap());
        let audience = token_uri.clone();

        let app = Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let hits = hits.clone();
                let audience = audience.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(form.get("grant_type").map(String::as_str), Some(JWT_BEARER_GRANT));

                    let mut validation = Validation::new(Algorithm::RS256);
                    validation.set_audience(&[audience]);
                    let key = DecodingKey::from_rsa_pem(TEST_PUB.as_bytes()).unwrap();
                    let data = decode::<serde_json::Value>(&form["assertion"], &key, &validation).unwrap();
                    assert_eq!(data.claims["scope"], DATASTORE_SCOPE);

                    Json(json!({"access_token": "ya29.test-token", "expires_in": 3599, "token_type": "Bearer"}))
                }
            }),
        );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        token_uri
    }

    #[test]
    fn inline_credentials_take_precedence() {
        let mut config = crate::config::AppConfig::in_memory("s").documents;
        config.project_id = Some("p".to_string());
        config.client_email = Some("e@p.iam.gserviceaccount.com".to_string());
        config.private_key = Some(TEST_KEY.to_string());
        config.credentials_file = Some("/nonexistent.json".to_string());

        let account = ServiceAccount::from_config(&config).unwrap();
        assert_eq!(account.project_id, "p");
        assert_eq!(account.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn parses_service_account_json() {
        let raw = json!({
            "type": "service_account",
            "project_id": "from-file",
            "client_email": "svc@from-file.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
            "private_key_id": "abc"
        })
        .to_string();

        let account = ServiceAccount::from_json(&raw).unwrap();
        assert_eq!(account.project_id, "from-file");
        assert_eq!(account.token_uri, DEFAULT_TOKEN_URI);
        assert!(!format!("{:?}", account).contains("PRIVATE KEY"));
    }

    #[test]
    fn missing_credentials_file_is_an_error() {
        let mut config = crate::config::AppConfig::in_memory("s").documents;
        config.credentials_file = Some("/definitely/not/here.json".to_string());
        assert!(matches!(ServiceAccount::from_config(&config), Err(DocumentError::Credentials(_))));
    }

    #[test]
    fn rejects_garbage_private_key() {
        let mut bad = account(DEFAULT_TOKEN_URI);
        bad.private_key = "not a key".to_string();
        assert!(matches!(
            TokenSource::new(bad, reqwest::Client::new()),
            Err(DocumentError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn access_token_is_fetched_once_and_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let token_uri = spawn_token_endpoint(hits.clone()).await;

        let source = TokenSource::new(account(&token_uri), reqwest::Client::new()).unwrap();
        assert_eq!(source.access_token().await.unwrap(), "ya29.test-token");
        assert_eq!(source.access_token().await.unwrap(), "ya29.test-token");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
