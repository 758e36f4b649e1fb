use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

use super::credentials::{ServiceAccount, TokenSource};
use super::{DocumentError, DocumentPath, DocumentStore};
use crate::config::DocumentConfig;

const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";
/// Project used against the emulator when none is configured
const EMULATOR_PROJECT: &str = "demo-chainport";

enum FirestoreAuth {
    /// The emulator accepts this fixed bearer token as an admin credential
    Emulator,
    ServiceAccount(TokenSource),
}

/// Firestore REST client. Built once at startup and shared.
pub struct FirestoreClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    auth: FirestoreAuth,
}

impl FirestoreClient {
    pub fn from_config(config: &DocumentConfig) -> Result<Self, DocumentError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        if let Some(host) = &config.emulator_host {
            let project_id = config
                .project_id
                .clone()
                .unwrap_or_else(|| EMULATOR_PROJECT.to_string());
            tracing::info!("Firestore emulator at {}", host);
            return Ok(Self {
                http,
                base_url: format!("http://{}/v1", host),
                project_id,
                auth: FirestoreAuth::Emulator,
            });
        }

        let account = ServiceAccount::from_config(config)?;
        let project_id = account.project_id.clone();
        let tokens = TokenSource::new(account, http.clone())?;

        Ok(Self {
            http,
            base_url: FIRESTORE_BASE_URL.to_string(),
            project_id,
            auth: FirestoreAuth::ServiceAccount(tokens),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// `{base}/projects/{project}/databases/(default)/documents/{path}`
    fn document_url(&self, path: &DocumentPath) -> Result<Url, DocumentError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| DocumentError::InvalidPath(format!("bad base url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| DocumentError::InvalidPath("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["projects", self.project_id.as_str(), "databases", DEFAULT_DATABASE, "documents"])
            .extend(path.segments());
        Ok(url)
    }

    async fn bearer_token(&self) -> Result<String, DocumentError> {
        match &self.auth {
            FirestoreAuth::Emulator => Ok("owner".to_string()),
            FirestoreAuth::ServiceAccount(tokens) => tokens.access_token().await,
        }
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn set(&self, path: &DocumentPath, fields: &Map<String, Value>) -> Result<(), DocumentError> {
        let url = self.document_url(path)?;
        let body = json!({ "fields": encode_fields(fields)? });
        let token = self.bearer_token().await?;

        // PATCH without an update mask replaces the whole document
        let response = self.http.patch(url).bearer_auth(token).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Firestore write to {} failed with {}: {}", path, status, body);
            return Err(DocumentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Wrote document {}", path);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "firestore"
    }
}

/// Encode a JSON object as a Firestore `fields` map
pub fn encode_fields(fields: &Map<String, Value>) -> Result<Value, DocumentError> {
    let mut encoded = Map::with_capacity(fields.len());
    for (key, value) in fields {
        encoded.insert(key.clone(), encode_value(value, false)?);
    }
    Ok(Value::Object(encoded))
}

/// Encode one JSON value as a typed Firestore value
fn encode_value(value: &Value, inside_array: bool) -> Result<Value, DocumentError> {
    Ok(match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            // Firestore carries 64-bit integers as strings
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            if inside_array {
                return Err(DocumentError::InvalidDocument(
                    "arrays nested directly inside arrays cannot be stored".to_string(),
                ));
            }
            let values = items
                .iter()
                .map(|item| encode_value(item, true))
                .collect::<Result<Vec<_>, _>>()?;
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map)? } }),
    })
}
