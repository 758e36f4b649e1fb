use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::config::ChainConfig;
use crate::documents::{DocumentError, DocumentPath, DocumentStore};

/// Assigned chain ports fall in [PORT_BASE, PORT_BASE + PORT_SPAN)
const PORT_BASE: u16 = 10000;
const PORT_SPAN: u16 = 50000;
const DEFAULT_CHAIN_NAME: &str = "Untitled Chain";

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid chain data. Chain must have at least one step.")]
    InvalidChain,

    #[error("OpenAI API key is required")]
    MissingApiKey,

    #[error("User information required")]
    MissingUser,

    #[error("Invalid user email: {0}")]
    InvalidEmail(String),

    #[error("Invalid host: {0}")]
    InvalidHost(String),

    #[error(transparent)]
    Store(#[from] DocumentError),
}

/// Body of `POST /api/create-endpoint`. Fields stay raw JSON; type
/// mismatches map to domain errors, checked after the chain steps.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEndpointRequest {
    pub chain_data: Option<Value>,
    pub api_key: Option<Value>,
    pub user_info: Option<Value>,
}

/// Caller identity taken from `userInfo`. Non-string fields read as absent.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UserInfo {
    pub email: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub uid: Option<String>,
}

impl UserInfo {
    /// `None` unless `value` is a JSON object
    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            email: text("email"),
            name: text("name"),
            display_name: text("displayName"),
            uid: text("uid"),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainEndpoint {
    pub id: String,
    pub endpoint_url: String,
    pub simplified_api_url: String,
    pub port_number: u16,
    pub user_name: String,
}

/// Turns a chain definition into a stored document plus the URLs that
/// invoke it. The document store is injected at construction.
#[derive(Clone)]
pub struct ChainAssembler {
    documents: Arc<dyn DocumentStore>,
    config: ChainConfig,
}

impl ChainAssembler {
    pub fn new(documents: Arc<dyn DocumentStore>, config: ChainConfig) -> Self {
        Self { documents, config }
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    /// Validate, derive URLs for `host` (or the configured default), and
    /// persist the chain under the caller's email.
    pub async fn create_endpoint(
        &self,
        request: CreateEndpointRequest,
        host: Option<&str>,
    ) -> Result<ChainEndpoint, ChainError> {
        let chain_data = request
            .chain_data
            .filter(has_steps)
            .ok_or(ChainError::InvalidChain)?;
        let api_key = request
            .api_key
            .as_ref()
            .and_then(Value::as_str)
            .filter(|k| !k.trim().is_empty())
            .ok_or(ChainError::MissingApiKey)?
            .to_string();
        let user = request
            .user_info
            .as_ref()
            .and_then(UserInfo::from_value)
            .ok_or(ChainError::MissingUser)?;
        let email = user
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(ChainError::MissingUser)?
            .to_string();
        if email.contains('/') {
            return Err(ChainError::InvalidEmail(email));
        }

        let base = self.base_url(host)?;
        let id = Uuid::new_v4().simple().to_string();
        let port_number = derive_port_number(&email, &id);
        let user_name = resolve_user_name(&user, &email);
        let endpoint_url = endpoint_url(&base, &id);
        let simplified_api_url = simplified_api_url(&base, &id, port_number);

        let step_count = chain_data
            .get("steps")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let name = chain_data
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(DEFAULT_CHAIN_NAME)
            .to_string();

        let document = json!({
            "id": id,
            "name": name,
            "chainData": chain_data,
            "steps": step_count,
            "apiKey": api_key,
            "userEmail": email,
            "userName": user_name,
            "userId": user.uid,
            "endpointUrl": endpoint_url,
            "simplifiedApiUrl": simplified_api_url,
            "portNumber": port_number,
            "createdAt": Utc::now().to_rfc3339(),
        });

        let path = DocumentPath::chain(&email, &id).map_err(|_| ChainError::InvalidEmail(email.clone()))?;
        if let Value::Object(fields) = &document {
            self.documents.set(&path, fields).await?;
        }

        tracing::info!("Created endpoint: {}", endpoint_url);
        tracing::info!("Created simplified API: {}", simplified_api_url);
        tracing::info!("Stored chain ID: {} ({} backend)", id, self.documents.backend());

        Ok(ChainEndpoint {
            id,
            endpoint_url,
            simplified_api_url,
            port_number,
            user_name,
        })
    }

    /// `{scheme}://{host}/` where loopback hosts are always plain http
    fn base_url(&self, host: Option<&str>) -> Result<Url, ChainError> {
        let host = host
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .unwrap_or(self.config.default_host.as_str());

        if host.chars().any(|c| matches!(c, '/' | '\\' | '@' | '?' | '#') || c.is_whitespace()) {
            return Err(ChainError::InvalidHost(host.to_string()));
        }

        let probe = Url::parse(&format!("http://{}/", host))
            .map_err(|_| ChainError::InvalidHost(host.to_string()))?;
        let scheme = if is_loopback(probe.host_str().unwrap_or_default()) {
            "http"
        } else {
            self.config.public_scheme.as_str()
        };

        Url::parse(&format!("{}://{}/", scheme, host)).map_err(|_| ChainError::InvalidHost(host.to_string()))
    }
}

fn has_steps(chain_data: &Value) -> bool {
    chain_data
        .get("steps")
        .and_then(Value::as_array)
        .is_some_and(|steps| !steps.is_empty())
}

fn is_loopback(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]")
}

fn resolve_user_name(user: &UserInfo, email: &str) -> String {
    [&user.name, &user.display_name]
        .into_iter()
        .flatten()
        .map(|n| n.trim())
        .find(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string())
}

/// Stable port for a chain: SHA-256 of `email:id`, first two bytes, folded into the range
fn derive_port_number(email: &str, id: &str) -> u16 {
    let digest = Sha256::digest(format!("{}:{}", email, id).as_bytes());
    let raw = u16::from_be_bytes([digest[0], digest[1]]);
    PORT_BASE + raw % PORT_SPAN
}

fn endpoint_url(base: &Url, id: &str) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["api", "chains", id, "run"]);
    }
    url.into()
}

fn simplified_api_url(base: &Url, id: &str, port_number: u16) -> String {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(["api", "simple", id]);
    }
    url.query_pairs_mut().append_pair("port", &port_number.to_string());
    url.into()
}
