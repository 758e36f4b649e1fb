use chrono::Utc;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::database::models::port::{DEFAULT_HOST, MAX_PORT_NUMBER, MIN_PORT_NUMBER};
use crate::database::models::{Port, PortChanges, Protocol};
use crate::database::repository::PortStore;

const REQUIRED_MESSAGE: &str = "Name and port number are required";
const RANGE_MESSAGE: &str = "Port number must be between 1 and 65535";

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Port not found: {0}")]
    NotFound(String),

    #[error("Port {port_id} is not owned by {user_id}")]
    Forbidden { port_id: String, user_id: String },

    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

impl PortError {
    fn validation(field: &'static str, message: impl Into<String>) -> Self {
        PortError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Body of `POST /api/ports`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePort {
    pub name: Option<String>,
    pub port_number: Option<i64>,
    pub protocol: Option<String>,
    pub host: Option<String>,
    pub description: Option<String>,
}

/// Body of `PUT /api/ports/:id`. Absent fields are left unchanged; an
/// explicit `"description": null` clears the description.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePort {
    pub name: Option<String>,
    pub port_number: Option<i64>,
    pub protocol: Option<String>,
    pub host: Option<String>,
    #[serde(default, deserialize_with = "present_or_null")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

/// Distinguishes a field set to `null` (`Some(None)`) from an absent one (`None`)
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Owner-scoped port operations. Get, update and delete fetch the row first
/// and then compare owners, so a missing row (404) and someone else's row
/// (403) stay distinguishable.
#[derive(Clone)]
pub struct PortService {
    store: Arc<dyn PortStore>,
}

impl PortService {
    pub fn new(store: Arc<dyn PortStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PortStore> {
        &self.store
    }

    pub async fn list(&self, user_id: &str) -> Result<Vec<Port>, PortError> {
        Ok(self.store.list_by_owner(user_id).await?)
    }

    pub async fn get(&self, user_id: &str, id: &str) -> Result<Port, PortError> {
        let port = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| PortError::NotFound(id.to_string()))?;

        if port.user_id != user_id {
            tracing::warn!("User {} denied access to port {} owned by another user", user_id, id);
            return Err(PortError::Forbidden {
                port_id: id.to_string(),
                user_id: user_id.to_string(),
            });
        }

        Ok(port)
    }

    pub async fn create(&self, user_id: &str, input: CreatePort) -> Result<Port, PortError> {
        let name = input
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| PortError::validation("name", REQUIRED_MESSAGE))?;
        let port_number = match input.port_number {
            None | Some(0) => return Err(PortError::validation("portNumber", REQUIRED_MESSAGE)),
            Some(n) => validate_port_number(n)?,
        };
        let protocol = match input.protocol.as_deref() {
            None => Protocol::default(),
            Some(raw) => parse_protocol(raw)?,
        };
        let host = input
            .host
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        let now = Utc::now();
        let port = Port {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name,
            port_number,
            protocol: protocol.to_string(),
            host,
            description: input.description,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert(&port).await?;
        tracing::info!("User {} created port {} ({})", user_id, created.id, created.port_number);
        Ok(created)
    }

    pub async fn update(&self, user_id: &str, id: &str, input: UpdatePort) -> Result<Port, PortError> {
        let existing = self.get(user_id, id).await?;
        let changes = validate_changes(input)?;

        // updated_at never moves backwards, even if the clock does
        let updated_at = Utc::now().max(existing.updated_at);

        self.store
            .update(id, &changes, updated_at)
            .await?
            .ok_or_else(|| PortError::NotFound(id.to_string()))
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), PortError> {
        self.get(user_id, id).await?;

        if !self.store.delete(id).await? {
            // Removed by a concurrent request between fetch and delete
            return Err(PortError::NotFound(id.to_string()));
        }

        tracing::info!("User {} deleted port {}", user_id, id);
        Ok(())
    }
}

fn validate_port_number(n: i64) -> Result<i32, PortError> {
    if !(MIN_PORT_NUMBER..=MAX_PORT_NUMBER).contains(&n) {
        return Err(PortError::validation("portNumber", RANGE_MESSAGE));
    }
    Ok(n as i32)
}

/// Blank means the default protocol, on create and update alike
fn parse_protocol(raw: &str) -> Result<Protocol, PortError> {
    if raw.trim().is_empty() {
        return Ok(Protocol::default());
    }
    raw.parse::<Protocol>()
        .map_err(|message| PortError::validation("protocol", message))
}

fn validate_changes(input: UpdatePort) -> Result<PortChanges, PortError> {
    if let Some(name) = &input.name {
        if name.trim().is_empty() {
            return Err(PortError::validation("name", "Name cannot be empty"));
        }
    }
    if let Some(host) = &input.host {
        if host.trim().is_empty() {
            return Err(PortError::validation("host", "Host cannot be empty"));
        }
    }

    Ok(PortChanges {
        name: input.name,
        port_number: input.port_number.map(validate_port_number).transpose()?,
        protocol: input.protocol.as_deref().map(parse_protocol).transpose()?,
        host: input.host,
        description: input.description,
        is_active: input.is_active,
    })
}
