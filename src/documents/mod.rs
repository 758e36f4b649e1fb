//! Document store used to publish chain definitions.
//!
//! Documents are addressed by alternating collection/document segments,
//! e.g. `users/{email}/chains/{chainId}`, and written with set semantics
//! (the whole document is replaced).

pub mod credentials;
pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{DocumentBackend, DocumentConfig};

pub use credentials::ServiceAccount;
pub use firestore::FirestoreClient;
pub use memory::MemoryDocumentStore;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Document store credentials unavailable: {0}")]
    Credentials(String),

    #[error("Document store authentication failed: {0}")]
    Auth(String),

    #[error("Document store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Document store returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Path of a single document: an even number of non-empty segments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    pub fn new<I, S>(segments: I) -> Result<Self, DocumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();

        if segments.is_empty() || segments.len() % 2 != 0 {
            return Err(DocumentError::InvalidPath(format!(
                "expected collection/document pairs, got {} segment(s)",
                segments.len()
            )));
        }
        for segment in &segments {
            if segment.trim().is_empty() || segment.contains('/') || segment == "." || segment == ".." {
                return Err(DocumentError::InvalidPath(format!("invalid segment '{}'", segment)));
            }
        }

        Ok(Self { segments })
    }

    /// `users/{owner}/chains/{chain_id}`
    pub fn chain(owner_email: &str, chain_id: &str) -> Result<Self, DocumentError> {
        Self::new(["users", owner_email, "chains", chain_id])
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn document_id(&self) -> &str {
        // new() guarantees at least two segments
        &self.segments[self.segments.len() - 1]
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or overwrite the document at `path`
    async fn set(&self, path: &DocumentPath, fields: &Map<String, Value>) -> Result<(), DocumentError>;

    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;
}

/// Build the configured document store. Misconfiguration is returned as an
/// error for the caller to treat as fatal.
pub async fn connect(config: &DocumentConfig) -> Result<Arc<dyn DocumentStore>, DocumentError> {
    match config.backend {
        DocumentBackend::Memory => {
            tracing::warn!("Using in-memory document store; chains will not survive a restart");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        DocumentBackend::Firestore => {
            let client = FirestoreClient::from_config(config)?;
            tracing::info!("Firestore document store ready for project '{}'", client.project_id());
            Ok(Arc::new(client))
        }
    }
}
