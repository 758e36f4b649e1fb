#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use chainport_api::app::{router, AppState};
use chainport_api::auth::{issue_session_token, SessionClaims};
use chainport_api::config::AppConfig;
use chainport_api::database::MemoryPortStore;
use chainport_api::documents::MemoryDocumentStore;

pub const SESSION_SECRET: &str = "integration-test-secret";

/// Router served in-process on a free port, backed by in-memory stores
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub documents: Arc<MemoryDocumentStore>,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Bearer token for `sub`, signed with the server's secret
    pub fn token_for(&self, sub: &str) -> Result<String> {
        let claims = SessionClaims::new(sub, Some(format!("{}@example.com", sub)), 1)
            .context("failed to build test claims")?;
        issue_session_token(SESSION_SECRET, &claims).context("failed to sign test token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn spawn_server() -> Result<TestServer> {
    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let base_url = format!("http://127.0.0.1:{}", port);

    let documents = Arc::new(MemoryDocumentStore::new());
    let state = AppState::new(
        AppConfig::in_memory(SESSION_SECRET),
        Arc::new(MemoryPortStore::new()),
        documents.clone(),
    );

    // Bound before returning, so the server is ready as soon as we hand it out
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router(state)).await;
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("failed to build http client")?;

    Ok(TestServer {
        port,
        base_url,
        documents,
        client,
    })
}
