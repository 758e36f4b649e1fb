use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, SecurityConfig, StorageBackend};
use crate::database::{DatabaseManager, MemoryPortStore, PgPortRepository, PortStore};
use crate::documents::{self, DocumentStore};
use crate::handlers::{protected, public};
use crate::middleware::session_auth_middleware;
use crate::services::{ChainAssembler, PortService};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ports: PortService,
    pub chains: ChainAssembler,
}

impl AppState {
    pub fn new(config: AppConfig, ports: Arc<dyn PortStore>, documents: Arc<dyn DocumentStore>) -> Self {
        let chains = ChainAssembler::new(documents, config.chain.clone());
        Self {
            config: Arc::new(config),
            ports: PortService::new(ports),
            chains,
        }
    }

    /// Connect the configured backends. Any failure here is fatal.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let ports: Arc<dyn PortStore> = match config.database.backend {
            StorageBackend::Postgres => {
                let pool = DatabaseManager::connect(&config.database)
                    .await
                    .context("failed to connect to database")?;
                if config.database.run_migrations {
                    DatabaseManager::migrate(&pool)
                        .await
                        .context("failed to apply migrations")?;
                }
                Arc::new(PgPortRepository::new(pool))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory port store; ports will not survive a restart");
                Arc::new(MemoryPortStore::new())
            }
        };

        let documents = documents::connect(&config.documents)
            .await
            .context("failed to initialize document store")?;

        Ok(Self::new(config, ports, documents))
    }
}

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.security);

    Router::new()
        // Public
        .route("/", get(public::system::root))
        .route("/health", get(public::system::health))
        .route("/api/create-endpoint", post(public::chain::create_endpoint))
        // Session-protected
        .merge(port_routes(state.clone()))
        // Global middleware
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn port_routes(state: AppState) -> Router<AppState> {
    use protected::ports;

    Router::new()
        .route("/api/ports", get(ports::list).post(ports::create))
        .route(
            "/api/ports/:id",
            get(ports::get).put(ports::update).delete(ports::delete),
        )
        // route_layer: unknown paths stay 404 instead of 401
        .route_layer(middleware::from_fn_with_state(state, session_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("chainport_api=info,tower_http=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build state from `config` and serve until Ctrl-C
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting chainport API in {:?} mode", config.environment);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let state = AppState::from_config(config).await?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("chainport API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
