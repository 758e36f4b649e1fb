use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from the relational store
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds and checks the Postgres pool backing the port repository.
/// Constructed once at startup; the pool is then shared through `AppState`.
pub struct DatabaseManager;

impl DatabaseManager {
    /// Open a pool sized from config
    pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_deref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        Self::validate_url(url)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Created database pool ({} max connections)", config.max_connections);
        Ok(pool)
    }

    /// Apply embedded migrations from `migrations/`
    pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    /// Only postgres URLs with a database path are accepted
    fn validate_url(raw: &str) -> Result<(), DatabaseError> {
        let url = url::Url::parse(raw)
            .map_err(|e| DatabaseError::InvalidDatabaseUrl(e.to_string()))?;

        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if url.path().trim_start_matches('/').is_empty() {
            return Err(DatabaseError::InvalidDatabaseUrl("missing database name".to_string()));
        }
        Ok(())
    }
}
