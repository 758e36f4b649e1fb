use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, StorageBackend};
use crate::database::DatabaseManager;

/// `chainport serve` - same startup path as the chainport-api binary
pub async fn serve(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    crate::app::serve(config).await
}

/// `chainport migrate` - apply migrations against DATABASE_URL
pub async fn migrate(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.database.backend != StorageBackend::Postgres {
        anyhow::bail!("migrations require STORAGE_BACKEND=postgres");
    }

    let pool = DatabaseManager::connect(&config.database).await?;
    DatabaseManager::migrate(&pool).await?;

    output_success(
        &output_format,
        "Migrations applied",
        Some(json!({ "database": config.redacted().database.url })),
    )
}
