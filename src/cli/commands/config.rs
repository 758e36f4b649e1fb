use crate::cli::utils::output_value;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

/// `chainport config` - effective configuration, secrets masked
pub fn handle(config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let value = serde_json::to_value(config.redacted())?;
    output_value(&output_format, &value)?;

    if let Err(e) = config.validate() {
        eprintln!("warning: {}", e);
    }
    Ok(())
}
