use serde_json::json;

use crate::auth::{issue_session_token, SessionClaims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

/// `chainport token --sub <id>` - sign a session token with the configured secret
pub fn handle(
    config: &AppConfig,
    sub: String,
    email: Option<String>,
    hours: Option<u64>,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let hours = hours.unwrap_or(config.session.expiry_hours);
    let claims = SessionClaims::new(sub, email, hours)?;
    let token = issue_session_token(&config.session.secret, &claims)?;

    match output_format {
        OutputFormat::Text => {
            // Bare token so it can be captured with $(chainport token ...)
            println!("{}", token);
            Ok(())
        }
        OutputFormat::Json => output_success(
            &output_format,
            "Session token issued",
            Some(json!({
                "token": token,
                "sub": claims.sub,
                "expires_at": claims.exp,
            })),
        ),
    }
}
