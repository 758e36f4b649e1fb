pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "chainport")]
#[command(about = "chainport CLI - run and administer the chainport API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP API")]
    Serve {
        #[arg(long, help = "Listen port (overrides CHAINPORT_API_PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "Mint a session token for local testing")]
    Token {
        #[arg(long, help = "Subject (user id) carried in the token")]
        sub: String,
        #[arg(long, help = "Email claim")]
        email: Option<String>,
        #[arg(long, help = "Lifetime in hours (defaults to SESSION_EXPIRY_HOURS)")]
        hours: Option<u64>,
    },

    #[command(about = "Print the effective configuration with secrets redacted")]
    Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let config = crate::config::config().clone();

    match cli.command {
        Commands::Serve { port } => commands::server::serve(config, port).await,
        Commands::Migrate => commands::server::migrate(config, output_format).await,
        Commands::Token { sub, email, hours } => {
            commands::token::handle(&config, sub, email, hours, output_format)
        }
        Commands::Config => commands::config::handle(&config, output_format),
    }
}
