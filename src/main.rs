#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SESSION_SECRET, etc.
    let _ = dotenvy::dotenv();

    chainport_api::app::init_tracing();

    let config = chainport_api::config::config().clone();
    chainport_api::app::serve(config).await
}
