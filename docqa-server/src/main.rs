use clap::Parser;
use docqa_server::{ServerConfig, run_server, telemetry::init_logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loaded before parsing so `.env` values act as flag defaults.
    let dotenv = dotenvy::dotenv();
    let config = ServerConfig::parse();
    init_logging(config.env, config.log_format)?;

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    run_server(config).await
}
