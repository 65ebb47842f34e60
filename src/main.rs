use std::path::PathBuf;

use anyhow::Context;
use tracing::error;
use tracing_subscriber::EnvFilter;

use artifact_fetcher::Config;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        eprintln!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // Config path: ARTIFACT_FETCHER_CONFIG env var, first CLI arg, or default
    let config_path = std::env::var("ARTIFACT_FETCHER_CONFIG")
        .map(PathBuf::from)
        .ok()
        .or_else(|| std::env::args().nth(1).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("fetcher.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    // RUST_LOG wins; otherwise fall back to the configured log_level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    tracing::info!(
        config = %config_path.display(),
        targets = config.artifacts.len(),
        "configuration loaded"
    );

    artifact_fetcher::run_with_shutdown(config)
        .await
        .context("server error")
}
