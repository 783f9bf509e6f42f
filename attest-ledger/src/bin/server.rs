//! Attestation ledger server binary

use anyhow::Context;
use attest_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting EduChain attestation ledger");

    // Load configuration
    let config = match std::env::var("ATTEST_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        Err(_) => Config::from_env().context("Failed to load config from environment")?,
    };

    // Open ledger
    let ledger = Ledger::open(config).await.context("Failed to open ledger")?;

    let summary = ledger.summary();
    tracing::info!(
        chain_length = summary.chain_length,
        latest_height = summary.latest_height,
        latest_hash = %summary.latest_hash,
        is_valid = summary.is_valid,
        "Ledger opened successfully"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down ledger server");
    ledger.shutdown().await?;
    Ok(())
}
