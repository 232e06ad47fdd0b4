//! Command-line entry point: loads configuration, runs the report batch.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ucd_sales_report::{pipeline, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {config_path}"))?;

    let workbook = pipeline::run(&cfg).await.context("report run failed")?;
    info!("workbook written to {}", workbook.display());
    Ok(())
}
