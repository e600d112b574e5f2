//! Lookout - Main Entry Point

use anyhow::Context;
use lookout::{init_logging, run, LookoutConfig};
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("LOOKOUT_CONFIG"))
        .map(PathBuf::from);

    let config = LookoutConfig::load(path.as_deref()).context("Failed to load configuration")?;
    init_logging(&config.logging)?;

    info!("=== Lookout garden monitor v{} ===", env!("CARGO_PKG_VERSION"));
    run(config).await
}
