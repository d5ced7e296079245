use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::PipelineConfig;
use crate::helper_functions::project_root;

mod analysis;
mod config;
mod data_handling;
mod error;
mod habitat;
mod helper_functions;
mod models;
mod pipeline;

fn main() -> anyhow::Result<()> {
    // Setup logging and project configuration
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting the AMP habitat pipeline");

    let root = project_root();
    let config = PipelineConfig::load(&root)
        .with_context(|| format!("loading configuration from {}", root.display()))?;

    pipeline::run(&config).context("habitat pipeline failed")?;

    info!("Tables written to {}", config.output_dir.display());
    Ok(())
}
