//! Start command implementation.

use crate::core::config::{Config, ConfigOverrides};
use crate::core::runtime::Runtime;
use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;

/// Start the Beacon registry node.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Override the peer bind address.
    #[arg(long)]
    pub bind: Option<String>,

    /// Override the node identity.
    #[arg(long)]
    pub node_id: Option<String>,
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_owned()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Run the start command with the given config path and CLI overrides.
pub async fn run_start(
    config_path: &Path,
    args: StartArgs,
    log_level: Option<String>,
) -> Result<()> {
    let mut config = Config::from_file(config_path)
        .with_context(|| format!("failed to load config from {:?}", config_path))?;
    config.apply_overrides(&ConfigOverrides {
        log_level,
        bind: args.bind,
        node_id: args.node_id,
    });

    init_tracing(&config.telemetry.log_level);

    let mut runtime = Runtime::new(config)?;
    runtime.run().await
}
