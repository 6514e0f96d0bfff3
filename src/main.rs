//! Beacon - unified CLI entrypoint.
//!
//! Usage:
//!   beacon start --config config/beacon.toml [--bind ADDR] [--node-id ID]
//!   beacon status [--address ADDR]
//!   beacon config validate --config config/beacon.toml
//!   beacon config show --config config/beacon.toml [--format json]

use anyhow::Result;
use beacon::cli::commands::{run_config, run_start, run_status};
use beacon::cli::{Cli, Commands};
use clap::Parser;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config/beacon.toml"));

    match cli.command {
        Commands::Start(args) => run_start(&config_path, args, cli.log_level).await,
        Commands::Status(args) => run_status(args).await,
        Commands::Config(args) => run_config(args),
    }
}
