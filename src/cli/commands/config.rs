//! Config command implementation.

use crate::core::config::Config;
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate a configuration file.
    Validate {
        /// Config file path.
        #[arg(short, long, default_value = "config/beacon.toml")]
        config: PathBuf,
    },
    /// Print the effective configuration with defaults applied.
    Show {
        /// Config file path.
        #[arg(short, long, default_value = "config/beacon.toml")]
        config: PathBuf,
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Run the config command.
pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Validate { config } => validate_config(&config),
        ConfigCommand::Show { config, format } => show_config(&config, &format),
    }
}

fn validate_config(path: &Path) -> Result<()> {
    let config = Config::from_file(path)
        .with_context(|| format!("failed to load config from {:?}", path))?;
    config.validate()?;

    println!("✓ {} is valid", path.display());
    println!("  node:  {} on {}", config.node.id, config.node.bind);
    println!("  peers: {}", config.node.peers.len());
    println!(
        "  lease: renew every {}s, expire after {}s",
        config.lease.renewal_interval_secs, config.lease.duration_secs
    );
    Ok(())
}

fn show_config(path: &Path, format: &str) -> Result<()> {
    let config = Config::from_file(path)
        .with_context(|| format!("failed to load config from {:?}", path))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => println!("{}", toml::to_string_pretty(&config)?),
    }
    Ok(())
}
