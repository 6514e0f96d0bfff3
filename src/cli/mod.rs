//! Command-line interface.
//!
//! Unified CLI for Beacon operations.

pub mod commands;

use clap::{Parser, Subcommand};

/// Beacon - lease-based service registry with peer replication.
#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the Beacon registry node.
    Start(commands::StartArgs),
    /// Show registry status from a running node.
    Status(commands::StatusArgs),
    /// Configuration operations.
    Config(commands::ConfigArgs),
}
