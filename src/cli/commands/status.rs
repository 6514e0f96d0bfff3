//! Status command implementation.

use crate::net::client::TcpPeerTransport;
use crate::registry::instance::InstanceInfo;
use crate::replication::transport::PeerTransport;
use anyhow::{Context, Result};
use clap::Args;
use std::collections::BTreeMap;
use std::time::Duration;

/// Show registry status from a running node.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Peer address of the node to query.
    #[arg(short, long, default_value = "127.0.0.1:7700")]
    pub address: String,

    /// Output format (text, json).
    #[arg(long, default_value = "text")]
    pub format: String,

    /// Request timeout in milliseconds.
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,
}

/// Run the status command.
pub async fn run_status(args: StatusArgs) -> Result<()> {
    let transport = TcpPeerTransport::new("beacon-cli", Duration::from_millis(args.timeout_ms));
    let instances = transport
        .pull_snapshot(&args.address)
        .await
        .with_context(|| format!("failed to query node at {}", args.address))?;

    match args.format.as_str() {
        "json" => show_status_json(&instances),
        _ => show_status_text(&args.address, &instances),
    }
}

fn by_service(instances: &[InstanceInfo]) -> BTreeMap<&str, Vec<&InstanceInfo>> {
    let mut services: BTreeMap<&str, Vec<&InstanceInfo>> = BTreeMap::new();
    for info in instances {
        services.entry(info.service.as_str()).or_default().push(info);
    }
    services
}

fn show_status_text(address: &str, instances: &[InstanceInfo]) -> Result<()> {
    let services = by_service(instances);

    println!("Beacon Registry Status");
    println!("======================");
    println!("Node:      {}", address);
    println!("Services:  {}", services.len());
    println!("Instances: {}", instances.len());
    println!();

    for (service, members) in &services {
        println!("{}:", service);
        for info in members {
            println!(
                "  {:<24} {:<21} {}",
                info.instance_id,
                info.endpoint(),
                info.status
            );
        }
    }

    Ok(())
}

fn show_status_json(instances: &[InstanceInfo]) -> Result<()> {
    let services: BTreeMap<_, _> = by_service(instances);
    println!("{}", serde_json::to_string_pretty(&services)?);
    Ok(())
}
