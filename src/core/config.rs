//! Configuration parsing and validation.
//!
//! Configuration is loaded from TOML files with CLI overrides. Every
//! threshold the registry uses (lease terms, sweep cadence, guard
//! fraction, backoff schedule) is configurable; nothing is hardcoded.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node identity and peer wiring.
    pub node: NodeConfig,

    /// Default lease terms.
    #[serde(default)]
    pub lease: LeaseConfig,

    /// Expiry sweep settings.
    #[serde(default)]
    pub sweep: SweepSettings,

    /// Replication gossip settings.
    #[serde(default)]
    pub replication: ReplicationSettings,

    /// Delta change-log retention.
    #[serde(default)]
    pub delta: DeltaConfig,

    /// Telemetry settings.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Node identity and peer wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's identifier, used as event origin.
    #[serde(default = "default_node_id")]
    pub id: String,

    /// Peer listener bind address.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Peer registry node addresses.
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Default lease terms for registrations that do not carry their own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseConfig {
    /// Expected renewal cadence in seconds.
    #[serde(default = "default_renewal_interval_secs")]
    pub renewal_interval_secs: u64,

    /// Lease duration: no renewal for this long means eviction.
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            renewal_interval_secs: default_renewal_interval_secs(),
            duration_secs: default_duration_secs(),
        }
    }
}

/// Expiry sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Interval between sweeps in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Self-preservation guard: the fraction of the registry one sweep
    /// may evict before the sweep is suppressed.
    #[serde(default = "default_guard_fraction")]
    pub guard_fraction: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            guard_fraction: default_guard_fraction(),
        }
    }
}

/// Replication gossip settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationSettings {
    /// Per-peer event channel capacity.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Maximum events per push batch.
    #[serde(default = "default_batch_max")]
    pub batch_max: usize,

    /// Timeout for one peer exchange in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// First retry delay for an unreachable peer in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Retry delay cap in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Pull a full snapshot from a peer before serving.
    #[serde(default = "default_sync_on_start")]
    pub sync_on_start: bool,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            batch_max: default_batch_max(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            sync_on_start: default_sync_on_start(),
        }
    }
}

/// Delta change-log retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaConfig {
    /// Maximum retained change entries.
    #[serde(default = "default_delta_retention")]
    pub retention: usize,

    /// Maximum change entry age in seconds.
    #[serde(default = "default_delta_retention_secs")]
    pub retention_secs: u64,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            retention: default_delta_retention(),
            retention_secs: default_delta_retention_secs(),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// CLI overrides applied after loading.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the log level.
    pub log_level: Option<String>,
    /// Override the peer listener bind address.
    pub bind: Option<String>,
    /// Override the node id.
    pub node_id: Option<String>,
}

fn default_node_id() -> String {
    "beacon-1".to_string()
}

fn default_bind() -> String {
    "127.0.0.1:7700".to_string()
}

fn default_renewal_interval_secs() -> u64 {
    30
}

fn default_duration_secs() -> u64 {
    90
}

fn default_sweep_interval_secs() -> u64 {
    5
}

fn default_guard_fraction() -> f64 {
    0.15
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_batch_max() -> usize {
    64
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

fn default_backoff_base_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_sync_on_start() -> bool {
    true
}

fn default_delta_retention() -> usize {
    1024
}

fn default_delta_retention_secs() -> u64 {
    180
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref bind) = overrides.bind {
            self.node.bind = bind.clone();
        }
        if let Some(ref node_id) = overrides.node_id {
            self.node.id = node_id.clone();
        }
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<()> {
        self.validate_node()?;
        self.validate_lease()?;
        self.validate_sweep()?;
        self.validate_replication()?;
        Ok(())
    }

    /// The listener bind address, parsed.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.node
            .bind
            .parse()
            .with_context(|| format!("invalid node.bind address: {}", self.node.bind))
    }

    fn validate_node(&self) -> Result<()> {
        if self.node.id.trim().is_empty() {
            anyhow::bail!("node.id must not be empty");
        }
        self.bind_addr()?;
        for peer in &self.node.peers {
            peer.parse::<SocketAddr>()
                .with_context(|| format!("invalid peer address: {peer}"))?;
            if *peer == self.node.bind {
                anyhow::bail!("node.peers must not contain the node's own bind address");
            }
        }
        Ok(())
    }

    fn validate_lease(&self) -> Result<()> {
        if self.lease.duration_secs == 0 {
            anyhow::bail!("lease.duration_secs must be positive");
        }
        if self.lease.renewal_interval_secs >= self.lease.duration_secs {
            anyhow::bail!(
                "lease.renewal_interval_secs ({}) must be shorter than lease.duration_secs ({})",
                self.lease.renewal_interval_secs,
                self.lease.duration_secs
            );
        }
        Ok(())
    }

    fn validate_sweep(&self) -> Result<()> {
        if self.sweep.interval_secs == 0 {
            anyhow::bail!("sweep.interval_secs must be positive");
        }
        if !(0.0..=1.0).contains(&self.sweep.guard_fraction) {
            anyhow::bail!(
                "sweep.guard_fraction must be within [0.0, 1.0], got: {}",
                self.sweep.guard_fraction
            );
        }
        Ok(())
    }

    fn validate_replication(&self) -> Result<()> {
        if self.replication.batch_max == 0 {
            anyhow::bail!("replication.batch_max must be positive");
        }
        if self.replication.request_timeout_ms == 0 {
            anyhow::bail!("replication.request_timeout_ms must be positive");
        }
        if self.replication.backoff_base_ms > self.replication.backoff_max_ms {
            anyhow::bail!(
                "replication.backoff_base_ms ({}) must not exceed backoff_max_ms ({})",
                self.replication.backoff_base_ms,
                self.replication.backoff_max_ms
            );
        }
        Ok(())
    }
}
