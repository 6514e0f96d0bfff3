//! Runtime orchestration.
//!
//! The runtime owns component lifecycle:
//! - Start order: lease store → replication (startup snapshot sync) →
//!   expiry sweeper → peer listener
//! - Shutdown order: reversed, driven by a shared watch channel; every
//!   background task is joined before `shutdown` returns.

use crate::api::RegistryApi;
use crate::core::config::Config;
use crate::core::time::MonotonicClock;
use crate::net::server::PeerServer;
use crate::ops::observability::{ReadinessStatus, RegistryMetrics};
use crate::registry::delta::ChangeLogConfig;
use crate::registry::store::{LeaseDefaults, LeaseStore, StoreConfig};
use crate::registry::sweeper::{EvictionSweeper, SweepConfig};
use crate::replication::peer::BackoffPolicy;
use crate::replication::replicator::{ReplicationConfig, Replicator};
use crate::replication::transport::PeerTransport;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Component health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentHealth {
    /// Component is starting.
    Starting,
    /// Component is healthy and operational.
    Healthy,
    /// Component is degraded but functional.
    Degraded,
    /// Component has stopped.
    Stopped,
}

/// Health aggregated from all components.
#[derive(Debug, Clone)]
pub struct RuntimeHealth {
    /// Lease store health.
    pub store: ComponentHealth,
    /// Replication layer health.
    pub replication: ComponentHealth,
    /// Expiry sweeper health.
    pub sweeper: ComponentHealth,
    /// Peer listener health.
    pub listener: ComponentHealth,
}

impl Default for RuntimeHealth {
    fn default() -> Self {
        Self {
            store: ComponentHealth::Starting,
            replication: ComponentHealth::Starting,
            sweeper: ComponentHealth::Starting,
            listener: ComponentHealth::Starting,
        }
    }
}

impl RuntimeHealth {
    /// Check if the runtime is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        matches!(
            (self.store, self.sweeper, self.listener),
            (
                ComponentHealth::Healthy,
                ComponentHealth::Healthy,
                ComponentHealth::Healthy
            )
        ) && matches!(
            self.replication,
            ComponentHealth::Healthy | ComponentHealth::Degraded
        )
    }
}

/// Registry runtime holding all component handles.
pub struct Runtime {
    config: Arc<Config>,
    store: Arc<LeaseStore>,
    metrics: Arc<RegistryMetrics>,
    transport: Arc<dyn PeerTransport>,
    replicator: Option<Replicator>,
    health: RuntimeHealth,
    running: Arc<AtomicBool>,
    synced: bool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    sweeper_handle: Option<JoinHandle<()>>,
    listener_handle: Option<JoinHandle<()>>,
    listener_addr: Option<SocketAddr>,
}

impl Runtime {
    /// Create a runtime with the TCP peer transport.
    pub fn new(config: Config) -> Result<Self> {
        let transport = Arc::new(crate::net::client::TcpPeerTransport::new(
            config.node.id.clone(),
            Duration::from_millis(config.replication.request_timeout_ms),
        ));
        Self::with_transport(config, transport)
    }

    /// Create a runtime with an injected peer transport (tests, embedded
    /// multi-node setups).
    pub fn with_transport(config: Config, transport: Arc<dyn PeerTransport>) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        let metrics = Arc::new(RegistryMetrics::new());
        let store_config = StoreConfig {
            shard_count: 16,
            lease: LeaseDefaults {
                renewal_interval_secs: config.lease.renewal_interval_secs,
                duration_secs: config.lease.duration_secs,
            },
            changelog: ChangeLogConfig {
                retention: config.delta.retention,
                retention_secs: config.delta.retention_secs,
            },
        };
        let store = Arc::new(LeaseStore::new(
            store_config,
            config.node.id.clone(),
            Arc::new(MonotonicClock::new()),
            metrics.clone(),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            config: Arc::new(config),
            store,
            metrics,
            transport,
            replicator: None,
            health: RuntimeHealth::default(),
            running: Arc::new(AtomicBool::new(false)),
            synced: false,
            shutdown_tx,
            shutdown_rx,
            sweeper_handle: None,
            listener_handle: None,
            listener_addr: None,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Client API over this runtime's store.
    pub fn api(&self) -> RegistryApi {
        RegistryApi::new(self.store.clone())
    }

    /// The underlying lease store.
    pub fn store(&self) -> &Arc<LeaseStore> {
        &self.store
    }

    /// Shared counters.
    pub fn metrics(&self) -> &Arc<RegistryMetrics> {
        &self.metrics
    }

    /// Current health status.
    pub fn health(&self) -> &RuntimeHealth {
        &self.health
    }

    /// Bound peer listener address, once started.
    pub fn listener_addr(&self) -> Option<SocketAddr> {
        self.listener_addr
    }

    /// Check if the runtime is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Readiness snapshot for the status surface.
    pub fn readiness(&self) -> ReadinessStatus {
        ReadinessStatus {
            ready: self.health.is_ready(),
            instances: self.store.instance_count(),
            services: self.store.service_count(),
            synced: self.synced,
            sweeper_running: self.sweeper_handle.is_some(),
            listener_running: self.listener_handle.is_some(),
        }
    }

    /// Start all components.
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!(node = %self.config.node.id, "starting registry runtime");

        self.health.store = ComponentHealth::Healthy;

        self.start_replication().await;
        self.start_sweeper();
        self.start_listener().await?;

        self.running.store(true, Ordering::Release);
        tracing::info!(
            node = %self.config.node.id,
            peers = self.config.node.peers.len(),
            "registry runtime started"
        );
        Ok(())
    }

    async fn start_replication(&mut self) {
        let replication = &self.config.replication;
        let replication_config = ReplicationConfig {
            channel_capacity: replication.channel_capacity,
            batch_max: replication.batch_max,
            request_timeout_ms: replication.request_timeout_ms,
            backoff: BackoffPolicy {
                base_ms: replication.backoff_base_ms,
                max_ms: replication.backoff_max_ms,
            },
            sync_on_start: replication.sync_on_start,
        };
        let mut replicator = Replicator::new(
            replication_config,
            self.config.node.peers.clone(),
            self.transport.clone(),
            self.metrics.clone(),
        );

        // Pull a snapshot before the store starts emitting local events,
        // so a joining node never serves an empty registry to a full
        // cluster.
        if replication.sync_on_start && !self.config.node.peers.is_empty() {
            self.synced = replicator.sync_from_peers(&self.store).await.is_some();
        } else {
            self.synced = true;
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.store.set_event_sink(events_tx);
        replicator.start(events_rx, self.shutdown_rx.clone());

        self.health.replication = if self.synced {
            ComponentHealth::Healthy
        } else {
            ComponentHealth::Degraded
        };
        self.replicator = Some(replicator);
        tracing::info!(synced = self.synced, "replication layer started");
    }

    fn start_sweeper(&mut self) {
        let sweeper = EvictionSweeper::new(
            self.store.clone(),
            SweepConfig {
                interval_secs: self.config.sweep.interval_secs,
                guard_fraction: self.config.sweep.guard_fraction,
            },
            self.metrics.clone(),
        );
        self.sweeper_handle = Some(sweeper.spawn(self.shutdown_rx.clone()));
        self.health.sweeper = ComponentHealth::Healthy;
        tracing::info!(
            interval_secs = self.config.sweep.interval_secs,
            "expiry sweeper started"
        );
    }

    async fn start_listener(&mut self) -> Result<()> {
        let bind = self.config.bind_addr()?;
        let server = PeerServer::new(self.store.clone());
        let (addr, handle) = server
            .start(bind, self.shutdown_rx.clone())
            .await
            .with_context(|| format!("failed to bind peer listener on {bind}"))?;
        self.listener_addr = Some(addr);
        self.listener_handle = Some(handle);
        self.health.listener = ComponentHealth::Healthy;
        Ok(())
    }

    /// Stop all components and wait for their tasks.
    pub async fn shutdown(&mut self) {
        tracing::info!(node = %self.config.node.id, "shutting down registry runtime");
        let _ = self.shutdown_tx.send(true);

        if let Some(handle) = self.listener_handle.take() {
            let _ = handle.await;
        }
        self.health.listener = ComponentHealth::Stopped;

        if let Some(handle) = self.sweeper_handle.take() {
            let _ = handle.await;
        }
        self.health.sweeper = ComponentHealth::Stopped;

        if let Some(mut replicator) = self.replicator.take() {
            replicator.shutdown().await;
        }
        self.health.replication = ComponentHealth::Stopped;
        self.health.store = ComponentHealth::Stopped;

        self.running.store(false, Ordering::Release);
        tracing::info!("registry runtime stopped");
    }

    /// Start, wait for Ctrl-C, shut down.
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;
        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        self.shutdown().await;
        Ok(())
    }
}
