//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use beacon::core::time::{Clock, ManualClock};
use beacon::ops::observability::RegistryMetrics;
use beacon::registry::store::{LeaseStore, Registration, StoreConfig};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Create a store with the default configuration and the given clock.
pub fn store_with_clock(node_id: &str, clock: Arc<dyn Clock>) -> Arc<LeaseStore> {
    Arc::new(LeaseStore::new(
        StoreConfig::default(),
        node_id,
        clock,
        Arc::new(RegistryMetrics::new()),
    ))
}

/// Create a store driven by a fresh manual clock.
pub fn manual_store(node_id: &str) -> (Arc<ManualClock>, Arc<LeaseStore>) {
    let clock = Arc::new(ManualClock::new());
    let store = store_with_clock(node_id, clock.clone());
    (clock, store)
}

/// A valid registration for `service`/`instance_id` with default leases.
pub fn registration(service: &str, instance_id: &str) -> Registration {
    Registration {
        service: service.to_string(),
        instance_id: instance_id.to_string(),
        address: "10.0.0.1".to_string(),
        port: 8080,
        health_check_url: None,
        status: None,
        metadata: HashMap::new(),
        renewal_interval_secs: None,
        duration_secs: None,
    }
}

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    let config_content = r#"
[node]
id = "beacon-test"
bind = "127.0.0.1:0"
"#;

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(config_content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Create a configuration file with the given content.
pub fn create_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}
