//! Tests for the lease registry lifecycle.

mod common;

use beacon::ops::observability::RegistryMetrics;
use beacon::registry::delta::ChangeKind;
use beacon::registry::instance::InstanceStatus;
use beacon::registry::sweeper::{EvictionSweeper, SweepConfig};
use std::sync::Arc;

// ============================================================================
// Lease Lifecycle Tests
// ============================================================================

#[test]
fn register_renew_cancel_lifecycle() {
    let (_clock, store) = common::manual_store("node-a");

    let info = store.register(common::registration("orders", "i-1"));
    assert_eq!(info.status, InstanceStatus::Starting);
    assert_eq!(info.endpoint(), "10.0.0.1:8080");
    assert_eq!(store.instance_count(), 1);

    assert!(store.renew("orders", "i-1"));
    assert!(store.set_status("orders", "i-1", InstanceStatus::Up));
    assert_eq!(
        store.get("orders", "i-1").unwrap().status,
        InstanceStatus::Up
    );

    assert!(store.cancel("orders", "i-1"));
    assert!(store.get("orders", "i-1").is_none());
    assert!(store.is_empty());
}

#[test]
fn registration_overrides_lease_terms() {
    let (_clock, store) = common::manual_store("node-a");

    let mut reg = common::registration("orders", "i-1");
    reg.renewal_interval_secs = Some(5);
    reg.duration_secs = Some(15);
    let info = store.register(reg);

    assert_eq!(info.lease.renewal_interval_secs, 5);
    assert_eq!(info.lease.duration_secs, 15);
}

#[test]
fn re_registration_starts_fresh_lifecycle() {
    let (clock, store) = common::manual_store("node-a");

    store.register(common::registration("orders", "i-1"));
    clock.advance_ms(200_000);

    // Well past expiry, but a new registration resets the lease.
    store.register(common::registration("orders", "i-1"));
    assert!(store.expired_candidates().is_empty());
    assert_eq!(store.instance_count(), 1);
}

#[test]
fn fetch_all_groups_and_orders_instances() {
    let (_clock, store) = common::manual_store("node-a");

    store.register(common::registration("billing", "i-2"));
    store.register(common::registration("orders", "i-9"));
    store.register(common::registration("orders", "i-1"));

    let all = store.fetch_all();
    let services: Vec<&String> = all.keys().collect();
    assert_eq!(services, ["billing", "orders"]);

    let orders: Vec<&str> = all["orders"]
        .iter()
        .map(|info| info.instance_id.as_str())
        .collect();
    assert_eq!(orders, ["i-1", "i-9"]);
}

// ============================================================================
// Delta Fetch Tests
// ============================================================================

#[test]
fn delta_tracks_visible_changes_only() {
    let (_clock, store) = common::manual_store("node-a");

    store.register(common::registration("orders", "i-1"));
    let delta = store.fetch_delta(0);
    assert_eq!(delta.changes.len(), 1);
    assert_eq!(delta.changes[0].kind, ChangeKind::Registered);
    let cursor = delta.cursor;

    // Renewals refresh the lease but are not visible changes.
    assert!(store.renew("orders", "i-1"));
    let delta = store.fetch_delta(cursor);
    assert!(delta.changes.is_empty());
    assert!(!delta.reset);

    assert!(store.cancel("orders", "i-1"));
    let delta = store.fetch_delta(cursor);
    assert_eq!(delta.changes.len(), 1);
    assert_eq!(delta.changes[0].kind, ChangeKind::Cancelled);
    assert!(delta.changes[0].instance.is_none());
}

#[test]
fn delta_from_current_cursor_is_empty() {
    let (_clock, store) = common::manual_store("node-a");
    store.register(common::registration("orders", "i-1"));

    let cursor = store.fetch_delta(0).cursor;
    let delta = store.fetch_delta(cursor);
    assert!(delta.changes.is_empty());
    assert_eq!(delta.cursor, cursor);
}

// ============================================================================
// Expiry and Self-Preservation Tests
// ============================================================================

#[test]
fn eviction_appears_in_delta_as_evicted() {
    let (clock, store) = common::manual_store("node-a");
    let metrics = Arc::new(RegistryMetrics::new());
    let sweeper = EvictionSweeper::new(store.clone(), SweepConfig::default(), metrics);

    store.register(common::registration("orders", "i-1"));
    let cursor = store.fetch_delta(0).cursor;

    clock.advance_ms(91_000);
    let outcome = sweeper.sweep();
    assert_eq!(outcome.evicted, 1);

    let delta = store.fetch_delta(cursor);
    assert_eq!(delta.changes.len(), 1);
    assert_eq!(delta.changes[0].kind, ChangeKind::Evicted);
}

#[test]
fn suppressed_sweep_keeps_every_instance() {
    let (clock, store) = common::manual_store("node-a");
    let metrics = Arc::new(RegistryMetrics::new());
    let sweeper = EvictionSweeper::new(
        store.clone(),
        SweepConfig {
            interval_secs: 5,
            guard_fraction: 0.15,
        },
        metrics.clone(),
    );

    for n in 0..20 {
        store.register(common::registration("orders", &format!("i-{n}")));
    }
    clock.advance_ms(120_000);

    let outcome = sweeper.sweep();
    assert!(outcome.suppressed);
    assert_eq!(store.instance_count(), 20);
    assert_eq!(metrics.snapshot().sweeps_suppressed, 1);

    // Partial renewal ends the partition story; the next sweep evicts
    // only what stayed silent.
    for n in 0..18 {
        assert!(store.renew("orders", &format!("i-{n}")));
    }
    let outcome = sweeper.sweep();
    assert!(!outcome.suppressed);
    assert_eq!(outcome.evicted, 2);
    assert_eq!(store.instance_count(), 18);
}
