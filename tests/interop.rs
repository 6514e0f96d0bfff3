//! End-to-end tests: two full runtimes gossiping over real TCP.

mod common;

use beacon::core::config::Config;
use beacon::core::runtime::Runtime;
use common::registration;
use std::time::Duration;

fn node_config(id: &str, peers: Vec<String>) -> Config {
    Config::from_toml(&format!(
        r#"
[node]
id = "{id}"
bind = "127.0.0.1:0"
peers = [{peer_list}]

[replication]
request_timeout_ms = 500
backoff_base_ms = 50
backoff_max_ms = 200
"#,
        peer_list = peers
            .iter()
            .map(|p| format!("\"{p}\""))
            .collect::<Vec<_>>()
            .join(", "),
    ))
    .expect("valid test config")
}

async fn wait_for(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn two_nodes_converge_over_tcp() {
    let mut node_a = Runtime::new(node_config("beacon-a", vec![])).unwrap();
    node_a.start().await.unwrap();
    let addr_a = node_a.listener_addr().unwrap().to_string();

    // Seed the cluster before the second node joins.
    node_a.api().register(registration("orders", "i-1")).unwrap();

    let mut node_b = Runtime::new(node_config("beacon-b", vec![addr_a])).unwrap();
    node_b.start().await.unwrap();

    // Startup sync: node-b pulled node-a's registry before serving.
    assert_eq!(node_b.store().instance_count(), 1);
    assert!(node_b.readiness().ready);
    assert!(node_b.readiness().synced);

    // Writes on node-b gossip back to node-a. The peer set is one-way in
    // this test, which is enough to prove the path over real sockets.
    node_b
        .api()
        .register(registration("billing", "i-7"))
        .unwrap();
    let store_a = node_a.store().clone();
    wait_for(move || store_a.get("billing", "i-7").is_some()).await;

    node_b.api().cancel("billing", "i-7");
    let store_a = node_a.store().clone();
    wait_for(move || store_a.get("billing", "i-7").is_none()).await;

    node_b.shutdown().await;
    node_a.shutdown().await;
    assert!(!node_a.is_running());
}

#[tokio::test]
async fn standalone_node_is_ready_without_peers() {
    let mut node = Runtime::new(node_config("beacon-solo", vec![])).unwrap();
    node.start().await.unwrap();

    let readiness = node.readiness();
    assert!(readiness.ready);
    assert!(readiness.synced);
    assert!(readiness.sweeper_running);
    assert!(readiness.listener_running);

    node.api().register(registration("orders", "i-1")).unwrap();
    assert_eq!(node.readiness().instances, 1);
    assert_eq!(node.readiness().services, 1);

    node.shutdown().await;
}

#[tokio::test]
async fn node_starts_empty_when_every_peer_is_down() {
    // Reserve a port, then free it so the peer address is dead.
    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_peer = probe.local_addr().unwrap().to_string();
    drop(probe);

    let mut node = Runtime::new(node_config("beacon-lonely", vec![dead_peer])).unwrap();
    node.start().await.unwrap();

    assert!(node.store().is_empty());
    // Not synced, but still serving: availability over freshness.
    assert!(node.readiness().ready);
    assert!(!node.readiness().synced);

    node.shutdown().await;
}
