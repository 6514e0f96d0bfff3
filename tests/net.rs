//! Tests for the peer wire protocol over real sockets.

mod common;

use beacon::net::client::TcpPeerTransport;
use beacon::net::server::PeerServer;
use beacon::registry::store::LeaseStore;
use beacon::replication::event::ReplicationEvent;
use beacon::replication::transport::{PeerTransport, TransportError};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

async fn start_server(store: Arc<LeaseStore>) -> (SocketAddr, watch::Sender<bool>, JoinHandle<()>) {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bind: SocketAddr = "127.0.0.1:0".parse().unwrap();
    let (addr, handle) = PeerServer::new(store)
        .start(bind, shutdown_rx)
        .await
        .expect("bind peer listener");
    (addr, shutdown_tx, handle)
}

fn transport() -> TcpPeerTransport {
    TcpPeerTransport::new("node-test", Duration::from_millis(500))
}

#[tokio::test]
async fn push_applies_events_on_the_remote_store() {
    let (_clock_a, node_a) = common::manual_store("node-a");
    let (_clock_b, node_b) = common::manual_store("node-b");
    let (addr, shutdown, handle) = start_server(node_b.clone()).await;

    let info = node_a.register(common::registration("orders", "i-1"));
    let events = vec![ReplicationEvent::register(info, "node-a")];

    transport()
        .push_events(&addr.to_string(), &events)
        .await
        .expect("push");

    assert_eq!(node_b.instance_count(), 1);
    assert_eq!(
        node_b.get("orders", "i-1").unwrap().endpoint(),
        "10.0.0.1:8080"
    );

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn pull_snapshot_returns_remote_registry() {
    let (_clock, node) = common::manual_store("node-a");
    for n in 0..3 {
        node.register(common::registration("orders", &format!("i-{n}")));
    }
    let (addr, shutdown, handle) = start_server(node.clone()).await;

    let instances = transport()
        .pull_snapshot(&addr.to_string())
        .await
        .expect("pull snapshot");

    assert_eq!(instances.len(), 3);
    let ids: Vec<&str> = instances
        .iter()
        .map(|info| info.instance_id.as_str())
        .collect();
    assert_eq!(ids, ["i-0", "i-1", "i-2"]);

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn duplicate_push_is_idempotent() {
    let (_clock_a, node_a) = common::manual_store("node-a");
    let (_clock_b, node_b) = common::manual_store("node-b");
    let (addr, shutdown, handle) = start_server(node_b.clone()).await;

    let info = node_a.register(common::registration("orders", "i-1"));
    let events = vec![ReplicationEvent::register(info, "node-a")];

    let transport = transport();
    let peer = addr.to_string();
    transport.push_events(&peer, &events).await.expect("push");
    transport
        .push_events(&peer, &events)
        .await
        .expect("duplicate push");

    assert_eq!(node_b.instance_count(), 1);

    shutdown.send(true).unwrap();
    handle.await.unwrap();
}

#[tokio::test]
async fn connecting_to_a_dead_peer_fails_fast() {
    // Bind then drop a socket so the port is known-dead.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = transport().pull_snapshot(&addr.to_string()).await;
    assert!(matches!(
        result,
        Err(TransportError::Io { .. }) | Err(TransportError::Timeout { .. })
    ));
}
