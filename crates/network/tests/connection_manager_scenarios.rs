// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Black-box scenario for the Connection Manager's retry policy (spec §8,
//! scenario 3): a seed address that never accepts a connection keeps being
//! retried rather than being abandoned.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use neo_config::NetworkConfig;
use neo_network::{AddressState, ConnectionHost, ConnectionManager, Direction, SeedListSource};
use tokio::net::TcpStream;

struct NoopHost;

#[async_trait]
impl ConnectionHost for NoopHost {
    async fn on_connection(&self, _stream: TcpStream, _address: SocketAddr, _direction: Direction) {}
}

/// Binds a listener and immediately drops it, so its address refuses every
/// subsequent connection attempt deterministically.
async fn unreachable_address() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Seed addresses are always permanent requests, so a seed that never
/// accepts a connection must keep retrying forever rather than ever being
/// marked `Bad`.
#[tokio::test]
async fn permanent_seed_keeps_retrying_after_repeated_dial_failures() {
    let dead_address = unreachable_address().await;

    let config = NetworkConfig {
        listen_address: "127.0.0.1:0".to_string(),
        seed_list: vec![dead_address.to_string()],
        target_outbound_peers: 0,
        dial_timeout: Duration::from_millis(100),
        retry_base_delay: Duration::from_millis(20),
        max_retries: 3,
        ..NetworkConfig::default()
    };

    let address_source = Arc::new(SeedListSource::from_config(&config));
    let manager = ConnectionManager::start(config, address_source, Arc::new(NoopHost))
        .await
        .expect("connection manager should start even with an unreachable seed");

    // Give the manager well past `max_retries` worth of backoff cycles to
    // run; a permanent request must never transition to Bad.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(manager.state_of(&dead_address), Some(AddressState::Pending));
    assert_eq!(manager.connected_count(), 0);
}
