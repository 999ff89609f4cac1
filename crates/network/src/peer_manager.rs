// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Request routing across the connected peer set (spec §4.5): bounds
//! per-peer inflight work and defers overflow into a global pending cache.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{NetworkError, NetworkResult};
use crate::messages::{Command, Message};
use crate::peer::{PeerHandle, Priority};
use neo_core::UInt256;
use neo_config::NetworkConfig;
use neo_io::BinaryWriter;

/// Per-peer bookkeeping: inflight block requests (hash to index, so a
/// disconnect can re-enqueue them with the index the pending cache needs)
/// and outstanding non-block request flags (one bit per command kind that
/// expects a single reply).
struct PeerStats {
    handle: PeerHandle,
    inflight_blocks: Mutex<HashMap<UInt256, u32>>,
    outstanding: Mutex<HashSet<Command>>,
}

/// Routes block and header requests across live peers, bounding per-peer
/// concurrency and caching overflow until a peer frees up.
pub struct PeerManager {
    config: NetworkConfig,
    peers: DashMap<SocketAddr, Arc<PeerStats>>,
    pending_blocks: Mutex<VecDeque<(u32, UInt256)>>,
}

impl PeerManager {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            peers: DashMap::new(),
            pending_blocks: Mutex::new(VecDeque::new()),
        }
    }

    /// Registers a newly handshaked peer.
    pub fn add_peer(&self, handle: PeerHandle) {
        let address = handle.address;
        self.peers.insert(
            address,
            Arc::new(PeerStats {
                handle,
                inflight_blocks: Mutex::new(HashMap::new()),
                outstanding: Mutex::new(HashSet::new()),
            }),
        );
        debug!(%address, "peer manager registered peer");
    }

    /// Removes a peer, returning its still-outstanding block requests
    /// (index, hash) so the caller can re-route them via [`Self::reclaim`].
    pub fn remove_peer(&self, address: SocketAddr) -> Vec<(u32, UInt256)> {
        match self.peers.remove(&address) {
            Some((_, stats)) => stats
                .inflight_blocks
                .lock()
                .drain()
                .map(|(hash, index)| (index, hash))
                .collect(),
            None => {
                warn!(%address, "disconnecting unknown peer");
                Vec::new()
            }
        }
    }

    /// Re-enqueues block requests reclaimed from a disconnected peer,
    /// preserving ascending-index order; drops overflow past the pending
    /// cache's capacity with a warning instead of growing unbounded.
    pub fn reclaim(&self, requests: Vec<(u32, UInt256)>) {
        let mut pending = self.pending_blocks.lock();
        for (index, hash) in requests {
            if pending.len() >= self.config.pending_block_cache {
                warn!(index, "dropping reclaimed block request, pending cache full");
                continue;
            }
            let position = pending.iter().position(|(i, _)| *i > index).unwrap_or(pending.len());
            pending.insert(position, (index, hash));
        }
    }

    /// Routes a block request to the first peer with spare per-peer
    /// capacity, sending it a `GetBlockByIndex`; falls back to the global
    /// pending cache; errors if both are full.
    pub async fn request_block(&self, index: u32, hash: UInt256) -> NetworkResult<()> {
        let candidates: Vec<Arc<PeerStats>> = self.peers.iter().map(|entry| entry.value().clone()).collect();
        for stats in &candidates {
            let accepted = {
                let mut inflight = stats.inflight_blocks.lock();
                if inflight.len() < self.config.per_peer_block_cache {
                    inflight.insert(hash, index);
                    true
                } else {
                    false
                }
            };
            if accepted {
                let mut writer = BinaryWriter::new();
                writer.write_u32(index);
                writer.write_u32(1);
                let message = Message::create(Command::GetBlockByIndex, writer.into_bytes());
                if stats.handle.send(Priority::P2p, message).await.is_err() {
                    warn!(index, address = %stats.handle.address, "failed to send GetBlockByIndex, peer writer gone");
                }
                return Ok(());
            }
        }

        let mut pending = self.pending_blocks.lock();
        if pending.len() >= self.config.pending_block_cache {
            return Err(NetworkError::NoCapacity);
        }
        let position = pending.iter().position(|(i, _)| *i > index).unwrap_or(pending.len());
        pending.insert(position, (index, hash));
        Ok(())
    }

    /// Routes a headers request to any peer without an outstanding
    /// `GetHeaders` flag, sending it a `GetHeaders` with `hash_start`.
    pub async fn request_headers(&self, hash_start: UInt256) -> NetworkResult<()> {
        let candidates: Vec<Arc<PeerStats>> = self.peers.iter().map(|entry| entry.value().clone()).collect();
        for stats in &candidates {
            let accepted = {
                let mut outstanding = stats.outstanding.lock();
                if !outstanding.contains(&Command::GetHeaders) {
                    outstanding.insert(Command::GetHeaders);
                    true
                } else {
                    false
                }
            };
            if accepted {
                let mut writer = BinaryWriter::new();
                writer.write_bytes(hash_start.as_bytes());
                let message = Message::create(Command::GetHeaders, writer.into_bytes());
                if stats.handle.send(Priority::P2p, message).await.is_err() {
                    warn!(address = %stats.handle.address, "failed to send GetHeaders, peer writer gone");
                }
                return Ok(());
            }
        }
        Err(NetworkError::NoCapacity)
    }

    /// Clears the non-block outstanding flag for `command` on `address`.
    pub fn message_received(&self, address: SocketAddr, command: Command) {
        if let Some(stats) = self.peers.get(&address) {
            stats.outstanding.lock().remove(&command);
        }
    }

    /// Removes `hash` from `address`'s inflight set; if a pending block is
    /// waiting, routes its head to the now-free peer.
    pub async fn block_received(&self, address: SocketAddr, hash: UInt256) {
        let Some(stats) = self.peers.get(&address) else {
            warn!(%address, "block reply from unknown peer");
            return;
        };
        stats.inflight_blocks.lock().remove(&hash);
        drop(stats);

        let next = self.pending_blocks.lock().pop_front();
        if let Some((index, next_hash)) = next {
            if self.request_block(index, next_hash).await.is_err() {
                warn!(index, "failed to re-route drained pending block request");
            }
        }
    }

    /// Current number of registered peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn hash(byte: u8) -> UInt256 {
        UInt256::from_slice(&[byte; 32]).unwrap()
    }

    #[tokio::test]
    async fn pending_cache_orders_by_index_ascending() {
        let manager = PeerManager::new(NetworkConfig {
            per_peer_block_cache: 0,
            pending_block_cache: 10,
            ..NetworkConfig::default()
        });
        manager.request_block(5, hash(5)).await.unwrap();
        manager.request_block(2, hash(2)).await.unwrap();
        manager.request_block(8, hash(8)).await.unwrap();
        let pending = manager.pending_blocks.lock();
        let indices: Vec<u32> = pending.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2, 5, 8]);
    }

    #[test]
    fn disconnecting_unknown_peer_is_handled_defensively() {
        let manager = PeerManager::new(NetworkConfig::default());
        let removed = manager.remove_peer("127.0.0.1:1".parse().unwrap());
        assert!(removed.is_empty());
    }

    async fn handshaked_pair() -> (PeerHandle, PeerHandle) {
        use tokio::net::{TcpListener, TcpStream};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server_stream, server_addr) = listener.accept().await.unwrap();
        let client_stream = connect.await.unwrap();
        let client_addr = client_stream.local_addr().unwrap();

        let protocol = neo_config::ProtocolConfig::private(0x0a0b0c0d, 15_000);
        let version = |nonce: u32| crate::messages::VersionPayload {
            magic: protocol.magic,
            version: 0,
            timestamp: 0,
            port: 0,
            nonce,
            user_agent: "/test/".to_string(),
            start_height: 0,
            relay: true,
            capabilities: vec![],
        };

        let (server_tx, mut server_rx) = mpsc::unbounded_channel();
        let (client_tx, mut client_rx) = mpsc::unbounded_channel();

        struct CapturingHost(mpsc::UnboundedSender<PeerHandle>);
        #[async_trait::async_trait]
        impl crate::peer::PeerHost for CapturingHost {
            async fn on_handshaked(&self, peer: PeerHandle) {
                let _ = self.0.send(peer);
            }
            async fn on_message(&self, _peer: SocketAddr, _message: crate::messages::Message) {}
            async fn on_disconnect(&self, _peer: SocketAddr) {}
        }

        tokio::spawn(crate::peer::spawn(
            server_stream,
            server_addr,
            crate::peer::Direction::Inbound,
            protocol,
            version(1),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(60),
            Arc::new(CapturingHost(server_tx)),
        ));
        tokio::spawn(crate::peer::spawn(
            client_stream,
            client_addr,
            crate::peer::Direction::Outbound,
            protocol,
            version(2),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(60),
            Arc::new(CapturingHost(client_tx)),
        ));

        let server_side = server_rx.recv().await.unwrap();
        let client_side = client_rx.recv().await.unwrap();
        (server_side, client_side)
    }

    /// Wires a real loopback peer pair and hands back the server-facing
    /// handle (to register with a `PeerManager`) plus a channel that
    /// observes every application message the client side receives, so
    /// tests can assert on what was actually written to the wire.
    async fn handshaked_pair_observing_client_messages() -> (PeerHandle, mpsc::UnboundedReceiver<Message>) {
        use tokio::net::{TcpListener, TcpStream};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connect = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (server_stream, server_addr) = listener.accept().await.unwrap();
        let client_stream = connect.await.unwrap();
        let client_addr = client_stream.local_addr().unwrap();

        let protocol = neo_config::ProtocolConfig::private(0x0b0b0b0b, 15_000);
        let version = |nonce: u32| crate::messages::VersionPayload {
            magic: protocol.magic,
            version: 0,
            timestamp: 0,
            port: 0,
            nonce,
            user_agent: "/test/".to_string(),
            start_height: 0,
            relay: true,
            capabilities: vec![],
        };

        let (server_handshaked_tx, mut server_handshaked_rx) = mpsc::unbounded_channel();
        let (client_message_tx, client_message_rx) = mpsc::unbounded_channel();

        struct ServerHost(mpsc::UnboundedSender<PeerHandle>);
        #[async_trait::async_trait]
        impl crate::peer::PeerHost for ServerHost {
            async fn on_handshaked(&self, peer: PeerHandle) {
                let _ = self.0.send(peer);
            }
            async fn on_message(&self, _peer: SocketAddr, _message: Message) {}
            async fn on_disconnect(&self, _peer: SocketAddr) {}
        }
        struct ClientHost(mpsc::UnboundedSender<Message>);
        #[async_trait::async_trait]
        impl crate::peer::PeerHost for ClientHost {
            async fn on_handshaked(&self, _peer: PeerHandle) {}
            async fn on_message(&self, _peer: SocketAddr, message: Message) {
                let _ = self.0.send(message);
            }
            async fn on_disconnect(&self, _peer: SocketAddr) {}
        }

        tokio::spawn(crate::peer::spawn(
            server_stream,
            server_addr,
            crate::peer::Direction::Inbound,
            protocol,
            version(1),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(60),
            Arc::new(ServerHost(server_handshaked_tx)),
        ));
        tokio::spawn(crate::peer::spawn(
            client_stream,
            client_addr,
            crate::peer::Direction::Outbound,
            protocol,
            version(2),
            std::time::Duration::from_secs(30),
            std::time::Duration::from_secs(60),
            Arc::new(ClientHost(client_message_tx)),
        ));

        let server_side = server_handshaked_rx.recv().await.unwrap();
        (server_side, client_message_rx)
    }

    /// Confirms `request_block` doesn't just bookkeep: it actually puts a
    /// `GetBlockByIndex` on the wire to the peer it picked.
    #[tokio::test]
    async fn request_block_sends_get_block_by_index_over_the_wire() {
        let (server_side, mut client_messages) = handshaked_pair_observing_client_messages().await;
        let manager = PeerManager::new(NetworkConfig {
            per_peer_block_cache: 1,
            pending_block_cache: 10,
            ..NetworkConfig::default()
        });
        manager.add_peer(server_side);

        manager.request_block(7, hash(7)).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), client_messages.recv())
            .await
            .expect("client should receive the GetBlockByIndex")
            .expect("channel closed");
        assert_eq!(received.command, Command::GetBlockByIndex);
    }

    /// Confirms `request_headers` actually puts a `GetHeaders` on the wire.
    #[tokio::test]
    async fn request_headers_sends_get_headers_over_the_wire() {
        let (server_side, mut client_messages) = handshaked_pair_observing_client_messages().await;
        let manager = PeerManager::new(NetworkConfig::default());
        manager.add_peer(server_side);

        manager.request_headers(UInt256::zero()).await.unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(5), client_messages.recv())
            .await
            .expect("client should receive the GetHeaders")
            .expect("channel closed");
        assert_eq!(received.command, Command::GetHeaders);
    }

    /// Scenario 5 (peer-manager overflow): with 3 real peers at a per-peer
    /// block cache of 1, a 4th request overflows into the pending cache;
    /// acknowledging one block drains it onto the freed peer.
    #[tokio::test]
    async fn fourth_request_overflows_into_pending_cache_and_drains_on_ack() {
        let manager = PeerManager::new(NetworkConfig {
            per_peer_block_cache: 1,
            pending_block_cache: 10,
            ..NetworkConfig::default()
        });

        let mut local_handles = Vec::new();
        for _ in 0..3 {
            let (local, _remote) = handshaked_pair().await;
            local_handles.push(local);
        }
        for handle in &local_handles {
            manager.add_peer(handle.clone());
        }

        let h = |b: u8| hash(b);
        manager.request_block(1, h(1)).await.unwrap();
        manager.request_block(2, h(2)).await.unwrap();
        manager.request_block(3, h(3)).await.unwrap();
        assert!(manager.pending_blocks.lock().is_empty());
        for entry in manager.peers.iter() {
            assert_eq!(entry.value().inflight_blocks.lock().len(), 1);
        }

        manager.request_block(4, h(4)).await.unwrap();
        assert_eq!(manager.pending_blocks.lock().len(), 1);

        let freed_address = local_handles[0].address;
        manager.block_received(freed_address, h(1)).await;
        assert!(manager.pending_blocks.lock().is_empty());
        let freed_stats = manager.peers.get(&freed_address).unwrap();
        assert!(freed_stats.inflight_blocks.lock().contains_key(&h(4)));
    }
}
