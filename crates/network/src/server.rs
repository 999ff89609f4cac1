// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Single event loop coordinating peers, the Connection Manager, the Peer
//! Manager, and the Sync Manager (spec §4.7).

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use neo_config::{NetworkConfig, ProtocolConfig};
use neo_core::Ledger;
use neo_io::{BinaryWriter, MemoryReader};

use crate::connection_manager::{ConnectionHost, ConnectionManager};
use crate::messages::{Command, Message, NodeCapability, VersionPayload};
use crate::peer::{self, Direction, PeerHandle, PeerHost, Priority};
use crate::peer_manager::PeerManager;
use crate::sync::SyncManager;

/// Top-level coordinator: owns the Ledger handle, the live peer set, and
/// dispatches inbound messages to the right collaborator.
pub struct Server<L: Ledger> {
    protocol: ProtocolConfig,
    network: NetworkConfig,
    local_version_template: VersionPayload,
    peers: Arc<DashMap<SocketAddr, PeerHandle>>,
    peer_manager: Arc<PeerManager>,
    sync: Arc<SyncManager<L>>,
    ledger: Arc<L>,
}

impl<L: Ledger> Server<L> {
    /// Builds the Server and its collaborators; does not start networking
    /// yet, see [`Self::run`].
    pub fn new(protocol: ProtocolConfig, network: NetworkConfig, ledger: Arc<L>, user_agent: String) -> Arc<Self> {
        let peer_manager = Arc::new(PeerManager::new(network.clone()));
        let sync = Arc::new(SyncManager::new(ledger.clone(), peer_manager.clone(), network.clone()));
        let local_version_template = VersionPayload {
            magic: protocol.magic,
            version: 0,
            timestamp: 0,
            port: network
                .listen_address
                .parse::<SocketAddr>()
                .map(|a| a.port())
                .unwrap_or(0),
            nonce: rand::random(),
            user_agent,
            start_height: ledger.block_height(),
            relay: true,
            capabilities: vec![NodeCapability::FullNode {
                start_height: ledger.block_height(),
            }],
        };

        Arc::new(Self {
            protocol,
            network,
            local_version_template,
            peers: Arc::new(DashMap::new()),
            peer_manager,
            sync,
            ledger,
        })
    }

    /// Starts the Connection Manager and begins accepting/dialing peers.
    /// Runs until the process is torn down; the returned `ConnectionManager`
    /// is kept alive by the caller for as long as the server should run.
    pub async fn run(self: &Arc<Self>) -> Result<ConnectionManager, crate::error::NetworkError> {
        let address_source = Arc::new(crate::connection_manager::SeedListSource::from_config(&self.network));
        ConnectionManager::start(self.network.clone(), address_source, self.clone() as Arc<dyn ConnectionHost>).await
    }

    /// Number of currently handshaked peers.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Exposes the sync manager's steady-state timer hook without requiring
    /// callers to name the `L` type parameter themselves.
    pub fn sync_tick_handle(&self) -> Arc<dyn crate::sync::SyncTick>
    where
        L: 'static,
    {
        self.sync.clone() as Arc<dyn crate::sync::SyncTick>
    }

    async fn dispatch(&self, address: SocketAddr, message: Message) {
        self.peer_manager.message_received(address, message.command);
        match message.command {
            Command::Addr | Command::GetAddr => {
                self.handle_addr_exchange(address, message).await;
            }
            Command::Ping => {
                self.handle_ping(address, message).await;
            }
            Command::Pong => {
                // Keepalive bookkeeping already happened inside the peer task.
            }
            Command::Inv => {
                self.handle_inv(address, message).await;
            }
            Command::GetData => {
                info!(%address, "GetData received, deferring to ledger-backed handler");
            }
            Command::Headers => {
                self.handle_headers(address, message).await;
            }
            Command::Block => {
                self.handle_block(address, message).await;
            }
            _ => {
                info!(%address, command = ?message.command, "unhandled application message");
            }
        }
    }

    async fn handle_addr_exchange(&self, address: SocketAddr, message: Message) {
        match message.command {
            Command::GetAddr => {
                if let Some(peer) = self.peers.get(&address) {
                    let mut writer = BinaryWriter::new();
                    writer.write_var_int(0);
                    let _ = peer.send(Priority::P2p, Message::create(Command::Addr, writer.into_bytes())).await;
                }
            }
            Command::Addr => {
                info!(%address, "received Addr reply");
            }
            _ => unreachable!(),
        }
    }

    async fn handle_ping(&self, address: SocketAddr, message: Message) {
        let Some(peer) = self.peers.get(&address) else { return };
        let height = {
            let mut reader = MemoryReader::new(&message.payload);
            reader.read_u32().unwrap_or(0)
        };
        self.peer_manager.message_received(address, Command::Ping);
        let mut writer = BinaryWriter::new();
        writer.write_u32(height);
        let _ = peer.send(Priority::High, Message::create(Command::Pong, writer.into_bytes())).await;
    }

    async fn handle_inv(&self, address: SocketAddr, _message: Message) {
        info!(%address, "Inv received, relay cache not modeled in this core");
    }

    async fn handle_headers(&self, address: SocketAddr, message: Message) {
        // Individual header decoding is a concrete-chain-type concern owned
        // by the Ledger implementation; this core reads the wire-level
        // framing this crate defines for a Headers batch: a var-int count
        // followed by that many 32-byte hashes, the last of which anchors
        // the next `GetHeaders` continuation.
        let mut reader = MemoryReader::new(&message.payload);
        let count = reader.read_var_int(self.network.max_headers_per_batch as u64).unwrap_or(0) as usize;
        let mut last_hash = neo_core::UInt256::zero();
        for _ in 0..count {
            match reader.read_bytes(neo_core::UInt256::SIZE) {
                Ok(bytes) => match neo_core::UInt256::from_slice(&bytes) {
                    Ok(hash) => last_hash = hash,
                    Err(error) => {
                        warn!(%address, %error, "malformed header hash in Headers batch");
                        break;
                    }
                },
                Err(error) => {
                    warn!(%address, %error, "truncated Headers batch");
                    break;
                }
            }
        }
        self.sync.on_headers(count, last_hash).await;
        debug_assert!(count <= self.network.max_headers_per_batch as usize);
        self.peer_manager.message_received(address, Command::GetHeaders);
    }

    async fn handle_block(&self, address: SocketAddr, message: Message) {
        // The network core only understands the wire envelope it defines
        // for a Block reply: `index(4) | hash(32) | body`. The body itself
        // is a concrete-chain-type concern owned by the Ledger.
        let mut reader = MemoryReader::new(&message.payload);
        let index = match reader.read_u32() {
            Ok(index) => index,
            Err(error) => {
                warn!(%address, %error, "malformed Block payload");
                return;
            }
        };
        let hash = match reader
            .read_bytes(neo_core::UInt256::SIZE)
            .map_err(|e| e.to_string())
            .and_then(|bytes| neo_core::UInt256::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(hash) => hash,
            Err(reason) => {
                warn!(%address, reason, "malformed Block payload");
                return;
            }
        };
        let body = reader.read_to_end().unwrap_or_default();
        let block = match self.ledger.decode_block(&body) {
            Ok(block) => block,
            Err(error) => {
                warn!(%address, %error, "ledger rejected Block payload");
                return;
            }
        };
        let peer_handle = self.peers.get(&address).map(|entry| entry.clone());
        let peer_height = match peer_handle {
            Some(peer) => peer.last_known_height().await,
            None => 0,
        };
        self.sync.on_block(address, index, hash, block, peer_height).await;
    }
}

#[async_trait]
impl<L: Ledger> ConnectionHost for Server<L> {
    async fn on_connection(&self, stream: TcpStream, address: SocketAddr, direction: Direction) {
        let mut version = self.local_version_template.clone();
        version.start_height = self.ledger.block_height();
        info!(%address, ?direction, "new connection, starting handshake");
        peer::spawn(
            stream,
            address,
            direction,
            self.protocol,
            version,
            self.network.ping_interval,
            self.network.ping_timeout,
            self.self_as_host(),
        )
        .await;
    }
}

impl<L: Ledger> Server<L> {
    fn self_as_host(self: &Arc<Self>) -> Arc<dyn PeerHost>
    where
        L: 'static,
    {
        self.clone() as Arc<dyn PeerHost>
    }
}

#[async_trait]
impl<L: Ledger> PeerHost for Server<L> {
    async fn on_handshaked(&self, peer: PeerHandle) {
        info!(address = %peer.address, "peer handshaked");
        self.peers.insert(peer.address, peer.clone());
        self.peer_manager.add_peer(peer.clone());
        self.sync.on_connection(peer.address).await;
    }

    async fn on_message(&self, peer: SocketAddr, message: Message) {
        self.dispatch(peer, message).await;
    }

    async fn on_disconnect(&self, peer: SocketAddr) {
        warn!(address = %peer, "peer disconnected");
        self.peers.remove(&peer);
        let orphaned = self.peer_manager.remove_peer(peer);
        if !orphaned.is_empty() {
            debug!(address = %peer, count = orphaned.len(), "reclaiming in-flight block requests");
            self.peer_manager.reclaim(orphaned);
        }
    }
}

/// Spawns the steady-state block timer that periodically nudges the sync
/// manager in NORMAL mode (spec §4.6).
pub fn spawn_block_timer(tick: Arc<dyn crate::sync::SyncTick>, period: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            tick.tick().await;
        }
    });
}

/// Unregistration channel the event loop could additionally consume if a
/// caller wants to observe disconnects outside the `PeerHost` callback.
pub type DisconnectReceiver = mpsc::Receiver<SocketAddr>;

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{CoreResult, UInt160, UInt256, Witness};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingLedger {
        applied: StdMutex<Vec<u32>>,
    }

    #[async_trait]
    impl Ledger for RecordingLedger {
        type Block = u32;
        type Header = u32;

        fn block_height(&self) -> u32 {
            0
        }
        fn header_height(&self) -> u32 {
            0
        }
        async fn get_header_hash(&self, _index: u32) -> Option<UInt256> {
            None
        }
        async fn get_block(&self, _hash: UInt256) -> Option<Self::Block> {
            None
        }
        async fn get_header(&self, _hash: UInt256) -> Option<Self::Header> {
            None
        }
        async fn add_block(&self, block: Self::Block) -> CoreResult<()> {
            self.applied.lock().unwrap().push(block);
            Ok(())
        }
        async fn add_headers(&self, _headers: Vec<Self::Header>) -> CoreResult<()> {
            Ok(())
        }
        fn decode_block(&self, body: &[u8]) -> CoreResult<Self::Block> {
            Ok(body.first().copied().unwrap_or(0) as u32)
        }
        async fn verify_witness(
            &self,
            _script_hash: UInt160,
            _hashable: &[u8],
            _witness: &Witness,
            _gas_limit: i64,
        ) -> CoreResult<i64> {
            Ok(0)
        }
        fn milliseconds_per_block(&self) -> u32 {
            15_000
        }
    }

    fn test_server() -> Arc<Server<RecordingLedger>> {
        Server::new(
            ProtocolConfig::private(0x0102_0304, 15_000),
            NetworkConfig {
                listen_address: "127.0.0.1:0".to_string(),
                ..NetworkConfig::default()
            },
            Arc::new(RecordingLedger::default()),
            "/test/".to_string(),
        )
    }

    #[tokio::test]
    async fn handle_headers_extracts_the_last_hash_and_advances_mode() {
        let server = test_server();
        let hash = UInt256::from_slice(&[7u8; 32]).unwrap();
        let mut writer = BinaryWriter::new();
        writer.write_var_int(1);
        writer.write_bytes(hash.as_bytes());
        let message = Message::create(Command::Headers, writer.into_bytes());

        server.handle_headers("127.0.0.1:1".parse().unwrap(), message).await;
        assert_eq!(server.sync.mode(), crate::sync::SyncMode::Block);
    }

    #[tokio::test]
    async fn handle_block_decodes_the_body_and_advances_the_sync_manager() {
        let server = test_server();
        let hash = UInt256::from_slice(&[9u8; 32]).unwrap();
        let mut writer = BinaryWriter::new();
        writer.write_u32(1);
        writer.write_bytes(hash.as_bytes());
        writer.write_u8(42);
        let message = Message::create(Command::Block, writer.into_bytes());

        server.handle_block("127.0.0.1:1".parse().unwrap(), message).await;
        assert_eq!(server.sync.next_block_index(), 2);
        assert_eq!(*server.ledger.applied.lock().unwrap(), vec![42]);
    }
}
