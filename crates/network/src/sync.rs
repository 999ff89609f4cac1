// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Headers-first synchronisation state machine (spec §4.6): drives the
//! local chain forward through HEADERS, BLOCK, and a steady-state NORMAL
//! mode.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use neo_core::{Ledger, UInt256};
use neo_config::NetworkConfig;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::peer_manager::PeerManager;

/// Which phase of synchronisation the manager is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Headers,
    Block,
    Normal,
}

/// A future block cached because it arrived before `next_block_index`
/// caught up to it.
#[derive(Debug, Clone)]
struct PooledBlock<B> {
    index: u32,
    block: B,
}

/// Drives `Ledger` forward using the mode table from spec §4.6.
pub struct SyncManager<L: Ledger> {
    ledger: Arc<L>,
    peers: Arc<PeerManager>,
    config: NetworkConfig,
    state: Mutex<State<L::Block>>,
}

struct State<B> {
    mode: SyncMode,
    header_hash: UInt256,
    next_block_index: u32,
    block_pool: VecDeque<PooledBlock<B>>,
}

impl<L: Ledger> SyncManager<L> {
    pub fn new(ledger: Arc<L>, peers: Arc<PeerManager>, config: NetworkConfig) -> Self {
        let next_block_index = ledger.block_height() + 1;
        Self {
            ledger,
            peers,
            config,
            state: Mutex::new(State {
                mode: SyncMode::Headers,
                header_hash: UInt256::zero(),
                next_block_index,
                block_pool: VecDeque::new(),
            }),
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.state.lock().mode
    }

    pub fn next_block_index(&self) -> u32 {
        self.state.lock().next_block_index
    }

    /// A post-handshake peer was registered; kicks off headers sync if we
    /// are starting cold.
    pub async fn on_connection(&self, address: SocketAddr) {
        debug!(%address, "sync manager notified of new peer");
        self.request_more_headers().await;
    }

    /// Handles a batch of headers (HEADERS/NORMAL mode rows). `last_hash` is
    /// the final accepted header's hash, used to continue a HEADERS batch.
    pub async fn on_headers(&self, count: usize, last_hash: UInt256) {
        let mode = {
            let mut state = self.state.lock();
            state.header_hash = last_hash;
            state.mode
        };

        match mode {
            SyncMode::Headers => {
                if count >= self.config.max_headers_per_batch as usize {
                    self.request_more_headers().await;
                } else {
                    self.state.lock().mode = SyncMode::Block;
                    self.request_next_block().await;
                }
            }
            SyncMode::Normal => {
                if count >= self.config.max_headers_per_batch as usize {
                    self.state.lock().mode = SyncMode::Headers;
                    self.request_more_headers().await;
                } else if count < self.config.max_headers_per_batch as usize {
                    self.state.lock().mode = SyncMode::Block;
                    self.request_next_block().await;
                }
            }
            SyncMode::Block => {
                // HEADERS is ignored while draining blocks.
            }
        }
    }

    /// Handles one block arriving from `peer`, at `index` with `hash`.
    /// `peer_height` is that peer's last-known height, used for the
    /// cruise/trailing comparisons.
    pub async fn on_block(&self, peer: SocketAddr, index: u32, hash: UInt256, block: L::Block, peer_height: u32) {
        self.peers.block_received(peer, hash).await;
        let expected = self.state.lock().next_block_index;

        if index > expected {
            self.cache_future_block(index, block);
            return;
        }

        if index < expected {
            // Already processed; silently absorbed.
            return;
        }

        // index == expected: in NORMAL mode this is treated as already
        // validated upstream and absorbed without re-validation (resolved
        // open question — nothing in the mode table distinguishes it from
        // the general success path, and an already-known block is absorbed
        // rather than surfaced as an error).
        match self.ledger.add_block(block).await {
            Ok(()) => {
                self.advance_past(index, hash, peer_height).await;
            }
            Err(error) => {
                debug!(%error, index, "block processing failed, re-fetching");
                let _ = self.peers.request_block(index, hash).await;
            }
        }
    }

    /// Reports whether a peer at `peer_height` is considered caught up with
    /// the chain at `index` (within `cruise_height` of its tip).
    fn is_caught_up(&self, index: u32, peer_height: u32) -> bool {
        peer_height.saturating_sub(index) <= self.config.cruise_height
    }

    async fn advance_past(&self, index: u32, hash: UInt256, peer_height: u32) {
        let mut drained = Vec::new();
        {
            let mut state = self.state.lock();
            state.next_block_index = index + 1;
            while let Some(front) = state.block_pool.front() {
                if front.index == state.next_block_index {
                    let pooled = state.block_pool.pop_front().unwrap();
                    drained.push(pooled);
                    state.next_block_index += 1;
                } else {
                    break;
                }
            }
        }
        for pooled in drained {
            if self.ledger.add_block(pooled.block).await.is_err() {
                debug!(index = pooled.index, "drained pool block failed to apply");
            }
        }

        let mode = self.state.lock().mode;
        match mode {
            SyncMode::Headers => {
                if self.is_caught_up(index, peer_height) {
                    self.state.lock().mode = SyncMode::Normal;
                }
            }
            SyncMode::Block => {
                let diff = peer_height.saturating_sub(index);
                if hash == self.state.lock().header_hash && diff > self.config.cruise_height {
                    self.state.lock().mode = SyncMode::Headers;
                    self.request_more_headers().await;
                } else {
                    self.request_next_block().await;
                }
            }
            SyncMode::Normal => {
                let diff = peer_height.saturating_sub(index);
                if diff > self.config.trailing_height {
                    self.state.lock().mode = SyncMode::Headers;
                    self.request_more_headers().await;
                }
            }
        }
    }

    fn cache_future_block(&self, index: u32, block: L::Block) {
        let mut state = self.state.lock();
        let horizon = state.next_block_index + self.config.pool_horizon;
        if index > horizon {
            debug!(index, horizon, "future block outside pool horizon, dropping");
            return;
        }
        let position = state
            .block_pool
            .iter()
            .position(|p| p.index > index)
            .unwrap_or(state.block_pool.len());
        state.block_pool.insert(position, PooledBlock { index, block });
    }

    async fn request_more_headers(&self) {
        let hash_start = self.state.lock().header_hash;
        if let Err(error) = self.peers.request_headers(hash_start).await {
            debug!(%error, "no peer available to request headers from");
        } else {
            info!("requested more headers");
        }
    }

    async fn request_next_block(&self) {
        let (index, hash) = {
            let state = self.state.lock();
            (state.next_block_index, state.header_hash)
        };
        if let Err(error) = self.peers.request_block(index, hash).await {
            debug!(%error, index, "no capacity to request next block yet");
        }
    }

    /// Fired by the steady-state block timer (NORMAL mode's periodic poll).
    pub async fn on_block_timer(&self) {
        if self.mode() == SyncMode::Normal {
            self.request_next_block().await;
        }
    }
}

/// Narrow seam used by the server loop to fire the periodic block timer
/// without depending on a concrete `Ledger` type parameter.
#[async_trait]
pub trait SyncTick: Send + Sync {
    async fn tick(&self);
}

#[async_trait]
impl<L: Ledger> SyncTick for SyncManager<L> {
    async fn tick(&self) {
        self.on_block_timer().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::{CoreResult, Witness};

    #[derive(Clone)]
    struct StubLedger {
        height: u32,
    }

    #[async_trait]
    impl Ledger for StubLedger {
        type Block = u32;
        type Header = u32;

        fn block_height(&self) -> u32 {
            self.height
        }
        fn header_height(&self) -> u32 {
            self.height
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
        async fn add_block(&self, _block: Self::Block) -> CoreResult<()> {
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
            _script_hash: neo_core::UInt160,
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

    fn manager() -> SyncManager<StubLedger> {
        SyncManager::new(
            Arc::new(StubLedger { height: 0 }),
            Arc::new(PeerManager::new(NetworkConfig::default())),
            NetworkConfig::default(),
        )
    }

    #[test]
    fn starts_in_headers_mode() {
        assert_eq!(manager().mode(), SyncMode::Headers);
    }

    #[tokio::test]
    async fn short_headers_batch_switches_to_block_mode() {
        let sync = manager();
        sync.on_headers(5, UInt256::zero()).await;
        assert_eq!(sync.mode(), SyncMode::Block);
    }

    #[tokio::test]
    async fn full_headers_batch_stays_in_headers_mode() {
        let sync = manager();
        sync.on_headers(2000, UInt256::zero()).await;
        assert_eq!(sync.mode(), SyncMode::Headers);
    }

    #[tokio::test]
    async fn future_block_is_pooled_until_its_turn() {
        let sync = manager();
        sync.on_block("127.0.0.1:1".parse().unwrap(), 3, UInt256::zero(), 3, 10)
            .await;
        assert_eq!(sync.next_block_index(), 1);
        assert_eq!(sync.state.lock().block_pool.len(), 1);
    }

    #[tokio::test]
    async fn in_order_block_advances_next_index_and_drains_pool() {
        let sync = manager();
        sync.on_block("127.0.0.1:1".parse().unwrap(), 2, UInt256::zero(), 2, 10)
            .await;
        assert_eq!(sync.state.lock().block_pool.len(), 1);
        sync.on_block("127.0.0.1:1".parse().unwrap(), 1, UInt256::zero(), 1, 10)
            .await;
        assert_eq!(sync.next_block_index(), 3);
        assert!(sync.state.lock().block_pool.is_empty());
    }
}
