// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! A placeholder `Ledger` so the binary has something concrete to hand
//! `Server::new`. Block/transaction persistence and validation are out of
//! scope for this core (they belong to a real chain store); this
//! implementation only tracks heights and accepts everything it is given.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use neo_core::{CoreResult, Ledger, UInt160, UInt256, Witness};

/// Opaque block/header payload: this node has no concrete chain type of
/// its own, so it stores whatever bytes the wire handed it.
pub type RawEntry = Vec<u8>;

pub struct InMemoryLedger {
    block_height: AtomicU32,
    header_height: AtomicU32,
    blocks: DashMap<UInt256, RawEntry>,
    headers: DashMap<UInt256, RawEntry>,
    header_hashes: DashMap<u32, UInt256>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            block_height: AtomicU32::new(0),
            header_height: AtomicU32::new(0),
            blocks: DashMap::new(),
            headers: DashMap::new(),
            header_hashes: DashMap::new(),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    type Block = RawEntry;
    type Header = RawEntry;

    fn block_height(&self) -> u32 {
        self.block_height.load(Ordering::SeqCst)
    }

    fn header_height(&self) -> u32 {
        self.header_height.load(Ordering::SeqCst)
    }

    async fn get_header_hash(&self, index: u32) -> Option<UInt256> {
        self.header_hashes.get(&index).map(|entry| *entry)
    }

    async fn get_block(&self, hash: UInt256) -> Option<Self::Block> {
        self.blocks.get(&hash).map(|entry| entry.clone())
    }

    async fn get_header(&self, hash: UInt256) -> Option<Self::Header> {
        self.headers.get(&hash).map(|entry| entry.clone())
    }

    async fn add_block(&self, block: Self::Block) -> CoreResult<()> {
        self.block_height.fetch_add(1, Ordering::SeqCst);
        self.blocks.insert(UInt256::zero(), block);
        Ok(())
    }

    async fn add_headers(&self, headers: Vec<Self::Header>) -> CoreResult<()> {
        self.header_height.fetch_add(headers.len() as u32, Ordering::SeqCst);
        Ok(())
    }

    fn decode_block(&self, body: &[u8]) -> CoreResult<Self::Block> {
        Ok(body.to_vec())
    }

    async fn verify_witness(
        &self,
        _script_hash: UInt160,
        _hashable: &[u8],
        _witness: &Witness,
        gas_limit: i64,
    ) -> CoreResult<i64> {
        // No signature/script verification wired up yet; accepts every
        // witness and reports no gas consumed.
        let _ = gas_limit;
        Ok(0)
    }

    fn milliseconds_per_block(&self) -> u32 {
        15_000
    }
}
