// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! The narrow `Ledger` interface the sync manager and the VM's witness
//! checks are built against. Persistence, chain validation, and merkle/
//! signature verification are explicitly out of scope (spec §1) and live
//! behind this trait so the core crates never depend on them directly.

use crate::{CoreResult, UInt256, Witness};
use async_trait::async_trait;

/// Chain state and mutation entrypoints consumed by the network core.
///
/// Implementations own block/transaction persistence and validation rules;
/// this crate only calls through the trait. `Block` and `Header` are left
/// as associated types so a real implementation can use its own concrete
/// chain types without this crate knowing their shape.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Concrete block type understood by this ledger.
    type Block: Send + Sync + Clone + 'static;
    /// Concrete header type understood by this ledger.
    type Header: Send + Sync + Clone + 'static;

    /// Height of the last fully-processed block.
    fn block_height(&self) -> u32;

    /// Height of the last accepted header (may be ahead of `block_height`).
    fn header_height(&self) -> u32;

    /// Hash of the header at `index`, if known.
    async fn get_header_hash(&self, index: u32) -> Option<UInt256>;

    /// Fetches a previously-stored block by hash.
    async fn get_block(&self, hash: UInt256) -> Option<Self::Block>;

    /// Fetches a previously-stored header by hash.
    async fn get_header(&self, hash: UInt256) -> Option<Self::Header>;

    /// Validates and persists a block, advancing `block_height` on success.
    ///
    /// Returns `Ok(())` for a block already known (the "already-exists"
    /// case is absorbed here, not surfaced as an error per spec §7).
    async fn add_block(&self, block: Self::Block) -> CoreResult<()>;

    /// Validates and persists a contiguous run of headers.
    async fn add_headers(&self, headers: Vec<Self::Header>) -> CoreResult<()>;

    /// Decodes a block's ledger-specific body bytes (the wire frame's index
    /// and hash prefix have already been stripped by the caller) into this
    /// ledger's concrete `Block` type.
    fn decode_block(&self, body: &[u8]) -> CoreResult<Self::Block>;

    /// Evaluates a witness against a hashable message, charging `gas_limit`.
    ///
    /// Returns the gas consumed on success.
    async fn verify_witness(
        &self,
        script_hash: crate::UInt160,
        hashable: &[u8],
        witness: &Witness,
        gas_limit: i64,
    ) -> CoreResult<i64>;

    /// Milliseconds between blocks, used to size peer write deadlines.
    fn milliseconds_per_block(&self) -> u32;
}
