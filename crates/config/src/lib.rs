// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Configuration data model for a Neo-protocol node's core subsystems.
//!
//! This crate only holds the records the Connection Manager, Peer, and
//! Sync Manager read from; turning a config file or CLI flags into one of
//! these is a caller concern (a CLI's job, not this crate's).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-network protocol parameters negotiated out-of-band (magic) or
/// derived from block timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// 32-bit network identifier prefixing every wire frame.
    pub magic: u32,
    /// Nominal time between blocks, used to size write deadlines.
    pub milliseconds_per_block: u32,
}

impl ProtocolConfig {
    /// The well-known Neo N3 MainNet magic and block time.
    pub const fn mainnet() -> Self {
        Self {
            magic: 0x334f_454e,
            milliseconds_per_block: 15_000,
        }
    }

    /// The well-known Neo N3 TestNet magic and block time.
    pub const fn testnet() -> Self {
        Self {
            magic: 0x3254_334e,
            milliseconds_per_block: 15_000,
        }
    }

    /// A private/dev-net configuration with an arbitrary magic.
    pub const fn private(magic: u32, milliseconds_per_block: u32) -> Self {
        Self {
            magic,
            milliseconds_per_block,
        }
    }

    /// The per-frame write deadline: `max(block time, 1s)` (spec §5).
    pub fn write_deadline(&self) -> Duration {
        Duration::from_millis(self.milliseconds_per_block as u64).max(Duration::from_secs(1))
    }
}

/// Connection Manager / Peer Manager / Sync Manager tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// `host:port` this node listens on for inbound connections.
    pub listen_address: String,
    /// Bootstrap addresses tried when the peer set is below target.
    pub seed_list: Vec<String>,
    /// How many outbound connections the Connection Manager keeps open.
    pub target_outbound_peers: usize,
    /// Dial timeout for a single connection attempt.
    pub dial_timeout: Duration,
    /// Base retry delay; actual delay is `retries * retry_base_delay`.
    pub retry_base_delay: Duration,
    /// Maximum value the 8-bit retry counter saturates at.
    pub max_retries: u8,
    /// Per-peer inflight block-request cache capacity (default 1).
    pub per_peer_block_cache: usize,
    /// Global pending block-request cache capacity (default 20).
    pub pending_block_cache: usize,
    /// Headers requested per batch (default 2000).
    pub max_headers_per_batch: u32,
    /// Future-block pool horizon beyond `nextBlockIndex` (default 2000).
    pub pool_horizon: u32,
    /// Height difference below which the sync manager considers itself
    /// caught up (default 0).
    pub cruise_height: u32,
    /// Height difference above which NORMAL mode falls back to HEADERS
    /// (default 100).
    pub trailing_height: u32,
    /// Steady-state block-request timer (default 20s).
    pub block_timer: Duration,
    /// Interval between keepalive checks.
    pub ping_interval: Duration,
    /// How long an outstanding Ping may go unanswered.
    pub ping_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:10333".to_string(),
            seed_list: Vec::new(),
            target_outbound_peers: 10,
            dial_timeout: Duration::from_secs(1),
            retry_base_delay: Duration::from_secs(10),
            max_retries: u8::MAX,
            per_peer_block_cache: 1,
            pending_block_cache: 20,
            max_headers_per_batch: 2000,
            pool_horizon: 2000,
            cruise_height: 0,
            trailing_height: 100,
            block_timer: Duration::from_secs(20),
            ping_interval: Duration::from_secs(30),
            ping_timeout: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_deadline_is_never_below_one_second() {
        let cfg = ProtocolConfig::private(0, 200);
        assert_eq!(cfg.write_deadline(), Duration::from_secs(1));
    }

    #[test]
    fn mainnet_and_testnet_magics_differ() {
        assert_ne!(ProtocolConfig::mainnet().magic, ProtocolConfig::testnet().magic);
    }
}
