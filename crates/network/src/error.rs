// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use neo_io::IoError;
use thiserror::Error;

/// Every way the network layer can fail, classified per spec §7's error
/// kinds (transient / protocol violation / validation / resource / fatal).
#[derive(Debug, Error, Clone)]
pub enum NetworkError {
    /// Wire-frame decode failure: truncated, malformed varint, unknown
    /// command, or an oversize payload. Never raised from a panic.
    #[error("frame decode error: {0}")]
    Codec(#[from] IoError),

    /// A frame's magic did not match this peer's negotiated network.
    #[error("wrong network magic: expected 0x{expected:08x}, got 0x{actual:08x}")]
    WrongMagic { expected: u32, actual: u32 },

    /// A compressed frame decompressed past the protocol maximum, or a
    /// header-carrying command arrived compressed.
    #[error("oversize or disallowed compressed frame: {reason}")]
    CompressionViolation { reason: &'static str },

    /// The handshake state machine observed an illegal transition.
    #[error("handshake violation: {0}")]
    HandshakeViolation(&'static str),

    /// A Pong arrived with no outstanding Ping, or a second Ping was sent
    /// before the first was answered.
    #[error("keepalive violation: {0}")]
    KeepaliveViolation(&'static str),

    /// An Addr reply arrived without a matching outstanding GetAddr.
    #[error("unsolicited Addr reply")]
    UnsolicitedAddr,

    /// Dial, read, or write did not complete within its deadline.
    #[error("{operation} to {address} timed out")]
    Timeout { operation: &'static str, address: String },

    /// The underlying TCP connection failed or was reset.
    #[error("connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// `RequestBlock` found no peer with spare capacity and the global
    /// pending cache was also full.
    #[error("no capacity for block request: all peers and the pending cache are full")]
    NoCapacity,

    /// An operation referenced a peer the caller never registered.
    #[error("unknown peer: {address}")]
    UnknownPeer { address: String },

    /// The Ledger reported an unrecoverable I/O error; the server must
    /// shut down.
    #[error("fatal ledger error: {0}")]
    Fatal(String),
}

/// Result alias used throughout the network crate.
pub type NetworkResult<T> = std::result::Result<T, NetworkError>;
