// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use thiserror::Error;

/// Errors surfaced by the shared core primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A fixed-size hash/address value was built from the wrong number of bytes.
    #[error("invalid length for {type_name}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A hex string failed to parse into a fixed-size value.
    #[error("invalid hex encoding for {type_name}: {reason}")]
    InvalidHex {
        type_name: &'static str,
        reason: String,
    },

    /// A ledger implementation rejected a block/header payload as malformed.
    #[error("failed to decode {type_name}: {reason}")]
    Deserialization {
        type_name: &'static str,
        reason: String,
    },
}
