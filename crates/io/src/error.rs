// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use thiserror::Error;

/// Errors raised while reading or writing framed binary data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IoError {
    /// Attempted to read past the end of the buffer.
    #[error("unexpected end of stream: wanted {wanted} bytes, {remaining} remained")]
    EndOfStream { wanted: usize, remaining: usize },

    /// A variable-length integer exceeded the caller-supplied maximum.
    #[error("var-int value {value} exceeds maximum {max}")]
    VarIntTooLarge { value: u64, max: u64 },

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid UTF-8 string: {reason}")]
    InvalidString { reason: String },

    /// A payload exceeded a protocol-defined size limit.
    #[error("{what} of {size} bytes exceeds the maximum of {max} bytes")]
    TooLarge {
        what: &'static str,
        size: usize,
        max: usize,
    },
}

/// Result alias for I/O primitives.
pub type IoResult<T> = std::result::Result<T, IoError>;
