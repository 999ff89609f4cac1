// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Fixed-size hash/address identifiers.
//!
//! `UInt160` and `UInt256` are opaque little-endian byte arrays used
//! throughout the wire protocol and the `Ledger` interface as script hashes
//! and block/transaction hashes respectively. Hashing and signature
//! verification that *produce* these values are out of scope for this
//! crate (spec non-goal): they are assumed available as pure functions
//! supplied by the caller.

use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! fixed_hash {
    ($name:ident, $size:expr) => {
        /// Fixed-size little-endian identifier.
        #[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; $size]);

        impl $name {
            /// Number of bytes in this identifier.
            pub const SIZE: usize = $size;

            /// The all-zero value.
            pub const fn zero() -> Self {
                Self([0u8; $size])
            }

            /// Returns `true` if every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// Borrow the underlying bytes.
            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            /// Builds an instance from a byte slice, failing if the length is wrong.
            pub fn from_slice(bytes: &[u8]) -> Result<Self, CoreError> {
                if bytes.len() != $size {
                    return Err(CoreError::InvalidLength {
                        type_name: stringify!($name),
                        expected: $size,
                        actual: bytes.len(),
                    });
                }
                let mut buf = [0u8; $size];
                buf.copy_from_slice(bytes);
                Ok(Self(buf))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x")?;
                for byte in self.0.iter().rev() {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s).map_err(|e| CoreError::InvalidHex {
                    type_name: stringify!($name),
                    reason: e.to_string(),
                })?;
                let mut value = Self::from_slice(&bytes)?;
                value.0.reverse();
                Ok(value)
            }
        }
    };
}

fixed_hash!(UInt160, 20);
fixed_hash!(UInt256, 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_zero() {
        assert!(UInt160::zero().is_zero());
        assert!(UInt256::zero().is_zero());
    }

    #[test]
    fn roundtrip_display_parse() {
        let bytes: [u8; 32] = core::array::from_fn(|i| i as u8);
        let hash = UInt256(bytes);
        let text = hash.to_string();
        let parsed: UInt256 = text.parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn wrong_length_errors() {
        assert!(UInt160::from_slice(&[0u8; 19]).is_err());
    }
}
