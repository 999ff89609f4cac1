// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Wire frame codec (spec §4.1, §6): `magic(4) | flags(1) | command(1) |
//! varint(payload_len) | payload`.

use super::command::Command;
use crate::error::{NetworkError, NetworkResult};
use neo_io::{BinaryWriter, MemoryReader};

/// Payloads at or above this size are compressed before sending.
pub const COMPRESSION_MIN_SIZE: usize = 128;

/// Hard ceiling on a frame's decompressed payload size.
pub const MAX_PAYLOAD_SIZE: u32 = 0x0200_0000;

const FLAG_COMPRESSED: u8 = 0x01;

/// A fully-decoded wire frame: command plus raw (decompressed) payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Message {
    /// Builds a frame, compressing the payload if it is large enough and the
    /// command is allowed to carry a compressed body.
    pub fn create(command: Command, payload: Vec<u8>) -> Self {
        Self { command, payload }
    }

    /// Encodes this message as a complete frame ready to write to the wire,
    /// prefixed with `magic`.
    pub fn encode(&self, magic: u32) -> NetworkResult<Vec<u8>> {
        let (flags, payload) = if self.should_compress() {
            (FLAG_COMPRESSED, lz4_flex::compress_prepend_size(&self.payload))
        } else {
            (0u8, self.payload.clone())
        };

        let mut writer = BinaryWriter::with_capacity(payload.len() + 16);
        writer.write_u32(magic);
        writer.write_u8(flags);
        writer.write_u8(self.command.as_byte());
        writer.write_var_bytes(&payload).map_err(NetworkError::Codec)?;
        Ok(writer.into_bytes())
    }

    /// Decodes one complete frame from `bytes`, validating `magic` and
    /// rejecting disallowed or oversize compressed payloads. Never panics on
    /// malformed input; every failure routes through `NetworkError`.
    pub fn decode(bytes: &[u8], expected_magic: u32) -> NetworkResult<Self> {
        let mut reader = MemoryReader::new(bytes);
        let magic = reader.read_u32().map_err(NetworkError::Codec)?;
        if magic != expected_magic {
            return Err(NetworkError::WrongMagic {
                expected: expected_magic,
                actual: magic,
            });
        }
        let flags = reader.read_u8().map_err(NetworkError::Codec)?;
        let command_byte = reader.read_u8().map_err(NetworkError::Codec)?;
        let command = Command::from_byte(command_byte).ok_or(NetworkError::CompressionViolation {
            reason: "unknown command byte",
        })?;
        let raw = reader
            .read_var_bytes(MAX_PAYLOAD_SIZE as usize)
            .map_err(NetworkError::Codec)?;

        let compressed = flags & FLAG_COMPRESSED != 0;
        if compressed && command.is_header_carrying() {
            return Err(NetworkError::CompressionViolation {
                reason: "header-carrying command arrived compressed",
            });
        }

        let payload = if compressed {
            decompress_capped(&raw)?
        } else {
            raw
        };

        Ok(Self { command, payload })
    }

    fn should_compress(&self) -> bool {
        self.payload.len() >= COMPRESSION_MIN_SIZE && !self.command.is_header_carrying()
    }
}

/// Decompresses an LZ4-framed (size-prepended) payload, faulting rather than
/// allocating unbounded memory if the declared size exceeds the protocol max.
fn decompress_capped(raw: &[u8]) -> NetworkResult<Vec<u8>> {
    if raw.len() < 4 {
        return Err(NetworkError::CompressionViolation {
            reason: "compressed payload missing size prefix",
        });
    }
    let declared_size = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    if declared_size > MAX_PAYLOAD_SIZE {
        return Err(NetworkError::CompressionViolation {
            reason: "decompressed size exceeds protocol maximum",
        });
    }
    lz4_flex::decompress_size_prepended(raw).map_err(|_| NetworkError::CompressionViolation {
        reason: "LZ4 frame corrupt",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x334f454e;

    #[test]
    fn small_payload_round_trips_uncompressed() {
        let msg = Message::create(Command::Ping, vec![1, 2, 3]);
        let bytes = msg.encode(MAGIC).unwrap();
        let decoded = Message::decode(&bytes, MAGIC).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn large_payload_round_trips_compressed() {
        let payload = vec![7u8; 4096];
        let msg = Message::create(Command::Block, payload.clone());
        let bytes = msg.encode(MAGIC).unwrap();
        let decoded = Message::decode(&bytes, MAGIC).unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn headers_are_never_compressed_even_when_large() {
        let payload = vec![9u8; 4096];
        let msg = Message::create(Command::Headers, payload.clone());
        let bytes = msg.encode(MAGIC).unwrap();
        let decoded = Message::decode(&bytes, MAGIC).unwrap();
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let msg = Message::create(Command::Ping, vec![1]);
        let bytes = msg.encode(MAGIC).unwrap();
        assert!(matches!(
            Message::decode(&bytes, MAGIC + 1),
            Err(NetworkError::WrongMagic { .. })
        ));
    }

    #[test]
    fn compressed_headers_frame_is_rejected() {
        let mut writer = BinaryWriter::with_capacity(32);
        writer.write_u32(MAGIC);
        writer.write_u8(FLAG_COMPRESSED);
        writer.write_u8(Command::Headers.as_byte());
        let compressed = lz4_flex::compress_prepend_size(&[1, 2, 3, 4]);
        writer.write_var_bytes(&compressed).unwrap();
        let bytes = writer.into_bytes();
        assert!(matches!(
            Message::decode(&bytes, MAGIC),
            Err(NetworkError::CompressionViolation { .. })
        ));
    }

    #[test]
    fn truncated_frame_is_an_error_not_a_panic() {
        let bytes = [0x4e, 0x45, 0x4f, 0x33, 0x01];
        assert!(Message::decode(&bytes, MAGIC).is_err());
    }
}
