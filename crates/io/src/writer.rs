// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use crate::{IoError, IoResult};

/// An append-only buffer builder mirroring `MemoryReader`'s wire format.
#[derive(Debug, Default)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty writer with pre-reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// `true` if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Consumes the writer, returning the accumulated bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Writes a single byte.
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Writes a little-endian `u16`.
    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `i16`.
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Writes a little-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes a little-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Writes a little-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Writes raw bytes verbatim.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Writes the var-int size prefix for `value`, matching
    /// [`crate::MemoryReader::read_var_int`]'s encoding.
    pub fn write_var_int(&mut self, value: u64) {
        if value < 0xFD {
            self.write_u8(value as u8);
        } else if value <= 0xFFFF {
            self.write_u8(0xFD);
            self.write_u16(value as u16);
        } else if value <= 0xFFFF_FFFF {
            self.write_u8(0xFE);
            self.write_u32(value as u32);
        } else {
            self.write_u8(0xFF);
            self.write_u64(value);
        }
    }

    /// The number of bytes [`Self::write_var_int`] would emit for `value`.
    pub fn var_int_size(value: u64) -> usize {
        if value < 0xFD {
            1
        } else if value <= 0xFFFF {
            3
        } else if value <= 0xFFFF_FFFF {
            5
        } else {
            9
        }
    }

    /// Writes a var-int length prefix followed by `bytes`.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) -> IoResult<()> {
        if bytes.len() as u64 > u32::MAX as u64 {
            return Err(IoError::TooLarge {
                what: "var bytes",
                size: bytes.len(),
                max: u32::MAX as usize,
            });
        }
        self.write_var_int(bytes.len() as u64);
        self.write_bytes(bytes);
        Ok(())
    }

    /// Writes a var-int length prefix followed by the UTF-8 bytes of `s`.
    pub fn write_var_string(&mut self, s: &str) -> IoResult<()> {
        self.write_var_bytes(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryReader;

    #[test]
    fn var_int_roundtrips() {
        for value in [0u64, 0xFC, 0xFD, 0xFFFF, 0x1_0000, u32::MAX as u64 + 1] {
            let mut w = BinaryWriter::new();
            w.write_var_int(value);
            let bytes = w.into_bytes();
            assert_eq!(bytes.len(), BinaryWriter::var_int_size(value));
            let mut r = MemoryReader::new(&bytes);
            assert_eq!(r.read_var_int(u64::MAX).unwrap(), value);
        }
    }
}
