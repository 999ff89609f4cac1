// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use crate::{IoError, IoResult};
use bytes::Buf;

/// A cursor over an in-memory buffer, used to deserialize wire messages and
/// VM scripts without copying the backing bytes until a value is extracted.
pub struct MemoryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> MemoryReader<'a> {
    /// Wraps `data` for sequential reading starting at position 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current read offset.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Total length of the wrapped buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    fn require(&self, count: usize) -> IoResult<()> {
        if self.remaining() < count {
            Err(IoError::EndOfStream {
                wanted: count,
                remaining: self.remaining(),
            })
        } else {
            Ok(())
        }
    }

    /// Reads a single byte.
    pub fn read_u8(&mut self) -> IoResult<u8> {
        self.require(1)?;
        let b = self.data[self.position];
        self.position += 1;
        Ok(b)
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> IoResult<u16> {
        self.require(2)?;
        let mut buf = [0u8; 2];
        buf.copy_from_slice(&self.data[self.position..self.position + 2]);
        self.position += 2;
        Ok(u16::from_le_bytes(buf))
    }

    /// Reads a little-endian `i16`.
    pub fn read_i16(&mut self) -> IoResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> IoResult<u32> {
        self.require(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.data[self.position..self.position + 4]);
        self.position += 4;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a little-endian `i32`.
    pub fn read_i32(&mut self) -> IoResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> IoResult<u64> {
        self.require(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.data[self.position..self.position + 8]);
        self.position += 8;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads `count` raw bytes.
    pub fn read_bytes(&mut self, count: usize) -> IoResult<Vec<u8>> {
        self.require(count)?;
        let slice = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(slice.to_vec())
    }

    /// Reads every remaining byte.
    pub fn read_to_end(&mut self) -> IoResult<Vec<u8>> {
        let remaining = self.remaining();
        self.read_bytes(remaining)
    }

    /// Reads a Neo-style variable-length integer: a single byte below
    /// `0xFD`, or a prefix byte (`0xFD`/`0xFE`/`0xFF`) followed by a
    /// 2/4/8-byte little-endian value. Rejects values above `max`.
    pub fn read_var_int(&mut self, max: u64) -> IoResult<u64> {
        let prefix = self.read_u8()?;
        let value = match prefix {
            0xFD => self.read_u16()? as u64,
            0xFE => self.read_u32()? as u64,
            0xFF => self.read_u64()?,
            _ => prefix as u64,
        };
        if value > max {
            return Err(IoError::VarIntTooLarge { value, max });
        }
        Ok(value)
    }

    /// Reads a var-int-prefixed byte string, capped at `max` bytes.
    pub fn read_var_bytes(&mut self, max: usize) -> IoResult<Vec<u8>> {
        let len = self.read_var_int(max as u64)? as usize;
        self.read_bytes(len)
    }

    /// Reads a var-int-prefixed UTF-8 string, capped at `max` bytes.
    pub fn read_var_string(&mut self, max: usize) -> IoResult<String> {
        let bytes = self.read_var_bytes(max)?;
        String::from_utf8(bytes).map_err(|e| IoError::InvalidString {
            reason: e.to_string(),
        })
    }
}

impl<'a> Buf for MemoryReader<'a> {
    fn remaining(&self) -> usize {
        MemoryReader::remaining(self)
    }

    fn chunk(&self) -> &[u8] {
        &self.data[self.position..]
    }

    fn advance(&mut self, cnt: usize) {
        self.position += cnt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_scalars_little_endian() {
        let mut r = MemoryReader::new(&[0x01, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00]);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.read_u16().unwrap(), 0x0002);
        assert_eq!(r.read_u32().unwrap(), 0x0003);
    }

    #[test]
    fn var_int_prefixes() {
        let mut r = MemoryReader::new(&[0xFD, 0x00, 0x01]);
        assert_eq!(r.read_var_int(u64::MAX).unwrap(), 256);
    }

    #[test]
    fn var_int_rejects_over_max() {
        let mut r = MemoryReader::new(&[0x05]);
        assert!(r.read_var_int(4).is_err());
    }

    #[test]
    fn end_of_stream_does_not_panic() {
        let mut r = MemoryReader::new(&[0x01]);
        assert!(r.read_u32().is_err());
    }
}
