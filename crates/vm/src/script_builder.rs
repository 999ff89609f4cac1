// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Assembles raw opcode bytes. Used by the node's own scripts and by VM
//! tests that need to construct programs without hand-counting bytes.

use crate::op_code::OpCode;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Accumulates opcode bytes into a finished script.
#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    buffer: Vec<u8>,
}

impl ScriptBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends a single opcode with no operand.
    pub fn op(&mut self, opcode: OpCode) -> &mut Self {
        self.buffer.push(opcode.as_byte());
        self
    }

    /// Appends a raw byte, for opcodes/tests that need exact control.
    pub fn emit(&mut self, byte: u8) -> &mut Self {
        self.buffer.push(byte);
        self
    }

    /// Appends raw bytes verbatim.
    pub fn emit_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(bytes);
        self
    }

    /// Pushes a literal byte string, choosing `PUSHBYTES`/`PUSHDATA1/2/4`
    /// by length the way a real assembler would.
    pub fn push_bytes(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if len <= 75 {
            self.buffer.push(len as u8);
        } else if len <= u8::MAX as usize {
            self.buffer.push(OpCode::PushData1.as_byte());
            self.buffer.push(len as u8);
        } else if len <= u16::MAX as usize {
            self.buffer.push(OpCode::PushData2.as_byte());
            self.buffer.extend_from_slice(&(len as u16).to_le_bytes());
        } else {
            self.buffer.push(OpCode::PushData4.as_byte());
            self.buffer.extend_from_slice(&(len as u32).to_le_bytes());
        }
        self.buffer.extend_from_slice(data);
        self
    }

    /// Pushes an integer, using the compact `PUSHM1`/`PUSH0`/`PUSH1..16`
    /// forms when it fits, otherwise as a little-endian byte string.
    pub fn push_int(&mut self, value: impl Into<BigInt>) -> &mut Self {
        let value = value.into();
        if let Some(small) = value.to_i64() {
            if (-1..=16).contains(&small) {
                let byte = if small == -1 {
                    OpCode::PushM1.as_byte()
                } else if small == 0 {
                    OpCode::Push0.as_byte()
                } else {
                    0x50 + small as u8 // Push1..Push16 start at 0x51
                };
                self.buffer.push(byte);
                return self;
            }
        }
        let bytes = value.to_signed_bytes_le();
        self.push_bytes(&bytes)
    }

    /// Pushes `true`/`false` as `PUSH1`/`PUSH0`.
    pub fn push_bool(&mut self, value: bool) -> &mut Self {
        if value {
            self.buffer.push(0x51); // PUSH1
        } else {
            self.op(OpCode::Push0);
        }
        self
    }

    /// Number of bytes emitted so far.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// `true` if nothing has been emitted yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Finishes the script, consuming the builder.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Finishes the script, borrowing it.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_integers_use_compact_push_forms() {
        let script = ScriptBuilder::new().push_int(0).into_bytes();
        assert_eq!(script, vec![OpCode::Push0.as_byte()]);

        let script = ScriptBuilder::new().push_int(-1).into_bytes();
        assert_eq!(script, vec![OpCode::PushM1.as_byte()]);

        let script = ScriptBuilder::new().push_int(16).into_bytes();
        assert_eq!(script, vec![0x60]);
    }

    #[test]
    fn large_integers_fall_back_to_bytes() {
        let script = ScriptBuilder::new().push_int(1000).into_bytes();
        assert_eq!(script[0], 2); // two-byte little-endian payload
        assert_eq!(&script[1..], &1000i16.to_le_bytes());
    }

    #[test]
    fn push_bytes_picks_pushdata_for_long_payloads() {
        let data = vec![0xABu8; 100];
        let script = ScriptBuilder::new().push_bytes(&data).into_bytes();
        assert_eq!(script[0], OpCode::PushData1.as_byte());
        assert_eq!(script[1], 100);
    }
}
