// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

use crate::{BinaryWriter, IoResult, MemoryReader};

/// Types that can round-trip through the wire's binary encoding.
pub trait Serializable: Sized {
    /// Appends this value's wire encoding to `writer`.
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()>;

    /// Reads a value back out of `reader`.
    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self>;

    /// Convenience wrapper returning the encoded bytes directly.
    fn to_array(&self) -> IoResult<Vec<u8>> {
        let mut writer = BinaryWriter::new();
        self.serialize(&mut writer)?;
        Ok(writer.into_bytes())
    }
}
