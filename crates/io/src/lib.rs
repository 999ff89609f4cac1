// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Binary reader/writer and `Serializable` primitives shared by the wire
//! codec and the VM's script encoding.

mod error;
mod reader;
mod serializable;
mod writer;

pub use error::{IoError, IoResult};
pub use reader::MemoryReader;
pub use serializable::Serializable;
pub use writer::BinaryWriter;
