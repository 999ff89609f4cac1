// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Wire message types: the command set, frame codec, typed capabilities,
//! and the handshake payload.

mod capabilities;
mod command;
mod message;
mod version_payload;

pub use capabilities::NodeCapability;
pub use command::Command;
pub use message::{Message, COMPRESSION_MIN_SIZE, MAX_PAYLOAD_SIZE};
pub use version_payload::VersionPayload;
