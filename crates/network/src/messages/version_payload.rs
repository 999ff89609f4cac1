// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! The handshake's `Version` payload (spec §6).

use super::capabilities::NodeCapability;
use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

const MAX_USER_AGENT_LEN: usize = 1024;
const MAX_CAPABILITIES: u64 = 32;

/// Decoded fields of a `Version` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionPayload {
    pub magic: u32,
    pub version: u32,
    pub timestamp: u32,
    pub port: u16,
    pub nonce: u32,
    pub user_agent: String,
    pub start_height: u32,
    pub relay: bool,
    pub capabilities: Vec<NodeCapability>,
}

impl VersionPayload {
    /// The `FullNode` capability entry, if this peer advertised one.
    pub fn start_height_capability(&self) -> Option<u32> {
        self.capabilities.iter().find_map(|c| match c {
            NodeCapability::FullNode { start_height } => Some(*start_height),
            _ => None,
        })
    }

    /// `true` if this peer refuses compressed frames.
    pub fn compression_disabled(&self) -> bool {
        self.capabilities
            .iter()
            .any(|c| matches!(c, NodeCapability::DisableCompression))
    }
}

impl Serializable for VersionPayload {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        writer.write_u32(self.magic);
        writer.write_u32(self.version);
        writer.write_u32(self.timestamp);
        writer.write_u16(self.port);
        writer.write_u32(self.nonce);
        writer.write_var_string(&self.user_agent)?;
        writer.write_u32(self.start_height);
        writer.write_u8(self.relay as u8);
        writer.write_var_int(self.capabilities.len() as u64);
        for cap in &self.capabilities {
            cap.serialize(writer)?;
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        let magic = reader.read_u32()?;
        let version = reader.read_u32()?;
        let timestamp = reader.read_u32()?;
        let port = reader.read_u16()?;
        let nonce = reader.read_u32()?;
        let user_agent = reader.read_var_string(MAX_USER_AGENT_LEN)?;
        let start_height = reader.read_u32()?;
        let relay = reader.read_u8()? != 0;
        let capability_count = reader.read_var_int(MAX_CAPABILITIES)?;
        let mut capabilities = Vec::with_capacity(capability_count as usize);
        for _ in 0..capability_count {
            capabilities.push(NodeCapability::deserialize(reader)?);
        }
        Ok(Self {
            magic,
            version,
            timestamp,
            port,
            nonce,
            user_agent,
            start_height,
            relay,
            capabilities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_wire_format() {
        let payload = VersionPayload {
            magic: 0x334f454e,
            version: 0,
            timestamp: 1_700_000_000,
            port: 10333,
            nonce: 42,
            user_agent: "/neo-rs:0.1.0/".to_string(),
            start_height: 100,
            relay: true,
            capabilities: vec![
                NodeCapability::FullNode { start_height: 100 },
                NodeCapability::TcpServer { port: 10333 },
            ],
        };
        let bytes = payload.to_array().unwrap();
        let mut reader = MemoryReader::new(&bytes);
        let decoded = VersionPayload::deserialize(&mut reader).unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(decoded.start_height_capability(), Some(100));
        assert!(!decoded.compression_disabled());
    }
}
