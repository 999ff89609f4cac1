// Copyright (c) Neo-protocol node contributors
// Distributed under the MIT license. See LICENSE for details.

//! Typed Version-payload capability entries (spec §3 supplemental,
//! §6 normative).

use neo_io::{BinaryWriter, IoResult, MemoryReader, Serializable};

/// One capability a peer advertises during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCapability {
    /// The peer serves full blockchain data from the given height.
    FullNode { start_height: u32 },
    /// The peer accepts plain TCP connections on this port.
    TcpServer { port: u16 },
    /// The peer accepts WebSocket connections on this port.
    WsServer { port: u16 },
    /// The peer refuses compressed frames entirely.
    DisableCompression,
}

const TYPE_FULL_NODE: u8 = 0x01;
const TYPE_TCP_SERVER: u8 = 0x10;
const TYPE_WS_SERVER: u8 = 0x12;
const TYPE_DISABLE_COMPRESSION: u8 = 0x20;

impl Serializable for NodeCapability {
    fn serialize(&self, writer: &mut BinaryWriter) -> IoResult<()> {
        match self {
            NodeCapability::FullNode { start_height } => {
                writer.write_u8(TYPE_FULL_NODE);
                writer.write_u32(*start_height);
            }
            NodeCapability::TcpServer { port } => {
                writer.write_u8(TYPE_TCP_SERVER);
                writer.write_u16(*port);
            }
            NodeCapability::WsServer { port } => {
                writer.write_u8(TYPE_WS_SERVER);
                writer.write_u16(*port);
            }
            NodeCapability::DisableCompression => {
                writer.write_u8(TYPE_DISABLE_COMPRESSION);
            }
        }
        Ok(())
    }

    fn deserialize(reader: &mut MemoryReader<'_>) -> IoResult<Self> {
        Ok(match reader.read_u8()? {
            TYPE_FULL_NODE => NodeCapability::FullNode {
                start_height: reader.read_u32()?,
            },
            TYPE_TCP_SERVER => NodeCapability::TcpServer {
                port: reader.read_u16()?,
            },
            TYPE_WS_SERVER => NodeCapability::WsServer {
                port: reader.read_u16()?,
            },
            _ => NodeCapability::DisableCompression,
        })
    }
}
