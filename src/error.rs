use std::io;
use thiserror::Error;

use crate::protocol::MessageType;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("Packet of {size} bytes exceeds the MTU of {mtu} bytes")]
    PacketTooLarge { size: usize, mtu: usize },

    #[error("Invalid packet length")]
    InvalidLength,

    #[error("Invalid checksum")]
    InvalidChecksum,

    #[error("Checksum field must be zero before the checksum is computed")]
    ChecksumNotZeroed,

    #[error("Invalid field value: {0}")]
    InvalidFieldValue(String),

    #[error("Invalid protocol version")]
    InvalidProtocolVersion,

    #[error("Invalid header format")]
    InvalidHeaderFormat,

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
}

/// Failures of the framed guess protocol.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Transport error: {0}")]
    TransportError(#[from] io::Error),

    #[error("Incomplete write: {written} of {expected} bytes accepted")]
    IncompleteWrite { written: usize, expected: usize },

    /// The peer closed the stream; `received` bytes of the pending message had arrived.
    #[error("Connection closed after {received} bytes of a message")]
    ConnectionClosed { received: usize },

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("Expected {expected:?} message, got {found:?}")]
    UnexpectedMessageType {
        expected: MessageType,
        found: MessageType,
    },
}

impl ProtocolError {
    /// Whether this error is an ordinary end of session rather than a fault.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed { .. })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid target range {min}..{max}")]
    InvalidTargetRange { min: i32, max: i32 },

    #[error("Connection limit must be at least 1")]
    ZeroConnectionLimit,

    #[error("MTU of {0} bytes cannot hold an IPv4 header")]
    MtuTooSmall(usize),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
