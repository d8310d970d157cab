//! Virtual packet construction and a framed guessing-game protocol.
//!
//! This library builds simulated IPv4 and TCP headers byte for byte, computes
//! the Internet checksum (including the TCP pseudo-header), and carries a
//! small fixed-size application message over stream transports. It features:
//!
//! - Explicit wire serialization of option-less IPv4 and TCP headers
//! - RFC 1071 checksums and pseudo-header TCP checksums
//! - MTU-bounded packet assembly and parsing with checksum verification
//! - An IP-in-UDP virtual link built on Tokio
//! - A five-byte guess protocol that survives partial reads and writes
//! - A concurrent guess server sharing one locked game state

pub mod checksum;
pub mod ip;
pub mod tcp;
pub mod pseudo;
pub mod packet;
pub mod socket;
pub mod protocol;
pub mod game;
pub mod config;
pub mod server;
pub mod client;
pub mod error;

pub use error::{ConfigError, PacketError, ProtocolError, ServerError};

/// Largest virtual packet, header included, that will be constructed.
pub const MAX_PACKET_BYTES: usize = 1400;

/// Core trait for all packet builders.
///
/// This trait defines the common interface that all packet types must implement
/// for building and validating network packets.
pub trait PacketBuilder {
    /// Build the packet and return it as a vector of bytes.
    ///
    /// # Returns
    /// - `Ok(Vec<u8>)` - The serialized packet as a byte vector
    /// - `Err(PacketError)` - If packet construction fails
    fn build(&self) -> Result<Vec<u8>, PacketError>;

    /// Get the total length of the packet in bytes.
    fn length(&self) -> usize;

    /// Validate the packet fields and structure.
    ///
    /// # Returns
    /// - `Ok(())` - If the packet is valid
    /// - `Err(PacketError)` - If validation fails
    fn validate(&self) -> Result<(), PacketError>;
}

/// Trait for packets that carry a checksum field.
pub trait Checksumable {
    /// Calculate the checksum with the checksum field treated as zero.
    ///
    /// Returns `0` for a packet that fails [`PacketBuilder::validate`], since
    /// no checksum can be computed for it. Callers that need to tell this
    /// apart from a computed zero should validate first.
    fn calculate_checksum(&self) -> u16;

    /// Verify the checksum currently stored in the packet.
    ///
    /// # Returns
    /// `true` if the checksum is valid, `false` otherwise.
    fn verify_checksum(&self) -> bool;
}

/// Common header trait for all packet types.
pub trait PacketHeader {
    /// Get the header length in bytes.
    fn header_length(&self) -> usize;

    /// Get the header as a byte vector.
    ///
    /// # Returns
    /// - `Ok(Vec<u8>)` - The serialized header as a byte vector
    /// - `Err(PacketError)` - If serialization fails
    fn as_bytes(&self) -> Result<Vec<u8>, PacketError>;
}
