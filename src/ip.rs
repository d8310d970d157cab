//! Virtual IPv4 header.
//!
//! The header is always 20 bytes: no options are ever emitted or accepted.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::checksum;
use crate::{Checksumable, PacketError, PacketHeader};

/// Length of an option-less IPv4 header in bytes.
pub const IPV4_HEADER_LEN: usize = 20;

/// TTL used when the caller does not pick one.
pub const DEFAULT_TTL: u8 = 16;

const CHECKSUM_OFFSET: usize = 10;

/// IP Protocol Numbers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IpProtocol {
    /// Protocol 0, used for test messages on the virtual network.
    Test,
    Icmp,
    Tcp,
    Udp,
    Other(u8),
}

impl IpProtocol {
    pub fn number(self) -> u8 {
        match self {
            IpProtocol::Test => 0,
            IpProtocol::Icmp => 1,
            IpProtocol::Tcp => 6,
            IpProtocol::Udp => 17,
            IpProtocol::Other(n) => n,
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(n: u8) -> Self {
        match n {
            0 => IpProtocol::Test,
            1 => IpProtocol::Icmp,
            6 => IpProtocol::Tcp,
            17 => IpProtocol::Udp,
            n => IpProtocol::Other(n),
        }
    }
}

/// IPv4 header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ipv4Header {
    version: u8,
    ihl: u8,
    tos: u8,
    total_length: u16,
    identification: u16,
    flags_and_offset: u16,
    ttl: u8,
    protocol: IpProtocol,
    checksum: u16,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
}

impl Ipv4Header {
    pub fn new(protocol: IpProtocol, src_addr: Ipv4Addr, dst_addr: Ipv4Addr) -> Self {
        Self {
            version: 4,
            ihl: 5, // 5 32-bit words (20 bytes, no options)
            tos: 0,
            total_length: IPV4_HEADER_LEN as u16, // Updated by set_payload_len
            identification: 0,
            flags_and_offset: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            src_addr,
            dst_addr,
        }
    }

    pub fn with_ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    pub fn with_protocol(mut self, protocol: IpProtocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the total length for a payload of `payload_len` bytes.
    ///
    /// Fails with [`PacketError::PacketTooLarge`] if header plus payload would
    /// exceed `mtu`; the header is left untouched in that case.
    pub fn set_payload_len(&mut self, payload_len: usize, mtu: usize) -> Result<(), PacketError> {
        let size = IPV4_HEADER_LEN + payload_len;
        if size > mtu || size > u16::MAX as usize {
            return Err(PacketError::PacketTooLarge { size, mtu });
        }
        self.total_length = size as u16;
        Ok(())
    }

    pub fn total_length(&self) -> u16 {
        self.total_length
    }

    pub fn payload_len(&self) -> usize {
        self.total_length as usize - IPV4_HEADER_LEN
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn identification(&self) -> u16 {
        self.identification
    }

    pub fn protocol(&self) -> IpProtocol {
        self.protocol
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn src_addr(&self) -> Ipv4Addr {
        self.src_addr
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        self.dst_addr
    }

    /// Serialize the header exactly as it would be transmitted, including
    /// whatever value the checksum field currently holds.
    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];

        bytes[0] = (self.version << 4) | self.ihl;
        bytes[1] = self.tos;
        bytes[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        bytes[4..6].copy_from_slice(&self.identification.to_be_bytes());
        bytes[6..8].copy_from_slice(&self.flags_and_offset.to_be_bytes());
        bytes[8] = self.ttl;
        bytes[9] = self.protocol.number();
        checksum::put(&mut bytes, CHECKSUM_OFFSET, self.checksum);
        bytes[12..16].copy_from_slice(&self.src_addr.octets());
        bytes[16..20].copy_from_slice(&self.dst_addr.octets());

        bytes
    }

    /// Zero the checksum, compute it over the wire bytes, store it and
    /// return the finished header.
    pub fn seal(&mut self) -> [u8; IPV4_HEADER_LEN] {
        self.checksum = 0;
        let mut bytes = self.to_bytes();
        self.checksum = checksum::ip_sum(&bytes);
        checksum::put(&mut bytes, CHECKSUM_OFFSET, self.checksum);
        bytes
    }

    /// Parse a header from the front of `bytes`.
    ///
    /// The total length field must fit inside `bytes`; the checksum is
    /// read but not verified.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < IPV4_HEADER_LEN {
            return Err(PacketError::InvalidLength);
        }

        let version = bytes[0] >> 4;
        let ihl = bytes[0] & 0x0F;
        if version != 4 {
            return Err(PacketError::InvalidProtocolVersion);
        }
        if ihl != 5 {
            return Err(PacketError::InvalidHeaderFormat);
        }

        let total_length = u16::from_be_bytes([bytes[2], bytes[3]]);
        if (total_length as usize) < IPV4_HEADER_LEN || total_length as usize > bytes.len() {
            return Err(PacketError::InvalidLength);
        }

        Ok(Self {
            version,
            ihl,
            tos: bytes[1],
            total_length,
            identification: u16::from_be_bytes([bytes[4], bytes[5]]),
            flags_and_offset: u16::from_be_bytes([bytes[6], bytes[7]]),
            ttl: bytes[8],
            protocol: IpProtocol::from(bytes[9]),
            checksum: checksum::get(bytes, CHECKSUM_OFFSET),
            src_addr: Ipv4Addr::new(bytes[12], bytes[13], bytes[14], bytes[15]),
            dst_addr: Ipv4Addr::new(bytes[16], bytes[17], bytes[18], bytes[19]),
        })
    }
}

impl PacketHeader for Ipv4Header {
    fn header_length(&self) -> usize {
        (self.ihl * 4) as usize
    }

    fn as_bytes(&self) -> Result<Vec<u8>, PacketError> {
        Ok(self.to_bytes().to_vec())
    }
}

impl Checksumable for Ipv4Header {
    fn calculate_checksum(&self) -> u16 {
        let mut bytes = self.to_bytes();
        checksum::put(&mut bytes, CHECKSUM_OFFSET, 0);
        checksum::ip_sum(&bytes)
    }

    fn verify_checksum(&self) -> bool {
        checksum::verify(&self.to_bytes())
    }
}
