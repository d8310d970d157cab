use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::checksum;
use crate::pseudo;
use crate::{Checksumable, PacketBuilder, PacketError, PacketHeader};

/// Length of an option-less TCP header in bytes.
pub const TCP_HEADER_LEN: usize = 20;

pub(crate) const TCP_CHECKSUM_OFFSET: usize = 16;

/// TCP Flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpFlags {
    pub fin: bool,
    pub syn: bool,
    pub rst: bool,
    pub psh: bool,
    pub ack: bool,
    pub urg: bool,
    pub ece: bool,
    pub cwr: bool,
}

impl TcpFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_u8(&self) -> u8 {
        let mut flags = 0u8;
        if self.fin { flags |= 0b00000001; }
        if self.syn { flags |= 0b00000010; }
        if self.rst { flags |= 0b00000100; }
        if self.psh { flags |= 0b00001000; }
        if self.ack { flags |= 0b00010000; }
        if self.urg { flags |= 0b00100000; }
        if self.ece { flags |= 0b01000000; }
        if self.cwr { flags |= 0b10000000; }
        flags
    }

    pub fn from_u8(bits: u8) -> Self {
        Self {
            fin: bits & 0b00000001 != 0,
            syn: bits & 0b00000010 != 0,
            rst: bits & 0b00000100 != 0,
            psh: bits & 0b00001000 != 0,
            ack: bits & 0b00010000 != 0,
            urg: bits & 0b00100000 != 0,
            ece: bits & 0b01000000 != 0,
            cwr: bits & 0b10000000 != 0,
        }
    }
}

impl fmt::Display for TcpFlags {
    /// Renders set flags as `ACK+PSH`, empty when none are set.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (self.fin, "FIN"),
            (self.syn, "SYN"),
            (self.rst, "RST"),
            (self.psh, "PSH"),
            (self.ack, "ACK"),
            (self.urg, "URG"),
            (self.ece, "ECE"),
            (self.cwr, "CWR"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&set.join("+"))
    }
}

/// TCP Header
///
/// Fixed 20-byte layout; options are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpHeader {
    src_port: u16,
    dst_port: u16,
    sequence_number: u32,
    acknowledgment_number: u32,
    data_offset: u8,
    flags: TcpFlags,
    window_size: u16,
    checksum: u16,
    urgent_pointer: u16,
}

impl TcpHeader {
    pub fn new(src_port: u16, dst_port: u16) -> Self {
        Self {
            src_port,
            dst_port,
            sequence_number: 0,
            acknowledgment_number: 0,
            data_offset: 5, // 5 32-bit words (20 bytes, no options)
            flags: TcpFlags::new(),
            window_size: 65535,
            checksum: 0,
            urgent_pointer: 0,
        }
    }

    pub fn with_flags(mut self, flags: TcpFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_sequence(mut self, seq: u32) -> Self {
        self.sequence_number = seq;
        self
    }

    pub fn with_ack(mut self, ack: u32) -> Self {
        self.acknowledgment_number = ack;
        self.flags.ack = true;
        self
    }

    pub fn with_window_size(mut self, size: u16) -> Self {
        self.window_size = size;
        self
    }

    pub fn src_port(&self) -> u16 {
        self.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.dst_port
    }

    pub fn sequence(&self) -> u32 {
        self.sequence_number
    }

    pub fn acknowledgment(&self) -> u32 {
        self.acknowledgment_number
    }

    pub fn flags(&self) -> TcpFlags {
        self.flags
    }

    pub fn window_size(&self) -> u16 {
        self.window_size
    }

    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    pub fn to_bytes(&self) -> [u8; TCP_HEADER_LEN] {
        let mut bytes = [0u8; TCP_HEADER_LEN];

        bytes[0..2].copy_from_slice(&self.src_port.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.dst_port.to_be_bytes());
        bytes[4..8].copy_from_slice(&self.sequence_number.to_be_bytes());
        bytes[8..12].copy_from_slice(&self.acknowledgment_number.to_be_bytes());

        // Data Offset, Reserved, and Flags
        bytes[12] = self.data_offset << 4;
        bytes[13] = self.flags.as_u8();

        bytes[14..16].copy_from_slice(&self.window_size.to_be_bytes());
        checksum::put(&mut bytes, TCP_CHECKSUM_OFFSET, self.checksum);
        bytes[18..20].copy_from_slice(&self.urgent_pointer.to_be_bytes());

        bytes
    }

    /// Compute the checksum against the virtual addresses and payload,
    /// store it and return the finished header.
    pub fn seal(
        &mut self,
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
        payload: &[u8],
    ) -> Result<[u8; TCP_HEADER_LEN], PacketError> {
        self.checksum = 0;
        let mut bytes = self.to_bytes();
        self.checksum = pseudo::tcp_checksum(src_addr, dst_addr, &bytes, payload)?;
        checksum::put(&mut bytes, TCP_CHECKSUM_OFFSET, self.checksum);
        Ok(bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < TCP_HEADER_LEN {
            return Err(PacketError::InvalidLength);
        }
        let data_offset = bytes[12] >> 4;
        if data_offset != 5 {
            return Err(PacketError::InvalidHeaderFormat);
        }

        Ok(Self {
            src_port: u16::from_be_bytes([bytes[0], bytes[1]]),
            dst_port: u16::from_be_bytes([bytes[2], bytes[3]]),
            sequence_number: u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            acknowledgment_number: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            data_offset,
            flags: TcpFlags::from_u8(bytes[13]),
            window_size: u16::from_be_bytes([bytes[14], bytes[15]]),
            checksum: checksum::get(bytes, TCP_CHECKSUM_OFFSET),
            urgent_pointer: u16::from_be_bytes([bytes[18], bytes[19]]),
        })
    }
}

impl PacketHeader for TcpHeader {
    fn header_length(&self) -> usize {
        (self.data_offset as usize) * 4
    }

    fn as_bytes(&self) -> Result<Vec<u8>, PacketError> {
        Ok(self.to_bytes().to_vec())
    }
}

/// A TCP segment addressed between two virtual hosts.
///
/// The addresses only feed the pseudo-header; they are not part of the
/// serialized segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpSegment {
    header: TcpHeader,
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

impl TcpSegment {
    pub fn new(header: TcpHeader, src_addr: Ipv4Addr, dst_addr: Ipv4Addr) -> Self {
        Self {
            header,
            src_addr,
            dst_addr,
            payload: Vec::new(),
        }
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn header(&self) -> &TcpHeader {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize with a freshly computed checksum.
    pub fn seal(&mut self) -> Result<Vec<u8>, PacketError> {
        let header = self.header.seal(self.src_addr, self.dst_addr, &self.payload)?;
        let mut bytes = Vec::with_capacity(TCP_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&self.payload);
        Ok(bytes)
    }
}

impl Checksumable for TcpSegment {
    fn calculate_checksum(&self) -> u16 {
        if self.validate().is_err() {
            return 0;
        }
        let mut header = self.header.clone();
        match header.seal(self.src_addr, self.dst_addr, &self.payload) {
            Ok(_) => header.checksum,
            Err(_) => 0,
        }
    }

    fn verify_checksum(&self) -> bool {
        pseudo::verify_tcp_checksum(
            self.src_addr,
            self.dst_addr,
            &self.header.to_bytes(),
            &self.payload,
        )
        .unwrap_or(false)
    }
}

impl PacketBuilder for TcpSegment {
    /// Serialize header and payload as they stand, without recomputing the checksum.
    fn build(&self) -> Result<Vec<u8>, PacketError> {
        let mut packet = self.header.as_bytes()?;
        packet.extend_from_slice(&self.payload);
        Ok(packet)
    }

    fn length(&self) -> usize {
        self.header.header_length() + self.payload.len()
    }

    fn validate(&self) -> Result<(), PacketError> {
        if self.length() > u16::MAX as usize {
            return Err(PacketError::InvalidLength);
        }
        Ok(())
    }
}
