//! Packet assembly: virtual IPv4 packets, optionally carrying a TCP segment.

use serde::{Deserialize, Serialize};

use crate::ip::{IPV4_HEADER_LEN, IpProtocol, Ipv4Header};
use crate::pseudo;
use crate::tcp::{TCP_HEADER_LEN, TcpHeader};
use crate::{Checksumable, MAX_PACKET_BYTES, PacketBuilder, PacketError};

/// Builds transmittable virtual packets bounded by an MTU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketAssembler {
    mtu: usize,
}

impl Default for PacketAssembler {
    fn default() -> Self {
        Self {
            mtu: MAX_PACKET_BYTES,
        }
    }
}

impl PacketAssembler {
    pub fn new(mtu: usize) -> Self {
        Self { mtu }
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// IP header followed by `payload`; the protocol is taken from `header`.
    pub fn assemble_ip(&self, mut header: Ipv4Header, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
        header.set_payload_len(payload.len(), self.mtu)?;
        let header_bytes = header.seal();

        let mut packet = Vec::with_capacity(IPV4_HEADER_LEN + payload.len());
        packet.extend_from_slice(&header_bytes);
        packet.extend_from_slice(payload);
        Ok(packet)
    }

    /// TCP segment inside an IP packet whose protocol is forced to TCP.
    pub fn assemble_tcp(
        &self,
        ip_header: Ipv4Header,
        mut tcp_header: TcpHeader,
        payload: &[u8],
    ) -> Result<Vec<u8>, PacketError> {
        let size = IPV4_HEADER_LEN + TCP_HEADER_LEN + payload.len();
        if size > self.mtu {
            return Err(PacketError::PacketTooLarge { size, mtu: self.mtu });
        }

        let ip_header = ip_header.with_protocol(IpProtocol::Tcp);
        let tcp_bytes = tcp_header.seal(ip_header.src_addr(), ip_header.dst_addr(), payload)?;

        let mut segment = Vec::with_capacity(TCP_HEADER_LEN + payload.len());
        segment.extend_from_slice(&tcp_bytes);
        segment.extend_from_slice(payload);

        self.assemble_ip(ip_header, &segment)
    }

    pub fn assemble(
        &self,
        ip_header: Ipv4Header,
        payload: &[u8],
        tcp_header: Option<TcpHeader>,
    ) -> Result<Vec<u8>, PacketError> {
        match tcp_header {
            Some(tcp_header) => self.assemble_tcp(ip_header, tcp_header, payload),
            None => self.assemble_ip(ip_header, payload),
        }
    }
}

/// Assemble with the default MTU of [`MAX_PACKET_BYTES`].
pub fn assemble(
    ip_header: Ipv4Header,
    payload: &[u8],
    tcp_header: Option<TcpHeader>,
) -> Result<Vec<u8>, PacketError> {
    PacketAssembler::default().assemble(ip_header, payload, tcp_header)
}

/// A received virtual IP packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualPacket {
    header: Ipv4Header,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

impl VirtualPacket {
    /// Parse a packet; bytes beyond the header's total length are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        let header = Ipv4Header::parse(bytes)?;
        let payload = bytes[IPV4_HEADER_LEN..header.total_length() as usize].to_vec();
        Ok(Self { header, payload })
    }

    pub fn header(&self) -> &Ipv4Header {
        &self.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn ip_checksum_ok(&self) -> bool {
        self.header.verify_checksum()
    }

    /// Split the payload into TCP header and data.
    pub fn tcp_segment(&self) -> Result<(TcpHeader, &[u8]), PacketError> {
        if self.header.protocol() != IpProtocol::Tcp {
            return Err(PacketError::InvalidFieldValue(format!(
                "not a TCP packet (protocol {})",
                self.header.protocol().number()
            )));
        }
        let tcp_header = TcpHeader::parse(&self.payload)?;
        Ok((tcp_header, &self.payload[TCP_HEADER_LEN..]))
    }

    pub fn tcp_checksum_ok(&self) -> Result<bool, PacketError> {
        self.tcp_segment()?;
        pseudo::verify_tcp_checksum(
            self.header.src_addr(),
            self.header.dst_addr(),
            &self.payload[..TCP_HEADER_LEN],
            &self.payload[TCP_HEADER_LEN..],
        )
    }
}

impl PacketBuilder for VirtualPacket {
    fn build(&self) -> Result<Vec<u8>, PacketError> {
        let mut packet = self.header.to_bytes().to_vec();
        packet.extend_from_slice(&self.payload);
        Ok(packet)
    }

    fn length(&self) -> usize {
        IPV4_HEADER_LEN + self.payload.len()
    }

    fn validate(&self) -> Result<(), PacketError> {
        if self.length() != self.header.total_length() as usize {
            return Err(PacketError::InvalidLength);
        }
        if !self.ip_checksum_ok() {
            return Err(PacketError::InvalidChecksum);
        }
        Ok(())
    }
}
