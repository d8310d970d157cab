//! TCP pseudo-header checksum.
//!
//! The pseudo-header is never transmitted. It binds the virtual addresses
//! and segment length into the TCP checksum:
//!
//! ```text
//! +--------+--------+--------+--------+
//! |          source address           |
//! +--------+--------+--------+--------+
//! |        destination address        |
//! +--------+--------+--------+--------+
//! |  zero  |  PTCL  |    TCP length   |
//! +--------+--------+--------+--------+
//! ```

use std::net::Ipv4Addr;

use crate::checksum;
use crate::ip::IpProtocol;
use crate::tcp::{TCP_CHECKSUM_OFFSET, TCP_HEADER_LEN};
use crate::PacketError;

pub const PSEUDO_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PseudoHeader {
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    protocol: u8,
    segment_length: u16,
}

impl PseudoHeader {
    /// Pseudo-header for a TCP segment of `segment_length` bytes
    /// (TCP header plus payload, not counting the pseudo-header itself).
    pub fn tcp(
        src_addr: Ipv4Addr,
        dst_addr: Ipv4Addr,
        segment_length: usize,
    ) -> Result<Self, PacketError> {
        let segment_length = u16::try_from(segment_length).map_err(|_| PacketError::InvalidLength)?;
        Ok(Self {
            src_addr,
            dst_addr,
            protocol: IpProtocol::Tcp.number(),
            segment_length,
        })
    }

    pub fn segment_length(&self) -> u16 {
        self.segment_length
    }

    pub fn to_bytes(&self) -> [u8; PSEUDO_HEADER_LEN] {
        let mut bytes = [0u8; PSEUDO_HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.src_addr.octets());
        bytes[4..8].copy_from_slice(&self.dst_addr.octets());
        bytes[8] = 0;
        bytes[9] = self.protocol;
        bytes[10..12].copy_from_slice(&self.segment_length.to_be_bytes());
        bytes
    }
}

fn checksum_input(
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    tcp_header: &[u8],
    payload: &[u8],
) -> Result<Vec<u8>, PacketError> {
    if tcp_header.len() != TCP_HEADER_LEN {
        return Err(PacketError::InvalidLength);
    }
    let pseudo = PseudoHeader::tcp(src_addr, dst_addr, tcp_header.len() + payload.len())?;

    let mut buffer = Vec::with_capacity(PSEUDO_HEADER_LEN + tcp_header.len() + payload.len());
    buffer.extend_from_slice(&pseudo.to_bytes());
    buffer.extend_from_slice(tcp_header);
    buffer.extend_from_slice(payload);
    Ok(buffer)
}

/// Compute the TCP checksum over pseudo-header, header and payload.
///
/// The header's checksum field must already be zero; a non-zero field is
/// rejected with [`PacketError::ChecksumNotZeroed`] rather than cleared.
pub fn tcp_checksum(
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    tcp_header: &[u8],
    payload: &[u8],
) -> Result<u16, PacketError> {
    let buffer = checksum_input(src_addr, dst_addr, tcp_header, payload)?;
    if checksum::get(tcp_header, TCP_CHECKSUM_OFFSET) != 0 {
        return Err(PacketError::ChecksumNotZeroed);
    }
    Ok(checksum::ip_sum(&buffer))
}

/// Check a received segment whose header carries its checksum.
pub fn verify_tcp_checksum(
    src_addr: Ipv4Addr,
    dst_addr: Ipv4Addr,
    tcp_header: &[u8],
    payload: &[u8],
) -> Result<bool, PacketError> {
    let buffer = checksum_input(src_addr, dst_addr, tcp_header, payload)?;
    Ok(checksum::verify(&buffer))
}
