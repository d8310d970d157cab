//! IP-in-UDP virtual link.
//!
//! Virtual packets travel as the payload of ordinary UDP datagrams, one
//! packet per datagram. The UDP socket is created with socket2 so address
//! reuse can be set before binding, then handed to tokio.

use log::{debug, trace};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::config::LinkConfig;
use crate::error::PacketError;
use crate::ip::Ipv4Header;
use crate::packet::{PacketAssembler, VirtualPacket};
use crate::tcp::TcpHeader;

/// An async UDP socket carrying virtual IP packets.
///
/// Every packet sent over the link carries the link's TTL.
pub struct VirtualLink {
    socket: UdpSocket,
    assembler: PacketAssembler,
    ttl: u8,
}

impl VirtualLink {
    /// Creates and binds the UDP socket described by `config`.
    ///
    /// # Returns
    /// * `Ok(VirtualLink)` - The bound link
    /// * `Err(PacketError)` - If the configuration is invalid or binding fails
    pub async fn bind(config: LinkConfig) -> Result<Self, PacketError> {
        config
            .validate()
            .map_err(|e| PacketError::InvalidFieldValue(e.to_string()))?;

        let domain = match config.bind_addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => {
                return Err(PacketError::IoError(io::Error::new(
                    ErrorKind::InvalidInput,
                    "virtual links run over IPv4 only",
                )));
            }
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::from(config.bind_addr))?;

        let socket = UdpSocket::from_std(socket.into())?;
        debug!("Virtual link bound on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            assembler: PacketAssembler::new(config.mtu),
            ttl: config.ttl,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    /// Sends a virtual IP packet carrying `payload` to the link peer `to`.
    /// The header's TTL is replaced by the link's.
    ///
    /// # Returns
    /// * `Ok(usize)` - The number of bytes sent
    /// * `Err(PacketError)` - If the packet exceeds the MTU or sending fails
    pub async fn send_ip(
        &self,
        to: SocketAddr,
        header: Ipv4Header,
        payload: &[u8],
    ) -> Result<usize, PacketError> {
        let header = header.with_ttl(self.ttl);
        let packet = self.assembler.assemble_ip(header, payload)?;
        self.send_datagram(to, &packet).await
    }

    /// Sends a TCP segment inside a virtual IP packet.
    pub async fn send_tcp(
        &self,
        to: SocketAddr,
        ip_header: Ipv4Header,
        tcp_header: TcpHeader,
        payload: &[u8],
    ) -> Result<usize, PacketError> {
        let ip_header = ip_header.with_ttl(self.ttl);
        let packet = self.assembler.assemble_tcp(ip_header, tcp_header, payload)?;
        self.send_datagram(to, &packet).await
    }

    async fn send_datagram(&self, to: SocketAddr, packet: &[u8]) -> Result<usize, PacketError> {
        let sent = self.socket.send_to(packet, to).await?;
        if sent != packet.len() {
            return Err(PacketError::IoError(io::Error::new(
                ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, packet.len()),
            )));
        }
        trace!("Sent {} byte virtual packet to {}", sent, to);
        Ok(sent)
    }

    /// Receives one datagram and parses it as a virtual IP packet.
    ///
    /// # Returns
    /// * `Ok((VirtualPacket, SocketAddr))` - The packet and the link peer it came from
    /// * `Err(PacketError)` - If receiving fails or the datagram is not a valid packet
    pub async fn recv(&self) -> Result<(VirtualPacket, SocketAddr), PacketError> {
        let mut buffer = vec![0u8; self.assembler.mtu()];
        let (n, from) = self.socket.recv_from(&mut buffer).await?;
        trace!("Received {} byte datagram from {}", n, from);

        let packet = VirtualPacket::parse(&buffer[..n])?;
        Ok((packet, from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ip::{DEFAULT_TTL, IpProtocol};
    use crate::PacketBuilder;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);
    const VIRTUAL_SRC: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);
    const VIRTUAL_DST: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 2);

    async fn local_link() -> VirtualLink {
        VirtualLink::bind(LinkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..LinkConfig::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_receive_ip() {
        let sender = local_link().await;
        let receiver = local_link().await;
        let to = receiver.local_addr().unwrap();

        let header = Ipv4Header::new(IpProtocol::Test, VIRTUAL_SRC, VIRTUAL_DST);
        let sent = sender.send_ip(to, header, b"Hello world!").await.unwrap();
        assert_eq!(sent, 32);

        let (packet, from) = tokio::time::timeout(TIMEOUT, receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(from, sender.local_addr().unwrap());
        assert!(packet.validate().is_ok());
        assert_eq!(packet.header().src_addr(), VIRTUAL_SRC);
        assert_eq!(packet.header().ttl(), DEFAULT_TTL);
        assert_eq!(packet.payload(), b"Hello world!");
    }

    #[tokio::test]
    async fn test_link_ttl_applied_to_outgoing_packets() {
        let sender = VirtualLink::bind(LinkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ttl: 3,
            ..LinkConfig::default()
        })
        .await
        .unwrap();
        assert_eq!(sender.ttl(), 3);
        let receiver = local_link().await;
        let to = receiver.local_addr().unwrap();

        let header = Ipv4Header::new(IpProtocol::Test, VIRTUAL_SRC, VIRTUAL_DST).with_ttl(64);
        sender.send_ip(to, header.clone(), b"ip").await.unwrap();
        let tcp_header = TcpHeader::new(12345, 80);
        sender.send_tcp(to, header, tcp_header, b"tcp").await.unwrap();

        for _ in 0..2 {
            let (packet, _) = tokio::time::timeout(TIMEOUT, receiver.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(packet.header().ttl(), 3);
            assert!(packet.ip_checksum_ok());
        }
    }

    #[tokio::test]
    async fn test_send_receive_tcp() {
        let sender = local_link().await;
        let receiver = local_link().await;
        let to = receiver.local_addr().unwrap();

        let ip_header = Ipv4Header::new(IpProtocol::Test, VIRTUAL_SRC, VIRTUAL_DST);
        let tcp_header = TcpHeader::new(12345, 80).with_sequence(1).with_ack(1);
        sender
            .send_tcp(to, ip_header, tcp_header, b"Hello world!")
            .await
            .unwrap();

        let (packet, _) = tokio::time::timeout(TIMEOUT, receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(packet.ip_checksum_ok());
        assert!(packet.tcp_checksum_ok().unwrap());
        let (tcp, data) = packet.tcp_segment().unwrap();
        assert_eq!(tcp.src_port(), 12345);
        assert_eq!(data, b"Hello world!");
    }

    #[tokio::test]
    async fn test_oversized_packet_not_sent() {
        let sender = local_link().await;
        let to = sender.local_addr().unwrap();
        let header = Ipv4Header::new(IpProtocol::Test, VIRTUAL_SRC, VIRTUAL_DST);

        let payload = vec![0u8; 2000];
        assert!(matches!(
            sender.send_ip(to, header, &payload).await,
            Err(PacketError::PacketTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_datagram_rejected() {
        let receiver = local_link().await;
        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        raw.send_to(&[0x45, 0x00, 0x00], receiver.local_addr().unwrap())
            .await
            .unwrap();

        let result = tokio::time::timeout(TIMEOUT, receiver.recv()).await.unwrap();
        assert!(matches!(result, Err(PacketError::InvalidLength)));
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let result = VirtualLink::bind(LinkConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            mtu: 10,
            ..LinkConfig::default()
        })
        .await;
        assert!(matches!(result, Err(PacketError::InvalidFieldValue(_))));
    }
}
