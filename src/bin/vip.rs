use clap::{Args as ClapArgs, Parser, Subcommand};
use log::{error, warn};
use std::net::{Ipv4Addr, SocketAddr};

use vpacket::config::LinkConfig;
use vpacket::ip::{DEFAULT_TTL, IpProtocol, Ipv4Header};
use vpacket::socket::VirtualLink;
use vpacket::tcp::TcpHeader;
use vpacket::{MAX_PACKET_BYTES, PacketError};

/// Send and receive virtual IP packets carried in UDP datagrams.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct SendArgs {
    /// Local UDP address to send from
    #[clap(long, default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
    /// UDP address of the receiving node
    #[clap(long, default_value = "127.0.0.1:5001")]
    to: SocketAddr,
    /// Virtual source address
    #[clap(long, default_value = "192.168.0.1")]
    src: Ipv4Addr,
    /// Virtual destination address
    #[clap(long, default_value = "192.168.0.2")]
    dst: Ipv4Addr,
    /// Time to live
    #[clap(long, default_value = "16")]
    ttl: u8,
    /// Message to carry as the payload
    message: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one virtual IP packet
    Send {
        #[clap(flatten)]
        common: SendArgs,
        /// IP protocol number
        #[clap(long, default_value = "0")]
        protocol: u8,
    },
    /// Send one TCP segment (ACK, seq 1, ack 1) inside a virtual IP packet
    SendTcp {
        #[clap(flatten)]
        common: SendArgs,
        #[clap(long, default_value = "12345")]
        src_port: u16,
        #[clap(long, default_value = "80")]
        dst_port: u16,
    },
    /// Print every virtual packet received
    Recv {
        /// Local UDP address to listen on
        #[clap(long, default_value = "127.0.0.1:5001")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = match Args::parse().command {
        Command::Send { common, protocol } => {
            send(common, IpProtocol::from(protocol), None).await
        }
        Command::SendTcp {
            common,
            src_port,
            dst_port,
        } => {
            let tcp_header = TcpHeader::new(src_port, dst_port).with_sequence(1).with_ack(1);
            send(common, IpProtocol::Tcp, Some(tcp_header)).await
        }
        Command::Recv { bind } => recv(bind).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn link_config(bind_addr: SocketAddr, ttl: u8) -> LinkConfig {
    LinkConfig {
        bind_addr,
        mtu: MAX_PACKET_BYTES,
        ttl,
    }
}

async fn send(
    args: SendArgs,
    protocol: IpProtocol,
    tcp_header: Option<TcpHeader>,
) -> Result<(), PacketError> {
    let header = Ipv4Header::new(protocol, args.src, args.dst);
    let link = VirtualLink::bind(link_config(args.bind, args.ttl)).await?;

    let sent = match tcp_header {
        Some(tcp_header) => {
            link.send_tcp(args.to, header, tcp_header, args.message.as_bytes())
                .await?
        }
        None => link.send_ip(args.to, header, args.message.as_bytes()).await?,
    };
    println!("Sent {} bytes", sent);
    Ok(())
}

fn status(ok: bool) -> &'static str {
    if ok { "OK" } else { "FAIL" }
}

async fn recv(bind: SocketAddr) -> Result<(), PacketError> {
    let link = VirtualLink::bind(link_config(bind, DEFAULT_TTL)).await?;

    loop {
        // A bad packet is dropped; the node keeps listening
        let (packet, from) = match link.recv().await {
            Ok(received) => received,
            Err(PacketError::IoError(e)) => return Err(PacketError::IoError(e)),
            Err(e) => {
                warn!("Dropping malformed packet: {}", e);
                continue;
            }
        };

        let header = packet.header();
        println!("Received IP packet from {}", from);
        println!(
            "Header:  {} -> {} proto {} ttl {} len {}",
            header.src_addr(),
            header.dst_addr(),
            header.protocol().number(),
            header.ttl(),
            header.total_length()
        );
        println!("Checksum:  {}", status(packet.ip_checksum_ok()));

        if header.protocol() != IpProtocol::Tcp {
            println!("Message:  {}", String::from_utf8_lossy(packet.payload()));
            continue;
        }

        match (packet.tcp_segment(), packet.tcp_checksum_ok()) {
            (Ok((tcp, payload)), Ok(checksum_ok)) => {
                println!(
                    "TCP header:  {} -> {} seq {} ack {} win {}",
                    tcp.src_port(),
                    tcp.dst_port(),
                    tcp.sequence(),
                    tcp.acknowledgment(),
                    tcp.window_size()
                );
                println!("Flags:  {}", tcp.flags());
                println!("TCP Checksum:  {}", status(checksum_ok));
                println!(
                    "Payload ({} bytes):  {}",
                    payload.len(),
                    String::from_utf8_lossy(payload)
                );
            }
            (Err(e), _) | (_, Err(e)) => warn!("Dropping malformed TCP segment: {}", e),
        }
    }
}
