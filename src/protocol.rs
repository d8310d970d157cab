//! Framing for the guessing game.
//!
//! Every message is exactly five bytes: a type tag followed by a
//! big-endian `i32`. Both blocking ([`Read`]/[`Write`]) and tokio
//! ([`AsyncRead`]/[`AsyncWrite`]) transports are supported; either way a
//! message is only returned once all five bytes have arrived.

use log::trace;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read, Write};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ProtocolError;

/// Size of a guess message on the wire.
pub const GUESS_MESSAGE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Guess = 0,
    Response = 1,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(MessageType::Guess),
            1 => Ok(MessageType::Response),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// A decoded message; `number` is in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessMessage {
    pub message_type: MessageType,
    pub number: i32,
}

impl GuessMessage {
    pub fn guess(number: i32) -> Self {
        Self {
            message_type: MessageType::Guess,
            number,
        }
    }

    pub fn response(number: i32) -> Self {
        Self {
            message_type: MessageType::Response,
            number,
        }
    }

    pub fn encode(&self) -> [u8; GUESS_MESSAGE_LEN] {
        encode(self.message_type, self.number)
    }

    pub fn decode(bytes: &[u8; GUESS_MESSAGE_LEN]) -> Result<Self, ProtocolError> {
        let message_type = MessageType::try_from(bytes[0])?;
        let number = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Ok(Self {
            message_type,
            number,
        })
    }

    /// Fail unless this message has type `expected`.
    pub fn expect_type(self, expected: MessageType) -> Result<Self, ProtocolError> {
        if self.message_type != expected {
            return Err(ProtocolError::UnexpectedMessageType {
                expected,
                found: self.message_type,
            });
        }
        Ok(self)
    }
}

pub fn encode(message_type: MessageType, number: i32) -> [u8; GUESS_MESSAGE_LEN] {
    let mut bytes = [0u8; GUESS_MESSAGE_LEN];
    bytes[0] = message_type as u8;
    bytes[1..].copy_from_slice(&number.to_be_bytes());
    bytes
}

/// Write one message, retrying short writes until all five bytes are accepted.
pub fn send_message<W: Write>(
    transport: &mut W,
    message_type: MessageType,
    number: i32,
) -> Result<(), ProtocolError> {
    let bytes = encode(message_type, number);
    let mut written = 0;

    while written < bytes.len() {
        match transport.write(&bytes[written..]) {
            Ok(0) => {
                return Err(ProtocolError::IncompleteWrite {
                    written,
                    expected: bytes.len(),
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::TransportError(e)),
        }
    }
    transport.flush()?;

    trace!("Sent {:?} {}", message_type, number);
    Ok(())
}

/// Read exactly one message, accumulating partial reads.
pub fn receive_message<R: Read>(transport: &mut R) -> Result<GuessMessage, ProtocolError> {
    let mut buffer = [0u8; GUESS_MESSAGE_LEN];
    let mut received = 0;

    while received < buffer.len() {
        match transport.read(&mut buffer[received..]) {
            Ok(0) => return Err(ProtocolError::ConnectionClosed { received }),
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::TransportError(e)),
        }
    }

    GuessMessage::decode(&buffer)
}

/// Async counterpart of [`send_message`].
pub async fn send_message_async<W: AsyncWrite + Unpin>(
    transport: &mut W,
    message_type: MessageType,
    number: i32,
) -> Result<(), ProtocolError> {
    let bytes = encode(message_type, number);
    let mut written = 0;

    while written < bytes.len() {
        match transport.write(&bytes[written..]).await {
            Ok(0) => {
                return Err(ProtocolError::IncompleteWrite {
                    written,
                    expected: bytes.len(),
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::TransportError(e)),
        }
    }
    transport.flush().await?;

    trace!("Sent {:?} {}", message_type, number);
    Ok(())
}

/// Async counterpart of [`receive_message`].
pub async fn receive_message_async<R: AsyncRead + Unpin>(
    transport: &mut R,
) -> Result<GuessMessage, ProtocolError> {
    let mut buffer = [0u8; GUESS_MESSAGE_LEN];
    let mut received = 0;

    while received < buffer.len() {
        match transport.read(&mut buffer[received..]).await {
            Ok(0) => return Err(ProtocolError::ConnectionClosed { received }),
            Ok(n) => received += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProtocolError::TransportError(e)),
        }
    }

    GuessMessage::decode(&buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Hands out at most one byte per read.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    /// Accepts `capacity` bytes in total, then refuses further writes.
    struct Stingy {
        accepted: Vec<u8>,
        capacity: usize,
        per_call: usize,
    }

    impl Write for Stingy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf
                .len()
                .min(self.per_call)
                .min(self.capacity - self.accepted.len());
            self.accepted.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode(MessageType::Guess, 42), [0x00, 0x00, 0x00, 0x00, 0x2a]);
        assert_eq!(encode(MessageType::Response, -1), [0x01, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(GuessMessage::guess(i32::MIN).encode(), [0x00, 0x80, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_round_trip_boundary_values() {
        for message_type in [MessageType::Guess, MessageType::Response] {
            for number in [0, 1, -1, 50, i32::MIN, i32::MAX] {
                let mut wire = Vec::new();
                send_message(&mut wire, message_type, number).unwrap();
                assert_eq!(wire.len(), GUESS_MESSAGE_LEN);

                let message = receive_message(&mut Cursor::new(wire)).unwrap();
                assert_eq!(message.message_type, message_type);
                assert_eq!(message.number, number);
            }
        }
    }

    #[test]
    fn test_receive_one_byte_at_a_time() {
        let bytes = encode(MessageType::Guess, -123_456);
        let message = receive_message(&mut Trickle(&bytes)).unwrap();
        assert_eq!(message, GuessMessage::guess(-123_456));
    }

    #[test]
    fn test_receive_consumes_only_one_message() {
        let mut wire = Vec::new();
        send_message(&mut wire, MessageType::Guess, 10).unwrap();
        send_message(&mut wire, MessageType::Guess, 90).unwrap();

        let mut cursor = Cursor::new(wire);
        assert_eq!(receive_message(&mut cursor).unwrap().number, 10);
        assert_eq!(receive_message(&mut cursor).unwrap().number, 90);
    }

    #[test]
    fn test_receive_closed_mid_message() {
        let bytes = encode(MessageType::Guess, 7);
        match receive_message(&mut Trickle(&bytes[..3])) {
            Err(ProtocolError::ConnectionClosed { received }) => assert_eq!(received, 3),
            other => panic!("Unexpected result: {:?}", other),
        }

        let err = receive_message(&mut Cursor::new(Vec::new())).unwrap_err();
        assert!(err.is_connection_closed());
    }

    #[test]
    fn test_receive_unknown_tag() {
        let bytes = [0x07, 0, 0, 0, 1];
        assert!(matches!(
            receive_message(&mut Cursor::new(bytes)),
            Err(ProtocolError::UnknownMessageType(7))
        ));
    }

    #[test]
    fn test_send_retries_short_writes() {
        let mut sink = Stingy {
            accepted: Vec::new(),
            capacity: 64,
            per_call: 2,
        };
        send_message(&mut sink, MessageType::Response, 1).unwrap();
        assert_eq!(sink.accepted, encode(MessageType::Response, 1));
    }

    #[test]
    fn test_send_incomplete_write() {
        let mut sink = Stingy {
            accepted: Vec::new(),
            capacity: 3,
            per_call: 2,
        };
        match send_message(&mut sink, MessageType::Guess, 5) {
            Err(ProtocolError::IncompleteWrite { written, expected }) => {
                assert_eq!(written, 3);
                assert_eq!(expected, GUESS_MESSAGE_LEN);
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_expect_message_type() {
        let message = GuessMessage::response(0);
        assert!(message.expect_type(MessageType::Response).is_ok());
        assert!(matches!(
            message.expect_type(MessageType::Guess),
            Err(ProtocolError::UnexpectedMessageType {
                expected: MessageType::Guess,
                found: MessageType::Response,
            })
        ));
    }

    #[tokio::test]
    async fn test_async_receive_split_reads() {
        let bytes = encode(MessageType::Guess, i32::MAX);
        let mut transport = tokio_test::io::Builder::new()
            .read(&bytes[..1])
            .read(&bytes[1..2])
            .read(&bytes[2..4])
            .read(&bytes[4..])
            .build();

        let message = receive_message_async(&mut transport).await.unwrap();
        assert_eq!(message, GuessMessage::guess(i32::MAX));
    }

    #[tokio::test]
    async fn test_async_send_split_writes() {
        let bytes = encode(MessageType::Response, -1);
        let mut transport = tokio_test::io::Builder::new()
            .write(&bytes[..2])
            .write(&bytes[2..])
            .build();

        send_message_async(&mut transport, MessageType::Response, -1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_async_transport_error() {
        let mut transport = tokio_test::io::Builder::new()
            .read(&[0x00, 0x00])
            .read_error(io::Error::new(ErrorKind::ConnectionReset, "reset"))
            .build();

        match receive_message_async(&mut transport).await {
            Err(ProtocolError::TransportError(e)) => assert_eq!(e.kind(), ErrorKind::ConnectionReset),
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_async_round_trip_over_duplex() {
        let (mut client, mut server) = tokio::io::duplex(2);

        let writer = tokio::spawn(async move {
            send_message_async(&mut client, MessageType::Guess, i32::MIN).await
        });
        let message = receive_message_async(&mut server).await.unwrap();
        writer.await.unwrap().unwrap();

        assert_eq!(message, GuessMessage::guess(i32::MIN));
    }
}
