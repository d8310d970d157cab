use log::debug;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::ProtocolError;
use crate::game::GuessOutcome;
use crate::protocol::{self, MessageType};

/// A connection to a guess server.
pub struct GuessClient {
    stream: TcpStream,
}

impl GuessClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!("Connected to {}", stream.peer_addr()?);
        Ok(Self { stream })
    }

    /// Send a guess and wait for the server's response.
    pub async fn guess(&mut self, number: i32) -> Result<GuessOutcome, ProtocolError> {
        protocol::send_message_async(&mut self.stream, MessageType::Guess, number).await?;
        let response = protocol::receive_message_async(&mut self.stream)
            .await?
            .expect_type(MessageType::Response)?;
        Ok(GuessOutcome::from_wire_value(response.number))
    }
}

/// Connect, guess once and disconnect.
pub async fn guess_once<A: ToSocketAddrs>(addr: A, number: i32) -> Result<GuessOutcome, ProtocolError> {
    GuessClient::connect(addr).await?.guess(number).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GuessMessage, receive_message_async, send_message_async};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_guess_against_scripted_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let guess = receive_message_async(&mut stream).await.unwrap();
            send_message_async(&mut stream, MessageType::Response, 1).await.unwrap();
            guess
        });

        assert_eq!(guess_once(addr, 77).await.unwrap(), GuessOutcome::Lower);
        assert_eq!(server.await.unwrap(), GuessMessage::guess(77));
    }

    #[tokio::test]
    async fn test_rejects_non_response_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            receive_message_async(&mut stream).await.unwrap();
            send_message_async(&mut stream, MessageType::Guess, 0).await.unwrap();
        });

        let err = guess_once(addr, 1).await.unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedMessageType { .. }));
    }

    #[tokio::test]
    async fn test_server_closes_without_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            receive_message_async(&mut stream).await.unwrap();
        });

        let err = guess_once(addr, 1).await.unwrap_err();
        assert!(err.is_connection_closed(), "Unexpected error: {:?}", err);
    }
}
