//! TCP server for the guessing game: one task per accepted connection, all
//! sharing a single [`SharedGame`].

use log::{debug, error, info, warn};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::config::{ServerConfig, SessionMode};
use crate::error::{ProtocolError, ServerError};
use crate::game::SharedGame;
use crate::protocol::{self, MessageType};

/// Serve one client. Returns the number of guesses answered.
///
/// In [`SessionMode::SingleGuess`] any failure to read the guess, including
/// the peer closing early, is returned as an error. In
/// [`SessionMode::Persistent`] a close between messages ends the session
/// normally.
pub async fn handle_client<S>(
    stream: &mut S,
    game: &SharedGame,
    mode: SessionMode,
) -> Result<usize, ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut answered = 0;

    loop {
        let guess = match protocol::receive_message_async(stream).await {
            Ok(message) => message.expect_type(MessageType::Guess)?,
            Err(ProtocolError::ConnectionClosed { received: 0 })
                if mode == SessionMode::Persistent && answered > 0 =>
            {
                return Ok(answered);
            }
            Err(e) => return Err(e),
        };
        debug!("Received guess: {}", guess.number);

        let outcome = game.submit_guess(guess.number);
        protocol::send_message_async(stream, MessageType::Response, outcome.wire_value()).await?;
        answered += 1;

        if mode == SessionMode::SingleGuess {
            return Ok(answered);
        }
    }
}

pub struct GuessServer {
    listener: TcpListener,
    game: SharedGame,
    config: ServerConfig,
    limiter: Option<Arc<Semaphore>>,
}

impl GuessServer {
    /// Bind the listener and start a fresh game.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let game = SharedGame::new(config.game.clone())?;
        Self::with_game(config, game).await
    }

    /// Bind the listener around an existing game.
    pub async fn with_game(config: ServerConfig, game: SharedGame) -> Result<Self, ServerError> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_addr).await?;
        info!("Guess server listening on {}", listener.local_addr()?);

        let limiter = config.max_connections.map(|n| Arc::new(Semaphore::new(n)));

        Ok(Self {
            listener,
            game,
            config,
            limiter,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn game(&self) -> SharedGame {
        self.game.clone()
    }

    /// Accept connections forever.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` completes. Sessions already
    /// running are left to finish on their own.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) {
        tokio::pin!(shutdown);
        let mut next_id: u64 = 0;

        loop {
            // With a limit, a slot is reserved before accepting so excess
            // clients wait in the listen backlog.
            let permit = match &self.limiter {
                Some(limiter) => {
                    let acquire = Arc::clone(limiter).acquire_owned();
                    tokio::select! {
                        _ = &mut shutdown => break,
                        permit = acquire => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => break,
                        },
                    }
                }
                None => None,
            };

            let (stream, addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let id = next_id;
            next_id += 1;
            info!("Client {} connected: {}", id, addr);

            let game = self.game.clone();
            let mode = self.config.session_mode;
            tokio::spawn(async move {
                serve_connection(id, stream, game, mode).await;
                drop(permit);
            });
        }

        info!("Guess server shutting down");
    }
}

async fn serve_connection(id: u64, mut stream: TcpStream, game: SharedGame, mode: SessionMode) {
    match handle_client(&mut stream, &game, mode).await {
        Ok(answered) => debug!("Client {} done after {} guesses", id, answered),
        Err(e) if e.is_connection_closed() => info!("Client {} disconnected: {}", id, e),
        Err(e) => error!("Client {} session failed: {}", id, e),
    }
}
