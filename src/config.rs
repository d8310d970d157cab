//! Runtime configuration for the game server and the virtual link.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::ConfigError;
use crate::ip::{DEFAULT_TTL, IPV4_HEADER_LEN};
use crate::MAX_PACKET_BYTES;

/// Range new targets are drawn from, `target_min..target_max`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub target_min: i32,
    pub target_max: i32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            target_min: 0,
            target_max: 1000,
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_min >= self.target_max {
            return Err(ConfigError::InvalidTargetRange {
                min: self.target_min,
                max: self.target_max,
            });
        }
        Ok(())
    }
}

/// How many guesses a connection may make.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// One guess, one response, then the server closes the connection.
    #[default]
    SingleGuess,
    /// Keep answering guesses until the client disconnects.
    Persistent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// `None` serves every accepted connection concurrently, without limit.
    pub max_connections: Option<usize>,
    pub session_mode: SessionMode,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8888)),
            max_connections: None,
            session_mode: SessionMode::default(),
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_connections == Some(0) {
            return Err(ConfigError::ZeroConnectionLimit);
        }
        self.game.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub bind_addr: SocketAddr,
    pub mtu: usize,
    pub ttl: u8,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 5000)),
            mtu: MAX_PACKET_BYTES,
            ttl: DEFAULT_TTL,
        }
    }
}

impl LinkConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mtu < IPV4_HEADER_LEN {
            return Err(ConfigError::MtuTooSmall(self.mtu));
        }
        Ok(())
    }
}
