//! Shared state of the number-guessing game.

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::GameConfig;
use crate::error::ConfigError;

/// How a guess relates to the current target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuessOutcome {
    /// The target is lower than the guess.
    Lower,
    /// The target is higher than the guess.
    Higher,
    Match,
}

impl GuessOutcome {
    /// Value carried in a RESPONSE message.
    pub fn wire_value(self) -> i32 {
        match self {
            GuessOutcome::Higher => -1,
            GuessOutcome::Match => 0,
            GuessOutcome::Lower => 1,
        }
    }

    pub fn from_wire_value(value: i32) -> Self {
        match value.cmp(&0) {
            Ordering::Less => GuessOutcome::Higher,
            Ordering::Equal => GuessOutcome::Match,
            Ordering::Greater => GuessOutcome::Lower,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub target: i32,
    pub total_guesses: u64,
    pub rounds_won: u64,
}

#[derive(Debug)]
struct GameState {
    target: i32,
    total_guesses: u64,
    rounds_won: u64,
}

/// Cloneable handle to one game shared by every connection.
#[derive(Debug, Clone)]
pub struct SharedGame {
    state: Arc<Mutex<GameState>>,
    config: GameConfig,
}

impl SharedGame {
    /// Start a game with a random target drawn from `config`'s range.
    ///
    /// # Returns
    /// * `Ok(SharedGame)` - The new game
    /// * `Err(ConfigError)` - If the target range is empty
    pub fn new(config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let target = rand::thread_rng().gen_range(config.target_min..config.target_max);
        Self::with_target(config, target)
    }

    /// Start a game with a fixed first target. Later targets come from
    /// `config`'s range, which must not be empty.
    pub fn with_target(config: GameConfig, target: i32) -> Result<Self, ConfigError> {
        config.validate()?;
        debug!("Target number is {}. Shhhh...", target);
        Ok(Self {
            state: Arc::new(Mutex::new(GameState {
                target,
                total_guesses: 0,
                rounds_won: 0,
            })),
            config,
        })
    }

    // The critical section never leaves the state half-updated, so a
    // poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the guess and compare it with the target. A match picks a new
    /// target and resets the counter, all under one lock acquisition.
    pub fn submit_guess(&self, value: i32) -> GuessOutcome {
        let mut state = self.lock();
        state.total_guesses += 1;

        match value.cmp(&state.target) {
            Ordering::Less => GuessOutcome::Higher,
            Ordering::Greater => GuessOutcome::Lower,
            Ordering::Equal => {
                info!(
                    "Target {} guessed after {} guesses, starting a new round",
                    state.target, state.total_guesses
                );
                state.target = self.next_target(state.target);
                state.total_guesses = 0;
                state.rounds_won += 1;
                debug!("Target number is {}. Shhhh...", state.target);
                GuessOutcome::Match
            }
        }
    }

    /// Draw a target different from `previous` whenever the range allows it.
    fn next_target(&self, previous: i32) -> i32 {
        let range = self.config.target_min..self.config.target_max;
        let mut rng = rand::thread_rng();
        if range.len() < 2 {
            return rng.gen_range(range);
        }
        loop {
            let candidate = rng.gen_range(range.clone());
            if candidate != previous {
                return candidate;
            }
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let state = self.lock();
        GameSnapshot {
            target: state.target,
            total_guesses: state.total_guesses,
            rounds_won: state.rounds_won,
        }
    }
}
