//! Table sizing and room codes.

use coup_types::{CARD_KINDS, STANDARD_COPIES};
use rand::Rng;
use std::fmt;

use crate::GameError;

/// Largest table the card scaling covers.
pub const MAX_TABLE_PLAYERS: usize = 10;

/// Smallest table that can ever start.
pub const MIN_TABLE_PLAYERS: usize = 2;

pub const DEFAULT_MIN_PLAYERS: usize = 3;
pub const DEFAULT_MAX_PLAYERS: usize = 6;

/// Copies of each character needed for `players` seats.
///
/// Counts outside 3..=10 fall back to the standard deck.
pub fn cards_per_influence(players: usize) -> usize {
    match players {
        3..=6 => STANDARD_COPIES,
        7..=8 => 4,
        9..=10 => 5,
        _ => STANDARD_COPIES,
    }
}

pub fn deck_size(players: usize) -> usize {
    cards_per_influence(players) * CARD_KINDS
}

/// Occupancy bounds for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLimits {
    pub min_players: usize,
    pub max_players: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            min_players: DEFAULT_MIN_PLAYERS,
            max_players: DEFAULT_MAX_PLAYERS,
        }
    }
}

impl SessionLimits {
    pub fn new(min_players: usize, max_players: usize) -> Result<Self, GameError> {
        let limits = Self {
            min_players,
            max_players,
        };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        let ok = MIN_TABLE_PLAYERS <= self.min_players
            && self.min_players <= self.max_players
            && self.max_players <= MAX_TABLE_PLAYERS;
        if !ok {
            return Err(GameError::InvalidLimits {
                min: self.min_players,
                max: self.max_players,
            });
        }
        Ok(())
    }

    /// Copies per character for a deck that can seat `max_players`.
    pub fn copies(&self) -> usize {
        cards_per_influence(self.max_players)
    }
}

/// Four-digit, zero-padded numeric join code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomCode(String);

impl RoomCode {
    pub const LEN: usize = 4;

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(format!("{:04}", rng.gen_range(0..10_000u32)))
    }

    /// Accepts exactly four ASCII digits.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        (raw.len() == Self::LEN && raw.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
