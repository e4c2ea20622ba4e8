//! Coup execution layer.
//!
//! This crate holds the synchronous game logic: seats ([`Player`]), the court
//! [`Deck`], and the [`GameSession`] state machine that enforces turn order,
//! the coin economy, hidden hands and elimination.
//!
//! ## Information hiding
//! Only [`GameSession::private_view`] ever serializes cards, and only the
//! cards of the player it is computed for.
//!
//! ## Concurrency
//! Nothing here locks. A session assumes a single mutator at a time.

pub mod deck;
mod error;
pub mod lobby;
pub mod player;
pub mod session;

pub use deck::Deck;
pub use error::GameError;
pub use lobby::{cards_per_influence, deck_size, RoomCode, SessionLimits};
pub use player::{Player, HAND_SIZE, STARTING_COINS};
pub use session::{GameSession, Pending, EXCHANGE_DRAW};
