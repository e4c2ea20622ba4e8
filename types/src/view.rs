//! State projections sent to clients.
//!
//! [`GameView`] is the public projection: hand sizes only. [`PrivateView`]
//! extends it for exactly one recipient with that recipient's own cards.
//! Nothing here can carry another player's hand.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ActionType, Card};

/// Session lifecycle. `Finished` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Waiting,
    Starting,
    Playing,
    Finished,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Waiting => "Waiting",
            SessionState::Starting => "Starting",
            SessionState::Playing => "Playing",
            SessionState::Finished => "Finished",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub coins: u32,
    pub card_count: usize,
    pub is_alive: bool,
    pub is_active: bool,
}

/// Decision the table is waiting on before play continues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingKind {
    LoseInfluence,
    Exchange,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingView {
    pub kind: PendingKind,
    /// Player who must answer.
    pub player: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameView {
    pub id: String,
    pub state: SessionState,
    /// Players in turn order.
    pub players: Vec<PlayerView>,
    pub current_player: Option<String>,
    pub deck_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivatePlayerView {
    #[serde(flatten)]
    pub public: PlayerView,
    pub cards: Vec<Card>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateView {
    #[serde(flatten)]
    pub game: GameView,
    pub your_info: PrivatePlayerView,
    pub your_turn: bool,
    pub legal_actions: Vec<ActionType>,
    /// Cards drawn by an exchange this player must resolve.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exchange_drawn: Vec<Card>,
}
