use coup_types::{ActionType, Card, SessionState};
use thiserror::Error;

/// Rejected session operations. None of these are fatal to the process;
/// [`GameError::DeckExhausted`] during a deal indicates a deck sized too
/// small for the table.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("operation not allowed while session is {0}")]
    InvalidState(SessionState),
    #[error("table is full (max={max})")]
    Capacity { max: usize },
    #[error("player {0} already seated")]
    DuplicateId(String),
    #[error("player {0} not found")]
    NotFound(String),
    #[error("deck exhausted (needed={needed}, remaining={remaining})")]
    DeckExhausted { needed: usize, remaining: usize },
    #[error("hand already holds {0} cards")]
    HandFull(usize),
    #[error("card not held: {0}")]
    CardNotHeld(Card),
    #[error("insufficient funds (has={has}, needs={needs})")]
    InsufficientFunds { has: u32, needs: u32 },
    #[error("not your turn")]
    NotYourTurn,
    #[error("player {0} is inactive")]
    PlayerInactive(String),
    #[error("ten or more coins: coup is mandatory")]
    MustCoup,
    #[error("{0} requires a target")]
    TargetRequired(ActionType),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("a decision is pending")]
    DecisionPending,
    #[error("no pending decision for this player")]
    NoPendingDecision,
    #[error("invalid exchange selection")]
    InvalidExchange,
    #[error("invalid table limits (min={min}, max={max})")]
    InvalidLimits { min: usize, max: usize },
}

impl GameError {
    /// Stable identifier sent on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidState(_) => "invalid_state",
            GameError::Capacity { .. } => "capacity",
            GameError::DuplicateId(_) => "duplicate_id",
            GameError::NotFound(_) => "not_found",
            GameError::DeckExhausted { .. } => "deck_exhausted",
            GameError::HandFull(_) => "hand_full",
            GameError::CardNotHeld(_) => "card_not_held",
            GameError::InsufficientFunds { .. } => "insufficient_funds",
            GameError::NotYourTurn => "not_your_turn",
            GameError::PlayerInactive(_) => "player_inactive",
            GameError::MustCoup => "must_coup",
            GameError::TargetRequired(_) => "target_required",
            GameError::InvalidTarget(_) => "invalid_target",
            GameError::DecisionPending => "decision_pending",
            GameError::NoPendingDecision => "no_pending_decision",
            GameError::InvalidExchange => "invalid_exchange",
            GameError::InvalidLimits { .. } => "invalid_limits",
        }
    }
}
