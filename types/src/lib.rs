//! Shared data types for the Coup table server: card and action catalogs,
//! the wire envelope, inbound command payloads and state projections.

pub mod action;
pub use action::{ActionType, MUST_COUP_THRESHOLD};
pub mod card;
pub use card::{Card, CARD_KINDS, STANDARD_COPIES};
pub mod command;
pub use command::{
    ChatBroadcast, ChatMessage, Departure, ErrorPayload, GameCommand, JoinRequest, Seated, Welcome,
};
pub mod message;
pub use message::{Envelope, EnvelopeError, MessageType};
pub mod view;
pub use view::{
    GameView, PendingKind, PendingView, PlayerView, PrivatePlayerView, PrivateView, SessionState,
};
