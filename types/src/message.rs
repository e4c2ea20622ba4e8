//! Wire envelope.
//!
//! Every application frame is a JSON object:
//!
//! ```json
//! {"type": "game_state", "payload": {...}, "timestamp": "2024-01-01T00:00:00Z"}
//! ```
//!
//! `type` is drawn from a closed set, `payload` is shaped by `type`, and the
//! optional `timestamp` is diagnostic only (never used for ordering). The
//! field is omitted entirely when unset.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PlayerJoin,
    PlayerLeave,
    GameState,
    GameAction,
    Chat,
    Error,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::PlayerJoin => "player_join",
            MessageType::PlayerLeave => "player_leave",
            MessageType::GameState => "game_state",
            MessageType::GameAction => "game_action",
            MessageType::Chat => "chat",
            MessageType::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Envelope {
    pub fn new(kind: MessageType, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: None,
        }
    }

    /// Wraps any serializable payload.
    pub fn with_payload<T: Serialize>(kind: MessageType, payload: &T) -> Result<Self, EnvelopeError> {
        let payload = serde_json::to_value(payload).map_err(EnvelopeError::Encode)?;
        Ok(Self::new(kind, payload))
    }

    /// Stamps the envelope with the current wall clock.
    pub fn stamped(mut self) -> Self {
        self.timestamp = Some(Utc::now());
        self
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encode)
    }

    /// Decodes one frame. Never panics; anything that is not a well-typed
    /// envelope yields [`EnvelopeError::MalformedEnvelope`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(bytes).map_err(EnvelopeError::MalformedEnvelope)
    }

    /// Interprets the payload as `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EnvelopeError> {
        T::deserialize(&self.payload).map_err(EnvelopeError::MalformedEnvelope)
    }
}
