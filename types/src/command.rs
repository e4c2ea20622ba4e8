//! Payload shapes carried inside envelopes.

use serde::{Deserialize, Serialize};

use crate::{ActionType, Card};

/// `player_join` sent by a client: sit at table `room`, or open a new one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

/// `player_join` sent by the server right after the upgrade.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    pub message: String,
    #[serde(rename = "clientId")]
    pub client_id: String,
}

/// `player_join` sent to a client once it holds a seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seated {
    pub room: String,
    pub player_id: String,
    pub name: String,
}

/// `player_leave` notice delivered to the rest of the table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    pub room: String,
    pub player_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatBroadcast {
    pub from: String,
    pub message: String,
}

/// `error` payload: a stable machine code plus localized text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

/// `game_action` sent by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GameCommand {
    Start,
    Income,
    ForeignAid,
    Tax,
    Exchange,
    Coup { target: String },
    Assassinate { target: String },
    Steal { target: String },
    LoseInfluence { card: Card },
    ExchangeKeep { cards: Vec<Card> },
}

impl GameCommand {
    /// The turn action this command takes, with its target if any.
    pub fn turn_action(&self) -> Option<(ActionType, Option<&str>)> {
        match self {
            GameCommand::Income => Some((ActionType::Income, None)),
            GameCommand::ForeignAid => Some((ActionType::ForeignAid, None)),
            GameCommand::Tax => Some((ActionType::Tax, None)),
            GameCommand::Exchange => Some((ActionType::Exchange, None)),
            GameCommand::Coup { target } => Some((ActionType::Coup, Some(target.as_str()))),
            GameCommand::Assassinate { target } => {
                Some((ActionType::Assassinate, Some(target.as_str())))
            }
            GameCommand::Steal { target } => Some((ActionType::Steal, Some(target.as_str()))),
            GameCommand::Start | GameCommand::LoseInfluence { .. } | GameCommand::ExchangeKeep { .. } => {
                None
            }
        }
    }
}
