//! Routes decoded envelopes to tables and fans the results back out.
//!
//! Every successful mutation is followed by a fresh private projection for
//! each active member of the table, enqueued while the table lock is still
//! held so members see states in the order they were produced. Rejections
//! go back to the sender alone as an `error` envelope with a localized
//! message.

use coup_execution::{GameError, GameSession, Player, RoomCode};
use coup_types::{
    ChatBroadcast, ChatMessage, Departure, Envelope, EnvelopeError, ErrorPayload, GameCommand,
    JoinRequest, MessageType, Seated, Welcome,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::client::{Frame, FrameHandler};
use crate::i18n::Localizer;
use crate::registry::ConnectionRegistry;
use crate::tables::{lock_session, Tables};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("already seated in room {0}")]
    AlreadySeated(RoomCode),
    #[error("not seated at any table")]
    NotSeated,
    #[error("no free room codes")]
    NoFreeRooms,
    #[error("name must not be empty")]
    EmptyName,
    #[error("{0} messages are not accepted from clients")]
    Unsupported(MessageType),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Game(err) => err.code(),
            DispatchError::Envelope(_) => "malformed_payload",
            DispatchError::RoomNotFound(_) => "room_not_found",
            DispatchError::AlreadySeated(_) => "already_seated",
            DispatchError::NotSeated => "not_seated",
            DispatchError::NoFreeRooms => "no_free_rooms",
            DispatchError::EmptyName => "empty_name",
            DispatchError::Unsupported(_) => "unsupported",
        }
    }

    /// Values for the `{{.Key}}` placeholders of `error_<code>`.
    fn template_data(&self) -> HashMap<String, String> {
        let pairs: Vec<(&str, String)> = match self {
            DispatchError::Game(GameError::InvalidState(state)) => {
                vec![("State", state.to_string())]
            }
            DispatchError::Game(GameError::Capacity { max }) => vec![("Max", max.to_string())],
            DispatchError::Game(GameError::CardNotHeld(card)) => vec![("Card", card.to_string())],
            DispatchError::Game(GameError::InsufficientFunds { has, needs }) => {
                vec![("Has", has.to_string()), ("Needs", needs.to_string())]
            }
            DispatchError::Game(GameError::TargetRequired(action)) => {
                vec![("Action", action.to_string())]
            }
            DispatchError::RoomNotFound(room) => vec![("Room", room.clone())],
            DispatchError::AlreadySeated(room) => vec![("Room", room.to_string())],
            DispatchError::Unsupported(kind) => vec![("Type", kind.to_string())],
            _ => Vec::new(),
        };
        pairs
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect()
    }
}

fn frame<T: Serialize>(kind: MessageType, payload: &T) -> Result<Frame, EnvelopeError> {
    let text = Envelope::with_payload(kind, payload)?.stamped().encode()?;
    Ok(Frame::from(text))
}

pub struct Dispatcher {
    registry: Arc<ConnectionRegistry>,
    tables: Arc<Tables>,
    localizer: Arc<dyn Localizer>,
    /// Language chosen by each client at join time.
    languages: Mutex<HashMap<String, String>>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        tables: Arc<Tables>,
        localizer: Arc<dyn Localizer>,
    ) -> Self {
        Self {
            registry,
            tables,
            localizer,
            languages: Mutex::new(HashMap::new()),
        }
    }

    fn languages(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.languages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("language table lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn language_of(&self, client_id: &str) -> String {
        self.languages()
            .get(client_id)
            .cloned()
            .unwrap_or_else(|| self.localizer.default_language().to_string())
    }

    fn render(&self, client_id: &str, id: &str, data: &HashMap<String, String>) -> Option<String> {
        let lang = self.language_of(client_id);
        match self.localizer.message_with(&lang, id, data) {
            Ok(text) => Some(text),
            Err(err) => {
                tracing::debug!(client_id, lang = %lang, message_id = id, error = %err, "message render failed");
                None
            }
        }
    }

    /// Greets a freshly registered connection with its identity.
    pub fn welcome(&self, client_id: &str) -> bool {
        let message = self
            .render(client_id, "welcome_message", &HashMap::new())
            .unwrap_or_else(|| "welcome_message".to_string());
        let welcome = Welcome {
            message,
            client_id: client_id.to_string(),
        };
        match frame(MessageType::PlayerJoin, &welcome) {
            Ok(frame) => self.registry.send_to(client_id, frame),
            Err(err) => {
                tracing::warn!(client_id, error = %err, "failed to encode welcome");
                false
            }
        }
    }

    /// Releases everything a closed connection held.
    pub fn disconnect(&self, client_id: &str) {
        if let Some(code) = self.tables.unseat(client_id) {
            self.vacate(client_id, &code);
        }
        self.languages().remove(client_id);
    }

    fn send_error(&self, client_id: &str, err: &DispatchError) {
        let message = self
            .render(client_id, &format!("error_{}", err.code()), &err.template_data())
            .unwrap_or_else(|| err.to_string());
        let payload = ErrorPayload {
            code: err.code().to_string(),
            message,
        };
        match frame(MessageType::Error, &payload) {
            Ok(frame) => {
                self.registry.send_to(client_id, frame);
            }
            Err(err) => tracing::warn!(client_id, error = %err, "failed to encode error"),
        }
    }

    fn join(&self, client_id: &str, envelope: &Envelope) -> Result<(), DispatchError> {
        let request: JoinRequest = envelope.payload_as()?;
        if let Some(lang) = request.lang.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            self.languages()
                .insert(client_id.to_string(), lang.to_ascii_lowercase());
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(DispatchError::EmptyName);
        }
        if let Some(code) = self.tables.room_of(client_id) {
            return Err(DispatchError::AlreadySeated(code));
        }

        let requested = request.room.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let (code, session) = match requested {
            Some(raw) => {
                let code =
                    RoomCode::parse(raw).ok_or_else(|| DispatchError::RoomNotFound(raw.to_string()))?;
                let session = self
                    .tables
                    .get(&code)
                    .ok_or_else(|| DispatchError::RoomNotFound(code.to_string()))?;
                (code, session)
            }
            None => self.tables.open().ok_or(DispatchError::NoFreeRooms)?,
        };
        if !self.tables.seat(client_id, &code) {
            return Err(DispatchError::AlreadySeated(code));
        }

        let mut session = lock_session(&session);
        // The table may have closed between lookup and lock.
        let seated = if self.tables.get(&code).is_none() {
            Err(DispatchError::RoomNotFound(code.to_string()))
        } else {
            session
                .add_player(Player::new(client_id, name))
                .map_err(DispatchError::from)
        };
        if let Err(err) = seated {
            self.tables.unseat(client_id);
            if session.player_count() == 0 {
                self.tables.drop_room(&code);
            }
            return Err(err);
        }

        tracing::info!(client_id, room = %code, players = session.player_count(), "player seated");
        let seat = Seated {
            room: code.to_string(),
            player_id: client_id.to_string(),
            name: name.to_string(),
        };
        self.registry
            .send_to(client_id, frame(MessageType::PlayerJoin, &seat)?);
        self.publish(&session);
        Ok(())
    }

    fn game_action(&self, client_id: &str, envelope: &Envelope) -> Result<(), DispatchError> {
        let command: GameCommand = envelope.payload_as()?;
        let code = self.tables.room_of(client_id).ok_or(DispatchError::NotSeated)?;
        let session = self
            .tables
            .get(&code)
            .ok_or_else(|| DispatchError::RoomNotFound(code.to_string()))?;

        let mut session = lock_session(&session);
        match &command {
            GameCommand::Start => session.start_game()?,
            GameCommand::LoseInfluence { card } => session.lose_influence(client_id, *card)?,
            GameCommand::ExchangeKeep { cards } => session.complete_exchange(client_id, cards)?,
            turn => {
                if let Some((action, target)) = turn.turn_action() {
                    session.perform_action(client_id, action, target)?;
                }
            }
        }
        if let Some(winner) = session.winner() {
            tracing::info!(room = %code, winner = winner.id(), "game finished");
        }
        self.publish(&session);
        Ok(())
    }

    fn chat(&self, client_id: &str, envelope: &Envelope) -> Result<(), DispatchError> {
        let chat: ChatMessage = envelope.payload_as()?;
        let from = self
            .display_name(client_id)
            .unwrap_or_else(|| client_id.to_string());
        let broadcast = ChatBroadcast {
            from,
            message: chat.message,
        };
        let recipients = self.registry.broadcast(frame(MessageType::Chat, &broadcast)?);
        tracing::debug!(client_id, recipients, "chat relayed");
        Ok(())
    }

    fn leave(&self, client_id: &str) -> Result<(), DispatchError> {
        let code = self.tables.unseat(client_id).ok_or(DispatchError::NotSeated)?;
        self.vacate(client_id, &code);
        Ok(())
    }

    fn display_name(&self, client_id: &str) -> Option<String> {
        let session = self.tables.get(&self.tables.room_of(client_id)?)?;
        let session = lock_session(&session);
        session.player(client_id).map(|p| p.name().to_string())
    }

    /// Takes `client_id` off its table and tells whoever remains.
    fn vacate(&self, client_id: &str, code: &RoomCode) {
        let Some(session) = self.tables.get(code) else {
            return;
        };
        let mut session = lock_session(&session);
        if let Err(err) = session.remove_player(client_id) {
            tracing::warn!(client_id, room = %code, error = %err, "failed to remove player");
            return;
        }
        tracing::info!(client_id, room = %code, state = %session.state(), "player left");

        let remaining = active_members(&session);
        if remaining.is_empty() {
            self.tables.drop_room(code);
            return;
        }
        self.publish(&session);
        let notice = Departure {
            room: code.to_string(),
            player_id: client_id.to_string(),
        };
        match frame(MessageType::PlayerLeave, &notice) {
            Ok(frame) => {
                for id in remaining {
                    self.registry.send_to(&id, frame.clone());
                }
            }
            Err(err) => tracing::warn!(room = %code, error = %err, "failed to encode departure"),
        }
    }

    /// Sends each active member its own projection.
    fn publish(&self, session: &GameSession) {
        for id in active_members(session) {
            let Some(view) = session.private_view(&id) else {
                continue;
            };
            match frame(MessageType::GameState, &view) {
                Ok(frame) => {
                    self.registry.send_to(&id, frame);
                }
                Err(err) => {
                    tracing::warn!(client_id = %id, room = session.id(), error = %err, "failed to encode state")
                }
            }
        }
    }
}

fn active_members(session: &GameSession) -> Vec<String> {
    session
        .turn_order()
        .iter()
        .filter(|id| session.player(id).is_some_and(Player::is_active))
        .cloned()
        .collect()
}

impl FrameHandler for Dispatcher {
    fn handle(&self, client_id: &str, envelope: Envelope) {
        let kind = envelope.kind;
        let result = match kind {
            MessageType::PlayerJoin => self.join(client_id, &envelope),
            MessageType::GameAction => self.game_action(client_id, &envelope),
            MessageType::Chat => self.chat(client_id, &envelope),
            MessageType::PlayerLeave => self.leave(client_id),
            MessageType::GameState | MessageType::Error => Err(DispatchError::Unsupported(kind)),
        };
        if let Err(err) = result {
            tracing::debug!(client_id, %kind, code = err.code(), error = %err, "command rejected");
            self.send_error(client_id, &err);
        }
    }
}
