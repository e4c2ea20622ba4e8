//! Game session state machine.
//!
//! ```text
//! Waiting --start_game--> Starting --deal--> Playing --check_game_end--> Finished
//! ```
//!
//! `Finished` is terminal. Turn order is join order and is fixed once play
//! starts. A session is not safe for concurrent mutation; callers serialize
//! access (the server wraps each table in one mutex).
//!
//! Card conservation holds at every step:
//! `deck + hands + discard + pending exchange draw == total_cards`.

use chrono::{DateTime, Utc};
use coup_types::{
    ActionType, Card, GameView, PendingKind, PendingView, PrivateView, SessionState,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::deck::Deck;
use crate::lobby::SessionLimits;
use crate::player::{Player, HAND_SIZE};
use crate::GameError;

/// Cards drawn by an Exchange.
pub const EXCHANGE_DRAW: usize = 2;

/// A decision the table waits on before the turn can pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pending {
    /// `player` must give up one card (after a Coup or Assassinate).
    LoseInfluence { player: String },
    /// `player` must pick which cards to keep from hand plus `drawn`.
    Exchange { player: String, drawn: Vec<Card> },
}

impl Pending {
    pub fn player(&self) -> &str {
        match self {
            Pending::LoseInfluence { player } | Pending::Exchange { player, .. } => player,
        }
    }

    fn view(&self) -> PendingView {
        let kind = match self {
            Pending::LoseInfluence { .. } => PendingKind::LoseInfluence,
            Pending::Exchange { .. } => PendingKind::Exchange,
        };
        PendingView {
            kind,
            player: self.player().to_string(),
        }
    }
}

#[derive(Debug)]
pub struct GameSession {
    id: String,
    state: SessionState,
    players: HashMap<String, Player>,
    order: Vec<String>,
    current: usize,
    deck: Deck,
    discard: Vec<Card>,
    pending: Option<Pending>,
    limits: SessionLimits,
    total_cards: usize,
    winner: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    rng: StdRng,
}

impl GameSession {
    /// New session with the default 3..=6 limits and a 15 card deck.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_limits(id, SessionLimits::default())
    }

    /// New session whose deck is sized for `limits.max_players`.
    pub fn with_limits(id: impl Into<String>, limits: SessionLimits) -> Self {
        let deck = Deck::new(limits.copies());
        Self {
            id: id.into(),
            state: SessionState::Waiting,
            players: HashMap::new(),
            order: Vec::new(),
            current: 0,
            total_cards: deck.len(),
            deck,
            discard: Vec::new(),
            pending: None,
            limits,
            winner: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Replaces the shuffle source with a seeded one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Player IDs in turn order.
    pub fn turn_order(&self) -> &[String] {
        &self.order
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn discard_pile(&self) -> &[Card] {
        &self.discard
    }

    pub fn pending(&self) -> Option<&Pending> {
        self.pending.as_ref()
    }

    pub fn total_cards(&self) -> usize {
        self.total_cards
    }

    pub fn winner(&self) -> Option<&Player> {
        self.winner.as_deref().and_then(|id| self.players.get(id))
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn add_player(&mut self, player: Player) -> Result<(), GameError> {
        if self.state != SessionState::Waiting {
            return Err(GameError::InvalidState(self.state));
        }
        if self.players.len() >= self.limits.max_players {
            return Err(GameError::Capacity {
                max: self.limits.max_players,
            });
        }
        if self.players.contains_key(player.id()) {
            return Err(GameError::DuplicateId(player.id().to_string()));
        }
        self.order.push(player.id().to_string());
        self.players.insert(player.id().to_string(), player);
        Ok(())
    }

    /// Drops a player while waiting; afterwards only flags them inactive.
    ///
    /// An inactive player keeps their seat in the turn order. A decision
    /// pending on them is settled on their behalf so the table is not stuck.
    pub fn remove_player(&mut self, id: &str) -> Result<(), GameError> {
        if !self.players.contains_key(id) {
            return Err(GameError::NotFound(id.to_string()));
        }
        if self.state == SessionState::Waiting {
            self.players.remove(id);
            self.order.retain(|seat| seat != id);
            return Ok(());
        }

        if let Some(player) = self.players.get_mut(id) {
            player.deactivate();
        }
        self.settle_for_absent();
        Ok(())
    }

    pub fn can_start(&self) -> bool {
        self.state == SessionState::Waiting && self.players.len() >= self.limits.min_players
    }

    /// Shuffles and deals two cards to every seat in turn order.
    ///
    /// On [`GameError::DeckExhausted`] the session stays in `Starting` and
    /// must be discarded.
    pub fn start_game(&mut self) -> Result<(), GameError> {
        if !self.can_start() {
            return Err(GameError::InvalidState(self.state));
        }
        self.state = SessionState::Starting;
        self.deck.shuffle(&mut self.rng);

        for id in &self.order {
            let hand = self.deck.draw_many(HAND_SIZE)?;
            let Some(player) = self.players.get_mut(id) else {
                return Err(GameError::NotFound(id.clone()));
            };
            for card in hand {
                player.add_card(card)?;
            }
        }

        self.current = 0;
        self.state = SessionState::Playing;
        self.started_at = Some(Utc::now());
        info!(session = %self.id, players = self.order.len(), "game started");
        Ok(())
    }

    pub fn current_player(&self) -> Option<&Player> {
        if self.state != SessionState::Playing || self.order.is_empty() {
            return None;
        }
        self.order
            .get(self.current)
            .and_then(|id| self.players.get(id))
    }

    /// Passes the turn to the next living seat, then checks for a winner.
    pub fn next_turn(&mut self) {
        if self.state != SessionState::Playing {
            return;
        }
        let seats = self.order.len();
        for _ in 0..seats {
            self.current = (self.current + 1) % seats;
            let alive = self
                .players
                .get(&self.order[self.current])
                .is_some_and(Player::is_alive);
            if alive {
                break;
            }
        }
        self.check_game_end();
    }

    /// Finishes the game once at most one player is alive. A lone survivor
    /// becomes the winner; nobody alive finishes without one.
    pub fn check_game_end(&mut self) {
        if self.state != SessionState::Playing {
            return;
        }
        let alive = self.alive_players();
        if alive.len() > 1 {
            return;
        }
        let winner = alive.first().map(|p| p.id().to_string());
        self.state = SessionState::Finished;
        self.finished_at = Some(Utc::now());
        self.winner = winner;
        if let Some(Pending::Exchange { drawn, .. }) = self.pending.take() {
            self.deck.put_back(drawn);
        }
        info!(session = %self.id, winner = ?self.winner, "game finished");
    }

    /// Living players, in no particular order.
    pub fn alive_players(&self) -> Vec<&Player> {
        self.players.values().filter(|p| p.is_alive()).collect()
    }

    /// Actions `id` may take right now.
    pub fn legal_actions(&self, id: &str) -> Vec<ActionType> {
        if self.pending.is_some() {
            return Vec::new();
        }
        let Some(player) = self.current_player() else {
            return Vec::new();
        };
        if player.id() != id || !player.is_alive() || !player.is_active() {
            return Vec::new();
        }
        if player.must_coup() {
            return vec![ActionType::Coup];
        }
        ActionType::ALL
            .into_iter()
            .filter(|action| player.can_afford(*action))
            .filter(|action| *action != ActionType::Exchange || self.deck.len() >= EXCHANGE_DRAW)
            .collect()
    }

    /// Resolves a turn action for the current player.
    ///
    /// Character actions are taken on claim. Coup and Assassinate leave a
    /// pending loss on the target; Exchange leaves a pending selection on
    /// the actor. Everything else passes the turn.
    pub fn perform_action(
        &mut self,
        actor: &str,
        action: ActionType,
        target: Option<&str>,
    ) -> Result<(), GameError> {
        self.validate_action(actor, action, target)?;

        let cost = action.cost();
        self.player_mut(actor)?.remove_coins(cost)?;
        debug!(session = %self.id, actor, %action, target, "action");

        match action {
            ActionType::Income | ActionType::ForeignAid | ActionType::Tax => {
                self.player_mut(actor)?.add_coins(i64::from(action.reward()));
                self.next_turn();
            }
            ActionType::Steal => {
                let victim = target.ok_or(GameError::TargetRequired(action))?;
                let victim = self.player_mut(victim)?;
                let taken = victim.coins().min(action.reward());
                victim.remove_coins(taken)?;
                self.player_mut(actor)?.add_coins(i64::from(taken));
                self.next_turn();
            }
            ActionType::Coup | ActionType::Assassinate => {
                let victim = target.ok_or(GameError::TargetRequired(action))?;
                self.pending = Some(Pending::LoseInfluence {
                    player: victim.to_string(),
                });
                self.settle_for_absent();
            }
            ActionType::Exchange => {
                let drawn = self.deck.draw_many(EXCHANGE_DRAW)?;
                self.pending = Some(Pending::Exchange {
                    player: actor.to_string(),
                    drawn,
                });
            }
        }
        Ok(())
    }

    /// Settles a pending loss: `card` goes to the discard pile and the turn
    /// passes.
    pub fn lose_influence(&mut self, id: &str, card: Card) -> Result<(), GameError> {
        if self.state != SessionState::Playing {
            return Err(GameError::InvalidState(self.state));
        }
        match &self.pending {
            Some(Pending::LoseInfluence { player }) if player == id => {}
            _ => return Err(GameError::NoPendingDecision),
        }
        self.player_mut(id)?.remove_card(card)?;
        self.discard.push(card);
        self.pending = None;
        self.next_turn();
        Ok(())
    }

    /// Settles a pending exchange. `keep` must come from hand plus drawn and
    /// match the current hand size; the rest goes back and the deck is
    /// reshuffled.
    pub fn complete_exchange(&mut self, id: &str, keep: &[Card]) -> Result<(), GameError> {
        if self.state != SessionState::Playing {
            return Err(GameError::InvalidState(self.state));
        }
        let drawn = match &self.pending {
            Some(Pending::Exchange { player, drawn }) if player == id => drawn.clone(),
            _ => return Err(GameError::NoPendingDecision),
        };
        let player = self
            .players
            .get(id)
            .ok_or_else(|| GameError::NotFound(id.to_string()))?;
        if keep.len() != player.cards().len() {
            return Err(GameError::InvalidExchange);
        }

        let mut pool: Vec<Card> = player.cards().iter().copied().chain(drawn).collect();
        for card in keep {
            let index = pool
                .iter()
                .position(|held| held == card)
                .ok_or(GameError::InvalidExchange)?;
            pool.swap_remove(index);
        }

        self.player_mut(id)?.replace_hand(keep.to_vec());
        self.deck.put_back(pool);
        self.deck.shuffle(&mut self.rng);
        self.pending = None;
        self.next_turn();
        Ok(())
    }

    /// Public projection: hand sizes only.
    pub fn public_view(&self) -> GameView {
        GameView {
            id: self.id.clone(),
            state: self.state,
            players: self
                .order
                .iter()
                .filter_map(|id| self.players.get(id))
                .map(Player::public_view)
                .collect(),
            current_player: self.current_player().map(|p| p.id().to_string()),
            deck_size: self.deck.len(),
            winner: self.winner().map(Player::public_view),
            pending: self.pending.as_ref().map(Pending::view),
        }
    }

    /// Projection for `id` alone, revealing only that player's cards.
    pub fn private_view(&self, id: &str) -> Option<PrivateView> {
        let player = self.players.get(id)?;
        let exchange_drawn = match &self.pending {
            Some(Pending::Exchange { player, drawn }) if player == id => drawn.clone(),
            _ => Vec::new(),
        };
        Some(PrivateView {
            game: self.public_view(),
            your_info: player.private_view(),
            your_turn: self.current_player().is_some_and(|p| p.id() == id),
            legal_actions: self.legal_actions(id),
            exchange_drawn,
        })
    }

    fn player_mut(&mut self, id: &str) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(id)
            .ok_or_else(|| GameError::NotFound(id.to_string()))
    }

    fn validate_action(
        &self,
        actor: &str,
        action: ActionType,
        target: Option<&str>,
    ) -> Result<(), GameError> {
        if self.state != SessionState::Playing {
            return Err(GameError::InvalidState(self.state));
        }
        if self.pending.is_some() {
            return Err(GameError::DecisionPending);
        }
        let player = self
            .players
            .get(actor)
            .ok_or_else(|| GameError::NotFound(actor.to_string()))?;
        if self.current_player().map(Player::id) != Some(actor) {
            return Err(GameError::NotYourTurn);
        }
        if !player.is_active() {
            return Err(GameError::PlayerInactive(actor.to_string()));
        }
        if player.must_coup() && action != ActionType::Coup {
            return Err(GameError::MustCoup);
        }
        if !player.can_afford(action) {
            return Err(GameError::InsufficientFunds {
                has: player.coins(),
                needs: action.cost(),
            });
        }
        if action == ActionType::Exchange && self.deck.len() < EXCHANGE_DRAW {
            return Err(GameError::DeckExhausted {
                needed: EXCHANGE_DRAW,
                remaining: self.deck.len(),
            });
        }
        if action.needs_target() {
            let target = target.ok_or(GameError::TargetRequired(action))?;
            let valid = target != actor && self.players.get(target).is_some_and(Player::is_alive);
            if !valid {
                return Err(GameError::InvalidTarget(target.to_string()));
            }
        }
        Ok(())
    }

    /// Answers a decision pending on an inactive player: the first held
    /// card is given up, or the original hand is kept.
    fn settle_for_absent(&mut self) {
        let Some(pending) = &self.pending else {
            return;
        };
        let absent = self
            .players
            .get(pending.player())
            .is_some_and(|p| !p.is_active());
        if !absent {
            return;
        }
        let result = match pending.clone() {
            Pending::LoseInfluence { player } => {
                match self.players.get(&player).and_then(|p| p.cards().first().copied()) {
                    Some(card) => self.lose_influence(&player, card),
                    None => {
                        self.pending = None;
                        self.next_turn();
                        Ok(())
                    }
                }
            }
            Pending::Exchange { player, .. } => {
                let hand = self
                    .players
                    .get(&player)
                    .map(|p| p.cards().to_vec())
                    .unwrap_or_default();
                self.complete_exchange(&player, &hand)
            }
        };
        if let Err(err) = result {
            tracing::warn!(session = %self.id, ?err, "failed to settle decision for absent player");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn session_with(n: usize) -> GameSession {
        let mut session = GameSession::new("g").with_seed(1);
        for i in 0..n {
            session
                .add_player(Player::new(format!("p{i}"), format!("Player {i}")))
                .unwrap();
        }
        session
    }

    fn started(n: usize) -> GameSession {
        let mut session = session_with(n);
        session.start_game().unwrap();
        session
    }

    fn cards_in_play(session: &GameSession) -> usize {
        let hands: usize = session.players.values().map(|p| p.cards().len()).sum();
        let drawn = match &session.pending {
            Some(Pending::Exchange { drawn, .. }) => drawn.len(),
            _ => 0,
        };
        session.deck.len() + hands + session.discard.len() + drawn
    }

    /// Moves every card of `id` to the discard pile.
    fn eliminate(session: &mut GameSession, id: &str) {
        let cards = session.players[id].cards().to_vec();
        for card in cards {
            session.players.get_mut(id).unwrap().remove_card(card).unwrap();
            session.discard.push(card);
        }
    }

    fn set_coins(session: &mut GameSession, id: &str, coins: u32) {
        let player = session.players.get_mut(id).unwrap();
        player.add_coins(-i64::from(player.coins()));
        player.add_coins(i64::from(coins));
    }

    #[test]
    fn test_fresh_session_deck() {
        let session = GameSession::new("g");
        assert_eq!(session.state(), SessionState::Waiting);
        assert_eq!(session.deck().len(), 15);
        for card in Card::ALL {
            assert_eq!(session.deck().count(card), 3);
        }
    }

    #[test]
    fn test_large_table_deck() {
        let session = GameSession::with_limits("g", SessionLimits::new(3, 8).unwrap());
        assert_eq!(session.total_cards(), 20);
    }

    #[test]
    fn test_add_player_rules() {
        let mut session = session_with(6);
        assert_eq!(
            session.add_player(Player::new("p6", "late")),
            Err(GameError::Capacity { max: 6 })
        );
        session.remove_player("p5").unwrap();
        assert_eq!(
            session.add_player(Player::new("p0", "dup")),
            Err(GameError::DuplicateId("p0".into()))
        );
        assert_eq!(session.player_count(), 5);
    }

    #[test]
    fn test_remove_while_waiting_keeps_order() {
        let mut session = session_with(4);
        session.remove_player("p1").unwrap();
        assert_eq!(session.turn_order(), &["p0", "p2", "p3"]);
        assert_eq!(session.player_count(), 3);
        assert_eq!(
            session.remove_player("p1"),
            Err(GameError::NotFound("p1".into()))
        );
    }

    #[test]
    fn test_can_start_threshold() {
        let mut session = session_with(2);
        assert!(!session.can_start());
        assert_eq!(
            session.start_game(),
            Err(GameError::InvalidState(SessionState::Waiting))
        );
        session.add_player(Player::new("p2", "third")).unwrap();
        assert!(session.can_start());
        session.start_game().unwrap();
        assert!(!session.can_start());
    }

    #[test]
    fn test_start_deals_two_each() {
        let session = started(3);
        assert_eq!(session.state(), SessionState::Playing);
        assert_eq!(session.deck().len(), 9);
        for id in session.turn_order() {
            assert_eq!(session.player(id).unwrap().cards().len(), 2);
        }
        assert_eq!(cards_in_play(&session), 15);
        assert!(session.started_at().is_some());
        assert_eq!(session.current_player().unwrap().id(), "p0");
    }

    #[test]
    fn test_add_after_start_rejected() {
        let mut session = started(3);
        assert_eq!(
            session.add_player(Player::new("p3", "late")),
            Err(GameError::InvalidState(SessionState::Playing))
        );
        assert_eq!(session.player_count(), 3);
    }

    #[test]
    fn test_remove_while_playing_flags_inactive() {
        let mut session = started(3);
        session.remove_player("p1").unwrap();
        let p1 = session.player("p1").unwrap();
        assert!(!p1.is_active());
        assert!(p1.is_alive());
        assert_eq!(session.turn_order().len(), 3);

        // The inactive seat is still visited.
        session.next_turn();
        assert_eq!(session.current_player().unwrap().id(), "p1");
        assert!(session.legal_actions("p1").is_empty());
        assert_eq!(
            session.perform_action("p1", ActionType::Income, None),
            Err(GameError::PlayerInactive("p1".into()))
        );
    }

    #[test]
    fn test_scenario_last_survivor_wins() {
        let mut session = started(3);
        assert_eq!(session.current_player().unwrap().id(), "p0");
        eliminate(&mut session, "p0");
        eliminate(&mut session, "p1");
        session.check_game_end();
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.winner().unwrap().id(), "p2");
        assert!(session.finished_at().is_some());
        assert_eq!(cards_in_play(&session), 15);
    }

    #[test]
    fn test_everyone_eliminated_has_no_winner() {
        let mut session = started(3);
        for id in ["p0", "p1", "p2"] {
            eliminate(&mut session, id);
        }
        session.next_turn();
        assert_eq!(session.state(), SessionState::Finished);
        assert!(session.winner().is_none());
        assert!(session.current_player().is_none());
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut session = started(3);
        eliminate(&mut session, "p1");
        eliminate(&mut session, "p2");
        session.check_game_end();
        assert_eq!(
            session.perform_action("p0", ActionType::Income, None),
            Err(GameError::InvalidState(SessionState::Finished))
        );
        assert_eq!(
            session.add_player(Player::new("p9", "late")),
            Err(GameError::InvalidState(SessionState::Finished))
        );
        session.next_turn();
        assert_eq!(session.state(), SessionState::Finished);
    }

    #[test]
    fn test_income_passes_turn() {
        let mut session = started(3);
        session.perform_action("p0", ActionType::Income, None).unwrap();
        assert_eq!(session.player("p0").unwrap().coins(), 3);
        assert_eq!(session.current_player().unwrap().id(), "p1");
        assert_eq!(
            session.perform_action("p0", ActionType::Income, None),
            Err(GameError::NotYourTurn)
        );
    }

    #[test]
    fn test_steal_takes_at_most_balance() {
        let mut session = started(3);
        set_coins(&mut session, "p1", 1);
        session
            .perform_action("p0", ActionType::Steal, Some("p1"))
            .unwrap();
        assert_eq!(session.player("p0").unwrap().coins(), 3);
        assert_eq!(session.player("p1").unwrap().coins(), 0);
    }

    #[test]
    fn test_target_validation() {
        let mut session = started(3);
        assert_eq!(
            session.perform_action("p0", ActionType::Steal, None),
            Err(GameError::TargetRequired(ActionType::Steal))
        );
        assert_eq!(
            session.perform_action("p0", ActionType::Steal, Some("p0")),
            Err(GameError::InvalidTarget("p0".into()))
        );
        assert_eq!(
            session.perform_action("p0", ActionType::Steal, Some("ghost")),
            Err(GameError::InvalidTarget("ghost".into()))
        );
        eliminate(&mut session, "p2");
        assert_eq!(
            session.perform_action("p0", ActionType::Steal, Some("p2")),
            Err(GameError::InvalidTarget("p2".into()))
        );
    }

    #[test]
    fn test_coup_then_lose_influence() {
        let mut session = started(3);
        set_coins(&mut session, "p0", 7);
        session
            .perform_action("p0", ActionType::Coup, Some("p1"))
            .unwrap();
        assert_eq!(session.player("p0").unwrap().coins(), 0);
        assert_eq!(
            session.pending(),
            Some(&Pending::LoseInfluence {
                player: "p1".into()
            })
        );
        assert_eq!(session.current_player().unwrap().id(), "p0");
        assert!(session.legal_actions("p0").is_empty());
        assert_eq!(
            session.lose_influence("p2", Card::Duke),
            Err(GameError::NoPendingDecision)
        );

        let card = session.player("p1").unwrap().cards()[0];
        session.lose_influence("p1", card).unwrap();
        assert_eq!(session.discard_pile(), &[card]);
        assert_eq!(session.player("p1").unwrap().cards().len(), 1);
        assert!(session.pending().is_none());
        assert_eq!(session.current_player().unwrap().id(), "p1");
        assert_eq!(cards_in_play(&session), 15);
    }

    #[test]
    fn test_assassination_can_end_game() {
        let mut session = started(3);
        eliminate(&mut session, "p2");
        let p1_cards = session.player("p1").unwrap().cards().to_vec();
        session.players.get_mut("p1").unwrap().remove_card(p1_cards[0]).unwrap();
        session.discard.push(p1_cards[0]);
        set_coins(&mut session, "p0", 3);

        session
            .perform_action("p0", ActionType::Assassinate, Some("p1"))
            .unwrap();
        session.lose_influence("p1", p1_cards[1]).unwrap();
        assert_eq!(session.state(), SessionState::Finished);
        assert_eq!(session.winner().unwrap().id(), "p0");
        assert_eq!(cards_in_play(&session), 15);
    }

    #[test]
    fn test_must_coup_at_ten() {
        let mut session = started(3);
        set_coins(&mut session, "p0", 10);
        assert_eq!(session.legal_actions("p0"), vec![ActionType::Coup]);
        assert_eq!(
            session.perform_action("p0", ActionType::Tax, None),
            Err(GameError::MustCoup)
        );
        session
            .perform_action("p0", ActionType::Coup, Some("p2"))
            .unwrap();
    }

    #[test]
    fn test_legal_actions_by_balance() {
        let session = started(3);
        assert_eq!(
            session.legal_actions("p0"),
            vec![
                ActionType::Income,
                ActionType::ForeignAid,
                ActionType::Tax,
                ActionType::Exchange,
                ActionType::Steal
            ]
        );
        assert!(session.legal_actions("p1").is_empty());
    }

    #[test]
    fn test_exchange_round_trip() {
        let mut session = started(3);
        session.perform_action("p0", ActionType::Exchange, None).unwrap();
        let drawn = match session.pending() {
            Some(Pending::Exchange { drawn, .. }) => drawn.clone(),
            other => panic!("unexpected pending: {other:?}"),
        };
        assert_eq!(drawn.len(), 2);
        assert_eq!(session.deck().len(), 7);
        assert_eq!(cards_in_play(&session), 15);
        assert_eq!(
            session.private_view("p0").unwrap().exchange_drawn,
            drawn.clone()
        );
        assert!(session.private_view("p1").unwrap().exchange_drawn.is_empty());

        assert_eq!(
            session.complete_exchange("p0", &drawn[..1]),
            Err(GameError::InvalidExchange)
        );
        let foreign: Vec<Card> = Card::ALL
            .into_iter()
            .find(|card| {
                let held = session.player("p0").unwrap().cards();
                !held.contains(card) && !drawn.contains(card)
            })
            .map(|card| vec![card, card])
            .unwrap_or_default();
        if !foreign.is_empty() {
            assert_eq!(
                session.complete_exchange("p0", &foreign),
                Err(GameError::InvalidExchange)
            );
        }

        session.complete_exchange("p0", &drawn).unwrap();
        let mut hand = session.player("p0").unwrap().cards().to_vec();
        let mut expected = drawn.clone();
        hand.sort();
        expected.sort();
        assert_eq!(hand, expected);
        assert_eq!(session.deck().len(), 9);
        assert_eq!(cards_in_play(&session), 15);
        assert_eq!(session.current_player().unwrap().id(), "p1");
    }

    #[test]
    fn test_absent_target_loses_card_automatically() {
        let mut session = started(3);
        session.remove_player("p1").unwrap();
        set_coins(&mut session, "p0", 7);
        session
            .perform_action("p0", ActionType::Coup, Some("p1"))
            .unwrap();
        assert!(session.pending().is_none());
        assert_eq!(session.player("p1").unwrap().cards().len(), 1);
        assert_eq!(session.discard_pile().len(), 1);
        assert_eq!(session.current_player().unwrap().id(), "p1");
    }

    #[test]
    fn test_leaving_mid_exchange_keeps_hand() {
        let mut session = started(3);
        let hand = session.player("p0").unwrap().cards().to_vec();
        session.perform_action("p0", ActionType::Exchange, None).unwrap();
        session.remove_player("p0").unwrap();
        assert!(session.pending().is_none());
        assert_eq!(session.player("p0").unwrap().cards(), hand.as_slice());
        assert_eq!(session.deck().len(), 9);
        assert_eq!(session.current_player().unwrap().id(), "p1");
    }

    #[test]
    fn test_views_hide_other_hands() {
        let session = started(3);
        let public = assert_opening_view(&session);
        assert_eq!(public.players.len(), 3);
        assert!(public.players.iter().all(|p| p.card_count == 2));

        let view = session.private_view("p1").unwrap();
        assert_eq!(view.your_info.public.id, "p1");
        assert_eq!(view.your_info.cards, session.player("p1").unwrap().cards());
        assert!(!view.your_turn);
        assert!(session.private_view("ghost").is_none());
    }

    fn assert_opening_view(session: &GameSession) -> GameView {
        let view = session.public_view();
        assert_eq!(view.current_player.as_deref(), Some("p0"));
        assert_eq!(view.deck_size, 9);
        assert!(view.winner.is_none());
        view
    }

    proptest! {
        #[test]
        fn prop_next_turn_lands_on_living(
            seats in 3usize..=6,
            dead_mask in any::<u8>(),
            steps in 1usize..20,
        ) {
            let mut session = started(seats);
            for i in 0..seats {
                if dead_mask & (1 << i) != 0 {
                    eliminate(&mut session, &format!("p{i}"));
                }
            }
            for _ in 0..steps {
                session.next_turn();
                match session.state() {
                    SessionState::Playing => {
                        let current = session.current_player().unwrap();
                        prop_assert!(current.is_alive());
                    }
                    SessionState::Finished => {
                        prop_assert!(session.alive_players().len() <= 1);
                        break;
                    }
                    other => prop_assert!(false, "unexpected state {other}"),
                }
            }
            prop_assert_eq!(cards_in_play(&session), session.total_cards());
        }

        #[test]
        fn prop_random_play_conserves_cards(seed in any::<u64>(), moves in 1usize..80) {
            let mut session = GameSession::new("g").with_seed(seed);
            for i in 0..4 {
                session.add_player(Player::new(format!("p{i}"), "x")).unwrap();
            }
            session.start_game().unwrap();
            let mut pick = StdRng::seed_from_u64(seed ^ 0x5eed);
            for _ in 0..moves {
                if session.state() != SessionState::Playing {
                    break;
                }
                match session.pending().cloned() {
                    Some(Pending::LoseInfluence { player }) => {
                        let card = session.player(&player).unwrap().cards()[0];
                        session.lose_influence(&player, card).unwrap();
                    }
                    Some(Pending::Exchange { player, drawn }) => {
                        let keep = drawn[..session.player(&player).unwrap().cards().len()].to_vec();
                        session.complete_exchange(&player, &keep).unwrap();
                    }
                    None => {
                        let actor = session.current_player().unwrap().id().to_string();
                        let legal = session.legal_actions(&actor);
                        let action = legal[rand::Rng::gen_range(&mut pick, 0..legal.len())];
                        let target = session
                            .turn_order()
                            .iter()
                            .find(|id| **id != actor && session.player(id).unwrap().is_alive())
                            .cloned();
                        session.perform_action(&actor, action, target.as_deref()).unwrap();
                    }
                }
                prop_assert_eq!(cards_in_play(&session), session.total_cards());
            }
        }
    }
}
