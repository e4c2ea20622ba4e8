use coup_types::{ActionType, Card, PlayerView, PrivatePlayerView, MUST_COUP_THRESHOLD};

use crate::GameError;

/// Coins every player starts with.
pub const STARTING_COINS: u32 = 2;

/// Cards held by a fully alive player.
pub const HAND_SIZE: usize = 2;

/// One seat at a table.
///
/// `is_alive` drops to false when the last card leaves the hand and never
/// comes back. `is_active` drops to false when the player leaves a running
/// game; an inactive player keeps their cards and still counts as alive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Player {
    id: String,
    name: String,
    coins: u32,
    cards: Vec<Card>,
    is_alive: bool,
    is_active: bool,
}

impl Player {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            coins: STARTING_COINS,
            cards: Vec::with_capacity(HAND_SIZE),
            is_alive: true,
            is_active: true,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coins(&self) -> u32 {
        self.coins
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn add_card(&mut self, card: Card) -> Result<(), GameError> {
        if self.cards.len() >= HAND_SIZE {
            return Err(GameError::HandFull(self.cards.len()));
        }
        self.cards.push(card);
        Ok(())
    }

    /// Removes one copy of `card`. Emptying the hand eliminates the player.
    pub fn remove_card(&mut self, card: Card) -> Result<(), GameError> {
        let index = self
            .cards
            .iter()
            .position(|held| *held == card)
            .ok_or(GameError::CardNotHeld(card))?;
        self.cards.remove(index);
        if self.cards.is_empty() {
            self.is_alive = false;
        }
        Ok(())
    }

    /// Applies a signed delta, flooring the balance at zero.
    pub fn add_coins(&mut self, delta: i64) {
        let next = i64::from(self.coins).saturating_add(delta).max(0);
        self.coins = u32::try_from(next).unwrap_or(u32::MAX);
    }

    /// Debits `amount`, or leaves the balance untouched.
    pub fn remove_coins(&mut self, amount: u32) -> Result<(), GameError> {
        if self.coins < amount {
            return Err(GameError::InsufficientFunds {
                has: self.coins,
                needs: amount,
            });
        }
        self.coins -= amount;
        Ok(())
    }

    pub fn can_afford(&self, action: ActionType) -> bool {
        self.coins >= action.cost()
    }

    pub fn must_coup(&self) -> bool {
        self.coins >= MUST_COUP_THRESHOLD
    }

    pub fn public_view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            coins: self.coins,
            card_count: self.cards.len(),
            is_alive: self.is_alive,
            is_active: self.is_active,
        }
    }

    /// Only ever addressed to this player.
    pub fn private_view(&self) -> PrivatePlayerView {
        PrivatePlayerView {
            public: self.public_view(),
            cards: self.cards.clone(),
        }
    }

    pub(crate) fn deactivate(&mut self) {
        self.is_active = false;
    }

    /// Swaps in a hand of the same size after an exchange.
    pub(crate) fn replace_hand(&mut self, cards: Vec<Card>) {
        debug_assert_eq!(cards.len(), self.cards.len());
        self.cards = cards;
    }
}
