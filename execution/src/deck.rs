//! Court deck.
//!
//! The head of the deck is the front of the queue; dealing and drawing take
//! from the head, returned cards go to the tail before a reshuffle.

use coup_types::Card;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;

use crate::GameError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Deck {
    cards: VecDeque<Card>,
}

impl Deck {
    /// Unshuffled deck with `copies` of every character.
    pub fn new(copies: usize) -> Self {
        Self {
            cards: Card::deck(copies).into(),
        }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn count(&self, card: Card) -> usize {
        self.cards.iter().filter(|held| **held == card).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }

    /// Uniform Fisher-Yates shuffle.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards.make_contiguous().shuffle(rng);
    }

    /// Draws `n` cards from the head, or none at all.
    pub fn draw_many(&mut self, n: usize) -> Result<Vec<Card>, GameError> {
        if self.cards.len() < n {
            return Err(GameError::DeckExhausted {
                needed: n,
                remaining: self.cards.len(),
            });
        }
        Ok(self.cards.drain(..n).collect())
    }

    pub fn put_back(&mut self, cards: impl IntoIterator<Item = Card>) {
        self.cards.extend(cards);
    }
}
