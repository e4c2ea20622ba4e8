//! Character cards.
//!
//! Each card grants at most one character action and may block some of the
//! blockable actions. The pairings are fixed:
//!
//! | Card       | Performs    | Blocks       |
//! |------------|-------------|--------------|
//! | Duke       | Tax         | Foreign Aid  |
//! | Assassin   | Assassinate | -            |
//! | Ambassador | Exchange    | Steal        |
//! | Captain    | Steal       | Steal        |
//! | Contessa   | -           | Assassinate  |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ActionType;

/// Number of distinct character kinds in a deck.
pub const CARD_KINDS: usize = 5;

/// Copies of each character in the standard (3-6 player) deck.
pub const STANDARD_COPIES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Card {
    Duke,
    Assassin,
    Ambassador,
    Captain,
    Contessa,
}

impl Card {
    pub const ALL: [Card; CARD_KINDS] = [
        Card::Duke,
        Card::Assassin,
        Card::Ambassador,
        Card::Captain,
        Card::Contessa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Card::Duke => "Duke",
            Card::Assassin => "Assassin",
            Card::Ambassador => "Ambassador",
            Card::Captain => "Captain",
            Card::Contessa => "Contessa",
        }
    }

    /// Returns true if holding this card entitles the owner to `action`.
    ///
    /// Non-character actions never require a card, so they return false for
    /// every card.
    pub fn can_perform_action(&self, action: ActionType) -> bool {
        action.required_card() == Some(*self)
    }

    /// Returns true if this card may block `action`.
    pub fn can_block(&self, action: ActionType) -> bool {
        match action {
            ActionType::ForeignAid => *self == Card::Duke,
            ActionType::Assassinate => *self == Card::Contessa,
            ActionType::Steal => matches!(self, Card::Ambassador | Card::Captain),
            _ => false,
        }
    }

    /// Builds an unshuffled deck holding `copies` of every character,
    /// grouped by kind.
    pub fn deck(copies: usize) -> Vec<Card> {
        Card::ALL
            .iter()
            .flat_map(|card| std::iter::repeat(*card).take(copies))
            .collect()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
