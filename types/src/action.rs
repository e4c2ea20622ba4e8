use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Card;

/// Coins at or above which the only legal action is a coup.
pub const MUST_COUP_THRESHOLD: u32 = 10;

/// Turn actions. Cost, reward, required card and blockability are derived
/// from the variant and never stored per instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Income,
    Coup,
    ForeignAid,
    Tax,
    Assassinate,
    Exchange,
    Steal,
}

impl ActionType {
    pub const ALL: [ActionType; 7] = [
        ActionType::Income,
        ActionType::Coup,
        ActionType::ForeignAid,
        ActionType::Tax,
        ActionType::Assassinate,
        ActionType::Exchange,
        ActionType::Steal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Income => "Income",
            ActionType::Coup => "Coup",
            ActionType::ForeignAid => "Foreign Aid",
            ActionType::Tax => "Tax",
            ActionType::Assassinate => "Assassinate",
            ActionType::Exchange => "Exchange",
            ActionType::Steal => "Steal",
        }
    }

    /// Coins the actor pays up front.
    pub fn cost(&self) -> u32 {
        match self {
            ActionType::Coup => 7,
            ActionType::Assassinate => 3,
            _ => 0,
        }
    }

    /// Coins the actor gains. For Steal the coins come from the target.
    pub fn reward(&self) -> u32 {
        match self {
            ActionType::Income => 1,
            ActionType::ForeignAid => 2,
            ActionType::Tax => 3,
            ActionType::Steal => 2,
            _ => 0,
        }
    }

    /// The character the actor claims when taking this action.
    pub fn required_card(&self) -> Option<Card> {
        match self {
            ActionType::Tax => Some(Card::Duke),
            ActionType::Assassinate => Some(Card::Assassin),
            ActionType::Exchange => Some(Card::Ambassador),
            ActionType::Steal => Some(Card::Captain),
            _ => None,
        }
    }

    pub fn can_be_blocked(&self) -> bool {
        matches!(
            self,
            ActionType::ForeignAid | ActionType::Assassinate | ActionType::Steal
        )
    }

    /// Actions aimed at another player.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            ActionType::Coup | ActionType::Assassinate | ActionType::Steal
        )
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
