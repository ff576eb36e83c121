//! Player resources for the vending tycoon game
//!
//! Tracks the player's cash and unlocked research. Prices live in the
//! catalog and config; this module only keeps the books.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::catalog::ResearchKind;
use super::error::ValidationError;
use super::types::Cents;

/// Starting cash for the player when no config overrides it
pub const STARTING_CASH: Cents = 200_000;

/// Player progress and resources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// Player's current cash
    pub cash: Cents,

    /// Cash collected from machines over the whole game
    pub total_collected: Cents,

    /// Cash spent on purchases, repairs and research
    pub total_spent: Cents,

    pub unlocked_research: BTreeSet<ResearchKind>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(STARTING_CASH)
    }
}

impl GameState {
    pub fn new(starting_cash: Cents) -> Self {
        Self {
            cash: starting_cash,
            total_collected: 0,
            total_spent: 0,
            unlocked_research: BTreeSet::new(),
        }
    }

    /// Check if player can afford a purchase
    pub fn can_afford(&self, cost: Cents) -> bool {
        self.cash >= cost
    }

    /// Fail without side effects unless `cost` is affordable
    pub fn ensure_affordable(&self, cost: Cents) -> Result<(), ValidationError> {
        if self.can_afford(cost) {
            Ok(())
        } else {
            Err(ValidationError::InsufficientFunds {
                needed: cost,
                available: self.cash,
            })
        }
    }

    /// Deduct cash for a purchase
    pub fn spend(&mut self, cost: Cents) -> Result<(), ValidationError> {
        self.ensure_affordable(cost)?;
        self.cash -= cost;
        self.total_spent += cost;
        Ok(())
    }

    /// Add cash collected from a machine
    pub fn collect(&mut self, amount: Cents) {
        self.cash += amount;
        self.total_collected += amount;
    }

    pub fn has_research(&self, kind: ResearchKind) -> bool {
        self.unlocked_research.contains(&kind)
    }

    /// Pay for and record a research unlock
    pub fn unlock_research(&mut self, kind: ResearchKind) -> Result<(), ValidationError> {
        if self.has_research(kind) {
            return Err(ValidationError::ResearchAlreadyUnlocked(kind));
        }
        self.spend(kind.cost())?;
        self.unlocked_research.insert(kind);
        Ok(())
    }

    /// Get a summary string for display
    pub fn summary(&self) -> String {
        format!(
            "Cash: ${}.{:02} | Collected: ${}.{:02} | Research: {}",
            self.cash / 100,
            (self.cash % 100).abs(),
            self.total_collected / 100,
            self.total_collected % 100,
            self.unlocked_research.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spending_checks_funds() {
        let mut state = GameState::new(1_000);
        state.spend(400).unwrap();
        assert_eq!(state.cash, 600);

        assert_eq!(
            state.spend(601),
            Err(ValidationError::InsufficientFunds {
                needed: 601,
                available: 600
            })
        );
        assert_eq!(state.cash, 600);
        assert_eq!(state.total_spent, 400);
    }

    #[test]
    fn research_unlocks_once() {
        let mut state = GameState::new(ResearchKind::FasterTrucks.cost() * 2);
        state.unlock_research(ResearchKind::FasterTrucks).unwrap();
        assert!(state.has_research(ResearchKind::FasterTrucks));
        assert_eq!(
            state.unlock_research(ResearchKind::FasterTrucks),
            Err(ValidationError::ResearchAlreadyUnlocked(ResearchKind::FasterTrucks))
        );
        assert_eq!(state.cash, ResearchKind::FasterTrucks.cost());
    }

    #[test]
    fn summary_formats_dollars() {
        let mut state = GameState::new(1_205);
        state.collect(50);
        assert_eq!(state.summary(), "Cash: $12.55 | Collected: $0.50 | Research: 0");
    }
}
