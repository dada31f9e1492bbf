//! Trailing-stop rules

use super::Position;
use crate::config::StrategyConfig;
use crate::numeric::pct_change;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Thresholds of the profit-gated trailing stop, in percent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailingRules {
    /// Gain from entry that enables the trailing exit
    pub minimum_profit_pct: Decimal,
    /// Gain over the trailing reference that raises it
    pub trailing_update_pct: Decimal,
    /// Change from the trailing reference that exits (negative)
    pub trailing_drop_pct: Decimal,
}

impl Default for TrailingRules {
    fn default() -> Self {
        Self {
            minimum_profit_pct: dec!(2),
            trailing_update_pct: dec!(3),
            trailing_drop_pct: dec!(-1),
        }
    }
}

impl From<&StrategyConfig> for TrailingRules {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            minimum_profit_pct: config.minimum_profit_threshold,
            trailing_update_pct: config.trailing_update_threshold,
            trailing_drop_pct: config.trailing_drop_threshold,
        }
    }
}

/// What one price observation did to a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickDecision {
    pub from_entry_pct: Decimal,
    /// Measured against the reference before any ratchet on this tick
    pub from_trailing_pct: Decimal,
    /// The trailing exit was enabled on this tick
    pub armed_now: bool,
    /// Old and new reference when it was raised on this tick
    pub ratchet: Option<(Decimal, Decimal)>,
    pub exit: bool,
}

impl TrailingRules {
    /// Apply one price observation to `position`.
    ///
    /// Arming is checked first. A ratchet and an exit never happen on the
    /// same tick, and an exit needs the position to be armed.
    pub fn evaluate(&self, position: &mut Position, current_price: Decimal) -> TickDecision {
        let from_entry_pct = pct_change(position.entry_price(), current_price);
        let from_trailing_pct = pct_change(position.trailing_price(), current_price);

        let armed_now = from_entry_pct >= self.minimum_profit_pct && position.arm();

        let mut ratchet = None;
        let mut exit = false;
        if from_trailing_pct >= self.trailing_update_pct {
            ratchet = position
                .ratchet(current_price)
                .map(|old| (old, current_price));
        } else if position.is_armed() && from_trailing_pct <= self.trailing_drop_pct {
            exit = true;
        }

        TickDecision {
            from_entry_pct,
            from_trailing_pct,
            armed_now,
            ratchet,
            exit,
        }
    }

    /// Gain still needed before the trailing exit is enabled
    pub fn remaining_to_arm(&self, from_entry_pct: Decimal) -> Decimal {
        (self.minimum_profit_pct - from_entry_pct).max(Decimal::ZERO)
    }
}
