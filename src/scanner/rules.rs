//! Entry conditions and candidate ranking

use super::{Candidate, Observation, TriggerReason};
use crate::config::StrategyConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Entry thresholds and their lookback windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRules {
    /// Minimum fast-window rise, in percent
    pub quick_rise_pct: Decimal,
    pub quick_window_hours: u32,
    /// Maximum (most negative) slow-window change, in percent
    pub drop_pct: Decimal,
    pub slow_window_hours: u32,
}

impl Default for EntryRules {
    fn default() -> Self {
        Self {
            quick_rise_pct: dec!(3),
            quick_window_hours: 1,
            drop_pct: dec!(-3),
            slow_window_hours: 3,
        }
    }
}

impl From<&StrategyConfig> for EntryRules {
    fn from(config: &StrategyConfig) -> Self {
        Self {
            quick_rise_pct: config.quick_rise_threshold,
            quick_window_hours: config.quick_window_hours,
            drop_pct: config.price_drop_threshold,
            slow_window_hours: config.slow_window_hours,
        }
    }
}

impl EntryRules {
    /// Turn an observation into a candidate if either entry condition holds.
    ///
    /// The quick rise is checked first; its magnitude becomes the score.
    pub fn evaluate(&self, observation: &Observation) -> Option<Candidate> {
        let (score, trigger_reason) = if observation.quick_change_pct >= self.quick_rise_pct {
            (observation.quick_change_pct.abs(), TriggerReason::QuickRise)
        } else if observation.window_change_pct <= self.drop_pct {
            (observation.window_change_pct.abs(), TriggerReason::SlowDrop)
        } else {
            return None;
        };

        Some(Candidate {
            symbol: observation.symbol.clone(),
            current_price: observation.current_price,
            window_change_pct: observation.window_change_pct,
            quick_change_pct: observation.quick_change_pct,
            score,
            trigger_reason,
        })
    }
}

/// Highest-scoring candidate; on equal scores the earlier one wins
pub fn select_best(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
    candidates.into_iter().fold(None, |best, candidate| match best {
        Some(b) if b.score >= candidate.score => Some(b),
        _ => Some(candidate),
    })
}
