//! Scanner types

use crate::exchange::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which entry condition a candidate met
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerReason {
    /// Fast-window change at or above the quick-rise threshold
    QuickRise,
    /// Slow-window change at or below the drop threshold
    SlowDrop,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::QuickRise => write!(f, "quick rise"),
            TriggerReason::SlowDrop => write!(f, "slow drop"),
        }
    }
}

/// Market snapshot of one symbol taken during a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub symbol: Symbol,
    pub current_price: Decimal,
    /// Change over the slow window, in percent
    pub window_change_pct: Decimal,
    /// Change over the fast window, in percent
    pub quick_change_pct: Decimal,
}

/// A symbol that met an entry condition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub symbol: Symbol,
    pub current_price: Decimal,
    pub window_change_pct: Decimal,
    pub quick_change_pct: Decimal,
    /// Magnitude of the change that crossed its threshold
    pub score: Decimal,
    pub trigger_reason: TriggerReason,
}
