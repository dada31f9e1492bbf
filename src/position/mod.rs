//! Position state machine
//!
//! A single position moves through Searching, EnteredUnarmed and
//! EnteredArmed. The trailing exit only fires once the position has been
//! armed by a minimum gain from entry, and the trailing reference price is
//! only ever raised.

mod manager;
mod rules;
mod types;

pub use manager::PositionManager;
pub use rules::{TickDecision, TrailingRules};
pub use types::{ClosedTrade, ManageOutcome, Position, PositionState, TradeError};
