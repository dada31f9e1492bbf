//! Position types

use crate::exchange::{ExchangeError, OrderSide, Symbol};
use crate::retry::RetryError;
use crate::scanner::TriggerReason;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Engine phase derived from whether a position is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    /// No position, scanning for an entry
    Searching,
    /// Holding, trailing exit not yet enabled
    EnteredUnarmed,
    /// Holding, trailing exit enabled
    EnteredArmed,
}

impl PositionState {
    pub fn of(position: Option<&Position>) -> Self {
        match position {
            None => PositionState::Searching,
            Some(p) if p.is_armed() => PositionState::EnteredArmed,
            Some(_) => PositionState::EnteredUnarmed,
        }
    }
}

/// An open position.
///
/// The trailing reference can only move up and the armed flag can only be
/// set, so both are reachable only through [`Position::ratchet`] and
/// [`Position::arm`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Log correlation id
    pub id: Uuid,
    pub symbol: Symbol,
    entry_price: Decimal,
    trailing_price: Decimal,
    /// Base units bought, `None` until a post-fill balance was observed
    pub size: Option<Decimal>,
    /// Base balance observed before the entry order
    pub baseline_balance: Decimal,
    trailing_armed: bool,
    pub opened_at: DateTime<Utc>,
    pub entry_order_id: String,
    pub trigger: TriggerReason,
}

impl Position {
    pub fn new(
        symbol: Symbol,
        entry_price: Decimal,
        size: Option<Decimal>,
        baseline_balance: Decimal,
        entry_order_id: impl Into<String>,
        trigger: TriggerReason,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol,
            entry_price,
            trailing_price: entry_price,
            size,
            baseline_balance,
            trailing_armed: false,
            opened_at: Utc::now(),
            entry_order_id: entry_order_id.into(),
            trigger,
        }
    }

    pub fn entry_price(&self) -> Decimal {
        self.entry_price
    }

    /// Highest reference price recorded since entry
    pub fn trailing_price(&self) -> Decimal {
        self.trailing_price
    }

    pub fn is_armed(&self) -> bool {
        self.trailing_armed
    }

    pub fn state(&self) -> PositionState {
        PositionState::of(Some(self))
    }

    /// Enable the trailing exit. Returns true if it was not armed before.
    pub fn arm(&mut self) -> bool {
        let newly = !self.trailing_armed;
        self.trailing_armed = true;
        newly
    }

    /// Raise the trailing reference to `price`.
    ///
    /// Returns the previous reference, or `None` if `price` is not above it.
    pub fn ratchet(&mut self, price: Decimal) -> Option<Decimal> {
        if price <= self.trailing_price {
            return None;
        }
        let old = self.trailing_price;
        self.trailing_price = price;
        Some(old)
    }

    /// Size that can be sold, if known and positive
    pub fn sellable_size(&self) -> Option<Decimal> {
        self.size.filter(|s| *s > Decimal::ZERO)
    }
}

/// A position closed by a confirmed sell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position: Position,
    pub exit_price: Decimal,
    pub exit_order_id: Option<String>,
    /// Quantity submitted after precision truncation
    pub sold_qty: Decimal,
    /// Change from entry to exit, in percent
    pub realized_pct: Decimal,
    pub closed_at: DateTime<Utc>,
}

/// Result of managing a held position for one tick
#[derive(Debug, Clone)]
pub enum ManageOutcome {
    /// Still holding
    Hold,
    /// Sold, now flat
    Closed(ClosedTrade),
    /// Exit reached but the size was unknown; flat without selling
    Abandoned,
}

/// Position transition failures
#[derive(Debug, Error)]
pub enum TradeError {
    /// A gateway call failed
    #[error(transparent)]
    Exchange(#[from] RetryError<ExchangeError>),
    /// Order value is under the instrument minimum
    #[error("Order value {notional} for {symbol} below exchange minimum {minimum}")]
    BelowMinimum {
        symbol: Symbol,
        notional: Decimal,
        minimum: Decimal,
    },
    /// The exchange answered with a non-success status
    #[error("{side:?} order for {symbol} rejected ({code}): {message}")]
    Rejected {
        side: OrderSide,
        symbol: Symbol,
        code: i64,
        message: String,
    },
}
