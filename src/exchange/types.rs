//! Gateway request and response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Exchange product category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Spot,
    Linear,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Spot => "spot",
            Category::Linear => "linear",
        }
    }
}

/// Trading pair, e.g. XRP quoted in USDT
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    /// Asset being traded
    pub base: String,
    /// Pricing currency
    pub quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

/// Order type. Only market orders are placed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
}

/// Unit the order quantity is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarketUnit {
    /// Quantity is a quote-currency notional
    QuoteCoin,
    /// Quantity is an amount of the base asset
    BaseCoin,
}

impl MarketUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketUnit::QuoteCoin => "quoteCoin",
            MarketUnit::BaseCoin => "baseCoin",
        }
    }
}

/// An order to be submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub category: Category,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub qty: Decimal,
    pub unit: MarketUnit,
}

impl OrderRequest {
    /// Market buy spending `notional` of the quote currency
    pub fn market_buy(category: Category, symbol: Symbol, notional: Decimal) -> Self {
        Self {
            category,
            symbol,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            qty: notional,
            unit: MarketUnit::QuoteCoin,
        }
    }

    /// Market sell of `qty` base units
    pub fn market_sell(category: Category, symbol: Symbol, qty: Decimal) -> Self {
        Self {
            category,
            symbol,
            side: OrderSide::Sell,
            order_type: OrderType::Market,
            qty,
            unit: MarketUnit::BaseCoin,
        }
    }
}

/// Exchange acknowledgement of an order submission.
///
/// A transport-level success can still carry a rejection in `status_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAck {
    pub status_code: i64,
    pub order_id: Option<String>,
    pub message: String,
}

impl OrderAck {
    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }
}

/// Minimum order constraints for an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentLimits {
    /// Minimum quantity in base units
    pub min_qty: Decimal,
    /// Minimum order value in quote units
    pub min_notional: Decimal,
}
