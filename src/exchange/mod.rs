//! Exchange gateways
//!
//! Market data and order submission behind two traits, with a Bybit v5 REST
//! implementation and a paper exchange that simulates fills.

mod bybit;
mod error;
mod paper;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use bybit::{BybitClient, BybitConfig, Credentials, BYBIT_API_URL};
pub use error::ExchangeError;
pub use paper::PaperExchange;
pub use types::{
    Category, InstrumentLimits, MarketUnit, OrderAck, OrderRequest, OrderSide, OrderType, Symbol,
};

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Read-only market data
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Last traded price
    async fn get_price(&self, category: Category, symbol: &Symbol)
        -> Result<Decimal, ExchangeError>;

    /// Percentage change between the most recent hourly close and the close
    /// `lookback_hours` periods earlier
    async fn get_price_change(
        &self,
        category: Category,
        symbol: &Symbol,
        lookback_hours: u32,
    ) -> Result<Decimal, ExchangeError>;
}

/// Account and order operations
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Wallet balance of a single coin (zero when the coin is not held)
    async fn get_wallet_balance(&self, coin: &str) -> Result<Decimal, ExchangeError>;

    /// Submit an order. Exchange-side rejections come back as a non-success
    /// [`OrderAck`], not as an error.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    /// Minimum order constraints for a symbol
    async fn get_instrument_min_order(
        &self,
        category: Category,
        symbol: &Symbol,
    ) -> Result<InstrumentLimits, ExchangeError>;
}
