//! Paper trading exchange with simulated fills
//!
//! Prices and instrument limits come from a real gateway; orders fill
//! immediately at the last price against an in-memory wallet.

use super::{
    Category, ExchangeError, InstrumentLimits, MarketData, OrderAck, OrderGateway, OrderRequest,
    OrderSide, Symbol,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

const INSUFFICIENT_BALANCE: i64 = 170131;
const INVALID_QTY: i64 = 170136;

/// Paper exchange wrapping a live data source
pub struct PaperExchange<M> {
    inner: M,
    fee_rate: Decimal,
    balances: Arc<RwLock<HashMap<String, Decimal>>>,
}

impl<M> PaperExchange<M> {
    /// Create a paper exchange holding `quote_balance` of `quote_coin`
    pub fn new(inner: M, fee_rate: Decimal, quote_coin: &str, quote_balance: Decimal) -> Self {
        let mut balances = HashMap::new();
        balances.insert(quote_coin.to_uppercase(), quote_balance);
        Self {
            inner,
            fee_rate,
            balances: Arc::new(RwLock::new(balances)),
        }
    }

    /// Snapshot of all simulated balances
    pub async fn balances(&self) -> HashMap<String, Decimal> {
        self.balances.read().await.clone()
    }

    fn reject(code: i64, message: impl Into<String>) -> OrderAck {
        OrderAck {
            status_code: code,
            order_id: None,
            message: message.into(),
        }
    }
}

#[async_trait]
impl<M: MarketData + OrderGateway> MarketData for PaperExchange<M> {
    async fn get_price(
        &self,
        category: Category,
        symbol: &Symbol,
    ) -> Result<Decimal, ExchangeError> {
        self.inner.get_price(category, symbol).await
    }

    async fn get_price_change(
        &self,
        category: Category,
        symbol: &Symbol,
        lookback_hours: u32,
    ) -> Result<Decimal, ExchangeError> {
        self.inner
            .get_price_change(category, symbol, lookback_hours)
            .await
    }
}

#[async_trait]
impl<M: MarketData + OrderGateway> OrderGateway for PaperExchange<M> {
    async fn get_wallet_balance(&self, coin: &str) -> Result<Decimal, ExchangeError> {
        let balances = self.balances.read().await;
        Ok(balances
            .get(&coin.to_uppercase())
            .copied()
            .unwrap_or_default())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        if order.qty <= Decimal::ZERO {
            return Ok(Self::reject(INVALID_QTY, "Order quantity must be positive"));
        }

        let price = self.inner.get_price(order.category, &order.symbol).await?;
        if price <= Decimal::ZERO {
            return Err(ExchangeError::Parse(format!(
                "non-positive price {} for {}",
                price, order.symbol
            )));
        }

        let base = order.symbol.base.clone();
        let quote = order.symbol.quote.clone();
        let keep = Decimal::ONE - self.fee_rate;

        let mut balances = self.balances.write().await;
        let held_base = balances.get(&base).copied().unwrap_or_default();
        let held_quote = balances.get(&quote).copied().unwrap_or_default();

        let (new_base, new_quote) = match order.side {
            OrderSide::Buy => {
                if held_quote < order.qty {
                    return Ok(Self::reject(INSUFFICIENT_BALANCE, "Insufficient balance"));
                }
                (held_base + order.qty / price * keep, held_quote - order.qty)
            }
            OrderSide::Sell => {
                if held_base < order.qty {
                    return Ok(Self::reject(INSUFFICIENT_BALANCE, "Insufficient balance"));
                }
                (held_base - order.qty, held_quote + order.qty * price * keep)
            }
        };

        balances.insert(base, new_base);
        balances.insert(quote, new_quote);

        let order_id = Uuid::new_v4().to_string();
        tracing::info!(
            order_id = %order_id,
            symbol = %order.symbol,
            side = order.side.as_str(),
            qty = %order.qty,
            price = %price,
            "Paper order filled"
        );

        Ok(OrderAck {
            status_code: 0,
            order_id: Some(order_id),
            message: "OK".to_string(),
        })
    }

    async fn get_instrument_min_order(
        &self,
        category: Category,
        symbol: &Symbol,
    ) -> Result<InstrumentLimits, ExchangeError> {
        self.inner.get_instrument_min_order(category, symbol).await
    }
}
