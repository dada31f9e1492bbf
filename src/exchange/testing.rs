//! Scripted exchange for unit tests

use super::{
    Category, ExchangeError, InstrumentLimits, MarketData, OrderAck, OrderGateway, OrderRequest,
    OrderSide, Symbol,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    prices: HashMap<String, Decimal>,
    changes: HashMap<(String, u32), Decimal>,
    balances: HashMap<String, Decimal>,
    price_failures: HashMap<String, u32>,
    balance_calls: u32,
    /// Failing balance calls, as 1-based call numbers `[from, to)`
    balance_failures: Option<(u32, u32)>,
    fail_changes: bool,
    change_calls: u32,
    fail_all_prices: bool,
    reject_next_order: Option<(i64, String)>,
    fill_qty: Option<Decimal>,
    orders: Vec<OrderRequest>,
    limits: Option<InstrumentLimits>,
    price_calls: u32,
}

/// In-memory exchange whose prices, changes and failures are set by the test
#[derive(Default)]
pub struct ScriptedExchange {
    state: Mutex<State>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state.lock().unwrap().prices.insert(symbol.to_string(), price);
    }

    pub fn set_change(&self, symbol: &str, hours: u32, pct: Decimal) {
        self.state
            .lock()
            .unwrap()
            .changes
            .insert((symbol.to_string(), hours), pct);
    }

    pub fn set_balance(&self, coin: &str, amount: Decimal) {
        self.state.lock().unwrap().balances.insert(coin.to_string(), amount);
    }

    pub fn balance(&self, coin: &str) -> Decimal {
        self.state
            .lock()
            .unwrap()
            .balances
            .get(coin)
            .copied()
            .unwrap_or_default()
    }

    /// Fail the next `n` price fetches for `symbol` with a network error
    pub fn fail_prices(&self, symbol: &str, n: u32) {
        self.state
            .lock()
            .unwrap()
            .price_failures
            .insert(symbol.to_string(), n);
    }

    pub fn fail_all_prices(&self, fail: bool) {
        self.state.lock().unwrap().fail_all_prices = fail;
    }

    /// Let the next `skip` balance fetches through, then fail `n` of them
    pub fn fail_balances(&self, skip: u32, n: u32) {
        let mut state = self.state.lock().unwrap();
        let from = state.balance_calls + skip + 1;
        state.balance_failures = Some((from, from + n));
    }

    pub fn fail_changes(&self, fail: bool) {
        self.state.lock().unwrap().fail_changes = fail;
    }

    pub fn change_calls(&self) -> u32 {
        self.state.lock().unwrap().change_calls
    }

    pub fn reject_next_order(&self, code: i64, message: &str) {
        self.state.lock().unwrap().reject_next_order = Some((code, message.to_string()));
    }

    /// Base quantity credited by the next buys; defaults to notional / price
    pub fn set_fill_qty(&self, qty: Decimal) {
        self.state.lock().unwrap().fill_qty = Some(qty);
    }

    pub fn set_limits(&self, limits: InstrumentLimits) {
        self.state.lock().unwrap().limits = Some(limits);
    }

    pub fn orders(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().orders.clone()
    }

    pub fn price_calls(&self) -> u32 {
        self.state.lock().unwrap().price_calls
    }
}

#[async_trait]
impl MarketData for ScriptedExchange {
    async fn get_price(
        &self,
        _category: Category,
        symbol: &Symbol,
    ) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        state.price_calls += 1;
        let key = symbol.to_string();
        if state.fail_all_prices {
            return Err(ExchangeError::Network("scripted outage".into()));
        }
        if let Some(remaining) = state.price_failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ExchangeError::Network("scripted failure".into()));
            }
        }
        state
            .prices
            .get(&key)
            .copied()
            .ok_or(ExchangeError::SymbolNotFound(key))
    }

    async fn get_price_change(
        &self,
        _category: Category,
        symbol: &Symbol,
        lookback_hours: u32,
    ) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        state.change_calls += 1;
        if state.fail_changes {
            return Err(ExchangeError::Timeout("scripted kline timeout".into()));
        }
        Ok(state
            .changes
            .get(&(symbol.to_string(), lookback_hours))
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrderGateway for ScriptedExchange {
    async fn get_wallet_balance(&self, coin: &str) -> Result<Decimal, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        state.balance_calls += 1;
        let call = state.balance_calls;
        if state
            .balance_failures
            .is_some_and(|(from, to)| (from..to).contains(&call))
        {
            return Err(ExchangeError::Timeout("scripted balance timeout".into()));
        }
        Ok(state.balances.get(coin).copied().unwrap_or_default())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut state = self.state.lock().unwrap();
        state.orders.push(order.clone());

        if let Some((code, message)) = state.reject_next_order.take() {
            return Ok(OrderAck {
                status_code: code,
                order_id: None,
                message,
            });
        }

        let base = order.symbol.base.clone();
        let price = state
            .prices
            .get(&order.symbol.to_string())
            .copied()
            .unwrap_or(dec!(1));
        let held = state.balances.get(&base).copied().unwrap_or_default();
        let updated = match order.side {
            OrderSide::Buy => held + state.fill_qty.unwrap_or(order.qty / price),
            OrderSide::Sell => held - order.qty,
        };
        state.balances.insert(base, updated);

        Ok(OrderAck {
            status_code: 0,
            order_id: Some(format!("scripted-{}", state.orders.len())),
            message: "OK".to_string(),
        })
    }

    async fn get_instrument_min_order(
        &self,
        _category: Category,
        _symbol: &Symbol,
    ) -> Result<InstrumentLimits, ExchangeError> {
        Ok(self.state.lock().unwrap().limits.unwrap_or(InstrumentLimits {
            min_qty: dec!(0.1),
            min_notional: dec!(1),
        }))
    }
}
