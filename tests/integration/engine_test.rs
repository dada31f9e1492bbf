//! Engine driven over the paper exchange

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use trailstop::config::Config;
use trailstop::engine::{start, Engine, StartParams, TickOutcome};
use trailstop::exchange::{
    Category, ExchangeError, InstrumentLimits, MarketData, OrderAck, OrderGateway, OrderRequest,
    PaperExchange, Symbol,
};
use trailstop::position::PositionState;

/// Market data source whose prices the test moves by hand
#[derive(Default)]
struct MovingMarket {
    prices: Mutex<HashMap<String, Decimal>>,
    changes: Mutex<HashMap<(String, u32), Decimal>>,
}

impl MovingMarket {
    fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    fn set_change(&self, symbol: &str, hours: u32, pct: Decimal) {
        self.changes
            .lock()
            .unwrap()
            .insert((symbol.to_string(), hours), pct);
    }
}

#[async_trait]
impl MarketData for MovingMarket {
    async fn get_price(&self, _: Category, symbol: &Symbol) -> Result<Decimal, ExchangeError> {
        self.prices
            .lock()
            .unwrap()
            .get(&symbol.to_string())
            .copied()
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))
    }

    async fn get_price_change(
        &self,
        _: Category,
        symbol: &Symbol,
        lookback_hours: u32,
    ) -> Result<Decimal, ExchangeError> {
        Ok(self
            .changes
            .lock()
            .unwrap()
            .get(&(symbol.to_string(), lookback_hours))
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl OrderGateway for MovingMarket {
    async fn get_wallet_balance(&self, _: &str) -> Result<Decimal, ExchangeError> {
        Err(ExchangeError::Unauthorized("market data only".into()))
    }

    async fn place_order(&self, _: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        Err(ExchangeError::Unauthorized("market data only".into()))
    }

    async fn get_instrument_min_order(
        &self,
        _: Category,
        _: &Symbol,
    ) -> Result<InstrumentLimits, ExchangeError> {
        Ok(InstrumentLimits {
            min_qty: dec!(1),
            min_notional: dec!(5),
        })
    }
}

/// Shared handle so the test can move prices while the engine owns the exchange
struct Shared(Arc<MovingMarket>);

#[async_trait]
impl MarketData for Shared {
    async fn get_price(&self, c: Category, s: &Symbol) -> Result<Decimal, ExchangeError> {
        self.0.get_price(c, s).await
    }

    async fn get_price_change(
        &self,
        c: Category,
        s: &Symbol,
        h: u32,
    ) -> Result<Decimal, ExchangeError> {
        self.0.get_price_change(c, s, h).await
    }
}

#[async_trait]
impl OrderGateway for Shared {
    async fn get_wallet_balance(&self, coin: &str) -> Result<Decimal, ExchangeError> {
        self.0.get_wallet_balance(coin).await
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        self.0.place_order(order).await
    }

    async fn get_instrument_min_order(
        &self,
        c: Category,
        s: &Symbol,
    ) -> Result<InstrumentLimits, ExchangeError> {
        self.0.get_instrument_min_order(c, s).await
    }
}

fn config() -> Config {
    let mut config = Config::default();
    config.retry.max_retries = 1;
    config.retry.base_delay_ms = 0;
    config.retry.jitter_max_ms = 0;
    config
}

fn params() -> StartParams {
    StartParams {
        symbols: vec![Symbol::new("XRP", "USDT"), Symbol::new("WIF", "USDT")],
        notional_per_trade: dec!(100),
        poll_interval: None,
    }
}

fn setup() -> (Arc<MovingMarket>, Arc<PaperExchange<Shared>>) {
    let market = Arc::new(MovingMarket::default());
    market.set_price("XRPUSDT", dec!(0.5));
    market.set_price("WIFUSDT", dec!(2));
    let paper = PaperExchange::new(Shared(market.clone()), dec!(0), "USDT", dec!(1000));
    (market, Arc::new(paper))
}

#[tokio::test]
async fn test_paper_round_trip_with_profit() {
    let (market, paper) = setup();
    // WIF rose faster than XRP dropped
    market.set_change("XRPUSDT", 3, dec!(-4));
    market.set_change("WIFUSDT", 1, dec!(6));
    let mut engine = Engine::new(paper.clone(), params(), &config()).unwrap();

    let outcome = engine.tick().await.unwrap();
    let TickOutcome::Opened(position) = outcome else {
        panic!("expected an entry");
    };
    assert_eq!(position.symbol.base, "WIF");
    assert_eq!(position.size, Some(dec!(50)));

    for price in [dec!(2.06), dec!(2.2), dec!(2.25)] {
        market.set_price("WIFUSDT", price);
        assert!(matches!(engine.tick().await.unwrap(), TickOutcome::Holding));
    }
    assert_eq!(engine.state(), PositionState::EnteredArmed);
    assert_eq!(engine.position().unwrap().trailing_price(), dec!(2.2));

    // 1% under the 2.2 reference
    market.set_price("WIFUSDT", dec!(2.178));
    let TickOutcome::Closed(trade) = engine.tick().await.unwrap() else {
        panic!("expected an exit");
    };
    assert_eq!(trade.sold_qty, dec!(50));
    assert_eq!(engine.state(), PositionState::Searching);

    let balances = paper.balances().await;
    assert_eq!(balances["WIF"], dec!(0));
    assert_eq!(balances["USDT"], dec!(1008.9));
}

#[tokio::test]
async fn test_below_minimum_order_is_skipped() {
    let (market, paper) = setup();
    market.set_change("XRPUSDT", 3, dec!(-4));
    let mut small = params();
    small.notional_per_trade = dec!(2);
    let mut engine = Engine::new(paper.clone(), small, &config()).unwrap();

    assert!(matches!(engine.tick().await.unwrap(), TickOutcome::NoSignal));
    let delay = engine.step().await;

    assert_eq!(engine.state(), PositionState::Searching);
    assert_eq!(engine.consecutive_errors(), 0);
    assert_eq!(delay, Duration::from_secs(10));
    assert_eq!(paper.balances().await["USDT"], dec!(1000));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_keeps_open_position() {
    let (market, paper) = setup();
    market.set_change("XRPUSDT", 3, dec!(-5));
    let (tx, rx) = watch::channel(false);

    let run = start(paper.clone(), params(), Arc::new(config()), rx);
    let stop = async {
        tokio::time::sleep(Duration::from_secs(30)).await;
        tx.send(true).unwrap();
    };
    let (held, ()) = tokio::join!(run, stop);

    let position = held.unwrap().expect("position stays open");
    assert_eq!(position.symbol.base, "XRP");
    assert_eq!(paper.balances().await["XRP"], dec!(200));
}
