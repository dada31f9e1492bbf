//! Engine loop
//!
//! Drives the scanner while flat and the position manager while holding,
//! one tick at a time. Ticks never overlap: a tick finishes, including its
//! retries, before the next sleep starts.
//!
//! Repeated tick failures are contained by forgetting the in-memory
//! position after `max_consecutive_errors` and cooling down. A position
//! forgotten this way may still be held on the exchange.

use crate::config::Config;
use crate::exchange::{Category, ExchangeError, MarketData, OrderGateway, Symbol};
use crate::position::{
    ClosedTrade, ManageOutcome, Position, PositionManager, PositionState, TradeError,
    TrailingRules,
};
use crate::retry::{RetryError, RetryPolicy};
use crate::scanner::{EntryRules, ScanError, Scanner};
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::sleep;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No symbols to trade")]
    NoSymbols,
    #[error("Notional per trade must be positive, got {0}")]
    InvalidNotional(Decimal),
    #[error("Poll interval must be non-zero")]
    ZeroPollInterval,
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Trade(#[from] TradeError),
    #[error(transparent)]
    Exchange(#[from] RetryError<ExchangeError>),
}

/// Operator-facing run parameters
#[derive(Debug, Clone)]
pub struct StartParams {
    pub symbols: Vec<Symbol>,
    pub notional_per_trade: Decimal,
    /// Overrides the searching interval; holding never polls slower than this
    pub poll_interval: Option<Duration>,
}

/// What a successful tick did
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Flat and no symbol qualified
    NoSignal,
    /// Entered a position
    Opened(Position),
    /// Still holding
    Holding,
    /// Sold the position
    Closed(ClosedTrade),
    /// Exit reached with an unsellable size, flat without an order
    Abandoned,
}

/// How the last tick ended, for scheduling the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStatus {
    Ok,
    Failed,
    /// Failed and hit the consecutive error ceiling
    Reset,
}

/// Tick cadence and failure budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timing {
    pub search_interval: Duration,
    pub hold_interval: Duration,
    pub max_consecutive_errors: u32,
    pub cooldown: Duration,
}

impl Timing {
    pub fn from_config(config: &Config, poll_interval: Option<Duration>) -> Self {
        let engine = &config.engine;
        let mut search_interval = Duration::from_secs(engine.search_interval_secs);
        let mut hold_interval = Duration::from_secs(engine.hold_interval_secs);
        if let Some(poll) = poll_interval {
            search_interval = poll;
            hold_interval = hold_interval.min(poll);
        }
        Self {
            search_interval,
            hold_interval,
            max_consecutive_errors: engine.max_consecutive_errors,
            cooldown: Duration::from_secs(engine.cooldown_secs),
        }
    }

    /// Sleep before the next tick
    pub fn next_delay(&self, state: PositionState, status: TickStatus) -> Duration {
        let interval = match state {
            PositionState::Searching => self.search_interval,
            PositionState::EnteredUnarmed | PositionState::EnteredArmed => self.hold_interval,
        };
        match status {
            TickStatus::Ok => interval,
            TickStatus::Failed => interval * 2,
            TickStatus::Reset => self.cooldown,
        }
    }
}

/// Single-position trading engine
pub struct Engine<X: ?Sized> {
    exchange: Arc<X>,
    symbols: Vec<Symbol>,
    notional: Decimal,
    category: Category,
    scanner: Scanner,
    manager: PositionManager<X>,
    retry: RetryPolicy,
    timing: Timing,
    position: Option<Position>,
    consecutive_errors: u32,
}

impl<X> Engine<X>
where
    X: MarketData + OrderGateway + ?Sized,
{
    pub fn new(exchange: Arc<X>, params: StartParams, config: &Config) -> Result<Self, EngineError> {
        if params.symbols.is_empty() {
            return Err(EngineError::NoSymbols);
        }
        if params.notional_per_trade <= Decimal::ZERO {
            return Err(EngineError::InvalidNotional(params.notional_per_trade));
        }
        if params.poll_interval.is_some_and(|poll| poll.is_zero()) {
            return Err(EngineError::ZeroPollInterval);
        }

        let category = config.exchange.category;
        let retry = RetryPolicy::from(&config.retry);
        let scanner = Scanner::new(EntryRules::from(&config.strategy), category, retry.clone());
        let manager = PositionManager::new(
            exchange.clone(),
            TrailingRules::from(&config.strategy),
            category,
            config.precision.clone(),
            retry.clone(),
            config.strategy.monitoring_window_hours,
        );

        Ok(Self {
            exchange,
            symbols: params.symbols,
            notional: params.notional_per_trade,
            category,
            scanner,
            manager,
            retry,
            timing: Timing::from_config(config, params.poll_interval),
            position: None,
            consecutive_errors: 0,
        })
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn state(&self) -> PositionState {
        PositionState::of(self.position.as_ref())
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Consume the engine, returning any position still held
    pub fn into_position(self) -> Option<Position> {
        self.position
    }

    /// Run exactly one step: scan while flat, manage while holding
    pub async fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        let Some(position) = self.position.as_mut() else {
            return self.search().await;
        };

        let category = self.category;
        let exchange = &self.exchange;
        let symbol = &position.symbol;
        let price = self
            .retry
            .call("get_price", || exchange.get_price(category, symbol))
            .await?;

        match self.manager.manage(position, price).await? {
            ManageOutcome::Hold => Ok(TickOutcome::Holding),
            ManageOutcome::Closed(trade) => {
                self.position = None;
                Ok(TickOutcome::Closed(trade))
            }
            ManageOutcome::Abandoned => {
                self.position = None;
                Ok(TickOutcome::Abandoned)
            }
        }
    }

    async fn search(&mut self) -> Result<TickOutcome, EngineError> {
        let Some(candidate) = self.scanner.scan(self.exchange.as_ref(), &self.symbols).await? else {
            return Ok(TickOutcome::NoSignal);
        };

        let position = match self.manager.open(&candidate, self.notional).await {
            Ok(position) => position,
            // warned about by the manager, does not count as a failure
            Err(TradeError::BelowMinimum { .. }) => return Ok(TickOutcome::NoSignal),
            Err(e) => return Err(e.into()),
        };
        self.position = Some(position.clone());
        Ok(TickOutcome::Opened(position))
    }

    /// Tick once, account for failures and return the delay before the next tick
    pub async fn step(&mut self) -> Duration {
        let status = match self.tick().await {
            Ok(_) => {
                self.consecutive_errors = 0;
                TickStatus::Ok
            }
            Err(e) => {
                self.consecutive_errors += 1;
                increment(CounterMetric::TickError);
                tracing::error!(
                    error = %e,
                    consecutive_errors = self.consecutive_errors,
                    max = self.timing.max_consecutive_errors,
                    state = ?self.state(),
                    "Tick failed"
                );
                if self.consecutive_errors >= self.timing.max_consecutive_errors {
                    self.reset();
                    TickStatus::Reset
                } else {
                    TickStatus::Failed
                }
            }
        };
        set_gauge(GaugeMetric::ConsecutiveErrors, f64::from(self.consecutive_errors));

        self.timing.next_delay(self.state(), status)
    }

    fn reset(&mut self) {
        increment(CounterMetric::EngineReset);
        match self.position.take() {
            Some(position) => tracing::error!(
                position_id = %position.id,
                symbol = %position.symbol,
                size = ?position.size,
                cooldown_secs = self.timing.cooldown.as_secs(),
                "Too many consecutive errors, forgetting open position and cooling down"
            ),
            None => tracing::error!(
                cooldown_secs = self.timing.cooldown.as_secs(),
                "Too many consecutive errors, cooling down"
            ),
        }
        set_gauge(GaugeMetric::PositionOpen, 0.0);
        self.consecutive_errors = 0;
    }

    /// Tick until `shutdown` turns true or its sender is dropped.
    ///
    /// An open position is left as is on shutdown.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let symbols: Vec<String> = self.symbols.iter().map(ToString::to_string).collect();
        tracing::info!(
            symbols = ?symbols,
            notional = %self.notional,
            search_interval_secs = self.timing.search_interval.as_secs(),
            hold_interval_secs = self.timing.hold_interval.as_secs(),
            "Engine started"
        );

        while !*shutdown.borrow() {
            let delay = self.step().await;
            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        match &self.position {
            Some(position) => tracing::warn!(
                position_id = %position.id,
                symbol = %position.symbol,
                entry_price = %position.entry_price(),
                size = ?position.size,
                "Shutting down with an open position, leaving it untouched"
            ),
            None => tracing::info!("Shutting down, no open position"),
        }
    }
}

/// Build an engine and run it until shutdown.
///
/// Returns the position still held when the engine stopped.
pub async fn start<X>(
    exchange: Arc<X>,
    params: StartParams,
    config: Arc<Config>,
    shutdown: watch::Receiver<bool>,
) -> Result<Option<Position>, EngineError>
where
    X: MarketData + OrderGateway + ?Sized,
{
    let mut engine = Engine::new(exchange, params, &config)?;
    engine.run(shutdown).await;
    Ok(engine.into_position())
}
