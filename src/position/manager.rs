//! Position transitions against the exchange

use super::{ClosedTrade, ManageOutcome, Position, TradeError, TrailingRules};
use crate::config::PrecisionConfig;
use crate::exchange::{Category, MarketData, OrderGateway, OrderRequest, OrderSide, Symbol};
use crate::numeric::{format_price, pct_change, round_down};
use crate::retry::RetryPolicy;
use crate::scanner::Candidate;
use crate::telemetry::{increment, set_gauge, CounterMetric, GaugeMetric};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Opens, manages and closes the single position
pub struct PositionManager<X: ?Sized> {
    exchange: Arc<X>,
    rules: TrailingRules,
    category: Category,
    precision: PrecisionConfig,
    retry: RetryPolicy,
    monitoring_window_hours: u32,
}

impl<X> PositionManager<X>
where
    X: MarketData + OrderGateway + ?Sized,
{
    pub fn new(
        exchange: Arc<X>,
        rules: TrailingRules,
        category: Category,
        precision: PrecisionConfig,
        retry: RetryPolicy,
        monitoring_window_hours: u32,
    ) -> Self {
        Self {
            exchange,
            rules,
            category,
            precision,
            retry,
            monitoring_window_hours,
        }
    }

    pub fn rules(&self) -> &TrailingRules {
        &self.rules
    }

    /// Buy `notional` of quote currency into `candidate`.
    ///
    /// The size is the base balance delta around the fill. When the balance
    /// after the fill cannot be read the position is still returned with an
    /// unknown size, since the order went through.
    pub async fn open(&self, candidate: &Candidate, notional: Decimal) -> Result<Position, TradeError> {
        let symbol = &candidate.symbol;
        let price = candidate.current_price;

        self.check_minimum(symbol, price, notional).await?;

        let baseline = self.balance(&symbol.base).await?;

        let order = OrderRequest::market_buy(self.category, symbol.clone(), notional);
        let ack = self
            .retry
            .call("place_order", || self.exchange.place_order(&order))
            .await?;
        if !ack.is_success() {
            increment(CounterMetric::RejectedOrder);
            return Err(TradeError::Rejected {
                side: OrderSide::Buy,
                symbol: symbol.clone(),
                code: ack.status_code,
                message: ack.message,
            });
        }
        increment(CounterMetric::BuyOrder);

        let size = self.measure_size(symbol, baseline).await;
        let position = Position::new(
            symbol.clone(),
            price,
            size,
            baseline,
            ack.order_id.unwrap_or_default(),
            candidate.trigger_reason,
        );

        tracing::info!(
            position_id = %position.id,
            symbol = %symbol,
            reason = %candidate.trigger_reason,
            entry_price = %format_price(price),
            notional = %notional,
            size = ?size,
            order_id = %position.entry_order_id,
            "Position opened"
        );
        set_gauge(GaugeMetric::PositionOpen, 1.0);

        Ok(position)
    }

    /// Apply the current price to a held position, closing it on exit.
    ///
    /// On error the position keeps whatever arming or ratchet happened
    /// before the failing call.
    pub async fn manage(
        &self,
        position: &mut Position,
        current_price: Decimal,
    ) -> Result<ManageOutcome, TradeError> {
        if position.size.is_none() {
            self.reconcile_size(position).await;
        }

        self.log_monitoring_change(&position.symbol).await;

        let decision = self.rules.evaluate(position, current_price);
        set_gauge(
            GaugeMetric::UnrealizedPct,
            decision.from_entry_pct.to_f64().unwrap_or_default(),
        );

        tracing::info!(
            symbol = %position.symbol,
            price = %format_price(current_price),
            entry_price = %format_price(position.entry_price()),
            trailing_price = %format_price(position.trailing_price()),
            from_entry_pct = %decision.from_entry_pct.round_dp(2),
            from_trailing_pct = %decision.from_trailing_pct.round_dp(2),
            armed = position.is_armed(),
            "Holding"
        );

        if decision.armed_now {
            tracing::info!(
                symbol = %position.symbol,
                from_entry_pct = %decision.from_entry_pct.round_dp(2),
                "Trailing stop activated"
            );
        } else if !position.is_armed() {
            tracing::info!(
                symbol = %position.symbol,
                need_pct = %self.rules.remaining_to_arm(decision.from_entry_pct).round_dp(2),
                "Need more gain for trailing activation"
            );
        }

        if let Some((old, new)) = decision.ratchet {
            tracing::info!(
                symbol = %position.symbol,
                old = %format_price(old),
                new = %format_price(new),
                "Trailing price raised"
            );
        }

        if !decision.exit {
            return Ok(ManageOutcome::Hold);
        }

        tracing::info!(
            symbol = %position.symbol,
            price = %format_price(current_price),
            trailing_price = %format_price(position.trailing_price()),
            from_trailing_pct = %decision.from_trailing_pct.round_dp(2),
            "Trailing stop hit, exiting"
        );

        match self.close(position, current_price).await? {
            Some(trade) => Ok(ManageOutcome::Closed(trade)),
            None => Ok(ManageOutcome::Abandoned),
        }
    }

    /// Sell the whole position at market.
    ///
    /// Returns `None` without placing an order when the size is unknown or
    /// rounds to nothing; such a position cannot be sold and is dropped.
    pub async fn close(
        &self,
        position: &Position,
        current_price: Decimal,
    ) -> Result<Option<ClosedTrade>, TradeError> {
        let decimals = self.precision.decimals_for(&position.symbol.base);
        let qty = position
            .sellable_size()
            .map(|size| round_down(size, decimals))
            .filter(|qty| *qty > Decimal::ZERO);

        let Some(qty) = qty else {
            tracing::error!(
                position_id = %position.id,
                symbol = %position.symbol,
                size = ?position.size,
                "Position size unknown or zero, resetting without selling"
            );
            increment(CounterMetric::UnrecoverablePosition);
            set_gauge(GaugeMetric::PositionOpen, 0.0);
            return Ok(None);
        };

        let order = OrderRequest::market_sell(self.category, position.symbol.clone(), qty);
        let ack = self
            .retry
            .call("place_order", || self.exchange.place_order(&order))
            .await?;
        if !ack.is_success() {
            increment(CounterMetric::RejectedOrder);
            return Err(TradeError::Rejected {
                side: OrderSide::Sell,
                symbol: position.symbol.clone(),
                code: ack.status_code,
                message: ack.message,
            });
        }
        increment(CounterMetric::SellOrder);
        set_gauge(GaugeMetric::PositionOpen, 0.0);

        let trade = ClosedTrade {
            position: position.clone(),
            exit_price: current_price,
            exit_order_id: ack.order_id,
            sold_qty: qty,
            realized_pct: pct_change(position.entry_price(), current_price),
            closed_at: Utc::now(),
        };

        tracing::info!(
            position_id = %position.id,
            symbol = %position.symbol,
            entry_price = %format_price(position.entry_price()),
            exit_price = %format_price(current_price),
            qty = %qty,
            realized_pct = %trade.realized_pct.round_dp(2),
            held_secs = (trade.closed_at - position.opened_at).num_seconds(),
            "Position closed"
        );

        Ok(Some(trade))
    }

    async fn check_minimum(&self, symbol: &Symbol, price: Decimal, notional: Decimal) -> Result<(), TradeError> {
        let category = self.category;
        let limits = self
            .retry
            .call("get_instrument_min_order", || {
                self.exchange.get_instrument_min_order(category, symbol)
            })
            .await?;
        let minimum = limits.min_notional.max(limits.min_qty * price);

        if notional < minimum {
            tracing::warn!(
                symbol = %symbol,
                notional = %notional,
                minimum = %minimum,
                "Order value below exchange minimum"
            );
            return Err(TradeError::BelowMinimum {
                symbol: symbol.clone(),
                notional,
                minimum,
            });
        }
        Ok(())
    }

    async fn balance(&self, coin: &str) -> Result<Decimal, TradeError> {
        Ok(self
            .retry
            .call("get_wallet_balance", || self.exchange.get_wallet_balance(coin))
            .await?)
    }

    async fn measure_size(&self, symbol: &Symbol, baseline: Decimal) -> Option<Decimal> {
        let after = match self.balance(&symbol.base).await {
            Ok(after) => after,
            Err(e) => {
                tracing::warn!(
                    symbol = %symbol,
                    error = %e,
                    "Balance after fill not observable, size unknown"
                );
                return None;
            }
        };

        let delta = after - baseline;
        if delta <= Decimal::ZERO {
            tracing::warn!(
                symbol = %symbol,
                before = %baseline,
                after = %after,
                "Balance did not increase after fill, size unknown"
            );
            return None;
        }
        Some(delta)
    }

    async fn reconcile_size(&self, position: &mut Position) {
        if let Some(size) = self.measure_size(&position.symbol, position.baseline_balance).await {
            tracing::info!(symbol = %position.symbol, size = %size, "Position size recovered");
            position.size = Some(size);
        }
    }

    /// Single attempt, logged only. The tick's price is already fetched.
    async fn log_monitoring_change(&self, symbol: &Symbol) {
        let hours = self.monitoring_window_hours;
        match self
            .exchange
            .get_price_change(self.category, symbol, hours)
            .await
        {
            Ok(change) => tracing::info!(
                symbol = %symbol,
                window_h = hours,
                change_pct = %change.round_dp(2),
                "Monitoring window change"
            ),
            Err(e) => tracing::warn!(symbol = %symbol, error = %e, "Monitoring window change unavailable"),
        }
    }
}
