//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Gateway call repeated after a transient error
    Retry,
    /// Buy order accepted
    BuyOrder,
    /// Sell order accepted
    SellOrder,
    /// Order answered with a non-success status
    RejectedOrder,
    /// Tick that ended in an error
    TickError,
    /// Forced reset after too many consecutive errors
    EngineReset,
    /// Position dropped because its size could not be sold
    UnrecoverablePosition,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// 1 while holding, 0 while searching
    PositionOpen,
    /// Change from entry of the open position, in percent
    UnrealizedPct,
    /// Current consecutive tick errors
    ConsecutiveErrors,
}

fn counter_name(metric: CounterMetric) -> &'static str {
    match metric {
        CounterMetric::Retry => "trailstop_retries_total",
        CounterMetric::BuyOrder => "trailstop_buy_orders_total",
        CounterMetric::SellOrder => "trailstop_sell_orders_total",
        CounterMetric::RejectedOrder => "trailstop_rejected_orders_total",
        CounterMetric::TickError => "trailstop_tick_errors_total",
        CounterMetric::EngineReset => "trailstop_engine_resets_total",
        CounterMetric::UnrecoverablePosition => "trailstop_unrecoverable_positions_total",
    }
}

fn gauge_name(metric: GaugeMetric) -> &'static str {
    match metric {
        GaugeMetric::PositionOpen => "trailstop_position_open",
        GaugeMetric::UnrealizedPct => "trailstop_unrealized_pct",
        GaugeMetric::ConsecutiveErrors => "trailstop_consecutive_errors",
    }
}

/// Increment a counter by one
pub fn increment(metric: CounterMetric) {
    ::metrics::counter!(counter_name(metric)).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    ::metrics::gauge!(gauge_name(metric)).set(value);
}

/// Serve metrics for Prometheus scraping on `0.0.0.0:port`
pub fn install_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
