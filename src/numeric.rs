//! Decimal helpers shared by the scanner and the position state machine

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Relative change from `old` to `new`, in percent.
///
/// A zero reference has no defined change and yields `0`.
pub fn pct_change(old: Decimal, new: Decimal) -> Decimal {
    if old.is_zero() {
        return Decimal::ZERO;
    }

    (new - old)
        .checked_div(old)
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or(Decimal::ZERO)
}

/// Truncate `value` toward zero at `decimals` places.
///
/// Sell quantities go through here so an order never exceeds the held balance.
pub fn round_down(value: Decimal, decimals: u32) -> Decimal {
    value.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Format a price or percentage for log lines.
///
/// Values below 0.0001 keep up to 12 decimals so micro-priced coins stay readable.
pub fn format_price(value: Decimal) -> String {
    if value.is_zero() {
        return "0.0000".to_string();
    }

    if value.abs() < dec!(0.0001) {
        let wide = format!("{:.12}", value);
        let trimmed = wide.trim_end_matches('0').trim_end_matches('.');
        let decimals = trimmed.split('.').nth(1).map_or(0, str::len);
        if decimals < 4 {
            return format!("{:.4}", value);
        }
        return trimmed.to_string();
    }

    format!("{:.4}", value)
}
