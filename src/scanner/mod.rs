//! Opportunity scanner
//!
//! Observes every candidate symbol, evaluates the entry conditions and keeps
//! the single highest-scoring qualifier. Observations are read-only and run
//! concurrently; ranking happens once all of them are collected.

mod rules;
mod types;

pub use rules::{select_best, EntryRules};
pub use types::{Candidate, Observation, TriggerReason};

use crate::exchange::{Category, ExchangeError, MarketData, Symbol};
use crate::numeric::format_price;
use crate::retry::{RetryError, RetryPolicy};
use futures_util::future::join_all;
use thiserror::Error;

/// Scan failures that make the whole pass unusable
#[derive(Debug, Error)]
pub enum ScanError {
    /// No symbols to scan
    #[error("No symbols to scan")]
    NoSymbols,
    /// Every symbol failed to evaluate
    #[error("All {count} symbols failed to evaluate, last error: {last_error}")]
    AllFailed { count: usize, last_error: String },
}

/// Evaluates entry conditions across a symbol list
pub struct Scanner {
    rules: EntryRules,
    category: Category,
    retry: RetryPolicy,
}

impl Scanner {
    pub fn new(rules: EntryRules, category: Category, retry: RetryPolicy) -> Self {
        Self {
            rules,
            category,
            retry,
        }
    }

    pub fn rules(&self) -> &EntryRules {
        &self.rules
    }

    /// Fetch price and both window changes for one symbol
    pub async fn observe<M>(
        &self,
        market: &M,
        symbol: &Symbol,
    ) -> Result<Observation, RetryError<ExchangeError>>
    where
        M: MarketData + ?Sized,
    {
        let category = self.category;
        let current_price = self
            .retry
            .call("get_price", || market.get_price(category, symbol))
            .await?;
        let window_change_pct = self
            .retry
            .call("get_price_change", || {
                market.get_price_change(category, symbol, self.rules.slow_window_hours)
            })
            .await?;
        let quick_change_pct = self
            .retry
            .call("get_price_change", || {
                market.get_price_change(category, symbol, self.rules.quick_window_hours)
            })
            .await?;

        Ok(Observation {
            symbol: symbol.clone(),
            current_price,
            window_change_pct,
            quick_change_pct,
        })
    }

    /// Scan all symbols and return the best entry, if any qualifies.
    ///
    /// A symbol that fails to evaluate is logged and skipped.
    pub async fn scan<M>(&self, market: &M, symbols: &[Symbol]) -> Result<Option<Candidate>, ScanError>
    where
        M: MarketData + ?Sized,
    {
        if symbols.is_empty() {
            return Err(ScanError::NoSymbols);
        }

        tracing::info!(count = symbols.len(), "Scanning symbols");

        let results = join_all(symbols.iter().map(|symbol| self.observe(market, symbol))).await;

        let mut failures = 0;
        let mut last_error = String::new();
        let mut candidates = Vec::new();

        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(observation) => {
                    tracing::info!(
                        symbol = %symbol,
                        price = %format_price(observation.current_price),
                        slow_window_h = self.rules.slow_window_hours,
                        slow_change_pct = %format_price(observation.window_change_pct),
                        quick_window_h = self.rules.quick_window_hours,
                        quick_change_pct = %format_price(observation.quick_change_pct),
                        "Observed"
                    );
                    candidates.extend(self.rules.evaluate(&observation));
                }
                Err(e) => {
                    tracing::warn!(symbol = %symbol, error = %e, "Error checking symbol, skipping");
                    failures += 1;
                    last_error = e.to_string();
                }
            }
        }

        if failures == symbols.len() {
            return Err(ScanError::AllFailed {
                count: failures,
                last_error,
            });
        }

        let best = select_best(candidates);
        match &best {
            Some(candidate) => tracing::info!(
                symbol = %candidate.symbol,
                reason = %candidate.trigger_reason,
                score = %format_price(candidate.score),
                price = %format_price(candidate.current_price),
                "Entry signal found"
            ),
            None => tracing::info!("No entry signals found"),
        }

        Ok(best)
    }
}
