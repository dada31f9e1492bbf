//! Run command implementation

use crate::config::{load_whitelist, Config, ExecutionMode};
use crate::engine::{start, StartParams};
use crate::exchange::{BybitClient, BybitConfig, Credentials, PaperExchange, Symbol};
use crate::position::Position;
use anyhow::Context;
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Quote amount spent per trade (defaults to strategy.notional_per_trade)
    #[arg(long)]
    pub amount: Option<Decimal>,

    /// Trade a single coin, e.g. WIF
    #[arg(long, conflicts_with = "whitelist")]
    pub coin: Option<String>,

    /// Comma-separated coin list used when no coin is given
    #[arg(long, default_value = "whitelist.txt")]
    pub whitelist: PathBuf,

    /// Searching poll interval in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// Simulate fills instead of placing real orders
    #[arg(long)]
    pub paper: bool,
}

impl RunArgs {
    pub fn log_label(&self) -> String {
        let target = match &self.coin {
            Some(coin) => coin.to_uppercase(),
            None => "whitelist".to_string(),
        };
        match self.amount {
            Some(amount) => format!("{}_{}", target, amount.normalize()),
            None => target,
        }
    }

    fn symbols(&self, quote: &str) -> anyhow::Result<Vec<Symbol>> {
        let coins = match &self.coin {
            Some(coin) => vec![coin.trim().to_uppercase()],
            None => load_whitelist(&self.whitelist)?,
        };
        Ok(coins.into_iter().map(|c| Symbol::new(c, quote)).collect())
    }

    pub async fn execute(&self, config: Arc<Config>) -> anyhow::Result<()> {
        let symbols = self.symbols(&config.exchange.quote_coin)?;
        let params = StartParams {
            symbols,
            notional_per_trade: self.amount.unwrap_or(config.strategy.notional_per_trade),
            poll_interval: self.interval.map(Duration::from_secs),
        };

        let paper = self.paper || config.exchange.mode == ExecutionMode::Paper;
        let credentials = Credentials::from_env();
        if !paper && credentials.is_none() {
            anyhow::bail!("API_KEY and SECRET_KEY must be set for live trading");
        }

        let client = BybitClient::new(
            BybitConfig {
                base_url: config.exchange.base_url.clone(),
                timeout: Duration::from_secs(config.exchange.timeout_secs),
                recv_window_ms: config.exchange.recv_window_ms,
                ..BybitConfig::default()
            },
            credentials,
        )
        .context("Failed to build exchange client")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received, stopping after the current tick");
                let _ = shutdown_tx.send(true);
            }
        });

        let held = if paper {
            tracing::info!(
                quote_balance = %config.exchange.paper_quote_balance,
                fee_rate = %config.exchange.paper_fee_rate,
                "Starting in paper mode"
            );
            let exchange = PaperExchange::new(
                client,
                config.exchange.paper_fee_rate,
                &config.exchange.quote_coin,
                config.exchange.paper_quote_balance,
            );
            start(Arc::new(exchange), params, config, shutdown_rx).await?
        } else {
            tracing::warn!("Starting in live mode, orders are real");
            start(Arc::new(client), params, config, shutdown_rx).await?
        };

        report(held.as_ref());
        Ok(())
    }
}

fn report(held: Option<&Position>) {
    if let Some(position) = held {
        println!(
            "Open position left on exchange: {} entry {} size {}",
            position.symbol,
            position.entry_price(),
            position
                .size
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
    }
}
