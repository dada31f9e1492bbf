//! Check command implementation

use crate::config::Config;
use crate::exchange::{BybitClient, BybitConfig, Credentials, MarketData, OrderGateway, Symbol};
use crate::numeric::format_price;
use clap::Args;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Coin used for the market data and instrument checks
    #[arg(long, default_value = "XRP")]
    pub coin: String,
}

impl CheckArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = BybitClient::new(
            BybitConfig {
                base_url: config.exchange.base_url.clone(),
                timeout: Duration::from_secs(config.exchange.timeout_secs),
                recv_window_ms: config.exchange.recv_window_ms,
                ..BybitConfig::default()
            },
            Credentials::from_env(),
        )?;
        let category = config.exchange.category;
        let symbol = Symbol::new(&self.coin, &config.exchange.quote_coin);

        println!("Checking connection to {}", config.exchange.base_url);

        if client.has_credentials() {
            let balances = client.get_all_balances().await?;
            println!("Wallet balances:");
            for (coin, amount) in balances.iter().filter(|(_, a)| !a.is_zero()) {
                println!("  {}: {}", coin, amount);
            }
            let quote = client.get_wallet_balance(&config.exchange.quote_coin).await?;
            println!("  {} available: {}", config.exchange.quote_coin, quote);
        } else {
            println!("No API credentials set, skipping wallet checks");
        }

        let limits = client.get_instrument_min_order(category, &symbol).await?;
        println!(
            "{} minimum order: qty {} / value {} {}",
            symbol, limits.min_qty, limits.min_notional, config.exchange.quote_coin
        );

        let price = client.get_price(category, &symbol).await?;
        println!("{} price: {}", symbol, format_price(price));

        let hours = config.strategy.quick_window_hours;
        let change = client.get_price_change(category, &symbol, hours).await?;
        println!("{} {}h change: {}%", symbol, hours, change.round_dp(2));

        println!("Connection OK");
        Ok(())
    }
}
