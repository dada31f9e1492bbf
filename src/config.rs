//! Configuration types for trailstop
//!
//! Every section has defaults, so an empty file is a valid configuration.
//! The configuration is read once at startup and shared read-only.

use crate::exchange::Category;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
    #[error("Whitelist file '{0}' is empty")]
    EmptyWhitelist(PathBuf),
    #[error("No valid coins found in '{path}'. {hint}")]
    NoValidCoins { path: PathBuf, hint: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub exchange: ExchangeConfig,
    pub strategy: StrategyConfig,
    pub engine: EngineConfig,
    pub retry: RetryConfig,
    pub precision: PrecisionConfig,
    pub telemetry: TelemetryConfig,
}

/// Exchange connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub mode: ExecutionMode,
    pub base_url: String,
    pub category: Category,
    pub quote_coin: String,
    pub recv_window_ms: u64,
    pub timeout_secs: u64,
    /// Fee charged on simulated fills
    pub paper_fee_rate: Decimal,
    /// Starting quote balance of the paper wallet
    pub paper_quote_balance: Decimal,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            base_url: crate::exchange::BYBIT_API_URL.to_string(),
            category: Category::Spot,
            quote_coin: "USDT".to_string(),
            recv_window_ms: 60_000,
            timeout_secs: 10,
            paper_fee_rate: dec!(0.001),
            paper_quote_balance: dec!(1000),
        }
    }
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Entry and exit thresholds, all in percent
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Quote-currency amount spent per entry
    pub notional_per_trade: Decimal,
    /// Slow-window change at or below which a drop entry fires
    pub price_drop_threshold: Decimal,
    pub slow_window_hours: u32,
    /// Fast-window change at or above which a quick-rise entry fires
    pub quick_rise_threshold: Decimal,
    pub quick_window_hours: u32,
    /// Profit from entry that arms the trailing stop
    pub minimum_profit_threshold: Decimal,
    /// Rise from the trailing point that moves it up
    pub trailing_update_threshold: Decimal,
    /// Fall from the trailing point that closes an armed position
    pub trailing_drop_threshold: Decimal,
    /// Window of the informational change logged while holding
    pub monitoring_window_hours: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            notional_per_trade: dec!(10),
            price_drop_threshold: dec!(-3),
            slow_window_hours: 3,
            quick_rise_threshold: dec!(3),
            quick_window_hours: 1,
            minimum_profit_threshold: dec!(2),
            trailing_update_threshold: dec!(3),
            trailing_drop_threshold: dec!(-1),
            monitoring_window_hours: 1,
        }
    }
}

/// Tick cadence and failure containment
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub search_interval_secs: u64,
    pub hold_interval_secs: u64,
    pub max_consecutive_errors: u32,
    pub cooldown_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_interval_secs: 10,
            hold_interval_secs: 5,
            max_consecutive_errors: 5,
            cooldown_secs: 30,
        }
    }
}

/// Retry policy for gateway calls
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub jitter_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 5_000,
            jitter_max_ms: 2_000,
        }
    }
}

/// Sell quantity precision per base coin
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PrecisionConfig {
    pub default_decimals: u32,
    /// Per-coin decimals, applied over the built-in table
    #[serde(deserialize_with = "merge_precision_overrides")]
    pub overrides: HashMap<String, u32>,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            default_decimals: 2,
            overrides: builtin_precision(),
        }
    }
}

fn builtin_precision() -> HashMap<String, u32> {
    let mut overrides = HashMap::new();
    for coin in ["BTC", "ETH"] {
        overrides.insert(coin.to_string(), 6);
    }
    for coin in ["XRP", "ADA", "DOGE", "TRX"] {
        overrides.insert(coin.to_string(), 1);
    }
    overrides
}

fn merge_precision_overrides<'de, D>(deserializer: D) -> Result<HashMap<String, u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let user = HashMap::<String, u32>::deserialize(deserializer)?;
    let mut overrides = builtin_precision();
    for (coin, decimals) in user {
        overrides.insert(coin.trim().to_uppercase(), decimals);
    }
    Ok(overrides)
}

impl PrecisionConfig {
    /// Decimal places a sell quantity of `coin` is truncated to
    pub fn decimals_for(&self, coin: &str) -> u32 {
        self.overrides
            .get(&coin.to_uppercase())
            .copied()
            .unwrap_or(self.default_decimals)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Directory for per-run log files; console only when unset
    pub log_dir: Option<PathBuf>,
    /// Prometheus exporter port; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            log_dir: Some(PathBuf::from("logs")),
            metrics_port: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds with the wrong sign and zero intervals
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.strategy;
        if s.notional_per_trade <= Decimal::ZERO {
            return Err(ConfigError::Invalid("notional_per_trade must be positive".into()));
        }
        if s.price_drop_threshold >= Decimal::ZERO {
            return Err(ConfigError::Invalid("price_drop_threshold must be negative".into()));
        }
        if s.quick_rise_threshold <= Decimal::ZERO {
            return Err(ConfigError::Invalid("quick_rise_threshold must be positive".into()));
        }
        if s.trailing_update_threshold <= Decimal::ZERO {
            return Err(ConfigError::Invalid("trailing_update_threshold must be positive".into()));
        }
        if s.trailing_drop_threshold >= Decimal::ZERO {
            return Err(ConfigError::Invalid("trailing_drop_threshold must be negative".into()));
        }
        if s.minimum_profit_threshold < Decimal::ZERO {
            return Err(ConfigError::Invalid("minimum_profit_threshold must not be negative".into()));
        }
        if s.slow_window_hours == 0 || s.quick_window_hours == 0 || s.monitoring_window_hours == 0 {
            return Err(ConfigError::Invalid("lookback windows must be at least one hour".into()));
        }

        let e = &self.engine;
        if e.search_interval_secs == 0 || e.hold_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll intervals must be non-zero".into()));
        }
        if e.max_consecutive_errors == 0 {
            return Err(ConfigError::Invalid("max_consecutive_errors must be non-zero".into()));
        }

        if self.exchange.paper_fee_rate < Decimal::ZERO || self.exchange.paper_fee_rate >= Decimal::ONE {
            return Err(ConfigError::Invalid("paper_fee_rate must be in [0, 1)".into()));
        }
        Ok(())
    }
}

/// Parse a comma-separated coin list such as `XRP,ETH,BTC`.
///
/// Entries are trimmed and upper-cased; empty and non-alphabetic entries are dropped.
pub fn parse_whitelist(content: &str, path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ConfigError::EmptyWhitelist(path.to_path_buf()));
    }

    let coins: Vec<String> = content
        .split(',')
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_alphabetic()))
        .collect();

    if coins.is_empty() {
        let hint = if content.contains(',') {
            "File contains only empty values, spaces, or invalid symbols. Example of valid format: 'XRP,ETH,BTC'"
        } else {
            "File should contain comma-separated coin names. Example: 'XRP,ETH,BTC'"
        };
        return Err(ConfigError::NoValidCoins {
            path: path.to_path_buf(),
            hint: hint.to_string(),
        });
    }

    Ok(coins)
}

/// Load the coin whitelist from a file
pub fn load_whitelist(path: impl AsRef<Path>) -> Result<Vec<String>, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_whitelist(&content, path)
}
