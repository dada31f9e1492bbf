//! Configuration and whitelist loading

use rust_decimal_macros::dec;
use std::io::Write;
use std::path::Path;
use trailstop::config::{load_whitelist, Config, ConfigError, ExecutionMode, LogFormat};

#[test]
fn test_example_config_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config.toml.example");

    let config = Config::load(&path).unwrap();

    assert_eq!(config.exchange.mode, ExecutionMode::Paper);
    assert_eq!(config.exchange.quote_coin, "USDT");
    assert_eq!(config.strategy.price_drop_threshold, dec!(-3));
    assert_eq!(config.strategy.trailing_drop_threshold, dec!(-1));
    assert_eq!(config.engine.cooldown_secs, 30);
    assert_eq!(config.precision.decimals_for("doge"), 1);
    assert_eq!(config.precision.decimals_for("WIF"), 2);
    assert_eq!(config.telemetry.log_format, LogFormat::Pretty);
    assert_eq!(config.telemetry.metrics_port, None);
}

#[test]
fn test_printed_config_reloads() {
    let config = Config::default();
    let printed = toml::to_string_pretty(&config).unwrap();

    let reloaded: Config = toml::from_str(&printed).unwrap();

    assert_eq!(reloaded.strategy.notional_per_trade, config.strategy.notional_per_trade);
    assert_eq!(reloaded.precision.decimals_for("BTC"), 6);
    reloaded.validate().unwrap();
}

#[test]
fn test_invalid_threshold_rejected_on_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[strategy]\ntrailing_drop_threshold = 1.0").unwrap();

    let result = Config::load(file.path());

    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_whitelist_with_noise() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, " xrp, ETH ,,1INCH, doge ").unwrap();

    let coins = load_whitelist(file.path()).unwrap();

    assert_eq!(coins, vec!["XRP", "ETH", "DOGE"]);
}

#[test]
fn test_missing_whitelist_is_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = load_whitelist(dir.path().join("whitelist.txt"));

    assert!(matches!(result, Err(ConfigError::Io { .. })));
}
