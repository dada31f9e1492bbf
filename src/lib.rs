//! trailstop: Trailing-stop position manager for Bybit spot markets
//!
//! This library provides the core components for:
//! - Bybit v5 REST market data and order gateways
//! - Paper trading with simulated fills
//! - Bounded retries with jittered backoff around every gateway call
//! - Entry scanning across a coin whitelist
//! - A profit-gated trailing stop that only ratchets upward
//! - The engine loop with error containment and cool-down reset
//! - Logging and metrics

pub mod cli;
pub mod config;
pub mod engine;
pub mod exchange;
pub mod numeric;
pub mod position;
pub mod retry;
pub mod scanner;
pub mod telemetry;
