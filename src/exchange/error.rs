//! Exchange gateway errors

use thiserror::Error;

/// Errors raised at the gateway boundary
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Connection failed or dropped
    #[error("Network error: {0}")]
    Network(String),
    /// Request timed out
    #[error("Request timeout: {0}")]
    Timeout(String),
    /// Exchange rate limit hit
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),
    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    /// Exchange returned a non-zero status code in the response body
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },
    /// Response body missing fields or not parseable
    #[error("Parse error: {0}")]
    Parse(String),
    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Symbol unknown to the exchange
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),
    /// Not enough history to compute a change
    #[error("Insufficient history for {symbol}: need {needed} candles, got {got}")]
    InsufficientHistory {
        symbol: String,
        needed: usize,
        got: usize,
    },
}

impl ExchangeError {
    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ExchangeError::Network(_)
            | ExchangeError::Timeout(_)
            | ExchangeError::RateLimited(_)
            | ExchangeError::Parse(_) => true,
            ExchangeError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExchangeError::Parse(err.to_string())
        } else {
            ExchangeError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}
