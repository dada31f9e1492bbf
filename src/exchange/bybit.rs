//! Bybit v5 REST client
//!
//! Public market endpoints (tickers, klines, instrument info) plus the signed
//! account endpoints the engine needs: wallet balance and order creation.
//! Private requests are signed with HMAC-SHA256 over
//! `timestamp + api_key + recv_window + payload`.

use super::{
    Category, ExchangeError, InstrumentLimits, MarketData, OrderAck, OrderGateway, OrderRequest,
    Symbol,
};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Bybit mainnet REST base URL
pub const BYBIT_API_URL: &str = "https://api.bybit.com";

const RATE_LIMIT_CODE: i64 = 10006;
const AUTH_ERROR_CODES: [i64; 4] = [10003, 10004, 10005, 33004];

/// API key pair. `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Read `API_KEY` / `SECRET_KEY` from the environment
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("API_KEY").ok().filter(|k| !k.is_empty())?;
        let api_secret = std::env::var("SECRET_KEY").ok().filter(|s| !s.is_empty())?;
        Some(Self::new(api_key, api_secret))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars: Vec<char> = self.api_key.chars().collect();
        let masked_key = if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{}...{}", head, tail)
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("Credentials")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

/// Configuration for the Bybit client
#[derive(Debug, Clone)]
pub struct BybitConfig {
    /// REST base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Receive window for signed requests, in milliseconds
    pub recv_window_ms: u64,
    /// Account type queried for balances
    pub account_type: String,
}

impl Default for BybitConfig {
    fn default() -> Self {
        Self {
            base_url: BYBIT_API_URL.to_string(),
            timeout: Duration::from_secs(10),
            recv_window_ms: 60_000,
            account_type: "UNIFIED".to_string(),
        }
    }
}

/// Client for the Bybit v5 REST API
pub struct BybitClient {
    config: BybitConfig,
    credentials: Option<Credentials>,
    client: Client,
}

impl BybitClient {
    /// Create a client. Without credentials only public endpoints work.
    pub fn new(config: BybitConfig, credentials: Option<Credentials>) -> Result<Self, ExchangeError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            config,
            credentials,
            client,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// All non-zero coin balances of the account
    pub async fn get_all_balances(&self) -> Result<Vec<(String, Decimal)>, ExchangeError> {
        let params = [("accountType", self.config.account_type.clone())];
        let result: WalletResult = self.signed_get("/v5/account/wallet-balance", &params).await?;

        let mut balances = Vec::new();
        for account in result.list {
            for coin in account.coin {
                let amount = parse_balance(&coin.wallet_balance)?;
                if !amount.is_zero() {
                    balances.push((coin.coin, amount));
                }
            }
        }
        Ok(balances)
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.config.base_url, endpoint);

        tracing::debug!(endpoint, "GET");

        let response = self.client.get(&url).query(params).send().await?;
        Self::read_envelope(response).await?.into_result()
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let credentials = self.require_credentials()?;
        let url = format!("{}{}", self.config.base_url, endpoint);
        let query = build_query(params);
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(credentials, &timestamp, &query)?;

        tracing::debug!(endpoint, "GET (signed)");

        let response = self
            .client
            .get(format!("{}?{}", url, query))
            .header("X-BAPI-API-KEY", &credentials.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", self.config.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .send()
            .await?;

        Self::read_envelope(response).await?.into_result()
    }

    async fn signed_post(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<Envelope, ExchangeError> {
        let credentials = self.require_credentials()?;
        let url = format!("{}{}", self.config.base_url, endpoint);
        let payload = body.to_string();
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(credentials, &timestamp, &payload)?;

        tracing::debug!(endpoint, "POST (signed)");

        let response = self
            .client
            .post(&url)
            .header("X-BAPI-API-KEY", &credentials.api_key)
            .header("X-BAPI-TIMESTAMP", &timestamp)
            .header("X-BAPI-RECV-WINDOW", self.config.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;

        Self::read_envelope(response).await
    }

    fn require_credentials(&self) -> Result<&Credentials, ExchangeError> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ExchangeError::Unauthorized("API credentials not configured".into()))
    }

    fn sign(
        &self,
        credentials: &Credentials,
        timestamp: &str,
        payload: &str,
    ) -> Result<String, ExchangeError> {
        sign_payload(
            &credentials.api_secret,
            timestamp,
            &credentials.api_key,
            self.config.recv_window_ms,
            payload,
        )
    }

    async fn read_envelope(response: Response) -> Result<Envelope, ExchangeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketData for BybitClient {
    async fn get_price(
        &self,
        category: Category,
        symbol: &Symbol,
    ) -> Result<Decimal, ExchangeError> {
        let params = [
            ("category", category.as_str().to_string()),
            ("symbol", symbol.to_string()),
        ];
        let result: TickerResult = self.public_get("/v5/market/tickers", &params).await?;

        let ticker = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;
        parse_decimal("lastPrice", &ticker.last_price)
    }

    async fn get_price_change(
        &self,
        category: Category,
        symbol: &Symbol,
        lookback_hours: u32,
    ) -> Result<Decimal, ExchangeError> {
        let params = [
            ("category", category.as_str().to_string()),
            ("symbol", symbol.to_string()),
            ("interval", "60".to_string()),
            ("limit", (lookback_hours + 1).to_string()),
        ];
        let result: KlineResult = self.public_get("/v5/market/kline", &params).await?;

        change_from_klines(&symbol.to_string(), &result.list, lookback_hours as usize)
    }
}

#[async_trait]
impl OrderGateway for BybitClient {
    async fn get_wallet_balance(&self, coin: &str) -> Result<Decimal, ExchangeError> {
        let params = [
            ("accountType", self.config.account_type.clone()),
            ("coin", coin.to_string()),
        ];
        let result: WalletResult = self.signed_get("/v5/account/wallet-balance", &params).await?;
        balance_of(&result, coin)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let body = serde_json::json!({
            "category": order.category.as_str(),
            "symbol": order.symbol.to_string(),
            "side": order.side.as_str(),
            "orderType": "Market",
            "qty": order.qty.normalize().to_string(),
            "marketUnit": order.unit.as_str(),
        });

        let envelope = self.signed_post("/v5/order/create", &body).await?;
        order_ack(envelope)
    }

    async fn get_instrument_min_order(
        &self,
        category: Category,
        symbol: &Symbol,
    ) -> Result<InstrumentLimits, ExchangeError> {
        let params = [
            ("category", category.as_str().to_string()),
            ("symbol", symbol.to_string()),
        ];
        let result: InstrumentResult = self
            .public_get("/v5/market/instruments-info", &params)
            .await?;

        let instrument = result
            .list
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::SymbolNotFound(symbol.to_string()))?;

        Ok(InstrumentLimits {
            min_qty: parse_balance(&instrument.lot_size_filter.min_order_qty)?,
            min_notional: parse_balance(&instrument.lot_size_filter.min_order_amt)?,
        })
    }
}

/// Response envelope shared by every v5 endpoint.
///
/// `result` stays untyped until the status code is known: error responses
/// carry an empty object there.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    ret_code: i64,
    ret_msg: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl Envelope {
    fn into_result<T: DeserializeOwned>(self) -> Result<T, ExchangeError> {
        match self.ret_code {
            0 => Ok(serde_json::from_value(self.result)?),
            RATE_LIMIT_CODE => Err(ExchangeError::RateLimited(self.ret_msg)),
            code if AUTH_ERROR_CODES.contains(&code) => Err(ExchangeError::Unauthorized(self.ret_msg)),
            code => Err(ExchangeError::Api {
                code,
                message: self.ret_msg,
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    last_price: String,
}

/// Kline rows: `[startTime, open, high, low, close, volume, turnover]`, newest first
#[derive(Debug, Deserialize)]
struct KlineResult {
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct WalletResult {
    list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
struct WalletAccount {
    #[serde(default)]
    coin: Vec<WalletCoin>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletCoin {
    coin: String,
    #[serde(default)]
    wallet_balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstrumentResult {
    list: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Instrument {
    lot_size_filter: LotSizeFilter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilter {
    #[serde(default)]
    min_order_qty: String,
    #[serde(default)]
    min_order_amt: String,
}

fn build_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn sign_payload(
    secret: &str,
    timestamp: &str,
    api_key: &str,
    recv_window_ms: u64,
    payload: &str,
) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Unauthorized(format!("invalid API secret: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(api_key.as_bytes());
    mac.update(recv_window_ms.to_string().as_bytes());
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Order rejections stay in the ack; only rate limiting is raised as an error
fn order_ack(envelope: Envelope) -> Result<OrderAck, ExchangeError> {
    if envelope.ret_code == RATE_LIMIT_CODE {
        return Err(ExchangeError::RateLimited(envelope.ret_msg));
    }

    let order_id = if envelope.ret_code == 0 {
        let result: OrderResult = serde_json::from_value(envelope.result)?;
        result.order_id
    } else {
        None
    };

    Ok(OrderAck {
        status_code: envelope.ret_code,
        order_id,
        message: envelope.ret_msg,
    })
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal, ExchangeError> {
    Decimal::from_str(raw).map_err(|e| ExchangeError::Parse(format!("{}={:?}: {}", field, raw, e)))
}

/// Balances are reported as empty strings when the coin is not held
fn parse_balance(raw: &str) -> Result<Decimal, ExchangeError> {
    if raw.trim().is_empty() {
        return Ok(Decimal::ZERO);
    }
    parse_decimal("balance", raw)
}

fn balance_of(result: &WalletResult, coin: &str) -> Result<Decimal, ExchangeError> {
    let entry = result
        .list
        .iter()
        .flat_map(|account| account.coin.iter())
        .find(|c| c.coin.eq_ignore_ascii_case(coin));

    match entry {
        Some(c) => parse_balance(&c.wallet_balance),
        None => Ok(Decimal::ZERO),
    }
}

/// Percent change from the close `lookback` candles back to the latest close
fn change_from_klines(
    symbol: &str,
    rows: &[Vec<String>],
    lookback: usize,
) -> Result<Decimal, ExchangeError> {
    if rows.len() <= lookback {
        return Err(ExchangeError::InsufficientHistory {
            symbol: symbol.to_string(),
            needed: lookback + 1,
            got: rows.len(),
        });
    }

    let close = |row: &Vec<String>| -> Result<Decimal, ExchangeError> {
        let raw = row
            .get(4)
            .ok_or_else(|| ExchangeError::Parse(format!("kline row without close: {:?}", row)))?;
        parse_decimal("close", raw)
    };

    let latest = close(&rows[0])?;
    let earlier = close(&rows[lookback])?;
    Ok(crate::numeric::pct_change(earlier, latest))
}
