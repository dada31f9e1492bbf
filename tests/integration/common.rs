//! Bybit REST responses served through mockito

use mockito::{Matcher, Mock, ServerGuard};

/// Start a mock Bybit server
pub async fn bybit_server() -> ServerGuard {
    mockito::Server::new_async().await
}

/// Reply to `method path` with a JSON body, whatever the query string
pub async fn mock_json(
    server: &mut ServerGuard,
    method: &str,
    path: &str,
    status: usize,
    body: impl AsRef<str>,
) -> Mock {
    server
        .mock(method, path)
        .match_query(Matcher::Any)
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.as_ref())
        .create_async()
        .await
}

pub fn ticker(price: &str) -> String {
    format!(
        r#"{{"retCode":0,"retMsg":"OK","result":{{"category":"spot","list":[{{"symbol":"XRPUSDT","lastPrice":"{}"}}]}}}}"#,
        price
    )
}

/// Hourly klines, closes given newest first
pub fn klines(closes: &[&str]) -> String {
    let rows: Vec<String> = closes
        .iter()
        .enumerate()
        .map(|(i, c)| {
            format!(
                r#"["{}","1","1","1","{}","10","10"]"#,
                1_700_000_000_000u64 - i as u64 * 3_600_000,
                c
            )
        })
        .collect();
    format!(
        r#"{{"retCode":0,"retMsg":"OK","result":{{"symbol":"XRPUSDT","category":"spot","list":[{}]}}}}"#,
        rows.join(",")
    )
}

pub fn instrument(min_qty: &str, min_amt: &str) -> String {
    format!(
        r#"{{"retCode":0,"retMsg":"OK","result":{{"category":"spot","list":[{{"symbol":"XRPUSDT","lotSizeFilter":{{"basePrecision":"0.01","minOrderQty":"{}","minOrderAmt":"{}"}}}}]}}}}"#,
        min_qty, min_amt
    )
}

pub fn wallet(coin: &str, balance: &str) -> String {
    format!(
        r#"{{"retCode":0,"retMsg":"OK","result":{{"list":[{{"accountType":"UNIFIED","coin":[{{"coin":"{}","walletBalance":"{}"}}]}}]}}}}"#,
        coin, balance
    )
}
