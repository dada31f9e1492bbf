//! Bybit client against a mocked REST API

use crate::common::{bybit_server, instrument, klines, mock_json, ticker, wallet};
use mockito::Matcher;
use rust_decimal_macros::dec;
use trailstop::exchange::{
    BybitClient, BybitConfig, Category, Credentials, ExchangeError, MarketData, OrderGateway,
    OrderRequest, PaperExchange, Symbol,
};

fn client(base_url: String, credentials: Option<Credentials>) -> BybitClient {
    BybitClient::new(
        BybitConfig {
            base_url,
            ..BybitConfig::default()
        },
        credentials,
    )
    .unwrap()
}

fn credentials() -> Option<Credentials> {
    Some(Credentials::new("test-key-123456", "test-secret"))
}

fn xrp() -> Symbol {
    Symbol::new("XRP", "USDT")
}

#[tokio::test]
async fn test_get_price() {
    let mut server = bybit_server().await;
    let mock = server
        .mock("GET", "/v5/market/tickers")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("category".into(), "spot".into()),
            Matcher::UrlEncoded("symbol".into(), "XRPUSDT".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(ticker("0.5123"))
        .create_async()
        .await;

    let price = client(server.url(), None)
        .get_price(Category::Spot, &xrp())
        .await
        .unwrap();

    assert_eq!(price, dec!(0.5123));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_price_change_uses_lookback_close() {
    let mut server = bybit_server().await;
    let mock = server
        .mock("GET", "/v5/market/kline")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("interval".into(), "60".into()),
            Matcher::UrlEncoded("limit".into(), "4".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(klines(&["97", "98", "99", "100"]))
        .create_async()
        .await;

    let change = client(server.url(), None)
        .get_price_change(Category::Spot, &xrp(), 3)
        .await
        .unwrap();

    assert_eq!(change, dec!(-3));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_short_history_is_an_error() {
    let mut server = bybit_server().await;
    let _mock = mock_json(&mut server, "GET", "/v5/market/kline", 200, klines(&["97"])).await;

    let result = client(server.url(), None)
        .get_price_change(Category::Spot, &xrp(), 3)
        .await;

    assert!(matches!(
        result,
        Err(ExchangeError::InsufficientHistory { .. })
    ));
}

#[tokio::test]
async fn test_instrument_limits() {
    let mut server = bybit_server().await;
    let _mock = mock_json(
        &mut server,
        "GET",
        "/v5/market/instruments-info",
        200,
        instrument("0.1", "1"),
    )
    .await;

    let limits = client(server.url(), None)
        .get_instrument_min_order(Category::Spot, &xrp())
        .await
        .unwrap();

    assert_eq!(limits.min_qty, dec!(0.1));
    assert_eq!(limits.min_notional, dec!(1));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let mut server = bybit_server().await;
    let _mock = mock_json(&mut server, "GET", "/v5/market/tickers", 503, "busy").await;

    let err = client(server.url(), None)
        .get_price(Category::Spot, &xrp())
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Http { status: 503, .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_api_error_codes() {
    let mut server = bybit_server().await;
    let _tickers = mock_json(
        &mut server,
        "GET",
        "/v5/market/tickers",
        200,
        r#"{"retCode":10001,"retMsg":"params error: symbol invalid","result":{}}"#,
    )
    .await;
    let _kline = mock_json(
        &mut server,
        "GET",
        "/v5/market/kline",
        200,
        r#"{"retCode":10006,"retMsg":"Too many visits!","result":{}}"#,
    )
    .await;
    let client = client(server.url(), None);

    let err = client.get_price(Category::Spot, &xrp()).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Api { code: 10001, .. }));
    assert!(!err.is_retryable());

    let err = client
        .get_price_change(Category::Spot, &xrp(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::RateLimited(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_wallet_balance_signed() {
    let mut server = bybit_server().await;
    let mock = server
        .mock("GET", "/v5/account/wallet-balance")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("accountType".into(), "UNIFIED".into()),
            Matcher::UrlEncoded("coin".into(), "XRP".into()),
        ]))
        .match_header("X-BAPI-API-KEY", "test-key-123456")
        .match_header("X-BAPI-RECV-WINDOW", "60000")
        .match_header("X-BAPI-SIGN", Matcher::Regex("^[0-9a-f]{64}$".into()))
        .with_header("content-type", "application/json")
        .with_body(wallet("XRP", "12.5"))
        .create_async()
        .await;

    let balance = client(server.url(), credentials())
        .get_wallet_balance("XRP")
        .await
        .unwrap();

    assert_eq!(balance, dec!(12.5));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_wallet_balance_requires_credentials() {
    let mut server = bybit_server().await;
    let mock = server
        .mock("GET", "/v5/account/wallet-balance")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let err = client(server.url(), None)
        .get_wallet_balance("XRP")
        .await
        .unwrap_err();

    assert!(matches!(err, ExchangeError::Unauthorized(_)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_place_order_ack() {
    let mut server = bybit_server().await;
    let mock = server
        .mock("POST", "/v5/order/create")
        .match_header("X-BAPI-SIGN", Matcher::Regex("^[0-9a-f]{64}$".into()))
        .match_body(Matcher::PartialJsonString(
            r#"{"category":"spot","symbol":"XRPUSDT","side":"Buy","orderType":"Market","qty":"100","marketUnit":"quoteCoin"}"#
                .into(),
        ))
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"retCode":0,"retMsg":"OK","result":{"orderId":"1321003749386327552","orderLinkId":""}}"#,
        )
        .create_async()
        .await;

    let order = OrderRequest::market_buy(Category::Spot, xrp(), dec!(100));
    let ack = client(server.url(), credentials())
        .place_order(&order)
        .await
        .unwrap();

    assert!(ack.is_success());
    assert_eq!(ack.order_id.as_deref(), Some("1321003749386327552"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_place_order_rejection_stays_in_ack() {
    let mut server = bybit_server().await;
    let _mock = mock_json(
        &mut server,
        "POST",
        "/v5/order/create",
        200,
        r#"{"retCode":170140,"retMsg":"Order value exceeded lower limit.","result":{}}"#,
    )
    .await;

    let order = OrderRequest::market_sell(Category::Spot, xrp(), dec!(0.1));
    let ack = client(server.url(), credentials())
        .place_order(&order)
        .await
        .unwrap();

    assert!(!ack.is_success());
    assert_eq!(ack.status_code, 170140);
    assert!(ack.order_id.is_none());
}

#[tokio::test]
async fn test_paper_exchange_over_bybit_prices() {
    let mut server = bybit_server().await;
    let _mock = mock_json(&mut server, "GET", "/v5/market/tickers", 200, ticker("0.5")).await;
    let paper = PaperExchange::new(client(server.url(), None), dec!(0), "USDT", dec!(50));

    let order = OrderRequest::market_buy(Category::Spot, xrp(), dec!(20));
    let ack = paper.place_order(&order).await.unwrap();

    assert!(ack.is_success());
    assert_eq!(paper.get_wallet_balance("XRP").await.unwrap(), dec!(40));
    assert_eq!(paper.get_wallet_balance("USDT").await.unwrap(), dec!(30));
}
