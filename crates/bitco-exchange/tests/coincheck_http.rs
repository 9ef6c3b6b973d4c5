//! Coincheck 클라이언트 HTTP 통합 테스트 (mockito 서버 사용).

use bitco_core::{OrderSide, Pair, QuoteRequest};
use bitco_exchange::{CoincheckClient, CoincheckConfig, ErrorClass, ExchangeClient, ExchangeError};
use mockito::Matcher;
use rust_decimal_macros::dec;

fn client_for(server: &mockito::ServerGuard) -> CoincheckClient {
    let config = CoincheckConfig::new("test-access", "test-secret").with_base_url(server.url());
    CoincheckClient::new(config).unwrap()
}

#[tokio::test]
async fn test_get_ticker() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/ticker")
        .match_query(Matcher::UrlEncoded("pair".into(), "btc_jpy".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"last":5000000.0,"bid":4999000.0,"ask":5001000.0,"high":5100000.0,"low":4900000.0,"volume":"1234.5","timestamp":1700000000}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let ticker = client.get_ticker(Pair::BtcJpy).await.unwrap();

    mock.assert_async().await;
    assert_eq!(ticker.last, dec!(5000000));
    assert_eq!(ticker.spread(), dec!(2000));
    assert_eq!(ticker.timestamp.timestamp(), 1700000000);
}

#[tokio::test]
async fn test_quote_builds_rate_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/exchange/orders/rate")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("order_type".into(), "buy".into()),
            Matcher::UrlEncoded("pair".into(), "btc_jpy".into()),
            Matcher::UrlEncoded("price".into(), "500".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"success":true,"rate":"5000000","price":"500","amount":"0.0001"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let quote = client
        .get_quote(&QuoteRequest::buy_for_price(Pair::BtcJpy, dec!(500)))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(quote.rate, dec!(5000000));
    assert_eq!(quote.amount, dec!(0.0001));
}

#[tokio::test]
async fn test_signed_request_carries_auth_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/accounts/balance")
        .match_header("ACCESS-KEY", "test-access")
        .match_header("ACCESS-NONCE", Matcher::Regex(r"^\d+$".into()))
        .match_header("ACCESS-SIGNATURE", Matcher::Regex("^[0-9a-f]{64}$".into()))
        .with_status(200)
        .with_body(r#"{"success":true,"jpy":"12345.5","btc":"0.25","jpy_reserved":"0"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let balance = client.get_balances().await.unwrap();

    mock.assert_async().await;
    assert_eq!(balance.available("jpy"), dec!(12345.5));
    assert_eq!(balance.available("btc"), dec!(0.25));
}

#[tokio::test]
async fn test_place_limit_order_posts_json_body() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/exchange/orders")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJsonString(
            r#"{"pair":"btc_jpy","order_type":"buy","rate":"5000000","amount":"0.0001"}"#.into(),
        ))
        .with_status(200)
        .with_body(
            r#"{"success":true,"id":42,"rate":"5000000.0","amount":"0.0001","order_type":"buy","stop_loss_rate":null,"pair":"btc_jpy","created_at":"2024-01-01T00:00:00.000Z"}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let confirmation = client
        .place_limit_order(Pair::BtcJpy, OrderSide::Buy, dec!(5000000), dec!(0.0001), None)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(confirmation.order_id, 42);
    assert_eq!(confirmation.side, OrderSide::Buy);
}

#[tokio::test]
async fn test_cancel_order_uses_delete() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("DELETE", "/api/exchange/orders/42")
        .with_status(200)
        .with_body(r#"{"success":true,"id":42}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let cancelled = client.cancel_order(42).await.unwrap();

    mock.assert_async().await;
    assert_eq!(cancelled.order_id, 42);
}

#[tokio::test]
async fn test_list_open_orders() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/exchange/orders/opens")
        .with_status(200)
        .with_body(
            r#"{"success":true,"orders":[{"id":202835,"order_type":"buy","rate":26890,"pair":"btc_jpy","pending_amount":"0.5527","pending_market_buy_amount":null,"stop_loss_rate":null,"created_at":"2015-01-10T05:55:38.000Z"}]}"#,
        )
        .create_async()
        .await;

    let client = client_for(&server);
    let orders = client.list_open_orders().await.unwrap();

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].order_id, 202835);
    assert_eq!(orders[0].amount, Some(dec!(0.5527)));
}

#[tokio::test]
async fn test_unauthorized_response_is_auth_class() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/accounts/balance")
        .with_status(401)
        .with_body(r#"{"success":false,"error":"invalid authentication"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.get_balances().await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Auth);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_rejected_order_is_exchange_class() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/exchange/orders")
        .with_status(200)
        .with_body(r#"{"success":false,"error":"Amount is not enough"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .place_limit_order(Pair::BtcJpy, OrderSide::Buy, dec!(5000000), dec!(100), None)
        .await
        .unwrap_err();

    assert_eq!(err.class(), ErrorClass::Exchange);
    assert!(err.to_string().contains("Amount is not enough"));
}

#[tokio::test]
async fn test_server_error_is_retryable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/rate/btc_jpy")
        .with_status(503)
        .with_body("Service Unavailable")
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.get_dealer_rate(Pair::BtcJpy).await.unwrap_err();

    assert!(matches!(err, ExchangeError::Http { status: 503, .. }));
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn test_rate_limited() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/trades")
        .match_query(Matcher::Any)
        .with_status(429)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client.get_recent_trades(Pair::BtcJpy).await.unwrap_err();

    assert!(matches!(err, ExchangeError::RateLimited));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_connection_refused_is_transport() {
    let config = CoincheckConfig::new("a", "b").with_base_url("http://127.0.0.1:1");
    let client = CoincheckClient::new(config).unwrap();

    let err = client.get_ticker(Pair::BtcJpy).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn test_missing_credentials_fail_before_request() {
    let server = mockito::Server::new_async().await;
    let config = CoincheckConfig::new("", "").with_base_url(server.url());
    let client = CoincheckClient::new(config).unwrap();

    let err = client.list_open_orders().await.unwrap_err();
    assert!(err.is_auth_error());
}
