//! 시장/계좌 조회 endpoint.
//!
//! 원장을 거치지 않고 거래소로 전달되는 읽기 작업입니다.
//!
//! # 엔드포인트
//!
//! - `POST /api/v1/quote` - 주문 견적
//! - `GET /api/v1/ticker?pair=` - 최신 시세
//! - `GET /api/v1/rate/{pair}` - 판매소 환율
//! - `GET /api/v1/order-book?pair=` - 호가창
//! - `GET /api/v1/trades/recent?pair=` - 최근 공개 체결
//! - `GET /api/v1/balances` - 잔고
//! - `GET /api/v1/orders/open` - 거래소 미체결 주문
//! - `GET /api/v1/assets?pair=` - 총 자산

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use bitco_core::{
    Balance, DealerRate, OrderBook, OrderConfirmation, Pair, PublicTrade, Quote, QuoteRequest,
    Ticker,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::service::AssetsSummary;
use crate::state::AppState;

/// 통화쌍 쿼리 (생략 시 btc_jpy).
#[derive(Debug, Default, Deserialize)]
pub struct PairQuery {
    #[serde(default)]
    pub pair: Pair,
}

/// 최근 체결 목록 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecentTradesResponse {
    pub trades: Vec<PublicTrade>,
    pub total: usize,
}

/// 미체결 주문 목록 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct OpenOrdersResponse {
    pub orders: Vec<OrderConfirmation>,
    pub total: usize,
}

/// POST /api/v1/quote
pub async fn quote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<Quote>> {
    Ok(Json(state.gateway.quote(&request).await?))
}

/// GET /api/v1/ticker
pub async fn ticker(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> ApiResult<Json<Ticker>> {
    Ok(Json(state.gateway.ticker(query.pair).await?))
}

/// GET /api/v1/rate/{pair}
pub async fn dealer_rate(
    State(state): State<Arc<AppState>>,
    Path(pair): Path<Pair>,
) -> ApiResult<Json<DealerRate>> {
    Ok(Json(state.gateway.dealer_rate(pair).await?))
}

/// GET /api/v1/order-book
pub async fn order_book(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> ApiResult<Json<OrderBook>> {
    Ok(Json(state.gateway.order_book(query.pair).await?))
}

/// GET /api/v1/trades/recent
pub async fn recent_trades(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> ApiResult<Json<RecentTradesResponse>> {
    let trades = state.gateway.recent_trades(query.pair).await?;
    Ok(Json(RecentTradesResponse {
        total: trades.len(),
        trades,
    }))
}

/// GET /api/v1/balances
pub async fn balances(State(state): State<Arc<AppState>>) -> ApiResult<Json<Balance>> {
    Ok(Json(state.gateway.balances().await?))
}

/// GET /api/v1/orders/open
pub async fn open_orders(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<OpenOrdersResponse>> {
    let orders = state.gateway.open_orders().await?;
    Ok(Json(OpenOrdersResponse {
        total: orders.len(),
        orders,
    }))
}

/// GET /api/v1/assets
pub async fn assets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> ApiResult<Json<AssetsSummary>> {
    Ok(Json(state.gateway.assets(query.pair).await?))
}

/// 시장/계좌 조회 라우터 생성.
pub fn market_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/quote", post(quote))
        .route("/ticker", get(ticker))
        .route("/rate/{pair}", get(dealer_rate))
        .route("/order-book", get(order_book))
        .route("/trades/recent", get(recent_trades))
        .route("/balances", get(balances))
        .route("/orders/open", get(open_orders))
        .route("/assets", get(assets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use bitco_exchange::{ExchangeError, MockExchange, MockOp};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    use crate::error::ApiErrorResponse;
    use crate::state::create_test_state;

    async fn app(exchange: Arc<MockExchange>) -> Router {
        let state = Arc::new(create_test_state(exchange).await);
        market_router().with_state(state)
    }

    #[tokio::test]
    async fn test_quote_returns_decimal_strings() {
        let app = app(Arc::new(MockExchange::new(dec!(5000000)))).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/quote")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"pair":"btc_jpy","side":"buy","by":"price","value":"500"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["rate"], "5000000");
        let amount: rust_decimal::Decimal = json["amount"].as_str().unwrap().parse().unwrap();
        assert_eq!(amount, dec!(0.0001));
    }

    #[tokio::test]
    async fn test_dealer_rate_path() {
        let app = app(Arc::new(MockExchange::with_rates(dec!(5000000), dec!(4900000)))).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rate/btc_jpy")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let rate: DealerRate = serde_json::from_slice(&body).unwrap();
        assert_eq!(rate.rate, dec!(4900000));
    }

    #[tokio::test]
    async fn test_auth_failure_maps_to_bad_gateway() {
        let exchange = Arc::new(MockExchange::new(dec!(1)));
        exchange
            .fail_next(MockOp::Balances, ExchangeError::Unauthorized("invalid key".into()))
            .await;
        let app = app(exchange).await;

        let response = app
            .oneshot(Request::builder().uri("/balances").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ApiErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.code, "AUTH_ERROR");
    }

    #[tokio::test]
    async fn test_open_orders_empty() {
        let app = app(Arc::new(MockExchange::new(dec!(1)))).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/orders/open")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let list: OpenOrdersResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.total, 0);
    }
}
