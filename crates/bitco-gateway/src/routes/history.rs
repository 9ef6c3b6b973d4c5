//! 원장 기록 조회 endpoint.
//!
//! - `GET /api/v1/ticks?limit=` - 틱 샘플 (최신순, 기본 1000개)
//! - `GET /api/v1/trade-records?limit=` - 거래 기록 (시간순)
//! - `GET /api/v1/orders?limit=` - 원장 주문 (종료/실패 포함, 최신순)

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use bitco_core::{Order, TickSample, TradeRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::state::AppState;

/// 조회 개수 쿼리.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TicksResponse {
    pub ticks: Vec<TickSample>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TradeRecordsResponse {
    pub trades: Vec<TradeRecord>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
    pub total: usize,
}

/// GET /api/v1/ticks
pub async fn ticks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<TicksResponse>> {
    let ticks = state.gateway.tick_history(query.limit).await?;
    Ok(Json(TicksResponse {
        total: ticks.len(),
        ticks,
    }))
}

/// GET /api/v1/trade-records
pub async fn trade_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<TradeRecordsResponse>> {
    let trades = state.gateway.trade_records(query.limit).await?;
    Ok(Json(TradeRecordsResponse {
        total: trades.len(),
        trades,
    }))
}

/// GET /api/v1/orders
pub async fn orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<OrdersResponse>> {
    let orders = state.gateway.orders(query.limit).await?;
    Ok(Json(OrdersResponse {
        total: orders.len(),
        orders,
    }))
}

/// 기록 조회 라우터 생성.
pub fn history_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ticks", get(ticks))
        .route("/trade-records", get(trade_records))
        .route("/orders", get(orders))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use bitco_exchange::MockExchange;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::state::create_test_state;

    fn sample(offset_secs: i64) -> TickSample {
        TickSample {
            local_id: Uuid::new_v4(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(offset_secs),
            last: dec!(5000000),
            bid: dec!(4999000),
            ask: dec!(5001000),
            high: dec!(5100000),
            low: dec!(4900000),
            volume: dec!(12.5),
        }
    }

    #[tokio::test]
    async fn test_ticks_with_limit_newest_first() {
        let state = Arc::new(create_test_state(Arc::new(MockExchange::new(dec!(1)))).await);
        for offset in 0..3 {
            state.gateway.ledger().append_tick(&sample(offset)).await.unwrap();
        }
        let app = history_router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ticks?limit=2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let list: TicksResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(list.total, 2);
        assert_eq!(list.ticks[0].timestamp, sample(2).timestamp);
        assert_eq!(list.ticks[1].timestamp, sample(1).timestamp);
        assert_eq!(list.ticks[0].volume, dec!(12.5));
    }

    #[tokio::test]
    async fn test_trade_records_empty() {
        let state = Arc::new(create_test_state(Arc::new(MockExchange::new(dec!(1)))).await);
        let app = history_router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/trade-records")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let list: TradeRecordsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(list.total, 0);
    }
}
