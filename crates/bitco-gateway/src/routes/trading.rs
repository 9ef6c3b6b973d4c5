//! 주문 변경 endpoint.
//!
//! 모든 요청은 거래소 미체결 목록과 원장을 먼저 대조한 뒤 처리됩니다.
//!
//! # 엔드포인트
//!
//! - `GET /api/v1/position` - 현재 포지션
//! - `POST /api/v1/buy` - 고정 금액 매수
//! - `POST /api/v1/sell` - 포지션 전량 매도
//! - `POST /api/v1/cancel` - 포지션 주문 취소
//! - `POST /api/v1/reconcile` - 명시적 대조

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use bitco_core::{Order, Pair};
use bitco_ledger::ReconcileOutcome;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiResult;
use crate::service::CancelResult;
use crate::state::AppState;

/// 매수 요청.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuyRequest {
    #[serde(default)]
    pub pair: Pair,
    /// 사용할 결제 통화 금액
    pub amount: Decimal,
}

/// 매도 요청.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SellRequest {
    #[serde(default)]
    pub pair: Pair,
}

/// 현재 포지션 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct PositionResponse {
    pub position: Option<Order>,
}

/// GET /api/v1/position
pub async fn position(State(state): State<Arc<AppState>>) -> ApiResult<Json<PositionResponse>> {
    let position = state.gateway.position().await?;
    Ok(Json(PositionResponse { position }))
}

/// POST /api/v1/buy
pub async fn buy(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BuyRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.gateway.buy(request.pair, request.amount).await?))
}

/// POST /api/v1/sell
pub async fn sell(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SellRequest>,
) -> ApiResult<Json<Order>> {
    Ok(Json(state.gateway.sell(request.pair).await?))
}

/// POST /api/v1/cancel
pub async fn cancel(State(state): State<Arc<AppState>>) -> ApiResult<Json<CancelResult>> {
    Ok(Json(state.gateway.cancel().await?))
}

/// POST /api/v1/reconcile
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ReconcileOutcome>> {
    Ok(Json(state.gateway.reconcile().await?))
}

/// 주문 변경 라우터 생성.
pub fn trading_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/position", get(position))
        .route("/buy", post(buy))
        .route("/sell", post(sell))
        .route("/cancel", post(cancel))
        .route("/reconcile", post(reconcile))
}
