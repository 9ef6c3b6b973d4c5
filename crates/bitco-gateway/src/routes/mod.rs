//! RPC 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크
//! - `/api/v1/...` - 시장 조회, 주문 변경, 원장 기록

pub mod health;
pub mod history;
pub mod market;
pub mod trading;

pub use health::{health_router, ComponentHealth, ComponentStatus, HealthResponse};
pub use history::{history_router, LimitQuery, OrdersResponse, TicksResponse, TradeRecordsResponse};
pub use market::{market_router, OpenOrdersResponse, PairQuery, RecentTradesResponse};
pub use trading::{trading_router, BuyRequest, PositionResponse, SellRequest};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new().nest("/health", health_router()).nest(
        "/api/v1",
        Router::new()
            .merge(market_router())
            .merge(trading_router())
            .merge(history_router()),
    )
}
