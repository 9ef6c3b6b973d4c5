//! # Bitco Gateway
//!
//! 거래소 API를 타입이 있는 RPC 경계 뒤에 노출하면서, 로컬 원장으로
//! 단일 포지션을 추적하는 게이트웨이입니다.
//!
//! - `service::GatewayService`: 조회는 거래소로 그대로 전달하고, 주문 변경은
//!   항상 거래소 미체결 목록과 원장을 먼저 대조한 뒤에 수행합니다.
//! - `routes`: JSON over HTTP 라우터 (`axum`)
//! - `error`: 에러 → HTTP 상태/에러 코드 매핑

pub mod error;
pub mod routes;
pub mod service;
pub mod state;

pub use error::{ApiErrorResponse, ApiResult, GatewayError, GatewayResult};
pub use routes::create_api_router;
pub use service::{AssetsSummary, CancelResult, GatewayService, GatewaySettings};
pub use state::AppState;
