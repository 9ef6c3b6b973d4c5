//! 헬스 체크 endpoint.
//!
//! - `GET /health` - 서버, 원장, 거래소 자격증명, 샘플러 상태

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::AppState;

/// 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 전체 상태 ("healthy" | "degraded")
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// 현재 시간 (ISO 8601)
    pub timestamp: String,
    pub components: ComponentHealth,
}

/// 개별 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub ledger: ComponentStatus,
    pub exchange: ComponentStatus,
    pub sampler: ComponentStatus,
}

/// 컴포넌트 상태.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// "up" | "down" | "not_configured"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentStatus {
    pub fn up() -> Self {
        Self {
            status: "up".to_string(),
            message: None,
        }
    }

    pub fn up_with_info(message: impl Into<String>) -> Self {
        Self {
            status: "up".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn down(message: impl Into<String>) -> Self {
        Self {
            status: "down".to_string(),
            message: Some(message.into()),
        }
    }

    pub fn not_configured() -> Self {
        Self {
            status: "not_configured".to_string(),
            message: None,
        }
    }
}

/// GET /health
///
/// 원장 연결 실패 시 503. 거래소는 네트워크 호출 없이 자격증명 설정 여부만 보고합니다.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut overall_status = "healthy";
    let mut status_code = StatusCode::OK;

    let ledger = match state.gateway.ledger().health_check().await {
        Ok(()) => ComponentStatus::up(),
        Err(e) => {
            overall_status = "degraded";
            status_code = StatusCode::SERVICE_UNAVAILABLE;
            ComponentStatus::down(e.to_string())
        }
    };

    let exchange = if state.credentials_configured {
        ComponentStatus::up_with_info(state.gateway.exchange_name())
    } else {
        ComponentStatus::not_configured()
    };

    let sampler = if state.sampler_enabled {
        ComponentStatus::up()
    } else {
        ComponentStatus::not_configured()
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        version: state.version.clone(),
        uptime_secs: state.uptime_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: ComponentHealth {
            ledger,
            exchange,
            sampler,
        },
    };

    (status_code, Json(response))
}

/// 헬스 체크 라우터 생성.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use bitco_exchange::MockExchange;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    use crate::state::create_test_state;

    #[tokio::test]
    async fn test_health_reports_components() {
        let state = Arc::new(create_test_state(Arc::new(MockExchange::new(dec!(1)))).await);
        let app = Router::new()
            .route("/health", get(health_check))
            .with_state(state);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.components.ledger.status, "up");
        assert_eq!(health.components.exchange.message.as_deref(), Some("mock"));
        assert_eq!(health.components.sampler.status, "not_configured");
    }
}
