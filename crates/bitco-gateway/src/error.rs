//! 게이트웨이 에러 및 RPC 에러 응답 타입.
//!
//! 모든 엔드포인트는 같은 형식의 에러 본문을 반환합니다:
//!
//! ```json
//! {
//!   "code": "POSITION_CONFLICT",
//!   "message": "Position conflict: order ... is already open",
//!   "details": { "existing": "...", "status": "open" },
//!   "timestamp": 1738300800
//! }
//! ```
//!
//! | 원인 | HTTP | code |
//! |---|---|---|
//! | `PositionConflict` | 409 | `POSITION_CONFLICT` |
//! | `NoOpenPosition` | 404 | `NO_OPEN_POSITION` |
//! | `InvalidTransition` | 409 | `INVALID_TRANSITION` |
//! | `CloseInProgress` | 409 | `CLOSE_IN_PROGRESS` |
//! | `UnknownOrder` | 404 | `UNKNOWN_ORDER` |
//! | `DuplicateTimestamp` | 409 | `DUPLICATE_TIMESTAMP` |
//! | 인증 실패 | 502 | `AUTH_ERROR` |
//! | 거래소 거부 | 422 | `EXCHANGE_ERROR` (원격 메시지 그대로) |
//! | 네트워크 실패 | 503 / 504 | `EXCHANGE_UNAVAILABLE` / `EXCHANGE_TIMEOUT` |
//! | 잘못된 입력 | 400 | `INVALID_INPUT` |

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bitco_exchange::{ErrorClass, ExchangeError};
use bitco_ledger::LedgerError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// 게이트웨이 에러.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// 호출자 입력 오류
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// 게이트웨이 작업 Result 타입.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// HTTP 상태 코드.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Ledger(e) => match e {
                LedgerError::PositionConflict { .. }
                | LedgerError::InvalidTransition { .. }
                | LedgerError::CloseInProgress { .. }
                | LedgerError::DuplicateTimestamp(_) => StatusCode::CONFLICT,
                LedgerError::NoOpenPosition | LedgerError::UnknownOrder(_) => {
                    StatusCode::NOT_FOUND
                }
                LedgerError::Database(_) | LedgerError::Corrupt(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            GatewayError::Exchange(e) => match e.class() {
                ErrorClass::Auth => StatusCode::BAD_GATEWAY,
                ErrorClass::Exchange => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorClass::Invalid => StatusCode::BAD_REQUEST,
                ErrorClass::Transport if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
                ErrorClass::Transport => StatusCode::SERVICE_UNAVAILABLE,
            },
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// 에러 코드 문자열.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Ledger(e) => match e {
                LedgerError::PositionConflict { .. } => "POSITION_CONFLICT",
                LedgerError::NoOpenPosition => "NO_OPEN_POSITION",
                LedgerError::InvalidTransition { .. } => "INVALID_TRANSITION",
                LedgerError::CloseInProgress { .. } => "CLOSE_IN_PROGRESS",
                LedgerError::UnknownOrder(_) => "UNKNOWN_ORDER",
                LedgerError::DuplicateTimestamp(_) => "DUPLICATE_TIMESTAMP",
                LedgerError::Database(_) => "DB_ERROR",
                LedgerError::Corrupt(_) => "LEDGER_CORRUPT",
            },
            GatewayError::Exchange(e) => match e.class() {
                ErrorClass::Auth => "AUTH_ERROR",
                ErrorClass::Exchange => "EXCHANGE_ERROR",
                ErrorClass::Invalid => "INVALID_INPUT",
                ErrorClass::Transport if e.is_timeout() => "EXCHANGE_TIMEOUT",
                ErrorClass::Transport => "EXCHANGE_UNAVAILABLE",
            },
            GatewayError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    /// 사람이 읽을 메시지. 거래소 거부는 원격 메시지를 그대로 전달합니다.
    fn message(&self) -> String {
        match self {
            GatewayError::Exchange(ExchangeError::ApiError { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            GatewayError::Ledger(LedgerError::PositionConflict { existing, status }) => {
                Some(json!({ "existing": existing, "status": status }))
            }
            GatewayError::Ledger(LedgerError::InvalidTransition { local_id, from, to }) => {
                Some(json!({ "local_id": local_id, "from": from, "to": to }))
            }
            GatewayError::Ledger(LedgerError::CloseInProgress {
                local_id,
                close_local_id,
            }) => Some(json!({ "local_id": local_id, "close_local_id": close_local_id })),
            GatewayError::Exchange(ExchangeError::ApiError { code, .. }) => {
                Some(json!({ "remote_code": code }))
            }
            _ => None,
        }
    }

    /// RPC 에러 응답으로 변환.
    pub fn to_response(&self) -> ApiErrorResponse {
        match self.details() {
            Some(details) => ApiErrorResponse::with_details(self.code(), self.message(), details),
            None => ApiErrorResponse::new(self.code(), self.message()),
        }
    }
}

/// 통합 RPC 에러 응답.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "POSITION_CONFLICT")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 시각 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

impl From<GatewayError> for (StatusCode, Json<ApiErrorResponse>) {
    fn from(err: GatewayError) -> Self {
        let status = err.status_code();
        if status.is_server_error() {
            tracing::error!(code = err.code(), error = %err, "Request failed");
        } else {
            tracing::debug!(code = err.code(), error = %err, "Request rejected");
        }
        (status, Json(err.to_response()))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        <(StatusCode, Json<ApiErrorResponse>)>::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitco_core::OrderStatus;
    use uuid::Uuid;

    #[test]
    fn test_ledger_error_mapping() {
        let conflict = GatewayError::from(LedgerError::PositionConflict {
            existing: Uuid::nil(),
            status: OrderStatus::Open,
        });
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "POSITION_CONFLICT");
        let body = conflict.to_response();
        assert_eq!(body.details.unwrap()["status"], "open");

        let none = GatewayError::from(LedgerError::NoOpenPosition);
        assert_eq!(none.status_code(), StatusCode::NOT_FOUND);

        let dup = GatewayError::from(LedgerError::DuplicateTimestamp(1));
        assert_eq!(dup.status_code(), StatusCode::CONFLICT);

        let closing = GatewayError::from(LedgerError::CloseInProgress {
            local_id: Uuid::nil(),
            close_local_id: Uuid::nil(),
        });
        assert_eq!(closing.status_code(), StatusCode::CONFLICT);
        assert_eq!(closing.code(), "CLOSE_IN_PROGRESS");
        assert!(closing.to_response().details.unwrap()["close_local_id"].is_string());
    }

    #[test]
    fn test_exchange_error_mapping() {
        let auth = GatewayError::from(ExchangeError::Unauthorized("bad signature".into()));
        assert_eq!(auth.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(auth.code(), "AUTH_ERROR");

        let timeout = GatewayError::from(ExchangeError::Timeout("1s".into()));
        assert_eq!(timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);

        let down = GatewayError::from(ExchangeError::Http {
            status: 503,
            body: "maintenance".into(),
        });
        assert_eq!(down.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(down.code(), "EXCHANGE_UNAVAILABLE");
    }

    #[test]
    fn test_exchange_rejection_is_verbatim() {
        let err = GatewayError::from(ExchangeError::ApiError {
            code: 400,
            message: "Amount is insufficient".into(),
        });
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = err.to_response();
        assert_eq!(body.message, "Amount is insufficient");
        assert_eq!(body.details.unwrap()["remote_code"], 400);
    }

    #[test]
    fn test_invalid_input() {
        let err = GatewayError::InvalidInput("amount must be positive".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "INVALID_INPUT");
    }
}
