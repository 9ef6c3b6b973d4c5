//! 거래소 에러 타입.
//!
//! 모든 에러는 세 가지 분류 중 하나에 속합니다:
//! - **Transport**: 네트워크/HTTP 수준 실패. 조회는 재시도 가능, 주문 변경은 재시도 금지
//! - **Auth**: 서명/자격증명 거부. 프로세스 외부에서 자격증명을 고쳐야 함
//! - **Exchange**: 거래소의 업무 규칙 거부. 원격 메시지를 그대로 전달
//!
//! 요청 형식 검증 실패는 네트워크 호출 전에 `InvalidRequest`로 반환됩니다.

use thiserror::Error;

/// 에러 분류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// 네트워크/HTTP 실패
    Transport,
    /// 인증 실패
    Auth,
    /// 거래소 업무 거부
    Exchange,
    /// 요청 형식 오류 (네트워크 호출 없음)
    Invalid,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Transport => write!(f, "transport"),
            ErrorClass::Auth => write!(f, "auth"),
            ErrorClass::Exchange => write!(f, "exchange"),
            ErrorClass::Invalid => write!(f, "invalid"),
        }
    }
}

/// 거래소 관련 에러.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// 요청 한도 초과
    #[error("Rate limit exceeded")]
    RateLimited,

    /// 해석할 수 없는 HTTP 에러 응답
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),

    /// 인증/권한 에러
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 거래소가 반환한 에러 페이로드 (메시지 원문 유지)
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 형식이 잘못된 요청
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ExchangeError {
    /// 에러 분류를 반환합니다.
    pub fn class(&self) -> ErrorClass {
        match self {
            ExchangeError::NetworkError(_)
            | ExchangeError::Timeout(_)
            | ExchangeError::RateLimited
            | ExchangeError::Http { .. }
            | ExchangeError::ParseError(_) => ErrorClass::Transport,
            ExchangeError::Unauthorized(_) => ErrorClass::Auth,
            ExchangeError::ApiError { .. } => ErrorClass::Exchange,
            ExchangeError::InvalidRequest(_) => ErrorClass::Invalid,
        }
    }

    /// 조회 작업에서 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transport
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        self.class() == ErrorClass::Auth
    }

    /// 타임아웃인지 확인.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExchangeError::Timeout(_))
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_decode() {
            ExchangeError::ParseError(err.to_string())
        } else {
            ExchangeError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            ExchangeError::Timeout("1s".into()).class(),
            ErrorClass::Transport
        );
        assert_eq!(
            ExchangeError::Http {
                status: 502,
                body: "bad gateway".into()
            }
            .class(),
            ErrorClass::Transport
        );
        assert_eq!(
            ExchangeError::Unauthorized("invalid signature".into()).class(),
            ErrorClass::Auth
        );
        assert_eq!(
            ExchangeError::ApiError {
                code: 400,
                message: "Amount is not enough".into()
            }
            .class(),
            ErrorClass::Exchange
        );
        assert_eq!(
            ExchangeError::InvalidRequest("amount".into()).class(),
            ErrorClass::Invalid
        );
    }

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(ExchangeError::NetworkError("reset".into()).is_retryable());
        assert!(ExchangeError::RateLimited.is_retryable());
        assert!(!ExchangeError::Unauthorized("x".into()).is_retryable());
        assert!(!ExchangeError::ApiError {
            code: 400,
            message: "x".into()
        }
        .is_retryable());
        assert!(!ExchangeError::InvalidRequest("x".into()).is_retryable());
    }

    #[test]
    fn test_remote_message_kept_verbatim() {
        let err = ExchangeError::ApiError {
            code: 400,
            message: "残高が不足しています".into(),
        };
        assert_eq!(err.to_string(), "API error 400: 残高が不足しています");
    }
}
