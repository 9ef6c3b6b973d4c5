//! 게이트웨이 공통 에러 타입.
//!
//! 도메인 값 파싱과 설정 로드에서 발생하는 에러를 정의합니다.
//! 거래소/원장 에러는 각 크레이트가 별도로 정의합니다.

use thiserror::Error;

/// 닫힌 열거형에 대한 알 수 없는 와이어 문자열.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("알 수 없는 {kind} 값: '{value}'")]
pub struct ParseEnumError {
    /// 열거형 이름 (예: "Pair")
    pub kind: &'static str,
    /// 입력된 문자열
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum CoreError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(#[from] config::ConfigError),

    /// 열거형 파싱 에러
    #[error(transparent)]
    ParseEnum(#[from] ParseEnumError),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 로깅 초기화 에러
    #[error("로깅 초기화 에러: {0}")]
    Logging(String),
}

/// 핵심 작업을 위한 Result 타입.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
