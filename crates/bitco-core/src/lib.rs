//! # Bitco Core
//!
//! 거래소 게이트웨이의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 게이트웨이 전반에서 사용되는 기본 타입을 제공합니다:
//! - 통화쌍, 주문 방향 등 닫힌 열거형과 와이어 문자열 매핑
//! - 시세, 잔고, 주문, 거래 기록, 틱 샘플 값 타입
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
