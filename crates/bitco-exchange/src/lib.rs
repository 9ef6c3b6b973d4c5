//! 거래소 클라이언트 퍼사드.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - `ExchangeClient` trait: 거래소 기능별 단일 작업 인터페이스
//! - Coincheck REST 커넥터 (요청별 HMAC 서명)
//! - 조회 전용 호출을 위한 제한된 재시도 정책
//! - 테스트 및 드라이런용 인메모리 거래소
//!
//! 이 계층은 상태를 갖지 않으며 재시도를 수행하지 않습니다.
//! 어떤 호출을 재시도해도 안전한지는 호출자만 알 수 있습니다.

pub mod connector;
pub mod error;
pub mod mock;
pub mod retry;
pub mod traits;

pub use connector::{CoincheckClient, CoincheckConfig};
pub use error::*;
pub use mock::{MockExchange, MockOp};
pub use retry::{with_read_retry, RetryPolicy};
pub use traits::*;
