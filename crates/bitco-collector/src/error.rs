//! 에러 타입 정의.

use bitco_exchange::ExchangeError;
use bitco_ledger::LedgerError;
use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 시세 조회 실패
    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// 원장 기록 실패
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
