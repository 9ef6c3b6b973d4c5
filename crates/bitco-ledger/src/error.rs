//! 원장 에러 타입.

use bitco_core::OrderStatus;
use thiserror::Error;
use uuid::Uuid;

/// 원장 관련 에러.
///
/// 불변식 위반 에러는 자동 재시도하지 않고 항상 호출자에게 전달됩니다.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 이미 활성 포지션이 있음
    #[error("Position conflict: order {existing} is already {status}")]
    PositionConflict { existing: Uuid, status: OrderStatus },

    /// 활성 포지션 없음
    #[error("No open position")]
    NoOpenPosition,

    /// 포지션을 닫는 매도가 이미 기록되어 있음
    #[error("Close in progress for order {local_id}: sell {close_local_id} is unresolved")]
    CloseInProgress { local_id: Uuid, close_local_id: Uuid },

    /// 허용되지 않는 상태 전이
    #[error("Invalid transition for order {local_id}: {from} -> {to}")]
    InvalidTransition {
        local_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// 존재하지 않는 주문
    #[error("Unknown order: {0}")]
    UnknownOrder(Uuid),

    /// 같은 시각의 틱 샘플이 이미 있음
    #[error("Duplicate tick timestamp: {0}")]
    DuplicateTimestamp(i64),

    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 저장된 값을 해석할 수 없음
    #[error("Corrupt ledger row: {0}")]
    Corrupt(String),
}

impl LedgerError {
    /// 단일 포지션 규칙 등 원장 불변식 위반인지 확인.
    pub fn is_invariant_violation(&self) -> bool {
        !matches!(self, LedgerError::Database(_) | LedgerError::Corrupt(_))
    }
}

/// 원장 작업을 위한 Result 타입.
pub type LedgerResult<T> = Result<T, LedgerError>;
