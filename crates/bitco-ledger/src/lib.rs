//! # Bitco Ledger
//!
//! 로컬 포지션 원장.
//!
//! 현재 보유 중인 주문(포지션), 종료된 거래 기록, 틱 샘플을 SQLite에 저장하고
//! 거래소 미체결 목록과 대조(reconcile)하는 일관성 로직을 담당합니다.
//!
//! 단일 포지션 규칙(활성 주문은 최대 하나)은 부분 유니크 인덱스로 강제되므로
//! 동시에 두 `open_position`이 실행되어도 하나만 성공합니다.

pub mod error;
pub mod ledger;
mod records;
pub mod schema;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{Ledger, ReconcileOutcome};
