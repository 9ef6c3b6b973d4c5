//! CLI 명령 구현.
//!
//! 각 명령은 출력할 문자열을 반환하며, 출력은 `main`에서 수행합니다.

pub mod account;
pub mod history;
pub mod market;
pub mod orders;

pub use account::{assets, suggest_buy, suggest_sell, Suggestion};
pub use history::{ticks, trades};
pub use market::{order_book, rate, recent_trades, ticker, DEFAULT_BOOK_DEPTH};
pub use orders::{buy, cancel, pending, position, reconcile, sell};
