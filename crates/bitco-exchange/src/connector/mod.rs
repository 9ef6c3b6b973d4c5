//! 거래소 커넥터.

pub mod coincheck;

pub use coincheck::{CoincheckClient, CoincheckConfig};
