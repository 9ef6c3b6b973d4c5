//! Bitco 운영 CLI.
//!
//! 이 crate는 다음 기능을 제공합니다:
//! - 게이트웨이 RPC 클라이언트
//! - 자산/견적/포지션 조회 명령
//! - 매수, 매도, 취소, 대조 명령
//! - 틱 및 거래 기록 조회

pub mod client;
pub mod commands;
pub mod format;

pub use client::{ClientError, ClientResult, GatewayClient, DEFAULT_GATEWAY_ADDR, DEFAULT_TIMEOUT};
pub use format::{humanize_yen, OutputFormat};
