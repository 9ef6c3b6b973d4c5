//! 틱 샘플러.
//!
//! 고정 주기로 거래소 시세를 조회해 원장에 틱 샘플로 기록합니다:
//! - `TickSampler::sample_once`: 한 번 조회 후 기록 (같은 시각은 중복으로 간주, 성공 처리)
//! - `TickSampler::run`: 취소 토큰이 취소될 때까지 주기 실행

pub mod error;
pub mod sampler;
pub mod stats;

pub use error::{CollectorError, Result};
pub use sampler::{SampleOutcome, TickSampler};
pub use stats::SamplerStats;
