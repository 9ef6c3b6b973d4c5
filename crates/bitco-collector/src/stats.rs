//! 샘플링 통계 구조체.

use serde::Serialize;
use std::time::Duration;

use crate::{Result, SampleOutcome};

/// 샘플러 실행 통계
#[derive(Debug, Clone, Default, Serialize)]
pub struct SamplerStats {
    /// 총 시도 횟수
    pub attempts: usize,
    /// 저장된 샘플 수
    pub stored: usize,
    /// 같은 시각이 이미 있어 건너뛴 횟수
    pub duplicates: usize,
    /// 실패 횟수
    pub failures: usize,
    /// 마지막 실패 메시지
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SamplerStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 한 번의 샘플링 결과를 반영
    pub fn record(&mut self, result: &Result<SampleOutcome>) {
        self.attempts += 1;
        match result {
            Ok(SampleOutcome::Stored(_)) => self.stored += 1,
            Ok(SampleOutcome::Duplicate(_)) => self.duplicates += 1,
            Err(e) => {
                self.failures += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }

    /// 성공률 계산 (%). 중복도 성공으로 취급
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            ((self.stored + self.duplicates) as f64 / self.attempts as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            attempts = self.attempts,
            stored = self.stored,
            duplicates = self.duplicates,
            failures = self.failures,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "Sampling summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitco_exchange::ExchangeError;

    #[test]
    fn test_record_counts_each_outcome() {
        let mut stats = SamplerStats::new();
        stats.record(&Ok(SampleOutcome::Duplicate(1)));
        stats.record(&Err(ExchangeError::Timeout("1s".into()).into()));

        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.failures, 1);
        assert!(stats.last_error.as_deref().unwrap().contains("timeout"));
        assert_eq!(stats.success_rate(), 50.0);
    }

    #[test]
    fn test_empty_success_rate() {
        assert_eq!(SamplerStats::new().success_rate(), 0.0);
    }
}
