//! 조회 전용 호출을 위한 제한된 재시도.
//!
//! 시세, 잔고, 미체결 주문 같은 읽기 작업만 감싸야 합니다.
//! 주문 생성/취소는 중복 제출 위험이 있으므로 절대 재시도하지 않습니다.
//!
//! 대기 시간은 `base_delay * 2^(attempt-1)`이며 `max_delay`로 제한됩니다.

use std::future::Future;
use std::time::Duration;

use bitco_core::RetryConfig;
use tracing::{debug, warn};

use crate::ExchangeResult;

/// 재시도 정책.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 최초 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 대기 시간
    pub base_delay: Duration,
    /// 재시도 대기 상한
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// 재시도하지 않는 정책.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// `attempt`번째 실패 후 대기 시간 (1부터 시작).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

/// 조회 작업을 정책에 따라 재시도합니다.
///
/// `ExchangeError::is_retryable()`이 참인 에러(Transport 분류)만 재시도하며
/// 그 외 에러는 즉시 반환합니다.
pub async fn with_read_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> ExchangeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ExchangeResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                debug!(
                    operation = operation,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Read failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    warn!(
                        operation = operation,
                        attempts = attempt,
                        error = %e,
                        "Read failed after retries"
                    );
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExchangeError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_is_capped_exponential() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_secs(1));
        assert_eq!(policy.delay_for(100), Duration::from_secs(1));
    }

    #[test]
    fn test_policy_from_config() {
        let config = RetryConfig {
            max_attempts: 0,
            base_delay_ms: 50,
            max_delay_ms: 300,
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_for(4), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transport_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_read_retry(&RetryPolicy::default(), "ticker", || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(ExchangeError::Timeout("1s".into()))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ExchangeResult<()> = with_read_retry(&RetryPolicy::default(), "balance", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExchangeError::NetworkError("reset".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_non_transport_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: ExchangeResult<()> = with_read_retry(&RetryPolicy::default(), "quote", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ExchangeError::Unauthorized("bad key".into()))
        })
        .await;

        assert!(matches!(result, Err(ExchangeError::Unauthorized(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
