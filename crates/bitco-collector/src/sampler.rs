//! 틱 샘플러.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bitco_core::{Pair, TickSample};
use bitco_exchange::{with_read_retry, ExchangeClient, RetryPolicy};
use bitco_ledger::{Ledger, LedgerError};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{Result, SamplerStats};

/// 한 번의 샘플링 결과.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", content = "sample", rename_all = "snake_case")]
pub enum SampleOutcome {
    /// 새 샘플 저장
    Stored(TickSample),
    /// 같은 시각(Unix ms)의 샘플이 이미 있어 건너뜀
    Duplicate(i64),
}

/// 거래소 시세를 원장에 주기적으로 기록하는 샘플러.
#[derive(Clone)]
pub struct TickSampler {
    exchange: Arc<dyn ExchangeClient>,
    ledger: Ledger,
    retry: RetryPolicy,
    pair: Pair,
}

impl TickSampler {
    pub fn new(exchange: Arc<dyn ExchangeClient>, ledger: Ledger, retry: RetryPolicy) -> Self {
        Self {
            exchange,
            ledger,
            retry,
            pair: Pair::default(),
        }
    }

    /// 샘플링할 통화쌍 지정.
    pub fn with_pair(mut self, pair: Pair) -> Self {
        self.pair = pair;
        self
    }

    pub fn pair(&self) -> Pair {
        self.pair
    }

    /// 시세를 한 번 조회해 기록합니다.
    ///
    /// 거래소 시각이 기존 샘플과 같으면 `Duplicate`를 반환하며 에러로 취급하지 않습니다.
    #[instrument(skip(self), fields(exchange = self.exchange.name(), pair = %self.pair))]
    pub async fn sample_once(&self) -> Result<SampleOutcome> {
        let exchange = &*self.exchange;
        let pair = self.pair;
        let ticker = with_read_retry(&self.retry, "get_ticker", move || exchange.get_ticker(pair))
            .await?;

        let sample = TickSample::from_ticker(&ticker);
        match self.ledger.append_tick(&sample).await {
            Ok(()) => {
                debug!(ts = %sample.timestamp, last = %sample.last, "Tick stored");
                Ok(SampleOutcome::Stored(sample))
            }
            Err(LedgerError::DuplicateTimestamp(ts)) => {
                debug!(ts = ts, "Tick already recorded");
                Ok(SampleOutcome::Duplicate(ts))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `shutdown`이 취소될 때까지 `period`마다 샘플링합니다.
    ///
    /// 실패한 샘플링은 로그만 남기고 다음 주기에 다시 시도합니다.
    /// 처리가 주기보다 오래 걸리면 밀린 주기는 건너뜁니다.
    pub async fn run(
        &self,
        period: Duration,
        run_on_start: bool,
        shutdown: CancellationToken,
    ) -> SamplerStats {
        let started = Instant::now();
        let mut stats = SamplerStats::new();

        let first_tick = if run_on_start {
            tokio::time::Instant::now()
        } else {
            tokio::time::Instant::now() + period
        };
        let mut interval = tokio::time::interval_at(first_tick, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            pair = %self.pair,
            interval_secs = period.as_secs_f64(),
            run_on_start = run_on_start,
            "Tick sampler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping tick sampler");
                    break;
                }
                _ = interval.tick() => {
                    let result = self.sample_once().await;
                    if let Err(e) = &result {
                        error!(error = %e, "Tick sampling failed");
                    }
                    stats.record(&result);
                }
            }
        }

        stats.elapsed = started.elapsed();
        stats
    }
}
