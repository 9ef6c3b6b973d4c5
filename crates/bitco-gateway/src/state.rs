//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! `Arc<AppState>`로 래핑되어 axum State extractor로 주입됩니다.

use chrono::{DateTime, Utc};

use crate::GatewayService;

/// 애플리케이션 공유 상태.
pub struct AppState {
    /// 게이트웨이 서비스 (거래소 + 원장)
    pub gateway: GatewayService,

    /// 비공개 API 자격증명 설정 여부
    pub credentials_configured: bool,

    /// 틱 샘플러 동작 여부
    pub sampler_enabled: bool,

    /// 서버 버전
    pub version: String,

    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(gateway: GatewayService) -> Self {
        Self {
            gateway,
            credentials_configured: false,
            sampler_enabled: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        }
    }

    pub fn with_credentials(mut self, configured: bool) -> Self {
        self.credentials_configured = configured;
        self
    }

    pub fn with_sampler(mut self, enabled: bool) -> Self {
        self.sampler_enabled = enabled;
        self
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

/// 테스트용 상태 생성 (인메모리 원장 + 모의 거래소).
#[cfg(test)]
pub(crate) async fn create_test_state(
    exchange: std::sync::Arc<bitco_exchange::MockExchange>,
) -> AppState {
    use crate::GatewaySettings;
    use bitco_exchange::RetryPolicy;
    use bitco_ledger::Ledger;

    let ledger = Ledger::in_memory().await.unwrap();
    let gateway = GatewayService::new(exchange, ledger, RetryPolicy::none(), GatewaySettings::default());
    AppState::new(gateway).with_credentials(true)
}
