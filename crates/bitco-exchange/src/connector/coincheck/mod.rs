//! Coincheck 거래소 커넥터.
//!
//! Coincheck REST API 구현. 모든 요청은 고정 기본 URL을 대상으로 하며
//! 비공개 API는 `ACCESS-KEY`, `ACCESS-NONCE`, `ACCESS-SIGNATURE` 헤더로 인증합니다.

mod client;
mod types;

use std::fmt;
use std::time::Duration;

use bitco_core::AppConfig;
use secrecy::{ExposeSecret, SecretString};

pub use client::CoincheckClient;

/// 기본 REST API URL.
pub const DEFAULT_BASE_URL: &str = "https://coincheck.com";

// ============================================================================
// 설정
// ============================================================================

/// Coincheck 클라이언트 설정.
///
/// # 보안
/// - `Debug` 구현은 민감 정보(`access_key`, `secret_key`)를 마스킹합니다.
pub struct CoincheckConfig {
    /// API 액세스 키
    pub access_key: String,
    /// API 시크릿 키
    pub secret_key: SecretString,
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// 원시 응답 본문 로깅
    pub debug: bool,
}

impl fmt::Debug for CoincheckConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.access_key.len() > 8 {
            format!(
                "{}...{}",
                &self.access_key[..4],
                &self.access_key[self.access_key.len() - 4..]
            )
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("CoincheckConfig")
            .field("access_key", &masked_key)
            .field("secret_key", &"***REDACTED***")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("debug", &self.debug)
            .finish()
    }
}

impl CoincheckConfig {
    /// 새 설정 생성.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        let secret: String = secret_key.into();
        Self {
            access_key: access_key.into(),
            secret_key: SecretString::new(secret.into_boxed_str()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(1),
            debug: false,
        }
    }

    /// 기본 URL 변경 (테스트 서버 등).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// 요청 타임아웃 설정.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 디버그 모드 설정.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 애플리케이션 설정에서 생성.
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(
            config.main.access.clone(),
            config.main.secret.expose_secret().to_string(),
        )
        .with_base_url(config.exchange.base_url.clone())
        .with_timeout(config.exchange.timeout())
        .with_debug(config.main.debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_debug_masks_credentials() {
        let config = CoincheckConfig::new("abcdefghijklmnop", "very-secret");
        let debug = format!("{:?}", config);
        assert!(debug.contains("abcd...mnop"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_config_defaults() {
        let config = CoincheckConfig::new("a", "b").with_base_url("http://localhost:1234/");
        assert_eq!(config.base_url, "http://localhost:1234");
        assert_eq!(config.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_from_app_config() {
        let app = AppConfig::from_toml_str(
            r#"
            [main]
            access = "key"
            secret = "secret"
            debug = true

            [exchange]
            timeout_ms = 750
            "#,
        )
        .unwrap();

        let config = CoincheckConfig::from_app_config(&app);
        assert_eq!(config.access_key, "key");
        assert_eq!(config.secret_key.expose_secret(), "secret");
        assert_eq!(config.timeout, Duration::from_millis(750));
        assert!(config.debug);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
