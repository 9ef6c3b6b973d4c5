//! 설정 관리.
//!
//! 이 모듈은 애플리케이션 설정을 정의하고 관리합니다.
//! 설정은 프로세스 시작 시 한 번 로드되며 이후 변경되지 않습니다.
//!
//! ```toml
//! [main]
//! access = "ACCESS_KEY"
//! secret = "SECRET_KEY"
//! debug = false
//!
//! [exchange]
//! timeout_ms = 1000
//! ```
//!
//! 환경 변수 `BITCO__<SECTION>__<KEY>`로 오버라이드할 수 있습니다
//! (예: `BITCO__MAIN__SECRET`).

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// 애플리케이션 설정.
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// 자격증명 및 디버그 플래그
    #[serde(default)]
    pub main: MainConfig,
    /// 거래소 연결 설정
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// 조회 재시도 설정
    #[serde(default)]
    pub retry: RetryConfig,
    /// 원장 저장소 설정
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// RPC 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 틱 샘플러 설정
    #[serde(default)]
    pub sampler: SamplerConfig,
    /// 게이트웨이 정책 설정
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 자격증명 설정.
#[derive(Debug, Deserialize)]
pub struct MainConfig {
    /// API 액세스 키
    #[serde(default)]
    pub access: String,
    /// API 시크릿 키
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub secret: SecretString,
    /// 디버그 모드 (원시 응답 본문 로깅)
    #[serde(default)]
    pub debug: bool,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            access: String::new(),
            secret: empty_secret(),
            debug: false,
        }
    }
}

impl MainConfig {
    /// 비공개 API 호출에 필요한 자격증명이 설정되었는지 확인합니다.
    pub fn has_credentials(&self) -> bool {
        !self.access.is_empty() && !self.secret.expose_secret().is_empty()
    }
}

fn empty_secret() -> SecretString {
    SecretString::new("".into())
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into_boxed_str()))
}

/// 거래소 연결 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// REST API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (밀리초)
    pub timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://coincheck.com".to_string(),
            timeout_ms: 1000,
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 조회 전용 호출의 재시도 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 최초 시도를 포함한 최대 시도 횟수
    pub max_attempts: u32,
    /// 첫 재시도 대기 시간 (밀리초)
    pub base_delay_ms: u64,
    /// 재시도 대기 상한 (밀리초)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        }
    }
}

/// 원장 저장소 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// SQLite 연결 URL
    pub database_url: String,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://bitco.db".to_string(),
            max_connections: 5,
        }
    }
}

/// RPC 서버 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 요청 처리 타임아웃 (초)
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            request_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    /// 바인딩 주소 문자열.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 틱 샘플러 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// 샘플링 간격 (초)
    pub interval_secs: u64,
    /// 시작 직후 한 번 샘플링할지 여부
    pub run_on_start: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
        }
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// 게이트웨이 정책 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// 틱 이력 조회 기본 개수
    pub default_tick_limit: u32,
    /// 거래소에서 찾을 수 없는 `pending_submit` 주문을 실패 처리하기 전 유예 시간 (초)
    pub pending_grace_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_tick_limit: 1000,
            pending_grace_secs: 30,
        }
    }
}

impl GatewayConfig {
    pub fn pending_grace(&self) -> Duration {
        Duration::from_secs(self.pending_grace_secs)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // 파일에서 로드
            .add_source(config::File::from(path.as_ref()))
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("BITCO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다. 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config/bitco").required(false))
            .add_source(
                config::Environment::with_prefix("BITCO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// TOML 문자열에서 설정을 로드합니다.
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
