//! 로깅 초기화.
//!
//! 게이트웨이, 수집기, CLI가 같은 구독자 구성을 사용합니다.
//! 레벨과 형식은 `[logging]` 설정에서 오고, `RUST_LOG` / `LOG_FORMAT` 환경 변수가 있으면
//! 그 값이 우선합니다.

use std::str::FromStr;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;
use crate::error::{CoreError, CoreResult, ParseEnumError};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    /// 한 줄 JSON. 현재 주문 span 필드가 함께 기록됨
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(ParseEnumError::new("LogFormat", s)),
        }
    }
}

/// 구독자 설정.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` 지시문 (예: "info", "bitco_gateway=debug,warn")
    pub level: String,
    pub format: LogFormat,
}

impl LogConfig {
    pub fn new(level: impl Into<String>, format: LogFormat) -> Self {
        Self {
            level: level.into(),
            format,
        }
    }

    /// `[logging]` 섹션 기준 설정. 알 수 없는 형식은 `pretty`로 대체합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        Self::resolve(&settings.level, &settings.format)
    }

    /// 설정 파일 없이 실행되는 CLI용.
    pub fn from_env(default_level: &str) -> Self {
        Self::resolve(default_level, "pretty")
    }

    fn resolve(level: &str, format: &str) -> Self {
        let level = std::env::var("RUST_LOG").unwrap_or_else(|_| level.to_string());
        let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| format.to_string());

        Self {
            level,
            format: format.parse().unwrap_or_default(),
        }
    }
}

/// 전역 구독자를 설치합니다. 프로세스당 한 번만 성공합니다.
///
/// ```no_run
/// use bitco_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("bitco_gateway=debug,info", LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> CoreResult<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|e| CoreError::Logging(format!("invalid level '{}': {}", config.level, e)))?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| CoreError::Logging(e.to_string()))?;

    tracing::debug!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

/// 주문 변경 작업용 span. 통화쌍과 (있으면) 원장 주문 ID를 필드로 담습니다.
#[macro_export]
macro_rules! order_span {
    ($name:expr, $pair:expr) => {
        tracing::info_span!($name, pair = %$pair)
    };
    ($name:expr, $pair:expr, $local_id:expr) => {
        tracing::info_span!($name, pair = %$pair, local_id = %$local_id)
    };
}
