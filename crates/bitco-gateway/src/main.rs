//! Bitco gateway server.
//!
//! 하나의 프로세스가 하나의 원장을 소유하도록 틱 샘플러도 함께 실행합니다
//! (`--no-sampler`로 비활성화).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use bitco_collector::TickSampler;
use bitco_core::{init_logging, AppConfig, LogConfig};
use bitco_exchange::{CoincheckClient, ExchangeClient, RetryPolicy};
use bitco_gateway::{create_api_router, AppState, GatewayService, GatewaySettings};
use bitco_ledger::Ledger;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "bitco-gateway")]
#[command(about = "Position-guarded Coincheck gateway", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 경로 (생략 시 config/bitco.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 틱 샘플러를 실행하지 않음
    #[arg(long)]
    no_sampler: bool,

    /// 로그 레벨 (설정 파일 값보다 우선)
    #[arg(long)]
    log_level: Option<String>,
}

/// 전체 라우터 생성.
fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path),
        None => AppConfig::load_default(),
    }
    .context("failed to load configuration")?;

    let mut log_config = LogConfig::from_settings(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!(e))?;

    info!("Starting Bitco gateway...");

    if !config.main.has_credentials() {
        warn!("Exchange credentials not configured, private endpoints will fail");
    }

    let exchange: Arc<dyn ExchangeClient> = Arc::new(
        CoincheckClient::from_app_config(&config).context("failed to build exchange client")?,
    );
    let ledger = Ledger::connect(&config.ledger)
        .await
        .context("failed to open ledger")?;
    let retry = RetryPolicy::from(&config.retry);

    let gateway = GatewayService::new(
        exchange.clone(),
        ledger.clone(),
        retry,
        GatewaySettings::from(&config.gateway),
    );
    let state = Arc::new(
        AppState::new(gateway)
            .with_credentials(config.main.has_credentials())
            .with_sampler(!cli.no_sampler),
    );

    let shutdown_token = CancellationToken::new();

    let sampler_handle = if cli.no_sampler {
        info!("Tick sampler disabled");
        None
    } else {
        let sampler = TickSampler::new(exchange, ledger.clone(), retry);
        let token = shutdown_token.clone();
        let interval = config.sampler.interval();
        let run_on_start = config.sampler.run_on_start;
        Some(tokio::spawn(async move {
            let stats = sampler.run(interval, run_on_start, token).await;
            stats.log_summary("gateway sampler");
        }))
    };

    let app = create_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_token.clone()))
        .await?;

    info!("Server shutdown initiated, cleaning up...");
    shutdown_token.cancel();

    if let Some(handle) = sampler_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Sampler task ended abnormally");
        }
    }

    ledger.pool().close().await;
    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 수신 시 종료 토큰을 취소합니다.
async fn shutdown_signal(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }

    shutdown_token.cancel();
}
