//! Standalone tick sampler CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bitco_core::{init_logging, AppConfig, LogConfig, Pair};
use bitco_exchange::{CoincheckClient, RetryPolicy};
use bitco_ledger::Ledger;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use bitco_collector::TickSampler;

#[derive(Parser)]
#[command(name = "bitco-collector")]
#[command(about = "Coincheck tick sampler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 설정 파일 경로 (생략 시 config/bitco.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// 로그 레벨 (설정 파일 값보다 우선)
    #[arg(long)]
    log_level: Option<String>,

    /// 샘플링할 통화쌍
    #[arg(long, default_value = "btc_jpy")]
    pair: Pair,
}

#[derive(Subcommand)]
enum Commands {
    /// 시세를 한 번 조회해 기록
    Once,

    /// 데몬 모드: 설정된 주기로 계속 기록
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
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

    tracing::info!("Bitco collector starting");

    let exchange = CoincheckClient::from_app_config(&config)
        .context("failed to build exchange client")?;
    let ledger = Ledger::connect(&config.ledger)
        .await
        .context("failed to open ledger")?;

    let sampler = TickSampler::new(
        Arc::new(exchange),
        ledger.clone(),
        RetryPolicy::from(&config.retry),
    )
    .with_pair(cli.pair);

    match cli.command {
        Commands::Once => {
            let mut stats = bitco_collector::SamplerStats::new();
            let result = sampler.sample_once().await;
            stats.record(&result);
            stats.log_summary("once");
            result?;
        }
        Commands::Daemon => {
            let shutdown = CancellationToken::new();
            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Received Ctrl+C, stopping daemon");
                }
                signal_token.cancel();
            });

            let stats = sampler
                .run(config.sampler.interval(), config.sampler.run_on_start, shutdown)
                .await;
            stats.log_summary("daemon");
        }
    }

    ledger.pool().close().await;
    tracing::info!("Bitco collector stopped");

    Ok(())
}
