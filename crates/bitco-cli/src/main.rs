//! Bitco 운영 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 총 자산 (엔 환산)
//! bitco assets
//!
//! # 보유 엔 전액 매수 견적
//! bitco suggest buy
//!
//! # 500엔 매수 후 포지션 확인
//! bitco buy --amount 500
//! bitco position
//!
//! # 시세와 호가창 (상위 5단계)
//! bitco ticker
//! bitco order-book --depth 5
//!
//! # 다른 게이트웨이, JSON 출력
//! bitco --addr http://10.0.0.5:50051 --json ticks --limit 20
//! ```

use std::time::Duration;

use bitco_cli::client::{GatewayClient, DEFAULT_GATEWAY_ADDR};
use bitco_cli::commands;
use bitco_cli::OutputFormat;
use bitco_core::{init_logging, LogConfig, Pair};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::error;

#[derive(Parser)]
#[command(name = "bitco")]
#[command(about = "Bitco CLI - Coincheck 게이트웨이 운영 도구", long_about = None)]
#[command(version)]
struct Cli {
    /// 게이트웨이 주소
    #[arg(long, global = true, default_value = DEFAULT_GATEWAY_ADDR)]
    addr: String,

    /// 요청 타임아웃 (밀리초)
    #[arg(long, global = true, default_value_t = 1000)]
    timeout_ms: u64,

    /// 표 대신 JSON 출력
    #[arg(long, global = true)]
    json: bool,

    /// 통화쌍
    #[arg(long, global = true, default_value = "btc_jpy")]
    pair: Pair,

    /// 로그 레벨 (생략 시 RUST_LOG 또는 warn)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 총 자산 조회 (결제 통화 환산)
    Assets,

    /// 전액 매수/매도 견적
    Suggest {
        #[command(subcommand)]
        side: SuggestSide,
    },

    /// 최신 시세
    Ticker,

    /// 판매소 환율
    Rate,

    /// 호가창
    OrderBook {
        /// 표시할 호가 단계 수
        #[arg(long, short, default_value_t = commands::DEFAULT_BOOK_DEPTH)]
        depth: usize,
    },

    /// 최근 공개 체결 (최신순)
    TradesRecent {
        /// 최대 개수 (생략 시 전체)
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// 거래소 미체결 주문 목록
    Pending,

    /// 원장의 현재 포지션
    Position,

    /// 지정 금액(엔) 매수
    Buy {
        /// 매수 금액 (결제 통화)
        #[arg(long, short)]
        amount: Decimal,
    },

    /// 보유 포지션 매도
    Sell,

    /// 보유 포지션의 미체결 주문 취소
    Cancel,

    /// 원장과 거래소 상태 대조
    Reconcile,

    /// 최근 틱 샘플 (최신순)
    Ticks {
        /// 최대 개수 (생략 시 게이트웨이 기본값)
        #[arg(long, short)]
        limit: Option<u32>,
    },

    /// 거래 기록
    Trades {
        /// 최대 개수 (생략 시 게이트웨이 기본값)
        #[arg(long, short)]
        limit: Option<u32>,
    },
}

#[derive(Subcommand)]
enum SuggestSide {
    /// 보유 결제 통화 전액 매수 견적
    Buy,
    /// 보유 기준 통화 전량 매도 견적
    Sell,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("warn");
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    if let Err(e) = init_logging(log_config) {
        eprintln!("failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(output) => println!("{}", output.trim_end()),
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let client = GatewayClient::new(&cli.addr, Duration::from_millis(cli.timeout_ms))?;
    let format = OutputFormat::from_json_flag(cli.json);
    let pair = cli.pair;

    match cli.command {
        Commands::Assets => commands::assets(&client, pair, format).await,
        Commands::Suggest { side } => match side {
            SuggestSide::Buy => commands::suggest_buy(&client, pair, format).await,
            SuggestSide::Sell => commands::suggest_sell(&client, pair, format).await,
        },
        Commands::Ticker => commands::ticker(&client, pair, format).await,
        Commands::Rate => commands::rate(&client, pair, format).await,
        Commands::OrderBook { depth } => commands::order_book(&client, pair, depth, format).await,
        Commands::TradesRecent { limit } => {
            commands::recent_trades(&client, pair, limit, format).await
        }
        Commands::Pending => commands::pending(&client, format).await,
        Commands::Position => commands::position(&client, format).await,
        Commands::Buy { amount } => commands::buy(&client, pair, amount, format).await,
        Commands::Sell => commands::sell(&client, pair, format).await,
        Commands::Cancel => commands::cancel(&client, format).await,
        Commands::Reconcile => commands::reconcile(&client, format).await,
        Commands::Ticks { limit } => commands::ticks(&client, limit, format).await,
        Commands::Trades { limit } => commands::trades(&client, limit, format).await,
    }
}
