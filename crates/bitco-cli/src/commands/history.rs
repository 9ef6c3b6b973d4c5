//! 원장 기록 조회 명령.

use anyhow::Result;
use bitco_core::{TickSample, TradeRecord};

use crate::client::GatewayClient;
use crate::format::{heading, humanize_yen, rule, to_json, OutputFormat};

/// 최근 틱 샘플 조회 (최신순).
pub async fn ticks(
    client: &GatewayClient,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<String> {
    let response = client.ticks(limit).await?;

    match format {
        OutputFormat::Json => to_json(&response.ticks),
        OutputFormat::Table => Ok(format_ticks(&response.ticks)),
    }
}

fn format_ticks(ticks: &[TickSample]) -> String {
    let mut output = heading("틱 기록");
    output.push_str(&format!(
        "{:<20} {:>12} {:>12} {:>12} {:>14}\n",
        "TIME", "LAST", "BID", "ASK", "VOLUME"
    ));
    output.push_str(&rule(74));
    for tick in ticks {
        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>12} {:>14}\n",
            tick.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            humanize_yen(tick.last),
            humanize_yen(tick.bid),
            humanize_yen(tick.ask),
            tick.volume.round_dp(4).normalize().to_string()
        ));
    }
    output.push_str(&format!("\nTotal: {} ticks\n", ticks.len()));
    output
}

/// 종료된 포지션의 거래 기록 조회.
pub async fn trades(
    client: &GatewayClient,
    limit: Option<u32>,
    format: OutputFormat,
) -> Result<String> {
    let response = client.trade_records(limit).await?;

    match format {
        OutputFormat::Json => to_json(&response.trades),
        OutputFormat::Table => Ok(format_trades(&response.trades)),
    }
}

fn format_trades(trades: &[TradeRecord]) -> String {
    let mut output = heading("거래 기록");
    output.push_str(&format!(
        "{:<20} {:<38} {:>12} {:>12}\n",
        "TIME", "LOCAL ID", "BASE", "QUOTE"
    ));
    output.push_str(&rule(85));
    for trade in trades {
        output.push_str(&format!(
            "{:<20} {:<38} {:>12} {:>12}\n",
            trade.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            trade.local_id.to_string(),
            trade.base_amount.normalize().to_string(),
            humanize_yen(trade.quote_amount)
        ));
    }
    output.push_str(&format!("\nTotal: {} trades\n", trades.len()));
    output
}
