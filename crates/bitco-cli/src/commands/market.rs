//! 공개 시세 조회 명령.

use anyhow::Result;
use bitco_core::{BookLevel, DealerRate, OrderBook, Pair, PublicTrade, Ticker};

use crate::client::GatewayClient;
use crate::format::{heading, humanize_yen, rule, to_json, OutputFormat};

/// 호가창 기본 표시 단계 수.
pub const DEFAULT_BOOK_DEPTH: usize = 10;

/// 최신 시세 조회.
pub async fn ticker(client: &GatewayClient, pair: Pair, format: OutputFormat) -> Result<String> {
    let ticker = client.ticker(pair).await?;

    match format {
        OutputFormat::Json => to_json(&ticker),
        OutputFormat::Table => Ok(format_ticker(pair, &ticker)),
    }
}

fn format_ticker(pair: Pair, ticker: &Ticker) -> String {
    let quote = pair.quote().to_uppercase();

    let mut output = heading(&format!("{} 시세", pair));
    output.push_str(&format!("최종가:   {} {}\n", humanize_yen(ticker.last), quote));
    output.push_str(&format!(
        "매수/매도: {} / {} {} (스프레드 {})\n",
        humanize_yen(ticker.bid),
        humanize_yen(ticker.ask),
        quote,
        humanize_yen(ticker.spread())
    ));
    output.push_str(&format!(
        "고가/저가: {} / {} {}\n",
        humanize_yen(ticker.high),
        humanize_yen(ticker.low),
        quote
    ));
    output.push_str(&format!(
        "거래량:   {} {}\n",
        ticker.volume.round_dp(4).normalize(),
        pair.base().to_uppercase()
    ));
    output.push_str(&format!(
        "시각:     {}\n",
        ticker.timestamp.format("%Y-%m-%d %H:%M:%S")
    ));
    output
}

/// 판매소 환율 조회.
pub async fn rate(client: &GatewayClient, pair: Pair, format: OutputFormat) -> Result<String> {
    let rate = client.dealer_rate(pair).await?;

    match format {
        OutputFormat::Json => to_json(&rate),
        OutputFormat::Table => Ok(format_rate(&rate)),
    }
}

fn format_rate(rate: &DealerRate) -> String {
    format!(
        "판매소 환율 ({}): {} {}\n",
        rate.pair,
        humanize_yen(rate.rate),
        rate.pair.quote().to_uppercase()
    )
}

/// 호가창 조회. 양쪽 모두 최우선 호가부터 `depth` 단계까지 표시합니다.
pub async fn order_book(
    client: &GatewayClient,
    pair: Pair,
    depth: usize,
    format: OutputFormat,
) -> Result<String> {
    let mut book = client.order_book(pair).await?;
    book.asks.truncate(depth);
    book.bids.truncate(depth);

    match format {
        OutputFormat::Json => to_json(&book),
        OutputFormat::Table => Ok(format_order_book(pair, &book)),
    }
}

fn format_order_book(pair: Pair, book: &OrderBook) -> String {
    fn push_levels(output: &mut String, label: &str, levels: &[BookLevel]) {
        for level in levels {
            output.push_str(&format!(
                "{:<6} {:>14} {:>14}\n",
                label,
                humanize_yen(level.rate),
                level.amount.normalize().to_string()
            ));
        }
    }

    let mut output = heading(&format!("{} 호가창", pair));
    output.push_str(&format!("{:<6} {:>14} {:>14}\n", "SIDE", "RATE", "AMOUNT"));
    output.push_str(&rule(36));

    // 매도 호가는 높은 가격이 위로 오도록 뒤집어 출력
    let asks: Vec<BookLevel> = book.asks.iter().rev().cloned().collect();
    push_levels(&mut output, "ASK", &asks);
    output.push_str(&rule(36));
    push_levels(&mut output, "BID", &book.bids);

    match (book.best_ask(), book.best_bid()) {
        (Some(ask), Some(bid)) => output.push_str(&format!(
            "\n스프레드: {} {}\n",
            humanize_yen(ask.rate - bid.rate),
            pair.quote().to_uppercase()
        )),
        _ => output.push_str("\n호가가 비어 있습니다.\n"),
    }
    output
}

/// 최근 공개 체결 조회 (최신순).
pub async fn recent_trades(
    client: &GatewayClient,
    pair: Pair,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<String> {
    let mut trades = client.recent_trades(pair).await?.trades;
    if let Some(limit) = limit {
        trades.truncate(limit);
    }

    match format {
        OutputFormat::Json => to_json(&trades),
        OutputFormat::Table => Ok(format_recent_trades(&trades)),
    }
}

fn format_recent_trades(trades: &[PublicTrade]) -> String {
    let mut output = heading("최근 체결");
    output.push_str(&format!(
        "{:<20} {:>10} {:<6} {:>14} {:>14}\n",
        "TIME", "ID", "SIDE", "RATE", "AMOUNT"
    ));
    output.push_str(&rule(68));
    for trade in trades {
        output.push_str(&format!(
            "{:<20} {:>10} {:<6} {:>14} {:>14}\n",
            trade.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            trade.id,
            trade.side.as_str(),
            humanize_yen(trade.rate),
            trade.amount.normalize().to_string()
        ));
    }
    output.push_str(&format!("\nTotal: {} trades\n", trades.len()));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitco_core::OrderSide;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn level(rate: rust_decimal::Decimal, amount: rust_decimal::Decimal) -> BookLevel {
        BookLevel { rate, amount }
    }

    #[test]
    fn test_format_ticker() {
        let ticker = Ticker {
            last: dec!(5000000),
            bid: dec!(4999000),
            ask: dec!(5001000),
            high: dec!(5100000),
            low: dec!(4900000),
            volume: dec!(1234.567891),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };

        let output = format_ticker(Pair::BtcJpy, &ticker);
        assert!(output.contains("btc_jpy 시세"));
        assert!(output.contains("5,000,000 JPY"));
        assert!(output.contains("스프레드 2,000"));
        assert!(output.contains("1234.5679 BTC"));
        assert!(output.contains("2023-11-14 22:13:20"));
    }

    #[test]
    fn test_format_rate() {
        let rate = DealerRate {
            pair: Pair::BtcJpy,
            rate: dec!(4990000.5),
        };
        assert_eq!(format_rate(&rate), "판매소 환율 (btc_jpy): 4,990,000 JPY\n");
    }

    #[test]
    fn test_format_order_book_puts_best_ask_next_to_bids() {
        let book = OrderBook {
            asks: vec![level(dec!(5001000), dec!(0.1)), level(dec!(5002000), dec!(0.2))],
            bids: vec![level(dec!(4999000), dec!(0.3))],
        };

        let output = format_order_book(Pair::BtcJpy, &book);
        let worse_ask = output.find("5,002,000").unwrap();
        let best_ask = output.find("5,001,000").unwrap();
        let best_bid = output.find("4,999,000").unwrap();
        assert!(worse_ask < best_ask && best_ask < best_bid);
        assert!(output.contains("스프레드: 2,000 JPY"));
    }

    #[test]
    fn test_format_empty_order_book() {
        let output = format_order_book(Pair::BtcJpy, &OrderBook::default());
        assert!(output.contains("호가가 비어 있습니다"));
    }

    #[test]
    fn test_format_recent_trades() {
        let trade = PublicTrade {
            id: 42,
            pair: Pair::BtcJpy,
            rate: dec!(5000000),
            amount: dec!(0.0150),
            side: OrderSide::Sell,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        };

        let output = format_recent_trades(&[trade]);
        assert!(output.contains("42"));
        assert!(output.contains("sell"));
        assert!(output.contains("0.015"));
        assert!(output.contains("Total: 1 trades"));
    }
}
