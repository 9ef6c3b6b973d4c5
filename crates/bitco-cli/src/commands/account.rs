//! 계좌 조회 명령: 총 자산, 매수/매도 견적.

use anyhow::Result;
use bitco_core::{DealerRate, OrderSide, Pair, Quote, QuoteRequest};
use bitco_gateway::AssetsSummary;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::client::GatewayClient;
use crate::format::{heading, humanize_yen, to_json, OutputFormat};

/// 총 자산 조회.
pub async fn assets(client: &GatewayClient, pair: Pair, format: OutputFormat) -> Result<String> {
    let summary = client.assets(pair).await?;

    match format {
        OutputFormat::Json => to_json(&summary),
        OutputFormat::Table => Ok(format_assets(&summary)),
    }
}

fn format_assets(summary: &AssetsSummary) -> String {
    let base = summary.pair.base();
    let quote = summary.pair.quote();
    let base_amount = summary.balances.available(base);
    let quote_amount = summary.balances.available(quote);

    let mut output = heading("총 자산");
    output.push_str(&format!(
        "{:<6} {} {}\n",
        quote.to_uppercase(),
        humanize_yen(quote_amount),
        quote.to_uppercase()
    ));
    output.push_str(&format!(
        "{:<6} {} {} ({} {})\n",
        base.to_uppercase(),
        base_amount.normalize(),
        base.to_uppercase(),
        humanize_yen(base_amount * summary.rate),
        quote.to_uppercase()
    ));
    output.push_str(&format!(
        "{:<6} {} {}\n",
        "합계",
        humanize_yen(summary.total),
        quote.to_uppercase()
    ));
    output.push_str(&format!(
        "{:<6} {} {} (1 {})\n",
        "환율",
        humanize_yen(summary.rate),
        quote.to_uppercase(),
        base.to_uppercase()
    ));
    output
}

/// 전액 매수/매도 견적.
#[derive(Debug, Serialize)]
pub struct Suggestion {
    pub side: OrderSide,
    /// 견적에 사용한 잔고 (매수: 결제 통화, 매도: 기준 통화)
    pub available: Decimal,
    pub dealer_rate: DealerRate,
    /// 잔고가 없으면 견적 없음
    pub quote: Option<Quote>,
}

/// 보유 결제 통화 전액으로 매수할 때의 견적.
pub async fn suggest_buy(
    client: &GatewayClient,
    pair: Pair,
    format: OutputFormat,
) -> Result<String> {
    let balances = client.balances().await?;
    let available = balances.available(pair.quote());
    let request = QuoteRequest::buy_for_price(pair, available);
    render_suggestion(client, pair, OrderSide::Buy, available, request, format).await
}

/// 보유 기준 통화 전량을 매도할 때의 견적.
pub async fn suggest_sell(
    client: &GatewayClient,
    pair: Pair,
    format: OutputFormat,
) -> Result<String> {
    let balances = client.balances().await?;
    let available = balances.available(pair.base());
    let request = QuoteRequest::sell_amount(pair, available);
    render_suggestion(client, pair, OrderSide::Sell, available, request, format).await
}

async fn render_suggestion(
    client: &GatewayClient,
    pair: Pair,
    side: OrderSide,
    available: Decimal,
    request: QuoteRequest,
    format: OutputFormat,
) -> Result<String> {
    let dealer_rate = client.dealer_rate(pair).await?;
    // 잔고가 없으면 게이트웨이가 INVALID_INPUT으로 거부하므로 견적을 요청하지 않음
    let quote = if available > Decimal::ZERO {
        Some(client.quote(&request).await?)
    } else {
        None
    };

    let suggestion = Suggestion {
        side,
        available,
        dealer_rate,
        quote,
    };

    match format {
        OutputFormat::Json => to_json(&suggestion),
        OutputFormat::Table => Ok(format_suggestion(&suggestion)),
    }
}

fn format_suggestion(suggestion: &Suggestion) -> String {
    let pair = suggestion.dealer_rate.pair;
    let base = pair.base().to_uppercase();
    let quote_ccy = pair.quote().to_uppercase();

    let (title, label) = if suggestion.side.is_buy() {
        ("매수 견적", "매수가")
    } else {
        ("매도 견적", "매도가")
    };

    let mut output = heading(title);
    output.push_str(&format!(
        "판매소 환율: {} {} (1 {})\n",
        humanize_yen(suggestion.dealer_rate.rate),
        quote_ccy,
        base
    ));

    match &suggestion.quote {
        Some(quote) => {
            output.push_str(&format!(
                "{}: {} {} (1 {})\n",
                label,
                humanize_yen(quote.rate),
                quote_ccy,
                base
            ));
            output.push_str(&format!(
                "{} {} : {} {}\n",
                humanize_yen(quote.price),
                quote_ccy,
                quote.amount.normalize(),
                base
            ));
        }
        None => output.push_str("사용 가능한 잔고가 없습니다\n"),
    }

    output
}
