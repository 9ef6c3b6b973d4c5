//! 주문 명령: 미체결 조회, 포지션 조회, 매수, 매도, 취소, 대조.

use anyhow::Result;
use bitco_core::{Order, OrderConfirmation, Pair};
use bitco_ledger::ReconcileOutcome;
use rust_decimal::Decimal;

use crate::client::GatewayClient;
use crate::format::{heading, humanize_yen, rule, to_json, OutputFormat};

/// 거래소 미체결 주문 조회.
pub async fn pending(client: &GatewayClient, format: OutputFormat) -> Result<String> {
    let response = client.open_orders().await?;

    match format {
        OutputFormat::Json => to_json(&response.orders),
        OutputFormat::Table => Ok(format_open_orders(&response.orders)),
    }
}

fn format_open_orders(orders: &[OrderConfirmation]) -> String {
    let mut output = heading("미체결 주문");
    if orders.is_empty() {
        output.push_str("미체결 주문이 없습니다\n");
        return output;
    }

    output.push_str(&format!(
        "{:<12} {:<8} {:<12} {:<14} {:<14} {}\n",
        "ID", "PAIR", "SIDE", "RATE", "PENDING", "CREATED"
    ));
    output.push_str(&rule(84));
    for order in orders {
        output.push_str(&format!(
            "{:<12} {:<8} {:<12} {:<14} {:<14} {}\n",
            order.order_id,
            order.pair,
            order.side,
            order.rate.map(humanize_yen).unwrap_or_else(|| "-".to_string()),
            order
                .amount
                .map(|a| a.normalize().to_string())
                .unwrap_or_else(|| "-".to_string()),
            order.created_at.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    output.push_str(&format!("\nTotal: {} orders\n", orders.len()));
    output
}

/// 원장의 현재 포지션 조회.
pub async fn position(client: &GatewayClient, format: OutputFormat) -> Result<String> {
    let position = client.position().await?;

    match format {
        OutputFormat::Json => to_json(&position),
        OutputFormat::Table => Ok(match position {
            Some(order) => format_order("현재 포지션", &order),
            None => format!("{}보유 포지션이 없습니다\n", heading("현재 포지션")),
        }),
    }
}

/// 지정 금액(결제 통화) 매수.
pub async fn buy(
    client: &GatewayClient,
    pair: Pair,
    amount: Decimal,
    format: OutputFormat,
) -> Result<String> {
    let order = client.buy(pair, amount).await?;

    match format {
        OutputFormat::Json => to_json(&order),
        OutputFormat::Table => Ok(format_order("매수 주문", &order)),
    }
}

/// 보유 포지션 매도.
pub async fn sell(client: &GatewayClient, pair: Pair, format: OutputFormat) -> Result<String> {
    let order = client.sell(pair).await?;

    match format {
        OutputFormat::Json => to_json(&order),
        OutputFormat::Table => Ok(format_order("매도 완료", &order)),
    }
}

/// 보유 포지션의 미체결 주문 취소.
pub async fn cancel(client: &GatewayClient, format: OutputFormat) -> Result<String> {
    let result = client.cancel().await?;

    match format {
        OutputFormat::Json => to_json(&result),
        OutputFormat::Table => {
            let mut output = format_order("주문 취소", &result.order);
            output.push_str(&format!("주문을 취소했습니다: {}\n", result.order_id));
            Ok(output)
        }
    }
}

/// 원장과 거래소 상태 대조.
pub async fn reconcile(client: &GatewayClient, format: OutputFormat) -> Result<String> {
    let outcome = client.reconcile().await?;

    match format {
        OutputFormat::Json => to_json(&outcome),
        OutputFormat::Table => Ok(format_outcome(&outcome)),
    }
}

fn format_outcome(outcome: &ReconcileOutcome) -> String {
    let title = format!("대조 결과: {}", outcome.kind());
    match outcome.order() {
        Some(order) => format_order(&title, order),
        None => format!("{}활성 주문이 없습니다\n", heading(&title)),
    }
}

fn format_order(title: &str, order: &Order) -> String {
    let base = order.pair.base().to_uppercase();
    let quote = order.pair.quote().to_uppercase();

    let mut output = heading(title);
    output.push_str(&format!("{:<10} {}\n", "LOCAL ID", order.local_id));
    output.push_str(&format!(
        "{:<10} {}\n",
        "ORDER ID",
        order
            .order_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string())
    ));
    output.push_str(&format!("{:<10} {} {}\n", "SIDE", order.pair, order.side));
    output.push_str(&format!(
        "{:<10} {} {} (1 {})\n",
        "RATE",
        humanize_yen(order.rate),
        quote,
        base
    ));
    output.push_str(&format!(
        "{:<10} {} {} ({} {})\n",
        "AMOUNT",
        order.amount.normalize(),
        base,
        humanize_yen(order.notional()),
        quote
    ));
    output.push_str(&format!("{:<10} {}\n", "STATUS", order.status));
    if let Some(closing) = &order.closing {
        // 매도 접수가 확인되지 않았으면 거래소 ID 없이 표시
        output.push_str(&format!(
            "{:<10} sell {} @ {} {}\n",
            "CLOSING",
            closing
                .order_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "unconfirmed".to_string()),
            humanize_yen(closing.rate),
            quote
        ));
    }
    if let Some(reason) = &order.failure_reason {
        output.push_str(&format!("{:<10} {}\n", "REASON", reason));
    }
    output.push_str(&format!(
        "{:<10} {}\n",
        "UPDATED",
        order.updated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitco_core::{OrderIntent, OrderSide};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn open_order() -> Order {
        let mut order = Order::from_intent(OrderIntent::limit_buy(
            Pair::BtcJpy,
            dec!(5000000),
            dec!(0.0001),
        ));
        order.order_id = Some(42);
        order.status = bitco_core::OrderStatus::Open;
        order
    }

    #[test]
    fn test_format_order() {
        let output = format_order("현재 포지션", &open_order());
        assert!(output.contains("ORDER ID   42"));
        assert!(output.contains("btc_jpy buy"));
        assert!(output.contains("5,000,000 JPY (1 BTC)"));
        assert!(output.contains("0.0001 BTC (500 JPY)"));
        assert!(output.contains("STATUS     open"));
        assert!(!output.contains("CLOSING"));
    }

    #[test]
    fn test_format_closing_order() {
        let mut order = open_order();
        order.closing = Some(bitco_core::ClosingOrder {
            local_id: uuid::Uuid::new_v4(),
            order_id: None,
            rate: dec!(5100000),
            started_at: Utc::now(),
        });
        assert!(format_order("현재 포지션", &order)
            .contains("CLOSING    sell unconfirmed @ 5,100,000 JPY"));

        if let Some(closing) = order.closing.as_mut() {
            closing.order_id = Some(43);
        }
        assert!(format_order("현재 포지션", &order).contains("CLOSING    sell 43 @"));
    }

    #[test]
    fn test_format_open_orders() {
        assert!(format_open_orders(&[]).contains("미체결 주문이 없습니다"));

        let orders = vec![OrderConfirmation {
            order_id: 7,
            pair: Pair::BtcJpy,
            side: OrderSide::Sell,
            rate: Some(dec!(5100000)),
            amount: Some(dec!(0.00050)),
            stop_loss_rate: None,
            created_at: Utc::now(),
        }];
        let output = format_open_orders(&orders);
        assert!(output.contains("5,100,000"));
        assert!(output.contains("0.0005 "));
        assert!(output.contains("Total: 1 orders"));
    }

    #[test]
    fn test_format_outcome() {
        assert!(format_outcome(&ReconcileOutcome::Flat).contains("대조 결과: flat"));

        let output = format_outcome(&ReconcileOutcome::InSync(open_order()));
        assert!(output.contains("대조 결과: in_sync"));
        assert!(output.contains("ORDER ID   42"));
    }
}
