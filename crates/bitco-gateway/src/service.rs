//! 게이트웨이 서비스.
//!
//! 호출자가 사용하는 단일 진입점입니다.
//!
//! - 조회 작업(견적, 시세, 잔고 등)은 원장을 거치지 않고 거래소로 전달되며
//!   Transport 에러에 한해 제한적으로 재시도합니다.
//! - 주문 변경 작업(buy, sell, cancel)은 프로세스 내 뮤텍스로 직렬화되고,
//!   매번 최신 미체결 목록으로 `reconcile`을 먼저 수행한 뒤 현재 포지션을 확인합니다.
//! - 주문 생성/취소는 재시도하지 않습니다.
//! - 매도는 제출 전에 원장에 종료 매도로 기록되므로, 접수 응답을 잃어도
//!   다음 대조에서 미체결 목록과 체결 내역으로 판정되고 다시 제출되지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use bitco_core::{
    Balance, CloseOutcome, DealerRate, Fill, GatewayConfig, Order, OrderBook, OrderConfirmation,
    OrderIntent, OrderSide, OrderStatus, Pair, PublicTrade, Quote, QuoteRequest, RemoteOrderId,
    TickSample, Ticker, TradeRecord,
};
use chrono::{DateTime, Utc};
use bitco_exchange::{with_read_retry, ErrorClass, ExchangeClient, ExchangeError, RetryPolicy};
use bitco_ledger::{Ledger, LedgerError, ReconcileOutcome};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use crate::{GatewayError, GatewayResult};

/// 게이트웨이 정책 설정.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    /// `tick_history` 기본 조회 개수
    pub default_tick_limit: u32,
    /// 거래소에서 확인되지 않은 `pending_submit` 주문을 기다리는 시간
    pub pending_grace: Duration,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self::from(&GatewayConfig::default())
    }
}

impl From<&GatewayConfig> for GatewaySettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            default_tick_limit: config.default_tick_limit,
            pending_grace: config.pending_grace(),
        }
    }
}

/// 총 자산 요약.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetsSummary {
    pub pair: Pair,
    /// 기준 통화 평가에 사용한 판매소 환율
    pub rate: Decimal,
    pub balances: Balance,
    /// 결제 통화 잔고 + 기준 통화 잔고 × 환율
    pub total: Decimal,
}

/// 취소 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelResult {
    /// 취소된 거래소 주문 ID
    pub order_id: RemoteOrderId,
    /// `cancelled`로 전이된 원장 주문
    pub order: Order,
}

/// 게이트웨이 서비스.
pub struct GatewayService {
    exchange: Arc<dyn ExchangeClient>,
    ledger: Ledger,
    retry: RetryPolicy,
    settings: GatewaySettings,
    order_lock: Mutex<()>,
}

impl GatewayService {
    pub fn new(
        exchange: Arc<dyn ExchangeClient>,
        ledger: Ledger,
        retry: RetryPolicy,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            exchange,
            ledger,
            retry,
            settings,
            order_lock: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn exchange_name(&self) -> &str {
        self.exchange.name()
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    // ==================== 조회 ====================

    /// 주문 견적. 원장과 무관한 전달 호출입니다.
    pub async fn quote(&self, request: &QuoteRequest) -> GatewayResult<Quote> {
        if request.value <= Decimal::ZERO {
            return Err(GatewayError::InvalidInput(format!(
                "{} must be positive, got {}",
                request.by, request.value
            )));
        }
        let exchange = &*self.exchange;
        Ok(with_read_retry(&self.retry, "get_quote", move || exchange.get_quote(request)).await?)
    }

    pub async fn ticker(&self, pair: Pair) -> GatewayResult<Ticker> {
        let exchange = &*self.exchange;
        Ok(with_read_retry(&self.retry, "get_ticker", move || exchange.get_ticker(pair)).await?)
    }

    pub async fn dealer_rate(&self, pair: Pair) -> GatewayResult<DealerRate> {
        let exchange = &*self.exchange;
        Ok(
            with_read_retry(&self.retry, "get_dealer_rate", move || {
                exchange.get_dealer_rate(pair)
            })
            .await?,
        )
    }

    pub async fn order_book(&self, pair: Pair) -> GatewayResult<OrderBook> {
        let exchange = &*self.exchange;
        Ok(
            with_read_retry(&self.retry, "get_order_book", move || {
                exchange.get_order_book(pair)
            })
            .await?,
        )
    }

    pub async fn recent_trades(&self, pair: Pair) -> GatewayResult<Vec<PublicTrade>> {
        let exchange = &*self.exchange;
        Ok(
            with_read_retry(&self.retry, "get_recent_trades", move || {
                exchange.get_recent_trades(pair)
            })
            .await?,
        )
    }

    pub async fn balances(&self) -> GatewayResult<Balance> {
        Ok(self.fetch_balances().await?)
    }

    /// 거래소 미체결 주문 목록.
    pub async fn open_orders(&self) -> GatewayResult<Vec<OrderConfirmation>> {
        Ok(self.fetch_open_orders().await?)
    }

    /// 총 자산 (결제 통화 환산).
    pub async fn assets(&self, pair: Pair) -> GatewayResult<AssetsSummary> {
        let balances = self.fetch_balances().await?;
        let rate = self.dealer_rate(pair).await?.rate;
        let total = balances.total_in_quote(pair, rate);

        Ok(AssetsSummary {
            pair,
            rate,
            balances,
            total,
        })
    }

    /// 원장의 현재 포지션. 거래소와 대조하지 않습니다.
    pub async fn position(&self) -> GatewayResult<Option<Order>> {
        Ok(self.ledger.current_position().await?)
    }

    /// 최근 틱 샘플 (시간 내림차순). `limit`이 없으면 기본값 사용.
    pub async fn tick_history(&self, limit: Option<u32>) -> GatewayResult<Vec<TickSample>> {
        let limit = limit.unwrap_or(self.settings.default_tick_limit);
        Ok(self.ledger.list_ticks(limit).await?)
    }

    /// 거래 기록 (시간 오름차순).
    pub async fn trade_records(&self, limit: Option<u32>) -> GatewayResult<Vec<TradeRecord>> {
        let limit = limit.unwrap_or(self.settings.default_tick_limit);
        Ok(self.ledger.list_trades(limit).await?)
    }

    /// 종료/실패 주문을 포함한 원장 주문 목록 (최신순).
    pub async fn orders(&self, limit: Option<u32>) -> GatewayResult<Vec<Order>> {
        let limit = limit.unwrap_or(self.settings.default_tick_limit);
        Ok(self.ledger.list_orders(limit).await?)
    }

    // ==================== 주문 변경 ====================

    /// 명시적 대조.
    pub async fn reconcile(&self) -> GatewayResult<ReconcileOutcome> {
        let _guard = self.order_lock.lock().await;
        self.reconcile_locked().await
    }

    /// `fixed_amount`(결제 통화)만큼 지정가 매수합니다.
    ///
    /// 활성 포지션이 있으면 `PositionConflict`. 거래소 접수에 실패하면
    /// 실패 분류에 따라 주문을 `failed`로 기록하거나 다음 대조까지 `pending_submit`으로 남깁니다.
    pub async fn buy(&self, pair: Pair, fixed_amount: Decimal) -> GatewayResult<Order> {
        if fixed_amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidInput(format!(
                "amount must be positive, got {}",
                fixed_amount
            )));
        }

        let _guard = self.order_lock.lock().await;
        self.buy_locked(pair, fixed_amount)
            .instrument(bitco_core::order_span!("buy", pair))
            .await
    }

    /// 현재 포지션 전량을 지정가 매도하고 포지션을 종료합니다.
    ///
    /// 매도 주문은 즉시 체결된 것으로 보고 견적 금액으로 거래 기록을 남깁니다.
    /// 거래소가 매도를 거부하면 포지션은 `open`으로 유지되고, 접수 여부를 알 수 없으면
    /// 종료 매도 기록이 남아 다음 대조에서 판정됩니다 (`CloseInProgress`).
    pub async fn sell(&self, pair: Pair) -> GatewayResult<Order> {
        let _guard = self.order_lock.lock().await;
        self.sell_locked(pair)
            .instrument(bitco_core::order_span!("sell", pair))
            .await
    }

    /// 현재 포지션의 거래소 주문을 취소합니다.
    pub async fn cancel(&self) -> GatewayResult<CancelResult> {
        let _guard = self.order_lock.lock().await;
        let outcome = self.reconcile_locked().await?;
        let position = Self::still_active(&outcome)
            .cloned()
            .ok_or(LedgerError::NoOpenPosition)?;

        let span = bitco_core::order_span!("cancel", position.pair, position.local_id);
        self.cancel_locked(position).instrument(span).await
    }

    // ==================== 내부 ====================

    async fn buy_locked(&self, pair: Pair, fixed_amount: Decimal) -> GatewayResult<Order> {
        let outcome = self.reconcile_locked().await?;
        if let Some(active) = Self::still_active(&outcome) {
            return Err(LedgerError::PositionConflict {
                existing: active.local_id,
                status: active.status,
            }
            .into());
        }

        let quote = self
            .quote(&QuoteRequest::buy_for_price(pair, fixed_amount))
            .await?;
        let order = self
            .ledger
            .open_position(OrderIntent::limit_buy(pair, quote.rate, quote.amount))
            .await?;

        let confirmation = match self
            .exchange
            .place_limit_order(pair, OrderSide::Buy, order.rate, order.amount, None)
            .await
        {
            Ok(confirmation) => confirmation,
            Err(e) => {
                self.fail_submission(order.local_id, &e).await;
                return Err(e.into());
            }
        };

        let order = self
            .ledger
            .confirm_submission(
                order.local_id,
                confirmation.order_id,
                confirmation.rate.unwrap_or(order.rate),
                confirmation.amount.unwrap_or(order.amount),
            )
            .await
            .inspect_err(|e| {
                error!(
                    local_id = %order.local_id,
                    order_id = confirmation.order_id,
                    error = %e,
                    "Order accepted by exchange but not recorded, next reconcile will adopt it"
                )
            })?;

        info!(
            local_id = %order.local_id,
            order_id = ?order.order_id,
            rate = %order.rate,
            amount = %order.amount,
            "Buy order open"
        );
        Ok(order)
    }

    async fn sell_locked(&self, pair: Pair) -> GatewayResult<Order> {
        let outcome = self.reconcile_locked().await?;
        let position = Self::still_active(&outcome)
            .cloned()
            .ok_or(LedgerError::NoOpenPosition)?;

        if position.status != OrderStatus::Open {
            return Err(LedgerError::InvalidTransition {
                local_id: position.local_id,
                from: position.status,
                to: OrderStatus::Filled,
            }
            .into());
        }
        if let Some(closing) = &position.closing {
            return Err(LedgerError::CloseInProgress {
                local_id: position.local_id,
                close_local_id: closing.local_id,
            }
            .into());
        }
        if position.pair != pair {
            return Err(GatewayError::InvalidInput(format!(
                "open position is {}, not {}",
                position.pair, pair
            )));
        }

        let quote = self
            .quote(&QuoteRequest::sell_amount(pair, position.amount))
            .await?;
        let position = self.ledger.begin_close(position.local_id, quote.rate).await?;

        let confirmation = match self
            .exchange
            .place_limit_order(pair, OrderSide::Sell, quote.rate, position.amount, None)
            .await
        {
            Ok(confirmation) => confirmation,
            Err(e) => {
                self.fail_close(position.local_id, &e).await;
                return Err(e.into());
            }
        };

        self.ledger
            .record_close_submission(position.local_id, confirmation.order_id)
            .await
            .inspect_err(|e| {
                error!(
                    local_id = %position.local_id,
                    sell_order_id = confirmation.order_id,
                    error = %e,
                    "Sell accepted by exchange but not recorded, next reconcile will resolve it"
                )
            })?;

        let trade = TradeRecord::new(position.local_id, position.amount, quote.price);
        let closed = self
            .ledger
            .confirm_close(position.local_id, CloseOutcome::Filled(trade))
            .await?;

        info!(
            local_id = %closed.local_id,
            sell_order_id = confirmation.order_id,
            rate = %quote.rate,
            price = %quote.price,
            "Position closed by sell"
        );
        Ok(closed)
    }

    async fn cancel_locked(&self, position: Order) -> GatewayResult<CancelResult> {
        if let Some(closing) = &position.closing {
            return Err(LedgerError::CloseInProgress {
                local_id: position.local_id,
                close_local_id: closing.local_id,
            }
            .into());
        }
        let order_id = match (position.status, position.order_id) {
            (OrderStatus::Open, Some(id)) => id,
            _ => {
                return Err(LedgerError::InvalidTransition {
                    local_id: position.local_id,
                    from: position.status,
                    to: OrderStatus::Cancelled,
                }
                .into())
            }
        };

        let confirmation = self.exchange.cancel_order(order_id).await?;
        let order = self
            .ledger
            .confirm_close(position.local_id, CloseOutcome::Cancelled)
            .await?;

        info!(order_id = confirmation.order_id, "Position cancelled");
        Ok(CancelResult {
            order_id: confirmation.order_id,
            order,
        })
    }

    /// 최신 미체결 목록으로 원장을 대조하고, 거래소에서 사라진 주문을 종료 처리합니다.
    ///
    /// 호출자는 `order_lock`을 잡고 있어야 합니다.
    async fn reconcile_locked(&self) -> GatewayResult<ReconcileOutcome> {
        let remote = self.fetch_open_orders().await?;
        let outcome = self
            .ledger
            .reconcile(&remote, self.settings.pending_grace)
            .await?;

        match &outcome {
            ReconcileOutcome::RemoteClosed(order) => {
                let settled = if order.is_closing() {
                    self.settle_closing_sell(order).await?
                } else {
                    self.settle_remote_close(order).await?
                };
                return Ok(ReconcileOutcome::RemoteClosed(settled));
            }
            ReconcileOutcome::Unconfirmed(order) => {
                return self.resolve_unconfirmed(order).await;
            }
            ReconcileOutcome::Adopted(order) => {
                warn!(local_id = %order.local_id, order_id = ?order.order_id, "Recovered unrecorded submission");
            }
            ReconcileOutcome::Closing(order) => {
                info!(local_id = %order.local_id, "Closing sell still working on exchange");
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// 거래소에서 사라진 `open` 주문을 체결 내역으로 종료합니다.
    ///
    /// 체결 내역이 있으면 `filled`, 없으면 `cancelled`.
    async fn settle_remote_close(&self, order: &Order) -> GatewayResult<Order> {
        let Some(order_id) = order.order_id else {
            return Err(LedgerError::Corrupt(format!(
                "open order {} has no remote id",
                order.local_id
            ))
            .into());
        };

        let fills = self.fetch_fills().await?;

        let outcome = match TradeRecord::from_fills(order.local_id, order_id, &fills) {
            Some(trade) => CloseOutcome::Filled(trade),
            None => CloseOutcome::Cancelled,
        };
        let status = outcome.target_status();
        let closed = self.ledger.confirm_close(order.local_id, outcome).await?;

        warn!(
            local_id = %order.local_id,
            order_id = order_id,
            status = %status,
            "Order closed on exchange, ledger settled"
        );
        Ok(closed)
    }

    /// 미체결 목록에서 사라진 종료 매도를 체결 내역으로 정산합니다.
    ///
    /// 매도 체결이 있으면 포지션을 `filled`로 닫고, 없으면 종료 기록을 해제해
    /// 포지션을 다시 매도할 수 있는 `open` 상태로 돌립니다.
    async fn settle_closing_sell(&self, order: &Order) -> GatewayResult<Order> {
        let (Some(closing), Some(intent)) = (&order.closing, order.closing_intent()) else {
            return Ok(order.clone());
        };

        let fills = self.fetch_fills().await?;
        let sell_id = match closing.order_id {
            Some(id) => Some(id),
            None => {
                self.find_unrecorded_fill(&intent, closing.started_at, &fills)
                    .await?
            }
        };
        let trade = sell_id.and_then(|id| {
            TradeRecord::from_fills(order.local_id, id, &fills).map(|trade| (id, trade))
        });

        let Some((sell_id, trade)) = trade else {
            let reason = "closing sell left the exchange without fills";
            return Ok(self.ledger.abort_close(order.local_id, reason).await?);
        };

        if closing.order_id.is_none() {
            self.ledger
                .record_close_submission(order.local_id, sell_id)
                .await?;
        }
        let closed = self
            .ledger
            .confirm_close(order.local_id, CloseOutcome::Filled(trade))
            .await?;

        warn!(
            local_id = %order.local_id,
            sell_order_id = sell_id,
            "Closing sell filled on exchange, ledger settled"
        );
        Ok(closed)
    }

    /// 유예 시간이 지나도 미체결 목록에 없는 `pending_submit` 주문 판정.
    ///
    /// 접수 응답을 잃은 사이 즉시 체결되었을 수 있으므로 체결 내역을 먼저 확인합니다.
    /// 일치하는 체결이 있으면 그 주문으로 승격해 `filled`로 정산하고, 없으면 `failed`.
    async fn resolve_unconfirmed(&self, order: &Order) -> GatewayResult<ReconcileOutcome> {
        let fills = self.fetch_fills().await?;
        let matched = self
            .find_unrecorded_fill(&order.intent(), order.created_at, &fills)
            .await?
            .and_then(|id| {
                TradeRecord::from_fills(order.local_id, id, &fills).map(|trade| (id, trade))
            });

        if let Some((order_id, trade)) = matched {
            let settled = self.ledger.adopt_filled(order.local_id, order_id, trade).await?;
            return Ok(ReconcileOutcome::Adopted(settled));
        }

        let reason = format!(
            "not found on exchange after {}s",
            self.settings.pending_grace.as_secs()
        );
        let failed = self.ledger.mark_failed(order.local_id, &reason).await?;
        warn!(local_id = %order.local_id, "Unconfirmed submission abandoned");
        Ok(ReconcileOutcome::Abandoned(failed))
    }

    /// 원장에 아직 기록되지 않은 거래소 주문 중 `intent`와 일치하는 체결의 주문 ID.
    async fn find_unrecorded_fill(
        &self,
        intent: &OrderIntent,
        since: DateTime<Utc>,
        fills: &[Fill],
    ) -> GatewayResult<Option<RemoteOrderId>> {
        for fill in fills.iter().filter(|f| f.matches_intent(intent, since)) {
            if !self.ledger.is_known_remote_order(fill.order_id).await? {
                return Ok(Some(fill.order_id));
            }
        }
        Ok(None)
    }

    /// 매도 접수 실패 처리.
    ///
    /// Transport 실패는 거래소가 매도를 받았을 수 있으므로 종료 기록을 남겨 다음 대조에서
    /// 판정합니다. 그 외 실패는 종료 기록을 해제해 포지션을 `open`으로 유지합니다.
    async fn fail_close(&self, local_id: Uuid, err: &ExchangeError) {
        if err.class() == ErrorClass::Transport {
            warn!(
                local_id = %local_id,
                error = %err,
                "Sell outcome unknown, close left pending for reconciliation"
            );
            return;
        }

        match self.ledger.abort_close(local_id, &err.to_string()).await {
            Ok(_) => warn!(local_id = %local_id, error = %err, "Sell submission failed, position stays open"),
            Err(write_err) => error!(
                local_id = %local_id,
                error = %err,
                write_error = %write_err,
                "Failed to release close after rejected sell"
            ),
        }
    }

    /// 접수 실패 처리.
    ///
    /// Transport 실패는 거래소가 주문을 받았을 수 있으므로 `pending_submit`으로 남겨
    /// 다음 대조에서 판정합니다. 그 외 실패는 `failed`로 기록합니다.
    async fn fail_submission(&self, local_id: Uuid, err: &ExchangeError) {
        if err.class() == ErrorClass::Transport {
            warn!(
                local_id = %local_id,
                error = %err,
                "Submission outcome unknown, left pending for reconciliation"
            );
            return;
        }

        if let Err(write_err) = self.ledger.mark_failed(local_id, &err.to_string()).await {
            error!(
                local_id = %local_id,
                error = %err,
                write_error = %write_err,
                "Failed to record rejected submission"
            );
        }
    }

    /// 대조와 정산 이후에도 포지션 슬롯을 점유하는 주문.
    ///
    /// `RemoteClosed`는 정산이 끝난 종료 주문을 담고 있으므로 제외됩니다.
    fn still_active(outcome: &ReconcileOutcome) -> Option<&Order> {
        outcome.active_order().filter(|order| order.is_active())
    }

    async fn fetch_open_orders(&self) -> Result<Vec<OrderConfirmation>, ExchangeError> {
        let exchange = &*self.exchange;
        with_read_retry(&self.retry, "list_open_orders", move || {
            exchange.list_open_orders()
        })
        .await
    }

    async fn fetch_fills(&self) -> Result<Vec<Fill>, ExchangeError> {
        let exchange = &*self.exchange;
        with_read_retry(&self.retry, "list_fills", move || exchange.list_fills()).await
    }

    async fn fetch_balances(&self) -> Result<Balance, ExchangeError> {
        let exchange = &*self.exchange;
        with_read_retry(&self.retry, "get_balances", move || exchange.get_balances()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitco_exchange::{MockExchange, MockOp};
    use rust_decimal_macros::dec;

    async fn setup() -> (Arc<MockExchange>, GatewayService) {
        setup_with(GatewaySettings::default()).await
    }

    async fn setup_with(settings: GatewaySettings) -> (Arc<MockExchange>, GatewayService) {
        let exchange = Arc::new(MockExchange::new(dec!(5000000)));
        let ledger = Ledger::in_memory().await.unwrap();
        let service = GatewayService::new(exchange.clone(), ledger, RetryPolicy::none(), settings);
        (exchange, service)
    }

    fn no_grace() -> GatewaySettings {
        GatewaySettings {
            pending_grace: Duration::ZERO,
            ..GatewaySettings::default()
        }
    }

    fn remote_buy(order_id: RemoteOrderId) -> OrderConfirmation {
        OrderConfirmation {
            order_id,
            pair: Pair::BtcJpy,
            side: OrderSide::Buy,
            rate: Some(dec!(5000000)),
            amount: Some(dec!(0.0001)),
            stop_loss_rate: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_buy_opens_position() {
        let (exchange, service) = setup().await;

        let order = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();

        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.order_id, Some(1));
        assert_eq!(order.rate, dec!(5000000));
        assert_eq!(order.amount, dec!(0.0001));
        assert_eq!(exchange.placed_orders().await.len(), 1);
        assert_eq!(service.position().await.unwrap(), Some(order));
    }

    #[tokio::test]
    async fn test_second_buy_conflicts_without_submitting() {
        let (exchange, service) = setup().await;
        service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();

        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();

        assert!(matches!(
            err,
            GatewayError::Ledger(LedgerError::PositionConflict { .. })
        ));
        assert_eq!(exchange.placed_orders().await.len(), 1);
        assert_eq!(exchange.call_count(MockOp::Quote).await, 1);
    }

    #[tokio::test]
    async fn test_rejected_buy_marks_failed() {
        let (exchange, service) = setup().await;
        exchange
            .fail_next(
                MockOp::PlaceOrder,
                ExchangeError::ApiError {
                    code: 400,
                    message: "Amount is insufficient".into(),
                },
            )
            .await;

        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exchange(ExchangeError::ApiError { .. })));

        assert_eq!(service.position().await.unwrap(), None);
        let orders = service.orders(None).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::Failed);
        assert!(orders[0]
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("Amount is insufficient"));
    }

    #[tokio::test]
    async fn test_transport_failure_leaves_pending() {
        let (exchange, service) = setup().await;
        exchange
            .fail_next(MockOp::PlaceOrder, ExchangeError::Timeout("1s".into()))
            .await;

        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exchange(ExchangeError::Timeout(_))));

        let position = service.position().await.unwrap().unwrap();
        assert_eq!(position.status, OrderStatus::PendingSubmit);

        // 대조 전까지 새 매수는 막힘
        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Ledger(LedgerError::PositionConflict { .. })
        ));
    }

    #[tokio::test]
    async fn test_reconcile_adopts_order_accepted_during_timeout() {
        let (exchange, service) = setup().await;
        exchange
            .fail_next(MockOp::PlaceOrder, ExchangeError::Timeout("1s".into()))
            .await;
        service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();

        // 거래소는 실제로 주문을 받았음
        exchange.push_open_order(remote_buy(77)).await;

        let outcome = service.reconcile().await.unwrap();
        assert_eq!(outcome.kind(), "adopted");
        let position = service.position().await.unwrap().unwrap();
        assert_eq!(position.status, OrderStatus::Open);
        assert_eq!(position.order_id, Some(77));
    }

    #[tokio::test]
    async fn test_sell_without_position() {
        let (_exchange, service) = setup().await;
        let err = service.sell(Pair::BtcJpy).await.unwrap_err();
        assert!(matches!(err, GatewayError::Ledger(LedgerError::NoOpenPosition)));
    }

    #[tokio::test]
    async fn test_failed_sell_keeps_position_open() {
        let (exchange, service) = setup().await;
        let bought = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        exchange
            .fail_next(
                MockOp::PlaceOrder,
                ExchangeError::ApiError {
                    code: 400,
                    message: "Nonce must be incremented".into(),
                },
            )
            .await;

        assert!(service.sell(Pair::BtcJpy).await.is_err());

        let position = service.position().await.unwrap().unwrap();
        assert_eq!(position.local_id, bought.local_id);
        assert_eq!(position.status, OrderStatus::Open);
        assert!(position.closing.is_none());
        assert!(service.trade_records(None).await.unwrap().is_empty());

        // 거부된 매도는 기록이 해제되어 다시 매도 가능
        let closed = service.sell(Pair::BtcJpy).await.unwrap();
        assert_eq!(closed.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_unconfirmed_buy_filled_on_exchange_is_adopted() {
        let (exchange, service) = setup_with(no_grace()).await;
        let pending = service
            .ledger()
            .open_position(OrderIntent::limit_buy(Pair::BtcJpy, dec!(5000000), dec!(0.0001)))
            .await
            .unwrap();

        // 접수 응답을 잃은 사이 거래소에서 즉시 체결됨
        exchange.push_open_order(remote_buy(77)).await;
        exchange.fill_order(77).await.unwrap();

        let outcome = service.reconcile().await.unwrap();

        assert_eq!(outcome.kind(), "adopted");
        let settled = outcome.order().unwrap();
        assert_eq!(settled.local_id, pending.local_id);
        assert_eq!(settled.status, OrderStatus::Filled);
        assert_eq!(settled.order_id, Some(77));

        let trades = service.trade_records(None).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].local_id, pending.local_id);
        assert_eq!(trades[0].base_amount, dec!(0.0001));
        assert_eq!(trades[0].quote_amount, dec!(500));
    }

    #[tokio::test]
    async fn test_unconfirmed_buy_without_fill_is_abandoned() {
        let (exchange, service) = setup_with(no_grace()).await;
        exchange
            .fail_next(MockOp::PlaceOrder, ExchangeError::Timeout("1s".into()))
            .await;
        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exchange(ExchangeError::Timeout(_))));

        let outcome = service.reconcile().await.unwrap();

        assert_eq!(outcome.kind(), "abandoned");
        let failed = outcome.order().unwrap();
        assert_eq!(failed.status, OrderStatus::Failed);
        assert!(failed.failure_reason.as_deref().unwrap().contains("not found"));
        assert_eq!(exchange.call_count(MockOp::Fills).await, 1);
        assert!(service.trade_records(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recorded_fill_is_not_adopted_twice() {
        let (exchange, service) = setup_with(no_grace()).await;
        let first = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        exchange.fill_order(1).await.unwrap();
        service.reconcile().await.unwrap();

        // 같은 가격/수량의 새 주문이 접수 응답 없이 남음
        exchange
            .fail_next(MockOp::PlaceOrder, ExchangeError::Timeout("1s".into()))
            .await;
        service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();

        let outcome = service.reconcile().await.unwrap();

        assert_eq!(outcome.kind(), "abandoned");
        assert_ne!(outcome.order().unwrap().local_id, first.local_id);
        assert_eq!(service.trade_records(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sell_records_closing_order() {
        let (exchange, service) = setup().await;
        let bought = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();

        let closed = service.sell(Pair::BtcJpy).await.unwrap();

        let placed = exchange.placed_orders().await;
        assert_eq!(placed.len(), 2);
        assert_eq!(placed[1].side, OrderSide::Sell);

        let stored = service.ledger().get_order(bought.local_id).await.unwrap();
        assert_eq!(stored, closed);
        assert_eq!(stored.order_id, Some(1));
        let closing = stored.closing.unwrap();
        assert_eq!(closing.order_id, Some(placed[1].order_id));
        assert_eq!(closing.rate, dec!(5000000));
        assert!(service.ledger().is_known_remote_order(placed[1].order_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_sell_timeout_blocks_resubmission() {
        let (exchange, service) = setup().await;
        let bought = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        exchange
            .fail_next(MockOp::PlaceOrder, ExchangeError::Timeout("1s".into()))
            .await;

        let err = service.sell(Pair::BtcJpy).await.unwrap_err();
        assert!(matches!(err, GatewayError::Exchange(ExchangeError::Timeout(_))));

        let position = service.position().await.unwrap().unwrap();
        assert_eq!(position.local_id, bought.local_id);
        assert!(position.is_closing());

        let err = service.sell(Pair::BtcJpy).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Ledger(LedgerError::CloseInProgress { local_id, .. }) if local_id == bought.local_id
        ));
        let err = service.cancel().await.unwrap_err();
        assert!(matches!(err, GatewayError::Ledger(LedgerError::CloseInProgress { .. })));
        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Ledger(LedgerError::PositionConflict { .. })));

        assert_eq!(exchange.placed_orders().await.len(), 1);
        assert!(exchange.cancelled_orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_lost_sell_without_fill_reopens_position() {
        let (exchange, service) = setup_with(no_grace()).await;
        let bought = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        exchange
            .fail_next(MockOp::PlaceOrder, ExchangeError::Timeout("1s".into()))
            .await;
        service.sell(Pair::BtcJpy).await.unwrap_err();

        // 매도가 거래소에 도달하지 않았음
        let outcome = service.reconcile().await.unwrap();
        assert_eq!(outcome.kind(), "remote_closed");
        let reopened = outcome.order().unwrap();
        assert_eq!(reopened.status, OrderStatus::Open);
        assert!(!reopened.is_closing());

        let closed = service.sell(Pair::BtcJpy).await.unwrap();
        assert_eq!(closed.local_id, bought.local_id);
        assert_eq!(closed.status, OrderStatus::Filled);
        assert_eq!(exchange.placed_orders().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_closes_position() {
        let (exchange, service) = setup().await;
        let bought = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();

        let result = service.cancel().await.unwrap();

        assert_eq!(Some(result.order_id), bought.order_id);
        assert_eq!(result.order.status, OrderStatus::Cancelled);
        assert_eq!(exchange.cancelled_orders().await, vec![1]);
        assert_eq!(service.position().await.unwrap(), None);
        assert!(service.trade_records(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_without_position() {
        let (_exchange, service) = setup().await;
        let err = service.cancel().await.unwrap_err();
        assert!(matches!(err, GatewayError::Ledger(LedgerError::NoOpenPosition)));
    }

    #[tokio::test]
    async fn test_remote_fill_is_settled_on_reconcile() {
        let (exchange, service) = setup().await;
        let bought = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        exchange.fill_order(1).await.unwrap();

        let outcome = service.reconcile().await.unwrap();

        let closed = outcome.order().unwrap();
        assert_eq!(outcome.kind(), "remote_closed");
        assert_eq!(closed.local_id, bought.local_id);
        assert_eq!(closed.status, OrderStatus::Filled);

        let trades = service.trade_records(None).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].base_amount, dec!(0.0001));
        assert_eq!(trades[0].quote_amount, dec!(500));
        assert_eq!(service.position().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_buy_after_remote_fill_opens_new_position() {
        let (exchange, service) = setup().await;
        let first = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        exchange.fill_order(1).await.unwrap();

        let second = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();

        assert_ne!(second.local_id, first.local_id);
        assert_eq!(second.status, OrderStatus::Open);
        assert_eq!(service.trade_records(None).await.unwrap().len(), 1);

        let closed = service.sell(Pair::BtcJpy).await.unwrap();
        assert_eq!(closed.local_id, second.local_id);
    }

    #[tokio::test]
    async fn test_remote_cancel_is_settled_on_reconcile() {
        let (exchange, service) = setup().await;
        service.buy(Pair::BtcJpy, dec!(500)).await.unwrap();
        assert!(exchange.drop_open_order(1).await);

        let outcome = service.reconcile().await.unwrap();

        assert_eq!(outcome.order().unwrap().status, OrderStatus::Cancelled);
        assert!(service.trade_records(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buy_fails_when_open_orders_unavailable() {
        let (exchange, service) = setup().await;
        exchange
            .fail_next(
                MockOp::OpenOrders,
                ExchangeError::NetworkError("connection reset".into()),
            )
            .await;

        let err = service.buy(Pair::BtcJpy, dec!(500)).await.unwrap_err();

        assert!(matches!(err, GatewayError::Exchange(_)));
        assert!(exchange.placed_orders().await.is_empty());
        assert!(service.orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_is_rejected_before_network() {
        let (exchange, service) = setup().await;
        let err = service.buy(Pair::BtcJpy, dec!(0)).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
        assert_eq!(exchange.call_count(MockOp::OpenOrders).await, 0);
    }

    #[tokio::test]
    async fn test_assets_total() {
        let (exchange, service) = setup().await;
        exchange
            .set_balances(Balance::new().with("jpy", dec!(1000)).with("btc", dec!(0.001)))
            .await;

        let assets = service.assets(Pair::BtcJpy).await.unwrap();
        assert_eq!(assets.rate, dec!(5000000));
        assert_eq!(assets.total, dec!(6000));
    }

    #[tokio::test]
    async fn test_tick_history_uses_default_limit() {
        let (_exchange, service) = setup().await;
        assert_eq!(service.settings().default_tick_limit, 1000);
        assert!(service.tick_history(None).await.unwrap().is_empty());
    }
}
