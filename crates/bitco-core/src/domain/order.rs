//! 주문 타입 및 상태 머신.
//!
//! 이 모듈은 게이트웨이의 주문 관련 타입을 정의합니다:
//! - `OrderSide` - 주문 방향 (지정가/시장가 매수·매도)
//! - `OrderStatus` - 원장 주문 상태와 허용된 전이
//! - `OrderIntent` - 원장에 포지션을 여는 요청
//! - `Order` - 원장 주문 엔티티
//! - `OrderConfirmation` / `CancelConfirmation` - 거래소 확인 응답
//! - `ClosingOrder` - 포지션을 닫는 매도 주문 기록
//! - `Fill` / `TradeRecord` - 체결 내역과 원장 거래 기록

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::market::Pair;

/// 거래소가 부여한 주문 ID.
pub type RemoteOrderId = u64;

/// 거래소 시각과 로컬 시각 비교 시 허용하는 차이 (초).
const CLOCK_SKEW_SECS: i64 = 5;

fn not_before(ts: DateTime<Utc>, since: DateTime<Utc>) -> bool {
    ts >= since - chrono::Duration::seconds(CLOCK_SKEW_SECS)
}

wire_enum! {
    /// 주문 방향.
    pub enum OrderSide {
        /// 지정가 매수
        Buy => "buy",
        /// 지정가 매도
        Sell => "sell",
        /// 시장가 매수
        MarketBuy => "market_buy",
        /// 시장가 매도
        MarketSell => "market_sell",
    }
}

impl OrderSide {
    /// 시장가 주문인지 확인합니다.
    pub fn is_market(&self) -> bool {
        matches!(self, OrderSide::MarketBuy | OrderSide::MarketSell)
    }

    /// 매수 방향인지 확인합니다.
    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy | OrderSide::MarketBuy)
    }

    /// 같은 방향의 시장가 변형을 반환합니다.
    pub fn to_market(&self) -> Self {
        if self.is_buy() {
            OrderSide::MarketBuy
        } else {
            OrderSide::MarketSell
        }
    }

    /// 같은 방향의 지정가 변형을 반환합니다.
    pub fn to_limit(&self) -> Self {
        if self.is_buy() {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

wire_enum! {
    /// 원장 주문 상태.
    ///
    /// ```text
    /// pending_submit ──> open ──> filled
    ///        │             └────> cancelled
    ///        └──> failed
    /// ```
    pub enum OrderStatus {
        /// 로컬 기록됨, 거래소 제출 전
        PendingSubmit => "pending_submit",
        /// 거래소가 접수를 확인함
        Open => "open",
        /// 전량 체결됨
        Filled => "filled",
        /// 취소 확인됨
        Cancelled => "cancelled",
        /// 제출 자체가 실패함
        Failed => "failed",
    }
}

impl OrderStatus {
    /// 단일 포지션 슬롯을 점유하는 상태인지 확인합니다.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::PendingSubmit | OrderStatus::Open)
    }

    /// 최종 상태인지 확인합니다.
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// `self`에서 `next`로의 전이가 허용되는지 확인합니다.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::PendingSubmit, OrderStatus::Open)
                | (OrderStatus::PendingSubmit, OrderStatus::Failed)
                | (OrderStatus::Open, OrderStatus::Filled)
                | (OrderStatus::Open, OrderStatus::Cancelled)
        )
    }
}

/// 원장에 새 포지션을 여는 요청.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub pair: Pair,
    pub side: OrderSide,
    pub rate: Decimal,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_rate: Option<Decimal>,
}

impl OrderIntent {
    /// 지정가 매수 의도를 생성합니다.
    pub fn limit_buy(pair: Pair, rate: Decimal, amount: Decimal) -> Self {
        Self {
            pair,
            side: OrderSide::Buy,
            rate,
            amount,
            stop_loss_rate: None,
        }
    }

    /// 지정가 매도 의도를 생성합니다.
    pub fn limit_sell(pair: Pair, rate: Decimal, amount: Decimal) -> Self {
        Self {
            pair,
            side: OrderSide::Sell,
            rate,
            amount,
            stop_loss_rate: None,
        }
    }

    /// 손절 가격을 설정합니다.
    pub fn with_stop_loss(mut self, rate: Decimal) -> Self {
        self.stop_loss_rate = Some(rate);
        self
    }

    /// 예상 결제 금액 (rate × amount).
    pub fn notional(&self) -> Decimal {
        self.rate * self.amount
    }
}

/// 원장 주문 엔티티.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// 로컬 주문 ID (네트워크 호출 전에 할당, 재사용 불가)
    pub local_id: Uuid,
    /// 거래소 주문 ID (접수 확인 전에는 없음)
    pub order_id: Option<RemoteOrderId>,
    pub pair: Pair,
    pub side: OrderSide,
    pub rate: Decimal,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_rate: Option<Decimal>,
    pub status: OrderStatus,
    /// `failed` 전이 사유
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// 진행 중인 종료 매도 (상태는 `open` 유지)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing: Option<ClosingOrder>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// 의도로부터 `pending_submit` 상태의 새 주문을 생성합니다.
    pub fn from_intent(intent: OrderIntent) -> Self {
        let now = Utc::now();
        Self {
            local_id: Uuid::new_v4(),
            order_id: None,
            pair: intent.pair,
            side: intent.side,
            rate: intent.rate,
            amount: intent.amount,
            stop_loss_rate: intent.stop_loss_rate,
            status: OrderStatus::PendingSubmit,
            failure_reason: None,
            closing: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 포지션 슬롯을 점유 중인지 확인합니다.
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// 포지션 가치 (rate × amount).
    pub fn notional(&self) -> Decimal {
        self.rate * self.amount
    }

    /// 이 주문을 만든 의도. 거래소 ID 없이 원격 주문을 찾을 때 사용합니다.
    pub fn intent(&self) -> OrderIntent {
        OrderIntent {
            pair: self.pair,
            side: self.side,
            rate: self.rate,
            amount: self.amount,
            stop_loss_rate: self.stop_loss_rate,
        }
    }

    /// 종료 매도가 기록된 포지션인지 확인합니다.
    pub fn is_closing(&self) -> bool {
        self.closing.is_some()
    }

    /// 진행 중인 종료 매도의 의도 (포지션 전량 지정가 매도).
    pub fn closing_intent(&self) -> Option<OrderIntent> {
        self.closing
            .as_ref()
            .map(|closing| OrderIntent::limit_sell(self.pair, closing.rate, self.amount))
    }
}

/// 포지션을 닫는 매도 주문.
///
/// 매도 제출 전에 원장에 먼저 기록되고, 거래소 ID는 접수 확인 후 채워집니다.
/// 기록이 남아 있는 동안 같은 포지션에 대한 매도는 다시 제출되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosingOrder {
    pub local_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<RemoteOrderId>,
    pub rate: Decimal,
    pub started_at: DateTime<Utc>,
}

/// 거래소 주문 접수 확인.
///
/// 주문 생성 응답과 미체결 주문 목록 항목이 같은 형태로 정규화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order_id: RemoteOrderId,
    pub pair: Pair,
    pub side: OrderSide,
    /// 시장가 주문은 가격이 없음
    pub rate: Option<Decimal>,
    /// 주문 수량 (미체결 목록에서는 잔여 수량)
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl OrderConfirmation {
    /// 아직 거래소 ID가 없는 로컬 주문과 같은 주문으로 보이는지 확인합니다.
    ///
    /// 통화쌍, 방향, 가격이 일치하고 잔여 수량이 주문 수량을 넘지 않아야 합니다.
    pub fn matches_intent(&self, intent: &OrderIntent) -> bool {
        self.pair == intent.pair
            && self.side == intent.side
            && self.rate == Some(intent.rate)
            && self.amount.map_or(true, |amount| amount <= intent.amount)
    }

    /// `since` 이후에 접수된 주문인지 확인합니다 (시계 차이 허용).
    pub fn placed_after(&self, since: DateTime<Utc>) -> bool {
        not_before(self.created_at, since)
    }
}

/// 거래소 주문 취소 확인.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelConfirmation {
    pub order_id: RemoteOrderId,
}

/// 내 주문의 체결 내역.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub id: u64,
    pub order_id: RemoteOrderId,
    pub pair: Pair,
    pub side: OrderSide,
    pub rate: Decimal,
    /// 기준 통화 증감 (매도 시 음수)
    pub base_amount: Decimal,
    /// 결제 통화 증감 (매수 시 음수)
    pub quote_amount: Decimal,
    pub fee: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Fill {
    /// 거래소 ID를 모르는 로컬 주문의 체결로 보이는지 확인합니다.
    ///
    /// 통화쌍, 방향, 가격이 일치하고 체결 수량이 주문 수량 이하이며
    /// `since` 이후에 체결되어야 합니다 (시계 차이 허용).
    pub fn matches_intent(&self, intent: &OrderIntent, since: DateTime<Utc>) -> bool {
        self.pair == intent.pair
            && self.side.to_limit() == intent.side.to_limit()
            && self.rate == intent.rate
            && self.base_amount.abs() <= intent.amount
            && not_before(self.created_at, since)
    }
}

/// 종료된 포지션의 거래 기록.
///
/// 추가 전용이며 포지션이 종료 확인된 시점에 한 번 기록됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub local_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub base_amount: Decimal,
    pub quote_amount: Decimal,
}

impl TradeRecord {
    pub fn new(local_id: Uuid, base_amount: Decimal, quote_amount: Decimal) -> Self {
        Self {
            local_id,
            timestamp: Utc::now(),
            base_amount,
            quote_amount,
        }
    }

    /// 같은 주문의 체결 내역을 합산해 거래 기록을 만듭니다.
    ///
    /// 일치하는 체결이 없으면 `None`.
    pub fn from_fills(local_id: Uuid, order_id: RemoteOrderId, fills: &[Fill]) -> Option<Self> {
        let matched: Vec<&Fill> = fills.iter().filter(|f| f.order_id == order_id).collect();
        if matched.is_empty() {
            return None;
        }

        let base_amount = matched.iter().map(|f| f.base_amount.abs()).sum();
        let quote_amount = matched.iter().map(|f| f.quote_amount.abs()).sum();
        let timestamp = matched
            .iter()
            .map(|f| f.created_at)
            .max()
            .unwrap_or_else(Utc::now);

        Some(Self {
            local_id,
            timestamp,
            base_amount,
            quote_amount,
        })
    }
}

/// 포지션 종료 방식.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseOutcome {
    /// 체결로 종료 (`open → filled`)
    Filled(TradeRecord),
    /// 취소로 종료 (`open → cancelled`), 거래 기록 없음
    Cancelled,
}

impl CloseOutcome {
    /// 종료 후 상태.
    pub fn target_status(&self) -> OrderStatus {
        match self {
            CloseOutcome::Filled(_) => OrderStatus::Filled,
            CloseOutcome::Cancelled => OrderStatus::Cancelled,
        }
    }
}
