//! 거래소 trait 정의.

use async_trait::async_trait;
use bitco_core::{
    Balance, CancelConfirmation, DealerRate, Fill, OrderBook, OrderConfirmation, OrderSide, Pair,
    PublicTrade, Quote, QuoteRequest, RemoteOrderId, Ticker,
};
use rust_decimal::Decimal;

use crate::ExchangeError;

/// 거래소 작업을 위한 Result 타입.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// 거래소 기능별 작업을 제공하는 클라이언트 퍼사드.
///
/// 구현체는 상태를 갖지 않고, 입력 형식만 검증하며, 재시도하지 않습니다.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// 거래소 이름 반환.
    fn name(&self) -> &str;

    // === 시장 데이터 ===

    /// 주문 견적 조회.
    async fn get_quote(&self, request: &QuoteRequest) -> ExchangeResult<Quote>;

    /// 최신 시세 조회.
    async fn get_ticker(&self, pair: Pair) -> ExchangeResult<Ticker>;

    /// 판매소 환율 조회.
    async fn get_dealer_rate(&self, pair: Pair) -> ExchangeResult<DealerRate>;

    /// 호가창 조회.
    async fn get_order_book(&self, pair: Pair) -> ExchangeResult<OrderBook>;

    /// 최근 공개 체결 조회.
    async fn get_recent_trades(&self, pair: Pair) -> ExchangeResult<Vec<PublicTrade>>;

    // === 주문 작업 ===

    /// 지정가 주문.
    async fn place_limit_order(
        &self,
        pair: Pair,
        side: OrderSide,
        rate: Decimal,
        amount: Decimal,
        stop_loss_rate: Option<Decimal>,
    ) -> ExchangeResult<OrderConfirmation>;

    /// 시장가 주문.
    ///
    /// 매수는 결제 통화 금액, 매도는 기준 통화 수량을 `amount`로 받습니다.
    async fn place_market_order(
        &self,
        pair: Pair,
        side: OrderSide,
        amount: Decimal,
    ) -> ExchangeResult<OrderConfirmation>;

    /// 주문 취소.
    async fn cancel_order(&self, order_id: RemoteOrderId) -> ExchangeResult<CancelConfirmation>;

    /// 미체결 주문 목록.
    async fn list_open_orders(&self) -> ExchangeResult<Vec<OrderConfirmation>>;

    // === 계좌 작업 ===

    /// 통화별 잔고 조회.
    async fn get_balances(&self) -> ExchangeResult<Balance>;

    /// 내 주문의 최근 체결 내역.
    async fn list_fills(&self) -> ExchangeResult<Vec<Fill>>;
}

/// 양수 값인지 검증합니다.
pub fn ensure_positive(field: &str, value: Decimal) -> ExchangeResult<()> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ExchangeError::InvalidRequest(format!(
            "{} must be positive, got {}",
            field, value
        )))
    }
}

/// 지정가 주문 요청을 검증합니다.
pub fn validate_limit_order(
    side: OrderSide,
    rate: Decimal,
    amount: Decimal,
    stop_loss_rate: Option<Decimal>,
) -> ExchangeResult<()> {
    if side.is_market() {
        return Err(ExchangeError::InvalidRequest(format!(
            "limit order cannot use market side '{}'",
            side
        )));
    }
    ensure_positive("rate", rate)?;
    ensure_positive("amount", amount)?;
    if let Some(stop) = stop_loss_rate {
        ensure_positive("stop_loss_rate", stop)?;
    }
    Ok(())
}
