//! 인메모리 거래소 구현.
//!
//! 네트워크 없이 `ExchangeClient`를 구현합니다. 게이트웨이/샘플러 테스트와
//! 드라이런 모드에서 사용하며 견적 가격, 미체결 목록, 체결 내역, 실패 주입을
//! 스크립트로 조작할 수 있습니다.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use bitco_core::{
    AmountOrPrice, Balance, BookLevel, CancelConfirmation, DealerRate, Fill, OrderBook,
    OrderConfirmation, OrderSide, Pair, PublicTrade, Quote, QuoteRequest, RemoteOrderId, Ticker,
};
use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::traits::{ensure_positive, validate_limit_order, ExchangeClient, ExchangeResult};
use crate::ExchangeError;

/// 실패 주입 대상 작업.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    Quote,
    Ticker,
    DealerRate,
    OrderBook,
    RecentTrades,
    PlaceOrder,
    CancelOrder,
    OpenOrders,
    Balances,
    Fills,
}

/// 내부 거래소 상태.
#[derive(Debug)]
struct MockState {
    /// 매수 견적 가격
    buy_rate: Decimal,
    /// 매도 견적 가격
    sell_rate: Decimal,
    ticker: Option<Ticker>,
    balances: Balance,
    open_orders: Vec<OrderConfirmation>,
    fills: Vec<Fill>,
    trades: Vec<PublicTrade>,
    /// 접수된 모든 주문 (순서 유지)
    placed: Vec<OrderConfirmation>,
    cancelled: Vec<RemoteOrderId>,
    next_id: u64,
    next_fill_id: u64,
    failures: HashMap<MockOp, VecDeque<ExchangeError>>,
    calls: HashMap<MockOp, u32>,
}

impl MockState {
    /// 호출 횟수를 기록하고 주입된 실패가 있으면 꺼냅니다.
    fn enter(&mut self, op: MockOp) -> ExchangeResult<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.failures.get_mut(&op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn accept_order(
        &mut self,
        pair: Pair,
        side: OrderSide,
        rate: Option<Decimal>,
        amount: Decimal,
        stop_loss_rate: Option<Decimal>,
    ) -> OrderConfirmation {
        let confirmation = OrderConfirmation {
            order_id: self.next_id,
            pair,
            side,
            rate,
            amount: Some(amount),
            stop_loss_rate,
            created_at: Utc::now(),
        };
        self.next_id += 1;
        self.open_orders.push(confirmation.clone());
        self.placed.push(confirmation.clone());
        confirmation
    }
}

/// 인메모리 거래소.
#[derive(Debug)]
pub struct MockExchange {
    state: RwLock<MockState>,
}

impl MockExchange {
    /// 매수/매도 견적 가격이 같은 거래소를 생성합니다.
    pub fn new(rate: Decimal) -> Self {
        Self::with_rates(rate, rate)
    }

    /// 매수/매도 견적 가격을 따로 지정합니다.
    pub fn with_rates(buy_rate: Decimal, sell_rate: Decimal) -> Self {
        Self {
            state: RwLock::new(MockState {
                buy_rate,
                sell_rate,
                ticker: None,
                balances: Balance::new(),
                open_orders: Vec::new(),
                fills: Vec::new(),
                trades: Vec::new(),
                placed: Vec::new(),
                cancelled: Vec::new(),
                next_id: 1,
                next_fill_id: 1,
                failures: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    /// 견적 가격을 변경합니다.
    pub async fn set_rates(&self, buy_rate: Decimal, sell_rate: Decimal) {
        let mut state = self.state.write().await;
        state.buy_rate = buy_rate;
        state.sell_rate = sell_rate;
    }

    /// 다음 시세 응답을 고정합니다.
    pub async fn set_ticker(&self, ticker: Ticker) {
        self.state.write().await.ticker = Some(ticker);
    }

    /// 잔고를 설정합니다.
    pub async fn set_balances(&self, balances: Balance) {
        self.state.write().await.balances = balances;
    }

    /// 다음 `op` 호출이 `error`로 실패하도록 예약합니다.
    pub async fn fail_next(&self, op: MockOp, error: ExchangeError) {
        self.state
            .write()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// 미체결 주문을 직접 추가합니다 (다른 클라이언트가 낸 주문 등).
    pub async fn push_open_order(&self, confirmation: OrderConfirmation) {
        self.state.write().await.open_orders.push(confirmation);
    }

    /// 미체결 주문을 전량 체결시키고 체결 내역을 남깁니다.
    pub async fn fill_order(&self, order_id: RemoteOrderId) -> Option<Fill> {
        let mut state = self.state.write().await;
        let idx = state.open_orders.iter().position(|o| o.order_id == order_id)?;
        let order = state.open_orders.remove(idx);

        let rate = order.rate.unwrap_or(state.buy_rate);
        let amount = order.amount.unwrap_or_default();
        let (base_amount, quote_amount) = if order.side.is_buy() {
            (amount, -(amount * rate))
        } else {
            (-amount, amount * rate)
        };

        let fill = Fill {
            id: state.next_fill_id,
            order_id,
            pair: order.pair,
            side: order.side.to_limit(),
            rate,
            base_amount,
            quote_amount,
            fee: Decimal::ZERO,
            created_at: Utc::now(),
        };
        state.next_fill_id += 1;
        state.fills.push(fill.clone());
        Some(fill)
    }

    /// 체결 없이 미체결 목록에서 제거합니다 (거래소 측 취소).
    pub async fn drop_open_order(&self, order_id: RemoteOrderId) -> bool {
        let mut state = self.state.write().await;
        let before = state.open_orders.len();
        state.open_orders.retain(|o| o.order_id != order_id);
        before != state.open_orders.len()
    }

    /// 접수된 주문 목록.
    pub async fn placed_orders(&self) -> Vec<OrderConfirmation> {
        self.state.read().await.placed.clone()
    }

    /// 취소된 주문 ID 목록.
    pub async fn cancelled_orders(&self) -> Vec<RemoteOrderId> {
        self.state.read().await.cancelled.clone()
    }

    /// 작업 호출 횟수.
    pub async fn call_count(&self, op: MockOp) -> u32 {
        self.state.read().await.calls.get(&op).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_quote(&self, request: &QuoteRequest) -> ExchangeResult<Quote> {
        ensure_positive(request.by.as_str(), request.value)?;
        let mut state = self.state.write().await;
        state.enter(MockOp::Quote)?;

        let rate = if request.side.is_buy() {
            state.buy_rate
        } else {
            state.sell_rate
        };
        let (price, amount) = match request.by {
            AmountOrPrice::Price => (request.value, (request.value / rate).round_dp(8)),
            AmountOrPrice::Amount => (request.value * rate, request.value),
        };

        Ok(Quote {
            pair: request.pair,
            rate,
            price,
            amount,
            timestamp: Utc::now(),
        })
    }

    async fn get_ticker(&self, _pair: Pair) -> ExchangeResult<Ticker> {
        let mut state = self.state.write().await;
        state.enter(MockOp::Ticker)?;

        if let Some(ticker) = &state.ticker {
            return Ok(ticker.clone());
        }
        Ok(Ticker {
            last: state.buy_rate,
            bid: state.sell_rate,
            ask: state.buy_rate,
            high: state.buy_rate,
            low: state.sell_rate,
            volume: Decimal::ZERO,
            timestamp: Utc::now().trunc_subsecs(0),
        })
    }

    async fn get_dealer_rate(&self, pair: Pair) -> ExchangeResult<DealerRate> {
        let mut state = self.state.write().await;
        state.enter(MockOp::DealerRate)?;
        Ok(DealerRate {
            pair,
            rate: state.sell_rate,
        })
    }

    async fn get_order_book(&self, _pair: Pair) -> ExchangeResult<OrderBook> {
        let mut state = self.state.write().await;
        state.enter(MockOp::OrderBook)?;

        let mut book = OrderBook::default();
        for order in &state.open_orders {
            if let (Some(rate), Some(amount)) = (order.rate, order.amount) {
                let level = BookLevel { rate, amount };
                if order.side.is_buy() {
                    book.bids.push(level);
                } else {
                    book.asks.push(level);
                }
            }
        }
        book.asks.sort_by(|a, b| a.rate.cmp(&b.rate));
        book.bids.sort_by(|a, b| b.rate.cmp(&a.rate));
        Ok(book)
    }

    async fn get_recent_trades(&self, pair: Pair) -> ExchangeResult<Vec<PublicTrade>> {
        let mut state = self.state.write().await;
        state.enter(MockOp::RecentTrades)?;
        Ok(state
            .trades
            .iter()
            .filter(|t| t.pair == pair)
            .cloned()
            .collect())
    }

    async fn place_limit_order(
        &self,
        pair: Pair,
        side: OrderSide,
        rate: Decimal,
        amount: Decimal,
        stop_loss_rate: Option<Decimal>,
    ) -> ExchangeResult<OrderConfirmation> {
        validate_limit_order(side, rate, amount, stop_loss_rate)?;
        let mut state = self.state.write().await;
        state.enter(MockOp::PlaceOrder)?;
        Ok(state.accept_order(pair, side, Some(rate), amount, stop_loss_rate))
    }

    async fn place_market_order(
        &self,
        pair: Pair,
        side: OrderSide,
        amount: Decimal,
    ) -> ExchangeResult<OrderConfirmation> {
        ensure_positive("amount", amount)?;
        let mut state = self.state.write().await;
        state.enter(MockOp::PlaceOrder)?;
        Ok(state.accept_order(pair, side.to_market(), None, amount, None))
    }

    async fn cancel_order(&self, order_id: RemoteOrderId) -> ExchangeResult<CancelConfirmation> {
        let mut state = self.state.write().await;
        state.enter(MockOp::CancelOrder)?;

        let before = state.open_orders.len();
        state.open_orders.retain(|o| o.order_id != order_id);
        if before == state.open_orders.len() {
            return Err(ExchangeError::ApiError {
                code: 400,
                message: format!("order {} not found", order_id),
            });
        }
        state.cancelled.push(order_id);
        Ok(CancelConfirmation { order_id })
    }

    async fn list_open_orders(&self) -> ExchangeResult<Vec<OrderConfirmation>> {
        let mut state = self.state.write().await;
        state.enter(MockOp::OpenOrders)?;
        Ok(state.open_orders.clone())
    }

    async fn get_balances(&self) -> ExchangeResult<Balance> {
        let mut state = self.state.write().await;
        state.enter(MockOp::Balances)?;
        Ok(state.balances.clone())
    }

    async fn list_fills(&self) -> ExchangeResult<Vec<Fill>> {
        let mut state = self.state.write().await;
        state.enter(MockOp::Fills)?;
        Ok(state.fills.clone())
    }
}
