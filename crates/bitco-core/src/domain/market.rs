//! 시장 데이터 타입.
//!
//! 이 모듈은 거래소에서 조회하는 시장 데이터 값 타입을 정의합니다:
//! - `Pair` - 통화쌍
//! - `AmountOrPrice` - 견적 기준 (수량/금액)
//! - `Quote` - 주문 견적
//! - `Ticker` / `TickSample` - 시세 스냅샷과 그 영속 표현
//! - `Balance` - 통화별 잔고
//! - `OrderBook`, `PublicTrade`, `DealerRate` - 조회 전용 데이터

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::OrderSide;

wire_enum! {
    /// 거래 통화쌍.
    pub enum Pair {
        /// 비트코인/엔
        BtcJpy => "btc_jpy",
        /// 팩텀/엔
        FctJpy => "fct_jpy",
    }
}

impl Pair {
    /// 기준 통화 코드 (예: "btc").
    pub fn base(&self) -> &'static str {
        match self {
            Pair::BtcJpy => "btc",
            Pair::FctJpy => "fct",
        }
    }

    /// 결제 통화 코드.
    pub fn quote(&self) -> &'static str {
        match self {
            Pair::BtcJpy | Pair::FctJpy => "jpy",
        }
    }
}

impl Default for Pair {
    fn default() -> Self {
        Pair::BtcJpy
    }
}

wire_enum! {
    /// 견적 요청 기준.
    ///
    /// `Amount`는 기준 통화 수량, `Price`는 결제 통화 금액으로 견적을 요청합니다.
    pub enum AmountOrPrice {
        /// 수량 기준
        Amount => "amount",
        /// 금액 기준
        Price => "price",
    }
}

/// 견적 요청.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub pair: Pair,
    pub side: OrderSide,
    pub by: AmountOrPrice,
    pub value: Decimal,
}

impl QuoteRequest {
    pub fn new(pair: Pair, side: OrderSide, by: AmountOrPrice, value: Decimal) -> Self {
        Self {
            pair,
            side,
            by,
            value,
        }
    }

    /// 결제 통화 금액으로 매수 견적을 요청합니다.
    pub fn buy_for_price(pair: Pair, price: Decimal) -> Self {
        Self::new(pair, OrderSide::Buy, AmountOrPrice::Price, price)
    }

    /// 기준 통화 수량으로 매도 견적을 요청합니다.
    pub fn sell_amount(pair: Pair, amount: Decimal) -> Self {
        Self::new(pair, OrderSide::Sell, AmountOrPrice::Amount, amount)
    }
}

/// 주문 견적.
///
/// 요청마다 생성되며 저장되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// 통화쌍
    pub pair: Pair,
    /// 1 기준 통화당 가격
    pub rate: Decimal,
    /// 총 결제 금액
    pub price: Decimal,
    /// 기준 통화 수량
    pub amount: Decimal,
    /// 견적 시각
    pub timestamp: DateTime<Utc>,
}

/// 판매소 환율.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealerRate {
    pub pair: Pair,
    pub rate: Decimal,
}

/// 시세 스냅샷.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// 최종 거래 가격
    pub last: Decimal,
    /// 최우선 매수 호가
    pub bid: Decimal,
    /// 최우선 매도 호가
    pub ask: Decimal,
    /// 24시간 최고가
    pub high: Decimal,
    /// 24시간 최저가
    pub low: Decimal,
    /// 24시간 거래량
    pub volume: Decimal,
    /// 거래소 기준 시각
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    /// 스프레드 (ask - bid).
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// 원장에 기록되는 틱 샘플.
///
/// 추가 전용이며 `timestamp`가 정렬 키입니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSample {
    pub local_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
}

impl TickSample {
    /// 시세 스냅샷에서 새 틱 샘플을 생성합니다.
    pub fn from_ticker(ticker: &Ticker) -> Self {
        Self {
            local_id: Uuid::new_v4(),
            timestamp: ticker.timestamp,
            last: ticker.last,
            bid: ticker.bid,
            ask: ticker.ask,
            high: ticker.high,
            low: ticker.low,
            volume: ticker.volume,
        }
    }
}

/// 통화별 사용 가능 잔고 스냅샷.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(pub BTreeMap<String, Decimal>);

impl Balance {
    pub fn new() -> Self {
        Self::default()
    }

    /// 통화 잔고를 설정합니다.
    pub fn with(mut self, currency: impl Into<String>, amount: Decimal) -> Self {
        self.0.insert(currency.into(), amount);
        self
    }

    /// 통화 잔고를 반환합니다. 없으면 0.
    pub fn available(&self, currency: &str) -> Decimal {
        self.0.get(currency).copied().unwrap_or(Decimal::ZERO)
    }

    /// 결제 통화 기준 총 자산을 계산합니다.
    ///
    /// `rate`는 기준 통화 1단위의 결제 통화 가격입니다.
    pub fn total_in_quote(&self, pair: Pair, rate: Decimal) -> Decimal {
        self.available(pair.quote()) + self.available(pair.base()) * rate
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Decimal)> {
        self.0.iter()
    }
}

/// 호가 단계.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub rate: Decimal,
    pub amount: Decimal,
}

/// 호가창.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
}

impl OrderBook {
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }
}

/// 거래소 공개 체결 내역.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicTrade {
    pub id: u64,
    pub pair: Pair,
    pub rate: Decimal,
    pub amount: Decimal,
    pub side: OrderSide,
    pub created_at: DateTime<Utc>,
}
