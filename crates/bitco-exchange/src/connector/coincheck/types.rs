//! Coincheck API 요청/응답 타입.
//!
//! 숫자 필드는 엔드포인트에 따라 JSON 숫자 또는 문자열로 오므로
//! `Decimal`의 기본 역직렬화(둘 다 허용)를 사용합니다.

#![allow(dead_code)] // API 응답 필드 전체 매핑 (일부만 사용)

use std::collections::BTreeMap;

use bitco_core::{
    Balance, BookLevel, DealerRate, Fill, OrderBook, OrderConfirmation, Pair,
    PublicTrade, Ticker,
};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ExchangeError, ExchangeResult};

// ==================== 요청 타입 ====================

/// 지정가 주문 본문.
#[derive(Debug, Serialize)]
pub(super) struct LimitOrderBody<'a> {
    pub pair: &'a str,
    pub order_type: &'a str,
    pub rate: String,
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_rate: Option<String>,
}

/// 시장가 매수 본문. 금액은 결제 통화 기준.
#[derive(Debug, Serialize)]
pub(super) struct MarketBuyBody<'a> {
    pub pair: &'a str,
    pub order_type: &'a str,
    pub market_buy_amount: String,
}

/// 시장가 매도 본문. 수량은 기준 통화 기준.
#[derive(Debug, Serialize)]
pub(super) struct MarketSellBody<'a> {
    pub pair: &'a str,
    pub order_type: &'a str,
    pub amount: String,
}

// ==================== 응답 타입 ====================

/// 에러 응답.
#[derive(Debug, Deserialize)]
pub(super) struct CcError {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CcError {
    /// 에러 메시지 원문.
    pub fn message(&self) -> Option<String> {
        match (&self.error, &self.error_description) {
            (Some(err), Some(desc)) => Some(format!("{}: {}", err, desc)),
            (Some(err), None) => Some(err.clone()),
            (None, Some(desc)) => Some(desc.clone()),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CcTicker {
    pub last: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

impl CcTicker {
    pub fn into_ticker(self) -> ExchangeResult<Ticker> {
        let timestamp = Utc
            .timestamp_opt(self.timestamp, 0)
            .single()
            .ok_or_else(|| {
                ExchangeError::ParseError(format!("invalid ticker timestamp: {}", self.timestamp))
            })?;

        Ok(Ticker {
            last: self.last,
            bid: self.bid,
            ask: self.ask,
            high: self.high,
            low: self.low,
            volume: self.volume,
            timestamp,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CcOrderRate {
    #[serde(default)]
    pub success: Option<bool>,
    pub rate: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct CcDealerRate {
    pub rate: Decimal,
}

impl CcDealerRate {
    pub fn into_dealer_rate(self, pair: Pair) -> DealerRate {
        DealerRate {
            pair,
            rate: self.rate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CcOrderBook {
    pub asks: Vec<(Decimal, Decimal)>,
    pub bids: Vec<(Decimal, Decimal)>,
}

impl From<CcOrderBook> for OrderBook {
    fn from(book: CcOrderBook) -> Self {
        let level = |(rate, amount): (Decimal, Decimal)| BookLevel { rate, amount };
        OrderBook {
            asks: book.asks.into_iter().map(level).collect(),
            bids: book.bids.into_iter().map(level).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CcTrades {
    #[serde(default)]
    pub success: Option<bool>,
    pub data: Vec<CcTrade>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CcTrade {
    pub id: u64,
    pub amount: Decimal,
    pub rate: Decimal,
    pub pair: String,
    pub order_type: String,
    pub created_at: DateTime<Utc>,
}

impl CcTrade {
    pub fn into_trade(self) -> ExchangeResult<PublicTrade> {
        Ok(PublicTrade {
            id: self.id,
            pair: parse_wire(&self.pair)?,
            rate: self.rate,
            amount: self.amount,
            side: parse_wire(&self.order_type)?,
            created_at: self.created_at,
        })
    }
}

/// 주문 생성 응답.
#[derive(Debug, Deserialize)]
pub(super) struct CcOrderResponse {
    #[serde(default)]
    pub success: Option<bool>,
    pub id: u64,
    #[serde(default)]
    pub rate: Option<Decimal>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub market_buy_amount: Option<Decimal>,
    pub order_type: String,
    #[serde(default)]
    pub stop_loss_rate: Option<Decimal>,
    pub pair: String,
    pub created_at: DateTime<Utc>,
}

impl CcOrderResponse {
    pub fn into_confirmation(self) -> ExchangeResult<OrderConfirmation> {
        Ok(OrderConfirmation {
            order_id: self.id,
            pair: parse_wire(&self.pair)?,
            side: parse_wire(&self.order_type)?,
            rate: self.rate,
            amount: self.amount.or(self.market_buy_amount),
            stop_loss_rate: self.stop_loss_rate,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CcOpenOrders {
    #[serde(default)]
    pub success: Option<bool>,
    pub orders: Vec<CcOpenOrder>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CcOpenOrder {
    pub id: u64,
    pub order_type: String,
    #[serde(default)]
    pub rate: Option<Decimal>,
    pub pair: String,
    #[serde(default)]
    pub pending_amount: Option<Decimal>,
    #[serde(default)]
    pub pending_market_buy_amount: Option<Decimal>,
    #[serde(default)]
    pub stop_loss_rate: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl CcOpenOrder {
    pub fn into_confirmation(self) -> ExchangeResult<OrderConfirmation> {
        Ok(OrderConfirmation {
            order_id: self.id,
            pair: parse_wire(&self.pair)?,
            side: parse_wire(&self.order_type)?,
            rate: self.rate,
            amount: self.pending_amount.or(self.pending_market_buy_amount),
            stop_loss_rate: self.stop_loss_rate,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct CcCancel {
    #[serde(default)]
    pub success: Option<bool>,
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CcTransactions {
    #[serde(default)]
    pub success: Option<bool>,
    pub transactions: Vec<CcTransaction>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CcTransaction {
    pub id: u64,
    pub order_id: u64,
    pub created_at: DateTime<Utc>,
    pub funds: BTreeMap<String, Decimal>,
    pub pair: String,
    pub rate: Decimal,
    #[serde(default)]
    pub fee_currency: Option<String>,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub liquidity: Option<String>,
    pub side: String,
}

impl CcTransaction {
    pub fn into_fill(self) -> ExchangeResult<Fill> {
        let pair: Pair = parse_wire(&self.pair)?;
        let base_amount = self.funds.get(pair.base()).copied().unwrap_or_default();
        let quote_amount = self.funds.get(pair.quote()).copied().unwrap_or_default();

        Ok(Fill {
            id: self.id,
            order_id: self.order_id,
            pair,
            side: parse_wire(&self.side)?,
            rate: self.rate,
            base_amount,
            quote_amount,
            fee: self.fee,
            created_at: self.created_at,
        })
    }
}

/// 잔고 응답을 통화별 맵으로 변환합니다.
///
/// `success` 등 숫자가 아닌 필드는 무시합니다.
pub(super) fn balance_from_value(value: serde_json::Value) -> ExchangeResult<Balance> {
    let object = value
        .as_object()
        .ok_or_else(|| ExchangeError::ParseError("balance response is not an object".into()))?;

    let mut balance = Balance::new();
    for (key, raw) in object {
        let amount = match raw {
            serde_json::Value::String(s) => s.parse::<Decimal>().ok(),
            serde_json::Value::Number(n) => n.to_string().parse::<Decimal>().ok(),
            _ => None,
        };
        if let Some(amount) = amount {
            balance = balance.with(key.clone(), amount);
        }
    }
    Ok(balance)
}

/// 와이어 문자열을 닫힌 열거형으로 변환합니다.
fn parse_wire<T>(s: &str) -> ExchangeResult<T>
where
    T: std::str::FromStr<Err = bitco_core::ParseEnumError>,
{
    s.parse()
        .map_err(|e: bitco_core::ParseEnumError| ExchangeError::ParseError(e.to_string()))
}
