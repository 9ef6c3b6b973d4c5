//! 데이터베이스 레코드와 도메인 타입 간 변환.

use std::str::FromStr;

use bitco_core::{ClosingOrder, Order, TickSample, TradeRecord};
use chrono::{DateTime, SubsecRound, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::{LedgerError, LedgerResult};

/// orders 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct OrderRow {
    pub local_id: String,
    pub order_id: Option<i64>,
    pub pair: String,
    pub side: String,
    pub rate: String,
    pub amount: String,
    pub stop_loss_rate: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub close_local_id: Option<String>,
    pub close_order_id: Option<i64>,
    pub close_rate: Option<String>,
    pub close_started_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OrderRow {
    pub fn into_order(self) -> LedgerResult<Order> {
        let order_id = self
            .order_id
            .map(|id| parse_remote_id("order_id", id))
            .transpose()?;

        let closing = match (self.close_local_id, self.close_rate, self.close_started_at) {
            (Some(local_id), Some(rate), Some(started_at)) => Some(ClosingOrder {
                local_id: parse_uuid(&local_id)?,
                order_id: self
                    .close_order_id
                    .map(|id| parse_remote_id("close_order_id", id))
                    .transpose()?,
                rate: parse_field("close_rate", &rate)?,
                started_at: from_millis(started_at)?,
            }),
            (None, None, None) => None,
            (local_id, _, _) => {
                return Err(corrupt(
                    "close_local_id",
                    local_id.as_deref().unwrap_or("NULL"),
                ))
            }
        };

        Ok(Order {
            local_id: parse_uuid(&self.local_id)?,
            order_id,
            pair: parse_field("pair", &self.pair)?,
            side: parse_field("side", &self.side)?,
            rate: parse_field("rate", &self.rate)?,
            amount: parse_field("amount", &self.amount)?,
            stop_loss_rate: self
                .stop_loss_rate
                .as_deref()
                .map(|v| parse_field("stop_loss_rate", v))
                .transpose()?,
            status: parse_field("status", &self.status)?,
            failure_reason: self.failure_reason,
            closing,
            created_at: from_millis(self.created_at)?,
            updated_at: from_millis(self.updated_at)?,
        })
    }
}

/// trade_records 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct TradeRow {
    pub local_id: String,
    pub ts: i64,
    pub base_amount: String,
    pub quote_amount: String,
}

impl TradeRow {
    pub fn into_trade(self) -> LedgerResult<TradeRecord> {
        Ok(TradeRecord {
            local_id: parse_uuid(&self.local_id)?,
            timestamp: from_millis(self.ts)?,
            base_amount: parse_field("base_amount", &self.base_amount)?,
            quote_amount: parse_field("quote_amount", &self.quote_amount)?,
        })
    }
}

/// tick_samples 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct TickRow {
    pub local_id: String,
    pub ts: i64,
    pub last: String,
    pub bid: String,
    pub ask: String,
    pub high: String,
    pub low: String,
    pub volume: String,
}

impl TickRow {
    pub fn into_sample(self) -> LedgerResult<TickSample> {
        Ok(TickSample {
            local_id: parse_uuid(&self.local_id)?,
            timestamp: from_millis(self.ts)?,
            last: parse_field("last", &self.last)?,
            bid: parse_field("bid", &self.bid)?,
            ask: parse_field("ask", &self.ask)?,
            high: parse_field("high", &self.high)?,
            low: parse_field("low", &self.low)?,
            volume: parse_field("volume", &self.volume)?,
        })
    }
}

/// 저장 정밀도(밀리초)로 자른 현재 시각.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> LedgerResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| corrupt("timestamp", &ms.to_string()))
}

fn parse_remote_id(field: &str, id: i64) -> LedgerResult<u64> {
    u64::try_from(id).map_err(|_| corrupt(field, &id.to_string()))
}

fn parse_uuid(value: &str) -> LedgerResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| corrupt("local_id", value))
}

fn parse_field<T: FromStr>(field: &str, value: &str) -> LedgerResult<T> {
    value.parse().map_err(|_| corrupt(field, value))
}

fn corrupt(field: &str, value: &str) -> LedgerError {
    LedgerError::Corrupt(format!("{} = '{}'", field, value))
}
