//! 포지션 원장.
//!
//! # 동작 방식
//!
//! 1. `open_position`: 네트워크 호출 전에 `pending_submit` 행을 먼저 기록 (local_id 선할당)
//! 2. `confirm_submission`: 거래소 접수 확인 후 `open`으로 전이
//! 3. `begin_close`: 매도 제출 전에 종료 매도를 기록 (상태는 `open` 유지)
//! 4. `confirm_close` / `mark_failed`: 종료 상태로 전이하며 포지션 슬롯 해제
//! 5. `reconcile`: 주문 변경 전 거래소 미체결 목록과 대조해 어긋난 상태를 복구
//!
//! 모든 변경은 트랜잭션 안에서 쓰기 문장을 먼저 실행하고, 조건 불일치로
//! 영향받은 행이 없을 때만 원인을 조회합니다.
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! let ledger = Ledger::connect(&config.ledger).await?;
//! let order = ledger.open_position(intent).await?;
//! ledger.confirm_submission(order.local_id, 42, rate, amount).await?;
//! ```

use std::str::FromStr;
use std::time::Duration;

use bitco_core::{
    CloseOutcome, LedgerConfig, Order, OrderConfirmation, OrderIntent, OrderStatus,
    RemoteOrderId, TickSample, TradeRecord,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::records::{now, to_millis, OrderRow, TickRow, TradeRow};
use crate::{schema, LedgerError, LedgerResult};

const ORDER_COLUMNS: &str = "local_id, order_id, pair, side, rate, amount, stop_loss_rate, \
                             status, failure_reason, close_local_id, close_order_id, \
                             close_rate, close_started_at, created_at, updated_at";

/// 대조 결과.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "order", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// 활성 주문 없음
    Flat,
    /// 로컬 `open` 주문이 거래소 미체결 목록에 있음
    InSync(Order),
    /// 원장이 추적하는 거래소 주문(매수 또는 종료 매도)이 미체결 목록에서 사라짐.
    /// 호출자가 체결 내역으로 `confirm_close` 또는 `abort_close`를 수행해야 함
    RemoteClosed(Order),
    /// `pending_submit` 주문이 거래소 주문과 일치하여 승격됨
    /// (미체결이면 `open`, 이미 체결됐으면 `filled`)
    Adopted(Order),
    /// 거래소 어디에서도 확인되지 않은 `pending_submit` 주문. `failed`로 기록됨
    Abandoned(Order),
    /// 유예 시간 내의 `pending_submit` 주문. 변경 없음
    Pending(Order),
    /// 유예 시간이 지났지만 미체결 목록에 없는 `pending_submit` 주문. 변경 없음.
    /// 호출자가 체결 내역을 확인해 `adopt_filled` 또는 `mark_failed`를 수행해야 함
    Unconfirmed(Order),
    /// 종료 매도가 진행 중인 `open` 포지션. 매도를 다시 제출하면 안 됨
    Closing(Order),
}

impl ReconcileOutcome {
    /// 결과에 포함된 주문.
    pub fn order(&self) -> Option<&Order> {
        match self {
            ReconcileOutcome::Flat => None,
            ReconcileOutcome::InSync(o)
            | ReconcileOutcome::RemoteClosed(o)
            | ReconcileOutcome::Adopted(o)
            | ReconcileOutcome::Abandoned(o)
            | ReconcileOutcome::Pending(o)
            | ReconcileOutcome::Unconfirmed(o)
            | ReconcileOutcome::Closing(o) => Some(o),
        }
    }

    /// 대조 후에도 포지션 슬롯을 점유하는 주문.
    pub fn active_order(&self) -> Option<&Order> {
        match self {
            ReconcileOutcome::Flat | ReconcileOutcome::Abandoned(_) => None,
            other => other.order(),
        }
    }

    /// 로그용 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileOutcome::Flat => "flat",
            ReconcileOutcome::InSync(_) => "in_sync",
            ReconcileOutcome::RemoteClosed(_) => "remote_closed",
            ReconcileOutcome::Adopted(_) => "adopted",
            ReconcileOutcome::Abandoned(_) => "abandoned",
            ReconcileOutcome::Pending(_) => "pending",
            ReconcileOutcome::Unconfirmed(_) => "unconfirmed",
            ReconcileOutcome::Closing(_) => "closing",
        }
    }
}

/// 포지션 원장.
///
/// 내부 풀은 `Arc`로 공유되므로 복제 비용이 작습니다.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// 설정에 따라 연결하고 스키마를 준비합니다.
    pub async fn connect(config: &LedgerConfig) -> LedgerResult<Self> {
        info!(url = %config.database_url, "Opening ledger database...");

        let in_memory = config.database_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(&config.database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // 인메모리 DB는 연결마다 별도 DB이므로 단일 연결을 유지
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;
        let ledger = Self { pool };
        ledger.migrate().await?;

        info!("Ledger ready");
        Ok(ledger)
    }

    /// 테스트/드라이런용 인메모리 원장.
    pub async fn in_memory() -> LedgerResult<Self> {
        Self::connect(&LedgerConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 1,
        })
        .await
    }

    /// 기존 연결 풀에서 생성합니다. 스키마는 `migrate`로 별도 준비해야 합니다.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 내부 연결 풀.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 스키마를 생성합니다.
    pub async fn migrate(&self) -> LedgerResult<()> {
        schema::migrate(&self.pool).await
    }

    /// 데이터베이스 상태를 확인합니다.
    pub async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // ==================== 포지션 ====================

    /// 현재 활성(`pending_submit` 또는 `open`) 주문.
    pub async fn current_position(&self) -> LedgerResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE status IN ('pending_submit', 'open') LIMIT 1",
            ORDER_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderRow::into_order).transpose()
    }

    /// 새 포지션을 `pending_submit` 상태로 기록합니다.
    ///
    /// 네트워크 호출은 하지 않습니다. 활성 주문이 이미 있으면
    /// `PositionConflict`를 반환합니다.
    #[instrument(skip(self), fields(pair = %intent.pair, side = %intent.side))]
    pub async fn open_position(&self, intent: OrderIntent) -> LedgerResult<Order> {
        let mut order = Order::from_intent(intent);
        let ts = now();
        order.created_at = ts;
        order.updated_at = ts;

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (
                local_id, order_id, pair, side, rate, amount, stop_loss_rate,
                status, failure_reason, created_at, updated_at
            )
            VALUES (?, NULL, ?, ?, ?, ?, ?, ?, NULL, ?, ?)
            "#,
        )
        .bind(order.local_id.to_string())
        .bind(order.pair.as_str())
        .bind(order.side.as_str())
        .bind(order.rate.to_string())
        .bind(order.amount.to_string())
        .bind(order.stop_loss_rate.map(|r| r.to_string()))
        .bind(order.status.as_str())
        .bind(to_millis(ts))
        .bind(to_millis(ts))
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let existing = fetch_active(&mut tx).await?;
                return Err(match existing {
                    Some(existing) => {
                        debug!(existing = %existing.local_id, "Active slot occupied");
                        LedgerError::PositionConflict {
                            existing: existing.local_id,
                            status: existing.status,
                        }
                    }
                    None => LedgerError::Database(sqlx::Error::Database(db_err)),
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        info!(local_id = %order.local_id, rate = %order.rate, amount = %order.amount, "Position opened (pending_submit)");
        Ok(order)
    }

    /// 거래소 접수 확인: `pending_submit → open`.
    #[instrument(skip(self))]
    pub async fn confirm_submission(
        &self,
        local_id: Uuid,
        remote_order_id: RemoteOrderId,
        confirmed_rate: Decimal,
        confirmed_amount: Decimal,
    ) -> LedgerResult<Order> {
        let remote_id = remote_id_to_i64(remote_order_id)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET order_id = ?, rate = ?, amount = ?, status = 'open', updated_at = ?
            WHERE local_id = ? AND status = 'pending_submit'
            "#,
        )
        .bind(remote_id)
        .bind(confirmed_rate.to_string())
        .bind(confirmed_amount.to_string())
        .bind(to_millis(now()))
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, local_id, OrderStatus::Open).await);
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        info!(local_id = %local_id, order_id = remote_order_id, "Submission confirmed (open)");
        Ok(order)
    }

    /// 포지션 종료 확인: `open → filled` (거래 기록 추가) 또는 `open → cancelled`.
    ///
    /// 종료 매도가 기록된 포지션은 `filled`로만 닫을 수 있습니다.
    #[instrument(skip(self, outcome), fields(outcome = %outcome.target_status()))]
    pub async fn confirm_close(&self, local_id: Uuid, outcome: CloseOutcome) -> LedgerResult<Order> {
        let target = outcome.target_status();
        let guard = match outcome {
            CloseOutcome::Filled(_) => "",
            CloseOutcome::Cancelled => " AND close_local_id IS NULL",
        };
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(&format!(
            "UPDATE orders SET status = ?, updated_at = ? WHERE local_id = ? AND status = 'open'{}",
            guard
        ))
        .bind(target.as_str())
        .bind(to_millis(now()))
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_close_rejection(&mut tx, local_id, target).await);
        }

        if let CloseOutcome::Filled(trade) = &outcome {
            insert_trade(&mut tx, local_id, trade).await?;
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        info!(local_id = %local_id, status = %target, "Position closed");
        Ok(order)
    }

    /// 제출 실패 기록: `pending_submit → failed`.
    ///
    /// 행은 감사용으로 남지만 포지션 슬롯은 해제됩니다.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, local_id: Uuid, reason: &str) -> LedgerResult<Order> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'failed', failure_reason = ?, updated_at = ?
            WHERE local_id = ? AND status = 'pending_submit'
            "#,
        )
        .bind(reason)
        .bind(to_millis(now()))
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, local_id, OrderStatus::Failed).await);
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        warn!(local_id = %local_id, reason = reason, "Order marked failed");
        Ok(order)
    }

    /// 종료 매도 기록. 매도 제출 전에 호출합니다.
    ///
    /// 포지션은 `open`으로 남고 종료 매도의 local_id가 새로 할당됩니다.
    /// 이미 종료 매도가 기록되어 있으면 `CloseInProgress`.
    #[instrument(skip(self))]
    pub async fn begin_close(&self, local_id: Uuid, rate: Decimal) -> LedgerResult<Order> {
        let close_local_id = Uuid::new_v4();
        let ts = to_millis(now());
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET close_local_id = ?, close_order_id = NULL, close_rate = ?,
                close_started_at = ?, updated_at = ?
            WHERE local_id = ? AND status = 'open' AND close_local_id IS NULL
            "#,
        )
        .bind(close_local_id.to_string())
        .bind(rate.to_string())
        .bind(ts)
        .bind(ts)
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_close_rejection(&mut tx, local_id, OrderStatus::Filled).await);
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        info!(local_id = %local_id, close_local_id = %close_local_id, rate = %rate, "Close recorded before sell submission");
        Ok(order)
    }

    /// 종료 매도의 거래소 접수 확인. 거래소 주문 ID를 기록합니다.
    #[instrument(skip(self))]
    pub async fn record_close_submission(
        &self,
        local_id: Uuid,
        remote_order_id: RemoteOrderId,
    ) -> LedgerResult<Order> {
        let remote_id = remote_id_to_i64(remote_order_id)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET close_order_id = ?, updated_at = ?
            WHERE local_id = ? AND status = 'open'
              AND close_local_id IS NOT NULL AND close_order_id IS NULL
            "#,
        )
        .bind(remote_id)
        .bind(to_millis(now()))
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, local_id, OrderStatus::Filled).await);
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        info!(local_id = %local_id, sell_order_id = remote_order_id, "Close submission recorded");
        Ok(order)
    }

    /// 종료 매도 기록 해제. 매도가 거래소에서 거부되었거나 체결 없이 사라진 경우입니다.
    ///
    /// 포지션은 `open`으로 남아 다시 매도할 수 있습니다.
    #[instrument(skip(self))]
    pub async fn abort_close(&self, local_id: Uuid, reason: &str) -> LedgerResult<Order> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET close_local_id = NULL, close_order_id = NULL, close_rate = NULL,
                close_started_at = NULL, updated_at = ?
            WHERE local_id = ? AND status = 'open' AND close_local_id IS NOT NULL
            "#,
        )
        .bind(to_millis(now()))
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, local_id, OrderStatus::Open).await);
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        warn!(local_id = %local_id, reason = reason, "Close aborted, position stays open");
        Ok(order)
    }

    /// 접수 응답을 받지 못했지만 거래소에서 이미 체결된 `pending_submit` 주문을
    /// 한 트랜잭션으로 `open → filled` 처리하고 거래 기록을 남깁니다.
    #[instrument(skip(self, trade))]
    pub async fn adopt_filled(
        &self,
        local_id: Uuid,
        remote_order_id: RemoteOrderId,
        trade: TradeRecord,
    ) -> LedgerResult<Order> {
        let remote_id = remote_id_to_i64(remote_order_id)?;
        let ts = to_millis(now());
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET order_id = ?, status = 'open', updated_at = ?
            WHERE local_id = ? AND status = 'pending_submit'
            "#,
        )
        .bind(remote_id)
        .bind(ts)
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, local_id, OrderStatus::Open).await);
        }

        sqlx::query("UPDATE orders SET status = 'filled', updated_at = ? WHERE local_id = ?")
            .bind(ts)
            .bind(local_id.to_string())
            .execute(&mut *tx)
            .await?;
        insert_trade(&mut tx, local_id, &trade).await?;

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        warn!(local_id = %local_id, order_id = remote_order_id, "Unrecorded submission found filled, settled");
        Ok(order)
    }

    /// 거래소 주문 ID가 이미 원장의 어느 주문(매수 또는 종료 매도)에 기록되어 있는지 확인.
    pub async fn is_known_remote_order(&self, remote_order_id: RemoteOrderId) -> LedgerResult<bool> {
        let remote_id = remote_id_to_i64(remote_order_id)?;
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM orders WHERE order_id = ? OR close_order_id = ?")
                .bind(remote_id)
                .bind(remote_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count > 0)
    }

    /// 로컬 활성 주문을 거래소 미체결 목록과 대조합니다.
    ///
    /// - `open` 주문이 목록에 없으면 `RemoteClosed` (상태 변경 없음, 호출자가 종료 처리)
    /// - 종료 매도가 기록된 `open` 포지션은 매수 대신 매도 주문을 대조 (`Closing` 또는 `RemoteClosed`)
    /// - `pending_submit` 주문과 일치하는 미체결 주문이 있으면 `open`으로 승격 (`Adopted`)
    /// - 일치하는 주문 없이 `pending_grace`가 지나면 `Unconfirmed` (호출자가 체결 내역 확인)
    #[instrument(skip(self, remote_open_orders), fields(remote = remote_open_orders.len()))]
    pub async fn reconcile(
        &self,
        remote_open_orders: &[OrderConfirmation],
        pending_grace: Duration,
    ) -> LedgerResult<ReconcileOutcome> {
        let Some(order) = self.current_position().await? else {
            return Ok(ReconcileOutcome::Flat);
        };

        let outcome = match order.status {
            OrderStatus::Open if order.is_closing() => {
                self.reconcile_closing(order, remote_open_orders, pending_grace)
                    .await?
            }
            OrderStatus::Open => {
                let remote_id = order.order_id.ok_or_else(|| {
                    LedgerError::Corrupt(format!("open order {} has no remote id", order.local_id))
                })?;
                if remote_open_orders.iter().any(|r| r.order_id == remote_id) {
                    ReconcileOutcome::InSync(order)
                } else {
                    warn!(local_id = %order.local_id, order_id = remote_id, "Open order missing on exchange");
                    ReconcileOutcome::RemoteClosed(order)
                }
            }
            OrderStatus::PendingSubmit => {
                let intent = order.intent();
                if let Some(remote) = remote_open_orders.iter().find(|r| r.matches_intent(&intent)) {
                    let adopted = self.adopt(order.local_id, remote.order_id).await?;
                    ReconcileOutcome::Adopted(adopted)
                } else if elapsed_since(order.created_at) >= pending_grace {
                    warn!(local_id = %order.local_id, "Pending order not in open orders after grace");
                    ReconcileOutcome::Unconfirmed(order)
                } else {
                    ReconcileOutcome::Pending(order)
                }
            }
            _ => ReconcileOutcome::Flat,
        };

        debug!(outcome = outcome.kind(), "Reconciled");
        Ok(outcome)
    }

    /// 종료 매도가 기록된 포지션 대조.
    async fn reconcile_closing(
        &self,
        order: Order,
        remote_open_orders: &[OrderConfirmation],
        pending_grace: Duration,
    ) -> LedgerResult<ReconcileOutcome> {
        let (Some(closing), Some(intent)) = (order.closing.clone(), order.closing_intent()) else {
            return Ok(ReconcileOutcome::InSync(order));
        };

        if let Some(sell_id) = closing.order_id {
            return Ok(if remote_open_orders.iter().any(|r| r.order_id == sell_id) {
                ReconcileOutcome::Closing(order)
            } else {
                warn!(local_id = %order.local_id, sell_order_id = sell_id, "Closing sell missing on exchange");
                ReconcileOutcome::RemoteClosed(order)
            });
        }

        if let Some(remote) = remote_open_orders
            .iter()
            .find(|r| r.matches_intent(&intent) && r.placed_after(closing.started_at))
        {
            let recorded = self.record_close_submission(order.local_id, remote.order_id).await?;
            warn!(local_id = %order.local_id, sell_order_id = remote.order_id, "Recovered unrecorded closing sell");
            return Ok(ReconcileOutcome::Closing(recorded));
        }

        Ok(if elapsed_since(closing.started_at) >= pending_grace {
            warn!(local_id = %order.local_id, "Closing sell not in open orders after grace");
            ReconcileOutcome::RemoteClosed(order)
        } else {
            ReconcileOutcome::Closing(order)
        })
    }

    /// `pending_submit` 주문에 거래소 ID를 붙여 `open`으로 승격합니다.
    async fn adopt(&self, local_id: Uuid, remote_order_id: RemoteOrderId) -> LedgerResult<Order> {
        let remote_id = remote_id_to_i64(remote_order_id)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET order_id = ?, status = 'open', updated_at = ?
            WHERE local_id = ? AND status = 'pending_submit'
            "#,
        )
        .bind(remote_id)
        .bind(to_millis(now()))
        .bind(local_id.to_string())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(explain_rejection(&mut tx, local_id, OrderStatus::Open).await);
        }

        let order = fetch_order(&mut tx, local_id).await?;
        tx.commit().await?;

        info!(local_id = %local_id, order_id = remote_order_id, "Pending order adopted from exchange");
        Ok(order)
    }

    // ==================== 조회 ====================

    /// 주문 조회.
    pub async fn get_order(&self, local_id: Uuid) -> LedgerResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE local_id = ?",
            ORDER_COLUMNS
        ))
        .bind(local_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.ok_or(LedgerError::UnknownOrder(local_id))?.into_order()
    }

    /// 최근 주문 목록 (최신순). 실패/취소 주문 포함.
    pub async fn list_orders(&self, limit: u32) -> LedgerResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders ORDER BY created_at DESC, rowid DESC LIMIT ?",
            ORDER_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(OrderRow::into_order).collect()
    }

    /// 최근 `limit`개의 거래 기록 (시간 오름차순).
    pub async fn list_trades(&self, limit: u32) -> LedgerResult<Vec<TradeRecord>> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT local_id, ts, base_amount, quote_amount FROM (
                SELECT local_id, seq, ts, base_amount, quote_amount
                FROM trade_records
                ORDER BY ts DESC, seq DESC
                LIMIT ?
            )
            ORDER BY ts ASC, seq ASC
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TradeRow::into_trade).collect()
    }

    // ==================== 틱 ====================

    /// 틱 샘플 추가.
    ///
    /// 같은 시각의 샘플이 있으면 덮어쓰지 않고 `DuplicateTimestamp`를 반환합니다.
    pub async fn append_tick(&self, sample: &TickSample) -> LedgerResult<()> {
        let ts = to_millis(sample.timestamp);
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO tick_samples (local_id, ts, last, bid, ask, high, low, volume)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.local_id.to_string())
        .bind(ts)
        .bind(sample.last.to_string())
        .bind(sample.bid.to_string())
        .bind(sample.ask.to_string())
        .bind(sample.high.to_string())
        .bind(sample.low.to_string())
        .bind(sample.volume.to_string())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let (existing,): (i64,) =
                    sqlx::query_as("SELECT COUNT(*) FROM tick_samples WHERE ts = ?")
                        .bind(ts)
                        .fetch_one(&mut *tx)
                        .await?;
                return Err(if existing > 0 {
                    LedgerError::DuplicateTimestamp(ts)
                } else {
                    LedgerError::Database(sqlx::Error::Database(db_err))
                });
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;

        debug!(ts = ts, last = %sample.last, "Tick appended");
        Ok(())
    }

    /// 최근 `limit`개의 틱 샘플 (시간 내림차순).
    pub async fn list_ticks(&self, limit: u32) -> LedgerResult<Vec<TickSample>> {
        let rows = sqlx::query_as::<_, TickRow>(
            r#"
            SELECT local_id, ts, last, bid, ask, high, low, volume
            FROM tick_samples
            ORDER BY ts DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TickRow::into_sample).collect()
    }
}

async fn fetch_active(tx: &mut Transaction<'_, Sqlite>) -> LedgerResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE status IN ('pending_submit', 'open') LIMIT 1",
        ORDER_COLUMNS
    ))
    .fetch_optional(&mut **tx)
    .await?;

    row.map(OrderRow::into_order).transpose()
}

async fn fetch_order(tx: &mut Transaction<'_, Sqlite>, local_id: Uuid) -> LedgerResult<Order> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE local_id = ?",
        ORDER_COLUMNS
    ))
    .bind(local_id.to_string())
    .fetch_optional(&mut **tx)
    .await?;

    row.ok_or(LedgerError::UnknownOrder(local_id))?.into_order()
}

async fn insert_trade(
    tx: &mut Transaction<'_, Sqlite>,
    local_id: Uuid,
    trade: &TradeRecord,
) -> LedgerResult<()> {
    sqlx::query(
        r#"
        INSERT INTO trade_records (local_id, seq, ts, base_amount, quote_amount)
        SELECT ?, COALESCE(MAX(seq), 0) + 1, ?, ?, ?
        FROM trade_records WHERE local_id = ?
        "#,
    )
    .bind(local_id.to_string())
    .bind(to_millis(trade.timestamp))
    .bind(trade.base_amount.to_string())
    .bind(trade.quote_amount.to_string())
    .bind(local_id.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn elapsed_since(ts: DateTime<Utc>) -> Duration {
    (Utc::now() - ts).to_std().unwrap_or_default()
}

/// 종료 매도가 기록된 포지션에 대한 전이 거부 원인.
async fn explain_close_rejection(
    tx: &mut Transaction<'_, Sqlite>,
    local_id: Uuid,
    to: OrderStatus,
) -> LedgerError {
    match fetch_order(tx, local_id).await {
        Ok(Order {
            status: OrderStatus::Open,
            closing: Some(closing),
            ..
        }) => LedgerError::CloseInProgress {
            local_id,
            close_local_id: closing.local_id,
        },
        Ok(order) => LedgerError::InvalidTransition {
            local_id,
            from: order.status,
            to,
        },
        Err(e) => e,
    }
}

/// 조건부 UPDATE가 아무 행도 바꾸지 못한 원인.
async fn explain_rejection(
    tx: &mut Transaction<'_, Sqlite>,
    local_id: Uuid,
    to: OrderStatus,
) -> LedgerError {
    match fetch_order(tx, local_id).await {
        Ok(order) => LedgerError::InvalidTransition {
            local_id,
            from: order.status,
            to,
        },
        Err(e) => e,
    }
}

fn remote_id_to_i64(remote_order_id: RemoteOrderId) -> LedgerResult<i64> {
    i64::try_from(remote_order_id)
        .map_err(|_| LedgerError::Corrupt(format!("order_id out of range: {}", remote_order_id)))
}
