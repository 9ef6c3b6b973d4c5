//! 원장 스키마.
//!
//! 시작 시 멱등적으로 생성됩니다 (`IF NOT EXISTS`).
//!
//! - 금액/가격은 정규 10진 문자열(TEXT)로 저장
//! - 시각은 Unix 밀리초(INTEGER)로 저장
//! - `idx_orders_active_slot`: 활성 상태(`pending_submit`, `open`) 주문은
//!   같은 `position_slot`을 가질 수 없음. 단일 포지션 규칙을 DB가 강제합니다.
//! - `close_*` 컬럼: 포지션을 닫는 매도 주문. 제출 전에 기록되며 상태는 `open` 유지

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::LedgerResult;

/// 스키마 DDL. 순서대로 실행합니다.
pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        local_id        TEXT PRIMARY KEY NOT NULL,
        order_id        INTEGER,
        pair            TEXT NOT NULL,
        side            TEXT NOT NULL,
        rate            TEXT NOT NULL,
        amount          TEXT NOT NULL,
        stop_loss_rate  TEXT,
        status          TEXT NOT NULL,
        position_slot   INTEGER NOT NULL DEFAULT 1,
        failure_reason  TEXT,
        close_local_id  TEXT,
        close_order_id  INTEGER,
        close_rate      TEXT,
        close_started_at INTEGER,
        created_at      INTEGER NOT NULL,
        updated_at      INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_orders_active_slot
        ON orders (position_slot)
        WHERE status IN ('pending_submit', 'open')
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_orders_created_at ON orders (created_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS trade_records (
        local_id        TEXT NOT NULL,
        seq             INTEGER NOT NULL,
        ts              INTEGER NOT NULL,
        base_amount     TEXT NOT NULL,
        quote_amount    TEXT NOT NULL,
        PRIMARY KEY (local_id, seq)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_trade_records_ts ON trade_records (ts)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tick_samples (
        local_id        TEXT PRIMARY KEY NOT NULL,
        ts              INTEGER NOT NULL UNIQUE,
        last            TEXT NOT NULL,
        bid             TEXT NOT NULL,
        ask             TEXT NOT NULL,
        high            TEXT NOT NULL,
        low             TEXT NOT NULL,
        volume          TEXT NOT NULL
    )
    "#,
];

/// 종료 매도 컬럼 도입 이전에 만들어진 `orders` 테이블에 추가할 컬럼.
const CLOSE_COLUMNS: &[(&str, &str)] = &[
    ("close_local_id", "TEXT"),
    ("close_order_id", "INTEGER"),
    ("close_rate", "TEXT"),
    ("close_started_at", "INTEGER"),
];

/// 스키마를 생성합니다. 여러 번 호출해도 안전합니다.
pub async fn migrate(pool: &SqlitePool) -> LedgerResult<()> {
    let mut tx = pool.begin().await?;
    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    let existing: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info('orders')")
        .fetch_all(&mut *tx)
        .await?;
    for (column, ty) in CLOSE_COLUMNS {
        if !existing.iter().any(|name| name == column) {
            sqlx::query(&format!("ALTER TABLE orders ADD COLUMN {} {}", column, ty))
                .execute(&mut *tx)
                .await?;
            warn!(column = column, "Added missing orders column");
        }
    }
    tx.commit().await?;

    info!(statements = STATEMENTS.len(), "Ledger schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[tokio::test]
    async fn test_migrate_upgrades_orders_without_close_columns() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            r#"
            CREATE TABLE orders (
                local_id        TEXT PRIMARY KEY NOT NULL,
                order_id        INTEGER,
                pair            TEXT NOT NULL,
                side            TEXT NOT NULL,
                rate            TEXT NOT NULL,
                amount          TEXT NOT NULL,
                stop_loss_rate  TEXT,
                status          TEXT NOT NULL,
                position_slot   INTEGER NOT NULL DEFAULT 1,
                failure_reason  TEXT,
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate(&pool).await.unwrap();
        migrate(&pool).await.unwrap();

        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('orders')")
                .fetch_all(&pool)
                .await
                .unwrap();
        for (column, _) in CLOSE_COLUMNS {
            assert!(columns.iter().any(|name| name == column), "missing {}", column);
        }
    }
}
