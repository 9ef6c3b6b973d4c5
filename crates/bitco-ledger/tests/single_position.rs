//! 단일 포지션 규칙 검증.
//!
//! 임의의 주문 작업 순서와 동시 `open_position` 호출에서도
//! 활성(`pending_submit`/`open`) 주문이 둘 이상 생기지 않아야 합니다.

use std::time::Duration;

use bitco_core::{
    CloseOutcome, LedgerConfig, OrderConfirmation, OrderIntent, OrderSide, OrderStatus, Pair,
    TradeRecord,
};
use bitco_ledger::{Ledger, LedgerError};
use chrono::Utc;
use proptest::prelude::*;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
enum Op {
    Open,
    Confirm(u64),
    Fill,
    Cancel,
    Fail,
    BeginClose,
    AbortClose,
    Reconcile { remote_has_order: bool, grace_secs: u64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Open),
        3 => (1u64..1000).prop_map(Op::Confirm),
        2 => Just(Op::Fill),
        1 => Just(Op::Cancel),
        1 => Just(Op::Fail),
        1 => Just(Op::BeginClose),
        1 => Just(Op::AbortClose),
        2 => (any::<bool>(), prop_oneof![Just(0u64), Just(3600u64)])
            .prop_map(|(remote_has_order, grace_secs)| Op::Reconcile { remote_has_order, grace_secs }),
    ]
}

fn intent() -> OrderIntent {
    OrderIntent::limit_buy(Pair::BtcJpy, dec!(5000000), dec!(0.0001))
}

fn remote_for(order_id: u64) -> OrderConfirmation {
    OrderConfirmation {
        order_id,
        pair: Pair::BtcJpy,
        side: OrderSide::Buy,
        rate: Some(dec!(5000000)),
        amount: Some(dec!(0.0001)),
        stop_loss_rate: None,
        created_at: Utc::now(),
    }
}

async fn active_count(ledger: &Ledger) -> usize {
    ledger
        .list_orders(u32::MAX)
        .await
        .unwrap()
        .iter()
        .filter(|o| o.status.is_active())
        .count()
}

async fn apply(ledger: &Ledger, op: &Op) {
    let current = ledger.current_position().await.unwrap();
    match op {
        Op::Open => {
            let result = ledger.open_position(intent()).await;
            if current.is_some() {
                assert!(matches!(result, Err(LedgerError::PositionConflict { .. })));
            } else {
                assert!(result.is_ok());
            }
        }
        Op::Confirm(remote_id) => {
            if let Some(order) = current {
                let result = ledger
                    .confirm_submission(order.local_id, *remote_id, order.rate, order.amount)
                    .await;
                if order.status == OrderStatus::PendingSubmit {
                    assert!(result.is_ok());
                } else {
                    assert!(matches!(result, Err(LedgerError::InvalidTransition { .. })));
                }
            }
        }
        Op::Fill => {
            if let Some(order) = current {
                let trade = TradeRecord::new(order.local_id, order.amount, order.notional());
                let _ = ledger
                    .confirm_close(order.local_id, CloseOutcome::Filled(trade))
                    .await;
            }
        }
        Op::Cancel => {
            if let Some(order) = current {
                let _ = ledger.confirm_close(order.local_id, CloseOutcome::Cancelled).await;
            }
        }
        Op::Fail => {
            if let Some(order) = current {
                let _ = ledger.mark_failed(order.local_id, "rejected").await;
            }
        }
        Op::BeginClose => {
            if let Some(order) = current {
                let result = ledger.begin_close(order.local_id, order.rate).await;
                match (order.status, order.is_closing()) {
                    (OrderStatus::Open, false) => assert!(result.is_ok()),
                    (OrderStatus::Open, true) => {
                        assert!(matches!(result, Err(LedgerError::CloseInProgress { .. })))
                    }
                    _ => assert!(matches!(result, Err(LedgerError::InvalidTransition { .. }))),
                }
            }
        }
        Op::AbortClose => {
            if let Some(order) = current {
                let _ = ledger.abort_close(order.local_id, "rejected").await;
            }
        }
        Op::Reconcile {
            remote_has_order,
            grace_secs,
        } => {
            let remote: Vec<OrderConfirmation> = match (&current, remote_has_order) {
                (Some(order), true) => vec![remote_for(order.order_id.unwrap_or(9999))],
                _ => Vec::new(),
            };
            ledger
                .reconcile(&remote, Duration::from_secs(*grace_secs))
                .await
                .unwrap();
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn at_most_one_active_order(ops in proptest::collection::vec(op_strategy(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let ledger = Ledger::in_memory().await.unwrap();
            for op in &ops {
                apply(&ledger, op).await;
                assert!(active_count(&ledger).await <= 1, "violated after {:?}", op);
            }
        });
    }
}

#[tokio::test]
async fn test_concurrent_open_only_one_wins() {
    let path = std::env::temp_dir().join(format!("bitco-ledger-{}.db", uuid::Uuid::new_v4()));
    let config = LedgerConfig {
        database_url: format!("sqlite://{}", path.display()),
        max_connections: 4,
    };
    let ledger = Ledger::connect(&config).await.unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.open_position(intent()).await })
        })
        .collect();

    let mut won = 0;
    let mut conflicts = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => won += 1,
            Err(LedgerError::PositionConflict { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    assert_eq!(won, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(active_count(&ledger).await, 1);

    ledger.pool().close().await;
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}
