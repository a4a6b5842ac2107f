//! Per-key history through the service.

use std::time::Duration;

use provchain_core::{CultivateRequest, GoodUpdate, HistoryRecord, SupplyChain, User};
use provchain_ledger::{LedgerStore, LedgerTimestamp, MemoryLedger, StepClock};
use rust_decimal::Decimal;

fn supplier() -> User {
    serde_json::from_value(serde_json::json!({"id": "S1", "role": "supplier"})).unwrap()
}

fn frozen_ledger() -> MemoryLedger {
    // Zero step: every call returns the same instant, so ordering comes from
    // the ledger itself.
    MemoryLedger::with_clock(StepClock::new(
        LedgerTimestamp {
            seconds: 1_750_000_000,
            nanos: 0,
        },
        Duration::ZERO,
    ))
}

#[tokio::test]
async fn k_writes_yield_k_ordered_entries() {
    const K: usize = 6;
    let chain = SupplyChain::new(frozen_ledger());
    chain
        .cultivate(
            &supplier(),
            CultivateRequest {
                code: String::new(),
                name: "v0".into(),
                images: vec![],
                price: Decimal::ONE,
                amount: Decimal::ONE,
                unit: String::new(),
                description: String::new(),
                certificate_ref: String::new(),
            },
        )
        .await
        .unwrap();
    for i in 1..K {
        chain
            .update_good(
                &supplier(),
                GoodUpdate {
                    id: "Good1".into(),
                    name: Some(format!("v{i}")),
                    ..GoodUpdate::default()
                },
            )
            .await
            .unwrap();
    }

    let history = chain.good_history("Good1").await.unwrap();
    assert_eq!(history.len(), K);
    for (i, entry) in history.iter().enumerate() {
        let HistoryRecord::Value(good) = &entry.record else {
            panic!("unexpected tombstone");
        };
        assert_eq!(good.name, format!("v{i}"));
        assert!(!entry.is_delete);
    }
    for pair in history.windows(2) {
        assert!(pair[0].timestamp < pair[1].timestamp);
        assert_ne!(pair[0].transaction_id, pair[1].transaction_id);
    }
}

#[tokio::test]
async fn deletion_shows_as_tombstone() {
    let chain = SupplyChain::new(MemoryLedger::new());
    let ledger = chain.ledger();
    let mut txn = ledger.begin().await.unwrap();
    ledger
        .put_state(&mut txn, "Lot4", br#"{"note":"scratch"}"#.to_vec())
        .await
        .unwrap();
    ledger.commit(txn).await.unwrap();
    let mut txn = ledger.begin().await.unwrap();
    ledger.delete_state(&mut txn, "Lot4").await.unwrap();
    ledger.commit(txn).await.unwrap();

    let history = chain.key_history("Lot4").await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[1].is_delete);
    assert_eq!(
        history[1].record,
        HistoryRecord::Tombstone { id: "Lot4".into() }
    );
}

#[tokio::test]
async fn unknown_key_history_is_empty() {
    let chain = SupplyChain::new(MemoryLedger::new());
    assert!(chain.order_history("Order42").await.unwrap().is_empty());
}
