use std::future::Future;

use super::{expect_eq, read_fresh, write_committed, TestResult};
use crate::{LedgerError, LedgerStore};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "commit",
            "multi_key_commit_applies_every_write",
            multi_key_commit_applies_every_write(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "abort_discards_every_write",
            abort_discards_every_write(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "dropped_transaction_discards_writes",
            dropped_transaction_discards_writes(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "failed_commit_applies_nothing",
            failed_commit_applies_nothing(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "receipt_reports_tx_id_and_write_count",
            receipt_reports_tx_id_and_write_count(factory).await,
        ),
        TestResult::from_result(
            "commit",
            "last_write_in_transaction_wins",
            last_write_in_transaction_wins(factory).await,
        ),
    ]
}

async fn multi_key_commit_applies_every_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    for (key, value) in [("Order1", "order"), ("Lot1", "lot-a"), ("Lot2", "lot-b")] {
        s.put_state(&mut txn, key, value.as_bytes().to_vec())
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit(txn).await.map_err(|e| e.to_string())?;

    expect_eq("Order1", read_fresh(&s, "Order1").await?, Some("order".into()))?;
    expect_eq("Lot1", read_fresh(&s, "Lot1").await?, Some("lot-a".into()))?;
    expect_eq("Lot2", read_fresh(&s, "Lot2").await?, Some("lot-b".into()))
}

async fn abort_discards_every_write<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Order1", "original").await?;

    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "Order1", b"changed".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "Lot1", b"new".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.abort(txn).await.map_err(|e| e.to_string())?;

    expect_eq(
        "Order1",
        read_fresh(&s, "Order1").await?,
        Some("original".into()),
    )?;
    expect_eq("Lot1", read_fresh(&s, "Lot1").await?, None)
}

async fn dropped_transaction_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    {
        let mut txn = s.begin().await.map_err(|e| e.to_string())?;
        s.put_state(&mut txn, "Good1", b"dropped".to_vec())
            .await
            .map_err(|e| e.to_string())?;
    }
    expect_eq("Good1", read_fresh(&s, "Good1").await?, None)
}

/// A commit rejected for a conflict must not apply any of its writes.
async fn failed_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "GoodSequence", "0").await?;

    let mut loser = s.begin().await.map_err(|e| e.to_string())?;
    s.get_state(&mut loser, "GoodSequence")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut loser, "GoodSequence", b"1".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut loser, "Good1", b"loser".to_vec())
        .await
        .map_err(|e| e.to_string())?;

    write_committed(&s, "GoodSequence", "1").await?;

    match s.commit(loser).await {
        Err(LedgerError::Conflict { .. }) => {}
        Err(e) => return Err(format!("expected Conflict, got {e}")),
        Ok(_) => return Err("expected Conflict, commit succeeded".to_string()),
    }
    expect_eq("Good1", read_fresh(&s, "Good1").await?, None)
}

async fn receipt_reports_tx_id_and_write_count<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    let tx_id = s.tx_id(&txn);
    s.put_state(&mut txn, "Good1", b"a".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "GoodSequence", b"1".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let receipt = s.commit(txn).await.map_err(|e| e.to_string())?;
    expect_eq("tx_id", receipt.tx_id, tx_id)?;
    expect_eq("writes", receipt.writes, 2)
}

async fn last_write_in_transaction_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    for value in ["first", "second", "third"] {
        s.put_state(&mut txn, "Good1", value.as_bytes().to_vec())
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit(txn).await.map_err(|e| e.to_string())?;

    expect_eq("value", read_fresh(&s, "Good1").await?, Some("third".into()))?;
    let history = s
        .get_history_for_key("Good1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("history entries", history.len(), 1)
}
