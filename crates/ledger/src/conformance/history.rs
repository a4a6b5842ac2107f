use std::collections::BTreeSet;
use std::future::Future;

use super::{expect_eq, write_committed, TestResult};
use crate::LedgerStore;

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "history",
            "unknown_key_has_empty_history",
            unknown_key_has_empty_history(factory).await,
        ),
        TestResult::from_result(
            "history",
            "every_commit_appends_in_order",
            every_commit_appends_in_order(factory).await,
        ),
        TestResult::from_result(
            "history",
            "out_of_order_commits_keep_timestamps_increasing",
            out_of_order_commits_keep_timestamps_increasing(factory).await,
        ),
        TestResult::from_result(
            "history",
            "entries_carry_commit_metadata",
            entries_carry_commit_metadata(factory).await,
        ),
        TestResult::from_result(
            "history",
            "delete_records_tombstone",
            delete_records_tombstone(factory).await,
        ),
        TestResult::from_result(
            "history",
            "aborted_write_leaves_no_history",
            aborted_write_leaves_no_history(factory).await,
        ),
    ]
}

async fn unknown_key_has_empty_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let history = s
        .get_history_for_key("Good404")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("entries", history.len(), 0)
}

async fn every_commit_appends_in_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let stages = ["CULTIVATED", "HARVESTED", "IMPORTED", "MANUFACTURED"];
    for stage in stages {
        write_committed(&s, "Good1", stage).await?;
    }

    let history = s
        .get_history_for_key("Good1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("entries", history.len(), stages.len())?;
    for (entry, stage) in history.iter().zip(stages) {
        expect_eq("value", entry.value.as_slice(), stage.as_bytes())?;
        expect_eq("is_delete", entry.is_delete, false)?;
    }
    for pair in history.windows(2) {
        if pair[1].timestamp <= pair[0].timestamp {
            return Err(format!(
                "timestamps not increasing: {} then {}",
                pair[0].timestamp, pair[1].timestamp
            ));
        }
    }
    Ok(())
}

/// Blind writes begun A then B and committed B then A: history lists B's
/// value first and the timestamps still increase.
async fn out_of_order_commits_keep_timestamps_increasing<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut a = s.begin().await.map_err(|e| e.to_string())?;
    let mut b = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut a, "Lot1", b"a".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut b, "Lot1", b"b".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let receipt_b = s.commit(b).await.map_err(|e| e.to_string())?;
    let receipt_a = s.commit(a).await.map_err(|e| e.to_string())?;

    let history = s
        .get_history_for_key("Lot1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("entries", history.len(), 2)?;
    expect_eq("first value", history[0].value.as_slice(), b"b".as_slice())?;
    expect_eq("second value", history[1].value.as_slice(), b"a".as_slice())?;
    expect_eq("first timestamp", Some(history[0].timestamp), receipt_b.timestamp)?;
    expect_eq("second timestamp", Some(history[1].timestamp), receipt_a.timestamp)?;
    if history[1].timestamp <= history[0].timestamp {
        return Err(format!(
            "timestamps not increasing: {} then {}",
            history[0].timestamp, history[1].timestamp
        ));
    }

    let later = s.begin().await.map_err(|e| e.to_string())?;
    let later_ts = s.tx_timestamp(&later).map_err(|e| e.to_string())?;
    s.abort(later).await.map_err(|e| e.to_string())?;
    if later_ts <= history[1].timestamp {
        return Err(format!(
            "new transaction stamped {later_ts}, not after last commit {}",
            history[1].timestamp
        ));
    }
    Ok(())
}

/// Each entry reports the id and timestamp of the transaction that wrote it.
async fn entries_carry_commit_metadata<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut receipts = Vec::new();
    for value in ["a", "b", "c"] {
        let mut txn = s.begin().await.map_err(|e| e.to_string())?;
        s.put_state(&mut txn, "Order1", value.as_bytes().to_vec())
            .await
            .map_err(|e| e.to_string())?;
        receipts.push(s.commit(txn).await.map_err(|e| e.to_string())?);
    }

    let history = s
        .get_history_for_key("Order1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("entries", history.len(), receipts.len())?;
    for (entry, receipt) in history.iter().zip(&receipts) {
        expect_eq("tx_id", entry.tx_id.as_str(), receipt.tx_id.as_str())?;
        expect_eq("timestamp", Some(entry.timestamp), receipt.timestamp)?;
    }
    let distinct: BTreeSet<&str> = history.iter().map(|m| m.tx_id.as_str()).collect();
    expect_eq("distinct tx ids", distinct.len(), history.len())
}

async fn delete_records_tombstone<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Lot1", "lot").await?;

    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut txn, "Lot1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit(txn).await.map_err(|e| e.to_string())?;

    let history = s
        .get_history_for_key("Lot1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("entries", history.len(), 2)?;
    expect_eq("first is_delete", history[0].is_delete, false)?;
    expect_eq("tombstone is_delete", history[1].is_delete, true)?;
    expect_eq("tombstone value", history[1].value.len(), 0)
}

async fn aborted_write_leaves_no_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Good1", "kept").await?;

    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "Good1", b"discarded".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.abort(txn).await.map_err(|e| e.to_string())?;

    let history = s
        .get_history_for_key("Good1")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("entries", history.len(), 1)
}
