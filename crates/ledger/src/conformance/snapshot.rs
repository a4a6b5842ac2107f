use std::future::Future;

use super::{expect_eq, read_fresh, write_committed, TestResult};
use crate::LedgerStore;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "absent_key_reads_none",
            absent_key_reads_none(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "uncommitted_write_invisible_to_other_transaction",
            uncommitted_write_invisible_to_other_transaction(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "transaction_reads_its_own_writes",
            transaction_reads_its_own_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "later_commit_invisible_to_earlier_snapshot",
            later_commit_invisible_to_earlier_snapshot(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "pending_delete_hides_key",
            pending_delete_hides_key(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "timestamp_stable_within_transaction",
            timestamp_stable_within_transaction(factory).await,
        ),
    ]
}

async fn absent_key_reads_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    expect_eq("absent key", read_fresh(&s, "Good1").await?, None)
}

/// A write buffered in one transaction is not visible to another until commit.
async fn uncommitted_write_invisible_to_other_transaction<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut writer = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut writer, "Good1", b"pending".to_vec())
        .await
        .map_err(|e| e.to_string())?;

    expect_eq("before commit", read_fresh(&s, "Good1").await?, None)?;

    s.commit(writer).await.map_err(|e| e.to_string())?;
    expect_eq(
        "after commit",
        read_fresh(&s, "Good1").await?,
        Some("pending".to_string()),
    )
}

/// Sequence allocation relies on this: read, write, read again sees the write.
async fn transaction_reads_its_own_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "GoodSequence", "1").await?;

    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "GoodSequence", b"2".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let seen = s
        .get_state(&mut txn, "GoodSequence")
        .await
        .map_err(|e| e.to_string())?;
    s.abort(txn).await.map_err(|e| e.to_string())?;
    expect_eq("own write", seen, Some(b"2".to_vec()))
}

/// A transaction keeps reading from the snapshot it began with.
async fn later_commit_invisible_to_earlier_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Order1", "v1").await?;

    let mut reader = s.begin().await.map_err(|e| e.to_string())?;
    write_committed(&s, "Order1", "v2").await?;

    let seen = s
        .get_state(&mut reader, "Order1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort(reader).await.map_err(|e| e.to_string())?;
    expect_eq("snapshot read", seen, Some(b"v1".to_vec()))
}

async fn pending_delete_hides_key<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let seen = s
        .get_state(&mut txn, "Lot1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit(txn).await.map_err(|e| e.to_string())?;
    expect_eq("deleted within txn", seen, None)?;
    expect_eq("deleted after commit", read_fresh(&s, "Lot1").await?, None)
}

async fn timestamp_stable_within_transaction<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    let first = s.tx_timestamp(&txn).map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "Good1", b"x".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    let second = s.tx_timestamp(&txn).map_err(|e| e.to_string())?;
    let receipt = s.commit(txn).await.map_err(|e| e.to_string())?;
    expect_eq("timestamp across calls", second, first)?;
    expect_eq("receipt timestamp", receipt.timestamp, Some(first))
}
