use std::future::Future;

use super::{expect_eq, read_fresh, write_committed, TestResult};
use crate::{LedgerError, LedgerStore};

pub(super) async fn run_conflict_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        // Stale reads
        TestResult::from_result(
            "conflict",
            "two_read_modify_write_one_wins",
            two_read_modify_write_one_wins(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "conflict_names_the_key",
            conflict_names_the_key(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "read_of_absent_key_conflicts_with_creation",
            read_of_absent_key_conflicts_with_creation(factory).await,
        ),
        // Non-conflicts
        TestResult::from_result(
            "conflict",
            "disjoint_keys_both_commit",
            disjoint_keys_both_commit(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "blind_writes_both_commit",
            blind_writes_both_commit(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "resubmitted_after_conflict_succeeds",
            resubmitted_after_conflict_succeeds(factory).await,
        ),
        // Phantoms
        TestResult::from_result(
            "conflict",
            "range_scan_conflicts_with_insert_in_range",
            range_scan_conflicts_with_insert_in_range(factory).await,
        ),
        TestResult::from_result(
            "conflict",
            "range_scan_ignores_insert_outside_range",
            range_scan_ignores_insert_outside_range(factory).await,
        ),
    ]
}

/// Simulates two concurrent `next(sequence)` calls, interleaved by hand.
async fn two_read_modify_write_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "GoodSequence", "0").await?;

    let mut a = s.begin().await.map_err(|e| e.to_string())?;
    let mut b = s.begin().await.map_err(|e| e.to_string())?;
    for txn in [&mut a, &mut b] {
        s.get_state(txn, "GoodSequence")
            .await
            .map_err(|e| e.to_string())?;
        s.put_state(txn, "GoodSequence", b"1".to_vec())
            .await
            .map_err(|e| e.to_string())?;
    }

    s.commit(a).await.map_err(|e| format!("first commit: {e}"))?;
    match s.commit(b).await {
        Err(LedgerError::Conflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected Conflict, got {e}")),
        Ok(_) => Err("both read-modify-write transactions committed".to_string()),
    }
}

async fn conflict_names_the_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Order1", "v1").await?;

    let mut stale = s.begin().await.map_err(|e| e.to_string())?;
    s.get_state(&mut stale, "Order1")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut stale, "Order1", b"stale".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    write_committed(&s, "Order1", "v2").await?;

    match s.commit(stale).await {
        Err(LedgerError::Conflict { key }) => expect_eq("conflict key", key.as_str(), "Order1"),
        Err(e) => Err(format!("expected Conflict, got {e}")),
        Ok(_) => Err("stale commit succeeded".to_string()),
    }
}

/// Two creators that both observed "no counter yet" cannot both win.
async fn read_of_absent_key_conflicts_with_creation<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut a = s.begin().await.map_err(|e| e.to_string())?;
    let seen = s
        .get_state(&mut a, "OrderSequence")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("absent", seen, None)?;
    s.put_state(&mut a, "OrderSequence", b"0".to_vec())
        .await
        .map_err(|e| e.to_string())?;

    write_committed(&s, "OrderSequence", "0").await?;

    match s.commit(a).await {
        Err(LedgerError::Conflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected Conflict, got {e}")),
        Ok(_) => Err("commit over a concurrently created key succeeded".to_string()),
    }
}

async fn disjoint_keys_both_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Good1", "g1").await?;
    write_committed(&s, "Good2", "g2").await?;

    let mut a = s.begin().await.map_err(|e| e.to_string())?;
    let mut b = s.begin().await.map_err(|e| e.to_string())?;
    s.get_state(&mut a, "Good1")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut a, "Good1", b"g1'".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.get_state(&mut b, "Good2")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut b, "Good2", b"g2'".to_vec())
        .await
        .map_err(|e| e.to_string())?;

    s.commit(a).await.map_err(|e| format!("commit a: {e}"))?;
    s.commit(b).await.map_err(|e| format!("commit b: {e}"))?;
    Ok(())
}

/// Writes that were never read do not enter the read set.
async fn blind_writes_both_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut a = s.begin().await.map_err(|e| e.to_string())?;
    let mut b = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut a, "Good1", b"a".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut b, "Good1", b"b".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.commit(a).await.map_err(|e| format!("commit a: {e}"))?;
    s.commit(b).await.map_err(|e| format!("commit b: {e}"))?;
    expect_eq("final", read_fresh(&s, "Good1").await?, Some("b".into()))
}

async fn resubmitted_after_conflict_succeeds<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "GoodSequence", "0").await?;

    let mut stale = s.begin().await.map_err(|e| e.to_string())?;
    s.get_state(&mut stale, "GoodSequence")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut stale, "GoodSequence", b"1".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    write_committed(&s, "GoodSequence", "1").await?;
    if s.commit(stale).await.is_ok() {
        return Err("stale commit succeeded".to_string());
    }

    // Resubmission re-reads the counter and builds on the winner.
    let mut retry = s.begin().await.map_err(|e| e.to_string())?;
    let current = s
        .get_state(&mut retry, "GoodSequence")
        .await
        .map_err(|e| e.to_string())?;
    expect_eq("re-read", current, Some(b"1".to_vec()))?;
    s.put_state(&mut retry, "GoodSequence", b"2".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.commit(retry).await.map_err(|e| format!("retry: {e}"))?;
    expect_eq(
        "counter",
        read_fresh(&s, "GoodSequence").await?,
        Some("2".into()),
    )
}

async fn range_scan_conflicts_with_insert_in_range<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Good1", "g1").await?;

    let mut scanner = s.begin().await.map_err(|e| e.to_string())?;
    s.get_state_by_range(&mut scanner, "Good0", "Good:")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut scanner, "Summary", b"1 good".to_vec())
        .await
        .map_err(|e| e.to_string())?;

    write_committed(&s, "Good2", "g2").await?;

    match s.commit(scanner).await {
        Err(LedgerError::Conflict { key }) => expect_eq("phantom key", key.as_str(), "Good2"),
        Err(e) => Err(format!("expected Conflict, got {e}")),
        Ok(_) => Err("scan over a concurrently extended range committed".to_string()),
    }
}

async fn range_scan_ignores_insert_outside_range<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut scanner = s.begin().await.map_err(|e| e.to_string())?;
    s.get_state_by_range(&mut scanner, "Good0", "Good:")
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut scanner, "Summary", b"0 goods".to_vec())
        .await
        .map_err(|e| e.to_string())?;

    write_committed(&s, "Order1", "o1").await?;
    s.commit(scanner)
        .await
        .map(|_| ())
        .map_err(|e| format!("commit: {e}"))
}
