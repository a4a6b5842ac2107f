use std::future::Future;

use super::{expect_eq, write_committed, TestResult};
use crate::{LedgerError, LedgerStore};

pub(super) async fn run_range_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "range",
            "start_inclusive_end_exclusive",
            start_inclusive_end_exclusive(factory).await,
        ),
        TestResult::from_result(
            "range",
            "results_in_key_order",
            results_in_key_order(factory).await,
        ),
        TestResult::from_result(
            "range",
            "digit_band_excludes_sequence_key",
            digit_band_excludes_sequence_key(factory).await,
        ),
        TestResult::from_result(
            "range",
            "pending_writes_overlay_snapshot",
            pending_writes_overlay_snapshot(factory).await,
        ),
        TestResult::from_result(
            "range",
            "deleted_keys_excluded",
            deleted_keys_excluded(factory).await,
        ),
        TestResult::from_result(
            "range",
            "empty_range_is_empty",
            empty_range_is_empty(factory).await,
        ),
        TestResult::from_result(
            "range",
            "inverted_range_rejected",
            inverted_range_rejected(factory).await,
        ),
    ]
}

async fn scan<S: LedgerStore>(s: &S, start: &str, end: &str) -> Result<Vec<String>, String> {
    let mut txn = s.begin().await.map_err(|e| format!("begin: {e}"))?;
    let entries = s
        .get_state_by_range(&mut txn, start, end)
        .await
        .map_err(|e| format!("range {start}..{end}: {e}"))?;
    s.abort(txn).await.map_err(|e| format!("abort: {e}"))?;
    Ok(entries.into_iter().map(|(key, _)| key).collect())
}

async fn start_inclusive_end_exclusive<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for key in ["a", "b", "c", "d"] {
        write_committed(&s, key, key).await?;
    }
    expect_eq(
        "keys",
        scan(&s, "b", "d").await?,
        vec!["b".to_string(), "c".to_string()],
    )
}

/// Lexicographic, not numeric: "Good10" sorts before "Good2".
async fn results_in_key_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for key in ["Good2", "Good10", "Good1"] {
        write_committed(&s, key, "g").await?;
    }
    expect_eq(
        "keys",
        scan(&s, "Good0", "Good:").await?,
        vec!["Good1".to_string(), "Good10".to_string(), "Good2".to_string()],
    )
}

async fn digit_band_excludes_sequence_key<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Good1", "g").await?;
    write_committed(&s, "GoodSequence", "1").await?;
    write_committed(&s, "Order1", "o").await?;
    expect_eq(
        "keys",
        scan(&s, "Good0", "Good:").await?,
        vec!["Good1".to_string()],
    )
}

async fn pending_writes_overlay_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Lot1", "committed").await?;
    write_committed(&s, "Lot2", "doomed").await?;

    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "Lot1", b"rewritten".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.put_state(&mut txn, "Lot3", b"added".to_vec())
        .await
        .map_err(|e| e.to_string())?;
    s.delete_state(&mut txn, "Lot2")
        .await
        .map_err(|e| e.to_string())?;
    let entries = s
        .get_state_by_range(&mut txn, "Lot0", "Lot:")
        .await
        .map_err(|e| e.to_string())?;
    s.abort(txn).await.map_err(|e| e.to_string())?;

    expect_eq(
        "entries",
        entries,
        vec![
            ("Lot1".to_string(), b"rewritten".to_vec()),
            ("Lot3".to_string(), b"added".to_vec()),
        ],
    )
}

async fn deleted_keys_excluded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Order1", "o1").await?;
    write_committed(&s, "Order2", "o2").await?;

    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    s.delete_state(&mut txn, "Order1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit(txn).await.map_err(|e| e.to_string())?;

    expect_eq(
        "keys",
        scan(&s, "Order0", "Order:").await?,
        vec!["Order2".to_string()],
    )
}

async fn empty_range_is_empty<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    write_committed(&s, "Good1", "g").await?;
    expect_eq("keys", scan(&s, "Good1", "Good1").await?, Vec::<String>::new())
}

async fn inverted_range_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut txn = s.begin().await.map_err(|e| e.to_string())?;
    let result = s.get_state_by_range(&mut txn, "Good:", "Good0").await;
    s.abort(txn).await.map_err(|e| e.to_string())?;
    match result {
        Err(LedgerError::InvalidRange { .. }) => Ok(()),
        Err(e) => Err(format!("expected InvalidRange, got {e}")),
        Ok(entries) => Err(format!("expected InvalidRange, got {} entries", entries.len())),
    }
}
