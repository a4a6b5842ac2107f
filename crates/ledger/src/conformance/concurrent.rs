use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Barrier;

use super::{expect_eq, read_fresh, write_committed, TestResult};
use crate::{LedgerError, LedgerStore};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "racing_increments_exactly_one_wins",
        racing_increments_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "racing_writes_to_distinct_keys_all_succeed",
        racing_writes_to_distinct_keys_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "retried_increments_allocate_distinct_values",
        retried_increments_allocate_distinct_values(factory).await,
    ));

    results
}

async fn increment<S: LedgerStore>(s: &S, txn: &mut S::Transaction) -> Result<u64, LedgerError> {
    let current = s
        .get_state(txn, "GoodSequence")
        .await?
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|text| text.parse::<u64>().ok())
        .unwrap_or(0);
    let next = current + 1;
    s.put_state(txn, "GoodSequence", next.to_string().into_bytes())
        .await?;
    Ok(next)
}

// ── Racing increments: exactly one wins ─────────────────────────────────────

/// N tasks read the same counter, wait until all have read it, then commit.
/// Exactly one commit succeeds; the rest must get Conflict.
async fn racing_increments_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let ledger = Arc::new(factory().await);
    write_committed(&*ledger, "GoodSequence", "0").await?;

    let barrier = Arc::new(Barrier::new(N));
    let mut handles = Vec::new();
    for _ in 0..N {
        let s = ledger.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let mut txn = s.begin().await?;
            increment(&*s, &mut txn).await?;
            barrier.wait().await;
            match s.commit(txn).await {
                Ok(_) => Ok(true),
                Err(LedgerError::Conflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: LedgerError| format!("ledger error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }
    expect_eq(
        "counter",
        read_fresh(&*ledger, "GoodSequence").await?,
        Some("1".to_string()),
    )
}

// ── Disjoint writes ─────────────────────────────────────────────────────────

async fn racing_writes_to_distinct_keys_all_succeed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let ledger = Arc::new(factory().await);

    let barrier = Arc::new(Barrier::new(N));
    let mut handles = Vec::new();
    for i in 0..N {
        let s = ledger.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("Good{}", i + 1);
            let mut txn = s.begin().await?;
            s.get_state(&mut txn, &key).await?;
            s.put_state(&mut txn, &key, key.clone().into_bytes()).await?;
            barrier.wait().await;
            s.commit(txn).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e| format!("ledger error: {e}"))?;
    }
    for i in 1..=N {
        let key = format!("Good{i}");
        expect_eq(&key, read_fresh(&*ledger, &key).await?, Some(key.clone()))?;
    }
    Ok(())
}

// ── Retry until success ─────────────────────────────────────────────────────

/// N tasks increment the same counter, resubmitting on Conflict. Every task
/// must end up with a different value and the counter must reach N.
async fn retried_increments_allocate_distinct_values<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let ledger = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = ledger.clone();
        handles.push(tokio::spawn(async move {
            loop {
                let mut txn = s.begin().await?;
                let value = increment(&*s, &mut txn).await?;
                match s.commit(txn).await {
                    Ok(_) => return Ok(value),
                    Err(LedgerError::Conflict { .. }) => {
                        tokio::task::yield_now().await;
                    }
                    Err(e) => return Err(e),
                }
            }
        }));
    }

    let mut allocated = BTreeSet::new();
    for handle in handles {
        let value = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: LedgerError| format!("ledger error: {e}"))?;
        if !allocated.insert(value) {
            return Err(format!("value {value} allocated twice"));
        }
    }
    expect_eq(
        "allocated",
        allocated,
        (1..=N as u64).collect::<BTreeSet<_>>(),
    )?;
    expect_eq(
        "counter",
        read_fresh(&*ledger, "GoodSequence").await?,
        Some(N.to_string()),
    )
}
