//! Conformance test suite for `LedgerStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any `LedgerStore`
//! implementation can run to verify it honours the contract the provchain
//! core relies on. The suite covers:
//!
//! - **Snapshot reads**: uncommitted writes invisible, read-your-own-writes
//! - **Atomic commit**: all-or-nothing semantics for multi-key transactions
//! - **Conflict detection**: stale reads and phantom range entries rejected
//! - **Concurrency**: racing read-modify-write transactions, exactly one wins
//! - **History**: ordered modifications, tombstones, transaction metadata
//! - **Range scans**: half-open bounds, ordering, pending-write overlay
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty ledger for each test:
//!
//! ```ignore
//! use provchain_ledger::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn my_backend_conformance() {
//!     let report = run_conformance_suite(|| async { MyLedger::connect_test().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod conflict;
mod history;
mod range;
mod snapshot;

use std::fmt;
use std::future::Future;

use crate::LedgerStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "snapshot", "commit", "history").
    pub category: String,
    /// Test name (e.g. "uncommitted_write_invisible_to_other_transaction").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a ledger backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// ledger instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: LedgerStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(conflict::run_conflict_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);
    results.extend(range::run_range_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Commit a single-key write in its own transaction.
async fn write_committed<S: LedgerStore>(s: &S, key: &str, value: &str) -> Result<(), String> {
    let mut txn = s.begin().await.map_err(|e| format!("begin: {e}"))?;
    s.put_state(&mut txn, key, value.as_bytes().to_vec())
        .await
        .map_err(|e| format!("put {key}: {e}"))?;
    s.commit(txn)
        .await
        .map(|_| ())
        .map_err(|e| format!("commit {key}: {e}"))
}

/// Read a key in a fresh transaction and abort it.
async fn read_fresh<S: LedgerStore>(s: &S, key: &str) -> Result<Option<String>, String> {
    let mut txn = s.begin().await.map_err(|e| format!("begin: {e}"))?;
    let value = s
        .get_state(&mut txn, key)
        .await
        .map_err(|e| format!("get {key}: {e}"))?;
    s.abort(txn).await.map_err(|e| format!("abort: {e}"))?;
    value
        .map(|bytes| String::from_utf8(bytes).map_err(|e| format!("utf8: {e}")))
        .transpose()
}

fn expect_eq<T: PartialEq + fmt::Debug>(what: &str, actual: T, expected: T) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("{what}: expected {expected:?}, got {actual:?}"))
    }
}
