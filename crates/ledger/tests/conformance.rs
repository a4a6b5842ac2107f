use std::time::Duration;

use provchain_ledger::conformance::run_conformance_suite;
use provchain_ledger::{LedgerTimestamp, MemoryLedger, StepClock};

#[tokio::test]
async fn memory_ledger_passes_conformance_suite() {
    let report = run_conformance_suite(|| async { MemoryLedger::new() }).await;
    assert_eq!(report.failed, 0, "{report}");
    assert!(report.total > 30, "suite ran only {} tests", report.total);
}

#[tokio::test]
async fn memory_ledger_with_frozen_clock_passes_conformance_suite() {
    let start = LedgerTimestamp::parse_rfc3339("2025-03-01T08:00:00Z").unwrap();
    let report = run_conformance_suite(|| async move {
        MemoryLedger::with_clock(StepClock::new(start, Duration::ZERO))
    })
    .await;
    assert_eq!(report.failed, 0, "{report}");
}
