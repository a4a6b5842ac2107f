//! In-memory reference implementation of [`LedgerStore`].
//!
//! Every key keeps its full version list, tagged with the commit height of the
//! transaction that wrote it. A transaction reads the newest version at or
//! below the height it began at, and commit fails if any key it read (or any
//! key inside a range it scanned) gained a version above that height.
//!
//! The whole state can be written to and read back from a JSON file so a
//! short-lived process (the CLI) can keep a ledger across invocations.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::LedgerError;
use crate::record::{CommitReceipt, KeyModification, LedgerTimestamp};
use crate::traits::LedgerStore;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Source of invocation timestamps.
///
/// `None` means the clock cannot supply a timestamp; transactions begun at
/// that moment report `LedgerError::TimestampUnavailable`.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Option<LedgerTimestamp>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Option<LedgerTimestamp> {
        Some(LedgerTimestamp::now())
    }
}

/// Deterministic clock: returns `start`, then advances by `step` per call.
#[derive(Debug)]
pub struct StepClock {
    next_nanos: AtomicI64,
    step_nanos: i64,
}

impl StepClock {
    pub fn new(start: LedgerTimestamp, step: Duration) -> Self {
        let start_nanos = start.seconds * NANOS_PER_SEC + i64::from(start.nanos);
        StepClock {
            next_nanos: AtomicI64::new(start_nanos),
            step_nanos: i64::try_from(step.as_nanos()).unwrap_or(i64::MAX),
        }
    }
}

impl Clock for StepClock {
    fn now(&self) -> Option<LedgerTimestamp> {
        let n = self.next_nanos.fetch_add(self.step_nanos, Ordering::SeqCst);
        Some(LedgerTimestamp {
            seconds: n.div_euclid(NANOS_PER_SEC),
            nanos: u32::try_from(n.rem_euclid(NANOS_PER_SEC)).ok()?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Version {
    height: u64,
    tx_id: String,
    timestamp: LedgerTimestamp,
    /// `None` marks a deletion.
    value: Option<Vec<u8>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerState {
    /// Number of committed write transactions.
    height: u64,
    /// Last timestamp handed to a transaction; keeps timestamps strictly increasing.
    last_timestamp: Option<LedgerTimestamp>,
    /// Timestamp of the newest committed version of any key.
    #[serde(default)]
    last_committed: Option<LedgerTimestamp>,
    keys: BTreeMap<String, Vec<Version>>,
}

impl LedgerState {
    /// Newest version of `key` visible at `height`.
    fn version_at(&self, key: &str, height: u64) -> Option<&Version> {
        self.keys
            .get(key)
            .and_then(|versions| versions.iter().rev().find(|v| v.height <= height))
    }

    fn modified_after(&self, key: &str, height: u64) -> bool {
        self.keys
            .get(key)
            .and_then(|versions| versions.last())
            .is_some_and(|v| v.height > height)
    }
}

/// A transaction against a [`MemoryLedger`].
pub struct MemoryTransaction {
    tx_id: String,
    timestamp: Option<LedgerTimestamp>,
    snapshot_height: u64,
    reads: BTreeSet<String>,
    ranges: Vec<(String, String)>,
    writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("tx_id", &self.tx_id)
            .field("snapshot_height", &self.snapshot_height)
            .field("reads", &self.reads.len())
            .field("ranges", &self.ranges.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}

/// In-process versioned key-value ledger with optimistic concurrency control.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    clock: Box<dyn Clock>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// An empty ledger using the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_clock(clock: impl Clock) -> Self {
        MemoryLedger {
            state: Mutex::new(LedgerState::default()),
            clock: Box::new(clock),
        }
    }

    /// Load a ledger previously written by [`MemoryLedger::save`].
    ///
    /// A missing file yields an empty ledger.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let state = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<LedgerState>(&bytes).map_err(|e| {
                LedgerError::Backend(format!("corrupt ledger file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => LedgerState::default(),
            Err(e) => {
                return Err(LedgerError::Backend(format!(
                    "error reading ledger file {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(MemoryLedger {
            state: Mutex::new(state),
            clock: Box::new(SystemClock),
        })
    }

    /// Write the full ledger state to `path` (via a temporary sibling file).
    pub async fn save(&self, path: &Path) -> Result<(), LedgerError> {
        let bytes = {
            let state = self.state.lock().await;
            serde_json::to_vec(&*state)
                .map_err(|e| LedgerError::Backend(format!("ledger serialization: {e}")))?
        };
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes)
            .and_then(|()| std::fs::rename(&tmp, path))
            .map_err(|e| {
                LedgerError::Backend(format!("error writing ledger file {}: {e}", path.display()))
            })
    }

    /// Number of committed write transactions.
    pub async fn height(&self) -> u64 {
        self.state.lock().await.height
    }
}

fn make_tx_id(height: u64, timestamp: Option<LedgerTimestamp>) -> String {
    let nonce: [u8; 16] = rand::random();
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(height.to_be_bytes());
    if let Some(ts) = timestamp {
        hasher.update(ts.seconds.to_be_bytes());
        hasher.update(ts.nanos.to_be_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn key_range<'a>(start: &'a str, end: &'a str) -> (Bound<&'a str>, Bound<&'a str>) {
    (Bound::Included(start), Bound::Excluded(end))
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    type Transaction = MemoryTransaction;

    async fn begin(&self) -> Result<MemoryTransaction, LedgerError> {
        let mut state = self.state.lock().await;
        let timestamp = self.clock.now().map(|now| match state.last_timestamp {
            Some(last) if now <= last => last.successor(),
            _ => now,
        });
        if timestamp.is_some() {
            state.last_timestamp = timestamp;
        }
        Ok(MemoryTransaction {
            tx_id: make_tx_id(state.height, timestamp),
            timestamp,
            snapshot_height: state.height,
            reads: BTreeSet::new(),
            ranges: Vec::new(),
            writes: BTreeMap::new(),
        })
    }

    async fn commit(&self, txn: MemoryTransaction) -> Result<CommitReceipt, LedgerError> {
        let mut state = self.state.lock().await;

        for key in &txn.reads {
            if state.modified_after(key, txn.snapshot_height) {
                tracing::debug!(tx_id = %txn.tx_id, key = %key, "read-set conflict");
                return Err(LedgerError::Conflict { key: key.clone() });
            }
        }
        for (start, end) in &txn.ranges {
            let phantom = state
                .keys
                .range::<str, _>(key_range(start, end))
                .find(|(_, versions)| {
                    versions
                        .last()
                        .is_some_and(|v| v.height > txn.snapshot_height)
                })
                .map(|(key, _)| key.clone());
            if let Some(key) = phantom {
                tracing::debug!(tx_id = %txn.tx_id, key = %key, "range conflict");
                return Err(LedgerError::Conflict { key });
            }
        }

        let writes = txn.writes.len();
        if writes == 0 {
            return Ok(CommitReceipt {
                tx_id: txn.tx_id,
                timestamp: txn.timestamp,
                writes,
            });
        }
        // Transactions can commit out of begin order; history stamps follow
        // commit order.
        let timestamp = match (txn.timestamp, state.last_committed) {
            (None, _) => return Err(LedgerError::TimestampUnavailable),
            (Some(ts), Some(last)) if ts <= last => last.successor(),
            (Some(ts), _) => ts,
        };
        state.last_committed = Some(timestamp);
        if state.last_timestamp.map_or(true, |last| last < timestamp) {
            state.last_timestamp = Some(timestamp);
        }

        state.height += 1;
        let height = state.height;
        for (key, value) in txn.writes {
            state.keys.entry(key).or_default().push(Version {
                height,
                tx_id: txn.tx_id.clone(),
                timestamp,
                value,
            });
        }
        tracing::debug!(tx_id = %txn.tx_id, height, writes, "committed");

        Ok(CommitReceipt {
            tx_id: txn.tx_id,
            timestamp: Some(timestamp),
            writes,
        })
    }

    async fn abort(&self, txn: MemoryTransaction) -> Result<(), LedgerError> {
        tracing::trace!(tx_id = %txn.tx_id, discarded = txn.writes.len(), "aborted");
        Ok(())
    }

    fn tx_id(&self, txn: &MemoryTransaction) -> String {
        txn.tx_id.clone()
    }

    fn tx_timestamp(&self, txn: &MemoryTransaction) -> Result<LedgerTimestamp, LedgerError> {
        txn.timestamp.ok_or(LedgerError::TimestampUnavailable)
    }

    async fn get_state(
        &self,
        txn: &mut MemoryTransaction,
        key: &str,
    ) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(pending) = txn.writes.get(key) {
            return Ok(pending.clone());
        }
        let state = self.state.lock().await;
        txn.reads.insert(key.to_string());
        Ok(state
            .version_at(key, txn.snapshot_height)
            .and_then(|v| v.value.clone()))
    }

    async fn put_state(
        &self,
        txn: &mut MemoryTransaction,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), LedgerError> {
        txn.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    async fn delete_state(
        &self,
        txn: &mut MemoryTransaction,
        key: &str,
    ) -> Result<(), LedgerError> {
        txn.writes.insert(key.to_string(), None);
        Ok(())
    }

    async fn get_state_by_range(
        &self,
        txn: &mut MemoryTransaction,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError> {
        if start > end {
            return Err(LedgerError::InvalidRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        let state = self.state.lock().await;
        let mut merged: BTreeMap<String, Vec<u8>> = state
            .keys
            .range::<str, _>(key_range(start, end))
            .filter_map(|(key, _)| {
                state
                    .version_at(key, txn.snapshot_height)
                    .and_then(|v| v.value.clone())
                    .map(|value| (key.clone(), value))
            })
            .collect();
        for (key, pending) in txn.writes.range::<str, _>(key_range(start, end)) {
            match pending {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        txn.ranges.push((start.to_string(), end.to_string()));
        Ok(merged.into_iter().collect())
    }

    async fn get_history_for_key(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .keys
            .get(key)
            .map(|versions| {
                versions
                    .iter()
                    .map(|v| KeyModification {
                        tx_id: v.tx_id.clone(),
                        timestamp: v.timestamp,
                        value: v.value.clone().unwrap_or_default(),
                        is_delete: v.value.is_none(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
