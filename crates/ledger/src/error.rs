/// All errors that can be returned by a LedgerStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Optimistic concurrency control conflict: a key this transaction read
    /// (or a range it scanned) was modified by a transaction that committed
    /// after this one began. The whole invocation must be resubmitted.
    #[error("read-set conflict on key {key}: modified by a concurrent transaction")]
    Conflict { key: String },

    /// The ledger could not supply a deterministic invocation timestamp.
    #[error("transaction timestamp unavailable")]
    TimestampUnavailable,

    /// A range scan was requested with `start > end`.
    #[error("invalid range: start {start:?} sorts after end {end:?}")]
    InvalidRange { start: String, end: String },

    /// A backend-specific error (I/O, serialization of ledger state, etc.).
    #[error("ledger backend error: {0}")]
    Backend(String),
}

impl LedgerError {
    /// Whether resubmitting the same invocation may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, LedgerError::Conflict { .. })
    }
}
