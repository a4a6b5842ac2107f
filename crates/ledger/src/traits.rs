use async_trait::async_trait;

use crate::error::LedgerError;
use crate::record::{CommitReceipt, KeyModification, LedgerTimestamp};

/// The ledger collaborator consumed by the provchain core.
///
/// A `LedgerStore` provides durable, versioned key-value storage where every
/// external invocation runs as a single transaction.
///
/// ## Transaction Semantics
///
/// All state reads and writes take `&mut Self::Transaction`. The lifecycle is:
///
/// 1. `begin()`: start a transaction. It fixes the snapshot that reads are
///    served from, the transaction id, and the invocation timestamp.
/// 2. Call `get_state` / `put_state` / `delete_state` / `get_state_by_range`
///    with `&mut txn`. Writes are buffered in the transaction; reads observe
///    the transaction's own pending writes layered over the snapshot.
/// 3. `commit(txn)`: apply every buffered write atomically,
///    OR `abort(txn)`: discard them.
///
/// Dropping a transaction without committing discards its writes.
///
/// ## OCC Conflict Detection
///
/// Transactions are not serialized by the ledger. Instead every key read and
/// every range scanned is recorded in the transaction's read set; at commit,
/// if any of them was modified by a transaction that committed after this one
/// began, commit fails with `LedgerError::Conflict` and nothing is applied.
/// Callers resubmit the whole invocation.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so one ledger can serve
/// concurrently submitted invocations from independent tasks.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    /// The transaction type used by this ledger backend.
    type Transaction: Send;

    // ── Transaction lifecycle ─────────────────────────────────────────────────

    /// Begin a new transaction.
    async fn begin(&self) -> Result<Self::Transaction, LedgerError>;

    /// Commit a transaction, making all buffered writes durable.
    ///
    /// The receipt timestamp is the one history records for the writes. It
    /// is later than every earlier commit, and may therefore be later than
    /// [`LedgerStore::tx_timestamp`] when transactions commit out of begin
    /// order.
    async fn commit(&self, txn: Self::Transaction) -> Result<CommitReceipt, LedgerError>;

    /// Abort a transaction, discarding all buffered writes.
    async fn abort(&self, txn: Self::Transaction) -> Result<(), LedgerError>;

    /// The id the ledger will record for this transaction.
    fn tx_id(&self, txn: &Self::Transaction) -> String;

    /// The deterministic invocation timestamp of this transaction.
    ///
    /// Returns `Err(LedgerError::TimestampUnavailable)` if the ledger could
    /// not supply one.
    fn tx_timestamp(&self, txn: &Self::Transaction) -> Result<LedgerTimestamp, LedgerError>;

    // ── State operations (within transaction) ─────────────────────────────────

    /// Read a key. `Ok(None)` if the key is absent or deleted.
    async fn get_state(
        &self,
        txn: &mut Self::Transaction,
        key: &str,
    ) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Buffer a write of `value` under `key`.
    async fn put_state(
        &self,
        txn: &mut Self::Transaction,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), LedgerError>;

    /// Buffer a deletion of `key`. History keeps a tombstone entry.
    async fn delete_state(&self, txn: &mut Self::Transaction, key: &str)
        -> Result<(), LedgerError>;

    /// All live keys in `[start, end)`, in byte-wise lexicographic key order.
    async fn get_state_by_range(
        &self,
        txn: &mut Self::Transaction,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, LedgerError>;

    // ── Query operations (outside transaction) ────────────────────────────────

    /// Every committed modification of `key`, oldest first.
    async fn get_history_for_key(&self, key: &str) -> Result<Vec<KeyModification>, LedgerError>;
}
