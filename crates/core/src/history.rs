//! Provenance history reader.

use provchain_ledger::{LedgerStore, LedgerTimestamp};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::store::decode;

/// The value a key held after one modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistoryRecord<E> {
    Value(E),
    /// The key was deleted; only its id survives.
    Tombstone { id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry<E> {
    pub record: HistoryRecord<E>,
    pub transaction_id: String,
    pub timestamp: LedgerTimestamp,
    pub is_delete: bool,
}

/// Every committed version of `key`, oldest first. An unknown key has an
/// empty history.
pub async fn history_of<L, E>(ledger: &L, key: &str) -> Result<Vec<HistoryEntry<E>>, ChainError>
where
    L: LedgerStore,
    E: DeserializeOwned,
{
    let modifications = ledger.get_history_for_key(key).await?;
    tracing::debug!(key, versions = modifications.len(), "history");
    modifications
        .into_iter()
        .map(|m| {
            let record = if m.is_delete {
                HistoryRecord::Tombstone { id: key.to_string() }
            } else {
                HistoryRecord::Value(decode(key, &m.value)?)
            };
            Ok(HistoryEntry {
                record,
                transaction_id: m.tx_id,
                timestamp: m.timestamp,
                is_delete: m.is_delete,
            })
        })
        .collect()
}
