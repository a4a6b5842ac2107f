//! Entity store adapter: typed JSON records over one ledger transaction.

use provchain_ledger::LedgerStore;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ChainError;

/// Reads and writes JSON-encoded records inside a single ledger transaction.
///
/// Store failures propagate unchanged; bytes that do not decode surface as
/// [`ChainError::Decode`] and are never replaced by defaults.
pub struct EntityStore<'a, L: LedgerStore> {
    ledger: &'a L,
    txn: &'a mut L::Transaction,
}

impl<'a, L: LedgerStore> EntityStore<'a, L> {
    pub fn new(ledger: &'a L, txn: &'a mut L::Transaction) -> Self {
        EntityStore { ledger, txn }
    }

    /// Read and decode `key`; [`ChainError::NotFound`] if absent.
    pub async fn get<E: DeserializeOwned>(&mut self, key: &str) -> Result<E, ChainError> {
        self.try_get(key)
            .await?
            .ok_or_else(|| ChainError::NotFound(key.to_string()))
    }

    pub async fn try_get<E: DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> Result<Option<E>, ChainError> {
        let Some(bytes) = self.ledger.get_state(self.txn, key).await? else {
            return Ok(None);
        };
        tracing::debug!(key, len = bytes.len(), "read");
        decode(key, &bytes).map(Some)
    }

    pub async fn put<E: Serialize + Sync>(
        &mut self,
        key: &str,
        entity: &E,
    ) -> Result<(), ChainError> {
        let bytes = serde_json::to_vec(entity).map_err(|source| ChainError::Encode {
            key: key.to_string(),
            source,
        })?;
        tracing::debug!(key, len = bytes.len(), "write");
        self.ledger.put_state(self.txn, key, bytes).await?;
        Ok(())
    }

    /// Raw entries in `[start, end)`, in key order.
    pub async fn scan(
        &mut self,
        start: &str,
        end: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, ChainError> {
        Ok(self.ledger.get_state_by_range(self.txn, start, end).await?)
    }

    /// The invocation timestamp as RFC 3339. Identical for every call within
    /// one transaction.
    pub fn timestamp(&self) -> Result<String, ChainError> {
        Ok(self.ledger.tx_timestamp(&*self.txn)?.to_rfc3339()?)
    }
}

pub(crate) fn decode<E: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<E, ChainError> {
    serde_json::from_slice(bytes).map_err(|source| ChainError::Decode {
        key: key.to_string(),
        source,
    })
}
