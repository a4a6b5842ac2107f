//! Keyspace layout and per-type id allocation.
//!
//! Entities live under `"<Prefix><n>"` with `n` in decimal from 1. Each type
//! has one counter record under `"<Prefix>Sequence"` holding the last id
//! handed out. `next` is a plain read-increment-write; two invocations racing
//! on the same counter are separated by the ledger rejecting the later
//! commit.

use std::fmt;
use std::str::FromStr;

use provchain_ledger::LedgerStore;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::store::EntityStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Good,
    Lot,
    Order,
}

/// Persisted counter record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCounter {
    pub value: u64,
}

impl EntityKind {
    pub const ALL: [EntityKind; 3] = [EntityKind::Good, EntityKind::Lot, EntityKind::Order];

    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Good => "Good",
            EntityKind::Lot => "Lot",
            EntityKind::Order => "Order",
        }
    }

    pub fn sequence_key(self) -> &'static str {
        match self {
            EntityKind::Good => "GoodSequence",
            EntityKind::Lot => "LotSequence",
            EntityKind::Order => "OrderSequence",
        }
    }

    pub fn key(self, n: u64) -> String {
        format!("{}{n}", self.prefix())
    }

    /// The numeric id of `key` if it is an entity key of this kind.
    ///
    /// Only canonical keys parse: decimal digits, no sign, no leading zero.
    pub fn parse_key(self, key: &str) -> Option<u64> {
        let digits = key.strip_prefix(self.prefix())?;
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        digits.parse().ok()
    }

    /// The kind of entity stored under `key`, if any.
    pub fn of_key(key: &str) -> Option<EntityKind> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.parse_key(key).is_some())
    }

    /// Half-open range covering every key of this kind whose suffix starts
    /// with a digit. `:` sorts right after `9`, so the counter key (suffix
    /// `Sequence`) falls outside it.
    pub fn scan_bounds(self) -> (String, String) {
        (format!("{}0", self.prefix()), format!("{}:", self.prefix()))
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for EntityKind {
    type Err = ChainError;

    /// Accepts `good`/`goods`, `lot`/`lots`, `order`/`orders`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "good" | "goods" => Ok(EntityKind::Good),
            "lot" | "lots" => Ok(EntityKind::Lot),
            "order" | "orders" => Ok(EntityKind::Order),
            other => Err(ChainError::InvalidPayload(format!(
                "unknown entity kind {other:?}"
            ))),
        }
    }
}

/// Create a zero counter for every kind that has none. Idempotent.
pub async fn init<L: LedgerStore>(store: &mut EntityStore<'_, L>) -> Result<(), ChainError> {
    for kind in EntityKind::ALL {
        let key = kind.sequence_key();
        if store.try_get::<SequenceCounter>(key).await?.is_none() {
            store.put(key, &SequenceCounter { value: 0 }).await?;
            tracing::info!(counter = key, "initialized sequence");
        }
    }
    Ok(())
}

/// Last id allocated for `kind`; 0 if none yet.
pub async fn current<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    kind: EntityKind,
) -> Result<u64, ChainError> {
    Ok(store
        .try_get::<SequenceCounter>(kind.sequence_key())
        .await?
        .map_or(0, |c| c.value))
}

/// Allocate the next id for `kind`.
pub async fn next<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    kind: EntityKind,
) -> Result<u64, ChainError> {
    let value = current(store, kind).await? + 1;
    store
        .put(kind.sequence_key(), &SequenceCounter { value })
        .await?;
    Ok(value)
}
