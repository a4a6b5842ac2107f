//! Read-only subcommands. None of them write the ledger file.

use std::path::Path;

use provchain_core::{EntityKind, ListFilter, OwnerFilter, OwnerSlot};
use serde_json::Value;

use super::{chain_error, open};

fn parse_kind(kind: &str) -> Result<EntityKind, String> {
    kind.parse().map_err(chain_error)
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| format!("serialization error: {}", e))
}

pub(crate) async fn get(ledger: &Path, key: &str) -> Result<Value, String> {
    open(ledger)?.get_raw(key).await.map_err(chain_error)
}

pub(crate) async fn list(
    ledger: &Path,
    kind: &str,
    status: Option<String>,
    owner: Option<(String, String)>,
) -> Result<Value, String> {
    let kind = parse_kind(kind)?;
    let owner = match owner {
        Some((slot, actor_id)) => Some(OwnerFilter {
            slot: slot.parse::<OwnerSlot>().map_err(chain_error)?,
            actor_id,
        }),
        None => None,
    };
    let filter = ListFilter { status, owner };
    open(ledger)?.list(kind, &filter).await.map_err(chain_error)
}

pub(crate) async fn history(ledger: &Path, key: &str) -> Result<Value, String> {
    let entries = open(ledger)?.key_history(key).await.map_err(chain_error)?;
    to_value(&entries)
}

pub(crate) async fn counter(ledger: &Path, kind: &str) -> Result<Value, String> {
    let kind = parse_kind(kind)?;
    let value = open(ledger)?.counter(kind).await.map_err(chain_error)?;
    Ok(serde_json::json!({ "kind": kind.sequence_key(), "value": value }))
}
