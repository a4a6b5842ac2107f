//! Subcommand implementations. Each returns the JSON value to print.

pub(crate) mod init;
pub(crate) mod invoke;
pub(crate) mod query;

use std::path::Path;

use provchain_core::{ChainError, SupplyChain};
use provchain_ledger::MemoryLedger;

/// Open the ledger file at `path`. A missing file is an empty ledger.
pub(crate) fn open(path: &Path) -> Result<SupplyChain<MemoryLedger>, String> {
    let ledger = MemoryLedger::load(path).map_err(|e| e.to_string())?;
    tracing::debug!(path = %path.display(), "opened ledger");
    Ok(SupplyChain::new(ledger))
}

pub(crate) async fn save(chain: &SupplyChain<MemoryLedger>, path: &Path) -> Result<(), String> {
    chain.ledger().save(path).await.map_err(|e| e.to_string())?;
    let height = chain.ledger().height().await;
    tracing::debug!(path = %path.display(), height, "saved ledger");
    Ok(())
}

pub(crate) fn chain_error(e: ChainError) -> String {
    format!("{}: {}", e.kind(), e)
}
