use std::path::Path;

use provchain_core::EntityKind;
use serde_json::{Map, Value};

use super::{chain_error, open, save};

/// Create the sequence counters and report their values.
pub(crate) async fn run(ledger: &Path) -> Result<Value, String> {
    let chain = open(ledger)?;
    chain.init().await.map_err(chain_error)?;
    save(&chain, ledger).await?;

    let mut counters = Map::new();
    for kind in EntityKind::ALL {
        let value = chain.counter(kind).await.map_err(chain_error)?;
        counters.insert(kind.sequence_key().to_string(), Value::from(value));
    }
    Ok(Value::Object(counters))
}
