use std::io::Read;
use std::path::Path;

use provchain_core::{ChainError, Invocation};
use serde_json::Value;

use super::{chain_error, open, save};

/// Read one invocation, or an array of them, from `source` (`-` for stdin).
pub(crate) fn read_invocations(source: &Path) -> Result<(Vec<Invocation>, bool), String> {
    let text = if source == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("error reading stdin: {}", e))?;
        buf
    } else {
        std::fs::read_to_string(source)
            .map_err(|e| format!("error reading file '{}': {}", source.display(), e))?
    };
    let invalid = |what: &str, e: serde_json::Error| {
        chain_error(ChainError::InvalidPayload(format!(
            "{} in '{}': {}",
            what,
            source.display(),
            e
        )))
    };
    let doc: Value = serde_json::from_str(&text).map_err(|e| invalid("malformed JSON", e))?;

    let batch = doc.is_array();
    let invocations = if batch {
        serde_json::from_value::<Vec<Invocation>>(doc)
    } else {
        serde_json::from_value::<Invocation>(doc).map(|one| vec![one])
    }
    .map_err(|e| invalid("invalid invocation", e))?;
    Ok((invocations, batch))
}

/// Run every invocation in order, each in its own transaction.
///
/// Stops at the first failure. Invocations that already committed stay
/// committed and the ledger file is saved either way.
pub(crate) async fn run(ledger: &Path, source: &Path) -> Result<Value, String> {
    let (invocations, batch) = read_invocations(source)?;
    let chain = open(ledger)?;

    let mut results = Vec::with_capacity(invocations.len());
    let mut failure = None;
    for (index, invocation) in invocations.into_iter().enumerate() {
        let label = invocation.label();
        match chain.invoke(invocation).await {
            Ok(value) => results.push(value),
            Err(e) => {
                let msg = chain_error(e);
                failure = Some(if batch {
                    format!("invocation {} ({}) failed: {}", index, label, msg)
                } else {
                    msg
                });
                break;
            }
        }
    }
    save(&chain, ledger).await?;

    if let Some(msg) = failure {
        return Err(msg);
    }
    if batch {
        Ok(Value::Array(results))
    } else {
        Ok(results.pop().unwrap_or(Value::Null))
    }
}
