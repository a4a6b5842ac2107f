//! Commercial lot deriver.

use provchain_ledger::LedgerStore;

use crate::error::ChainError;
use crate::sequence::{self, EntityKind};
use crate::store::EntityStore;
use crate::types::{CommercialLot, Good, OrderLine, OrderLineRequest};

/// Mint one lot per requested line, each copied from its source good.
///
/// Fails on the first line whose good does not exist. Lots already written
/// for earlier lines stay buffered in the transaction, which the caller
/// aborts.
pub async fn derive_lots<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    lines: Vec<OrderLineRequest>,
) -> Result<Vec<OrderLine>, ChainError> {
    let mut derived = Vec::with_capacity(lines.len());
    for line in lines {
        if EntityKind::of_key(&line.good_id) != Some(EntityKind::Good) {
            return Err(ChainError::NotFound(line.good_id));
        }
        let good: Good = store.get(&line.good_id).await?;
        let id = EntityKind::Lot.key(sequence::next(store, EntityKind::Lot).await?);
        let lot = CommercialLot::from_good(&good, id, line.qr_code);
        store.put(&lot.id, &lot).await?;
        tracing::debug!(lot = %lot.id, good = %good.id, "derived lot");
        derived.push(OrderLine {
            lot,
            quantity: line.quantity,
        });
    }
    Ok(derived)
}

#[cfg(test)]
mod tests {
    use provchain_ledger::MemoryLedger;
    use rust_decimal::Decimal;

    use super::*;
    use crate::goods;
    use crate::types::{CultivateRequest, User};

    fn supplier() -> User {
        serde_json::from_value(serde_json::json!({"id": "S1", "role": "supplier"})).unwrap()
    }

    fn line(good_id: &str, qr: &str) -> OrderLineRequest {
        OrderLineRequest {
            good_id: good_id.into(),
            quantity: Decimal::from(10),
            qr_code: qr.into(),
        }
    }

    async fn seed(store: &mut EntityStore<'_, MemoryLedger>) -> Good {
        goods::cultivate(
            store,
            &supplier(),
            CultivateRequest {
                code: "MNG".into(),
                name: "Mango".into(),
                images: vec![],
                price: Decimal::from(3),
                amount: Decimal::from(50),
                unit: "kg".into(),
                description: String::new(),
                certificate_ref: String::new(),
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn each_line_gets_its_own_lot() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        let good = seed(&mut store).await;

        let lines = derive_lots(&mut store, vec![line(&good.id, "QR-A"), line(&good.id, "QR-B")])
            .await
            .unwrap();
        let ids: Vec<_> = lines.iter().map(|l| l.lot.id.as_str()).collect();
        assert_eq!(ids, vec!["Lot1", "Lot2"]);
        assert_eq!(lines[1].lot.qr_code, "QR-B");

        let stored: CommercialLot = store.get("Lot2").await.unwrap();
        assert_eq!(stored, lines[1].lot);
        assert_eq!(stored.provenance, good.provenance);
    }

    #[tokio::test]
    async fn missing_good_fails_the_derivation() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        seed(&mut store).await;

        let err = derive_lots(&mut store, vec![line("Good1", ""), line("Good9", "")])
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::NotFound(id) if id == "Good9"));
    }

    #[tokio::test]
    async fn lot_ids_are_not_goods() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        let err = derive_lots(&mut store, vec![line("Lot1", "")])
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::NotFound(_)));
    }
}
