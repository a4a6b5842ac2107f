//! Range enumeration of goods, lots and orders.
//!
//! Keys are scanned over the digit band of the type prefix and ordered by
//! their numeric suffix, so `Good10` comes after `Good9`. Only ids in
//! `1..=counter` are returned.

use std::fmt;
use std::str::FromStr;

use provchain_ledger::LedgerStore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::sequence::{self, EntityKind};
use crate::store::{decode, EntityStore};
use crate::types::{CommercialLot, Good, GoodStage, Order, OrderStage};

/// Named ownership slot of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerSlot {
    Supplier,
    Retailer,
    Manufacturer,
    Distributor,
}

impl OwnerSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            OwnerSlot::Supplier => "supplier",
            OwnerSlot::Retailer => "retailer",
            OwnerSlot::Manufacturer => "manufacturer",
            OwnerSlot::Distributor => "distributor",
        }
    }
}

impl fmt::Display for OwnerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerSlot {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "supplier" => Ok(OwnerSlot::Supplier),
            "retailer" => Ok(OwnerSlot::Retailer),
            "manufacturer" => Ok(OwnerSlot::Manufacturer),
            "distributor" => Ok(OwnerSlot::Distributor),
            other => Err(ChainError::InvalidPayload(format!(
                "unknown owner slot {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerFilter {
    pub slot: OwnerSlot,
    pub actor_id: String,
}

/// Both filters must match. An empty or absent status matches every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub owner: Option<OwnerFilter>,
}

impl ListFilter {
    pub fn status(status: impl Into<String>) -> Self {
        ListFilter {
            status: Some(status.into()),
            owner: None,
        }
    }

    pub fn owner(slot: OwnerSlot, actor_id: impl Into<String>) -> Self {
        ListFilter {
            status: None,
            owner: Some(OwnerFilter {
                slot,
                actor_id: actor_id.into(),
            }),
        }
    }

    fn parsed_status<S: FromStr<Err = ChainError>>(&self) -> Result<Option<S>, ChainError> {
        match self.status.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some),
        }
    }
}

/// Every allocated entity of `kind`, in id order.
async fn scan_kind<L, E>(
    store: &mut EntityStore<'_, L>,
    kind: EntityKind,
) -> Result<Vec<E>, ChainError>
where
    L: LedgerStore,
    E: DeserializeOwned,
{
    let counter = sequence::current(store, kind).await?;
    let (start, end) = kind.scan_bounds();
    let mut entries: Vec<(u64, String, Vec<u8>)> = store
        .scan(&start, &end)
        .await?
        .into_iter()
        .filter_map(|(key, bytes)| {
            kind.parse_key(&key)
                .filter(|n| *n <= counter)
                .map(|n| (n, key, bytes))
        })
        .collect();
    entries.sort_by_key(|(n, _, _)| *n);
    tracing::debug!(%kind, counter, found = entries.len(), "enumerated");

    entries
        .into_iter()
        .map(|(_, key, bytes)| decode(&key, &bytes))
        .collect()
}

pub async fn list_goods<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    filter: &ListFilter,
) -> Result<Vec<Good>, ChainError> {
    let status: Option<GoodStage> = filter.parsed_status()?;
    let supplier = match &filter.owner {
        None => None,
        Some(OwnerFilter {
            slot: OwnerSlot::Supplier,
            actor_id,
        }) => Some(actor_id.as_str()),
        Some(OwnerFilter { slot, .. }) => {
            return Err(ChainError::InvalidPayload(format!(
                "goods have no {slot} slot"
            )))
        }
    };

    let goods: Vec<Good> = scan_kind(store, EntityKind::Good).await?;
    Ok(goods
        .into_iter()
        .filter(|g| status.map_or(true, |s| g.stage == s))
        .filter(|g| supplier.map_or(true, |id| g.supplier.id == id))
        .collect())
}

/// Lots carry no ownership slot; an owner filter is rejected.
pub async fn list_lots<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    filter: &ListFilter,
) -> Result<Vec<CommercialLot>, ChainError> {
    let status: Option<GoodStage> = filter.parsed_status()?;
    if let Some(owner) = &filter.owner {
        return Err(ChainError::InvalidPayload(format!(
            "lots have no {} slot",
            owner.slot
        )));
    }

    let lots: Vec<CommercialLot> = scan_kind(store, EntityKind::Lot).await?;
    Ok(lots
        .into_iter()
        .filter(|l| status.map_or(true, |s| l.stage == s))
        .collect())
}

pub async fn list_orders<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    filter: &ListFilter,
) -> Result<Vec<Order>, ChainError> {
    let status: Option<OrderStage> = filter.parsed_status()?;
    if let Some(OwnerFilter {
        slot: OwnerSlot::Supplier,
        ..
    }) = &filter.owner
    {
        return Err(ChainError::InvalidPayload(
            "orders have no supplier slot".into(),
        ));
    }

    let orders: Vec<Order> = scan_kind(store, EntityKind::Order).await?;
    Ok(orders
        .into_iter()
        .filter(|o| status.map_or(true, |s| o.stage == s))
        .filter(|o| filter.owner.as_ref().map_or(true, |f| owned_by(o, f)))
        .collect())
}

fn owned_by(order: &Order, filter: &OwnerFilter) -> bool {
    let actor = match filter.slot {
        OwnerSlot::Retailer => Some(&order.retailer),
        OwnerSlot::Manufacturer => order.manufacturer.as_ref(),
        OwnerSlot::Distributor => order.distributor.as_ref(),
        OwnerSlot::Supplier => None,
    };
    actor.is_some_and(|a| a.id == filter.actor_id)
}

#[cfg(test)]
mod tests {
    use provchain_ledger::MemoryLedger;
    use rust_decimal::Decimal;

    use super::*;
    use crate::goods;
    use crate::types::{CultivateRequest, HarvestRequest, User};

    fn supplier(id: &str) -> User {
        serde_json::from_value(serde_json::json!({"id": id, "role": "supplier"})).unwrap()
    }

    fn cultivate_req(name: &str) -> CultivateRequest {
        CultivateRequest {
            code: String::new(),
            name: name.into(),
            images: vec![],
            price: Decimal::ONE,
            amount: Decimal::ONE,
            unit: "kg".into(),
            description: String::new(),
            certificate_ref: String::new(),
        }
    }

    async fn seed_goods(store: &mut EntityStore<'_, MemoryLedger>, n: usize) {
        for i in 0..n {
            let owner = if i % 2 == 0 { "S1" } else { "S2" };
            goods::cultivate(store, &supplier(owner), cultivate_req(&format!("g{i}")))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn goods_come_back_in_numeric_order() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        seed_goods(&mut store, 12).await;

        let goods = list_goods(&mut store, &ListFilter::default()).await.unwrap();
        let ids: Vec<_> = goods.iter().map(|g| g.id.clone()).collect();
        let expected: Vec<_> = (1..=12).map(|n| format!("Good{n}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn status_and_owner_filters_combine() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        seed_goods(&mut store, 4).await;
        for id in ["Good1", "Good2"] {
            let owner = if id == "Good1" { "S1" } else { "S2" };
            goods::harvest(
                &mut store,
                &supplier(owner),
                HarvestRequest {
                    id: id.into(),
                    amount: Decimal::TEN,
                },
            )
            .await
            .unwrap();
        }

        let filter = ListFilter {
            status: Some("HARVESTED".into()),
            owner: Some(OwnerFilter {
                slot: OwnerSlot::Supplier,
                actor_id: "S1".into(),
            }),
        };
        let goods = list_goods(&mut store, &filter).await.unwrap();
        assert_eq!(goods.len(), 1);
        assert_eq!(goods[0].id, "Good1");

        let harvested = list_goods(&mut store, &ListFilter::status("HARVESTED"))
            .await
            .unwrap();
        assert_eq!(harvested.len(), 2);

        let all = list_goods(&mut store, &ListFilter::status("")).await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn unparseable_status_is_invalid_payload() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        assert!(matches!(
            list_goods(&mut store, &ListFilter::status("RIPE")).await,
            Err(ChainError::InvalidPayload(_))
        ));
        assert!(matches!(
            list_orders(&mut store, &ListFilter::status("EXPORTED")).await,
            Err(ChainError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn owner_slots_are_checked_per_kind() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        assert!(list_goods(&mut store, &ListFilter::owner(OwnerSlot::Retailer, "R1"))
            .await
            .is_err());
        assert!(list_lots(&mut store, &ListFilter::owner(OwnerSlot::Supplier, "S1"))
            .await
            .is_err());
        assert!(list_orders(&mut store, &ListFilter::owner(OwnerSlot::Supplier, "S1"))
            .await
            .is_err());
        assert!(list_orders(&mut store, &ListFilter::owner(OwnerSlot::Retailer, "R1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn keys_beyond_counter_are_ignored() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        seed_goods(&mut store, 2).await;
        let mut stray: Good = store.get("Good2").await.unwrap();
        stray.id = "Good7".into();
        store.put("Good7", &stray).await.unwrap();
        store.put("Good02", &stray).await.unwrap();

        let goods = list_goods(&mut store, &ListFilter::default()).await.unwrap();
        assert_eq!(goods.len(), 2);
    }

    #[test]
    fn owner_slot_parses_lowercase() {
        assert_eq!("distributor".parse::<OwnerSlot>().unwrap(), OwnerSlot::Distributor);
        assert!("Distributor".parse::<OwnerSlot>().is_err());
    }
}
