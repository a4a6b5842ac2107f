use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::actor::Actor;
use crate::error::ChainError;

/// Stages of the goods lifecycle.
///
/// Canonical path: CULTIVATED, HARVESTED, then IMPORTED or MANUFACTURED,
/// EXPORTED, DISTRIBUTING, RETAILING, SOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoodStage {
    Cultivated,
    Harvested,
    Imported,
    Manufactured,
    Exported,
    Distributing,
    Retailing,
    Sold,
}

impl GoodStage {
    pub const ALL: [GoodStage; 8] = [
        GoodStage::Cultivated,
        GoodStage::Harvested,
        GoodStage::Imported,
        GoodStage::Manufactured,
        GoodStage::Exported,
        GoodStage::Distributing,
        GoodStage::Retailing,
        GoodStage::Sold,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GoodStage::Cultivated => "CULTIVATED",
            GoodStage::Harvested => "HARVESTED",
            GoodStage::Imported => "IMPORTED",
            GoodStage::Manufactured => "MANUFACTURED",
            GoodStage::Exported => "EXPORTED",
            GoodStage::Distributing => "DISTRIBUTING",
            GoodStage::Retailing => "RETAILING",
            GoodStage::Sold => "SOLD",
        }
    }
}

impl fmt::Display for GoodStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoodStage {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GoodStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ChainError::InvalidPayload(format!("unknown goods stage {s:?}")))
    }
}

/// One dated step in an item's provenance trail. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub stage: GoodStage,
    /// RFC 3339 invocation timestamp of the transition.
    pub timestamp: String,
    pub actor: Actor,
}

/// A physical good tracked from cultivation onwards. Stored under `Good<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Good {
    pub id: String,
    #[serde(default)]
    pub code: String,
    pub name: String,
    pub supplier: Actor,
    #[serde(default)]
    pub provenance: Vec<ProvenanceEvent>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub unit: String,
    pub stage: GoodStage,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub certificate_ref: String,
    #[serde(default)]
    pub qr_code: String,
}

/// Order-scoped copy of a [`Good`], minted when an order is placed.
/// Stored under `Lot<n>`; its provenance continues the source good's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommercialLot {
    pub id: String,
    pub good_id: String,
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub provenance: Vec<ProvenanceEvent>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(default)]
    pub unit: String,
    pub stage: GoodStage,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub certificate_ref: String,
    #[serde(default)]
    pub qr_code: String,
}

impl CommercialLot {
    pub fn from_good(good: &Good, id: String, qr_code: String) -> Self {
        CommercialLot {
            id,
            good_id: good.id.clone(),
            code: good.code.clone(),
            name: good.name.clone(),
            provenance: good.provenance.clone(),
            images: good.images.clone(),
            expiry: good.expiry.clone(),
            price: good.price,
            unit: good.unit.clone(),
            stage: good.stage,
            description: good.description.clone(),
            certificate_ref: good.certificate_ref.clone(),
            qr_code,
        }
    }
}

/// Anything that carries a provenance trail and moves through [`GoodStage`]s.
pub trait Traceable: Serialize + DeserializeOwned + Send + Sync {
    fn stage(&self) -> GoodStage;

    fn provenance(&self) -> &[ProvenanceEvent];

    /// Append `event` and move to its stage.
    fn record(&mut self, event: ProvenanceEvent);

    fn set_price(&mut self, price: Decimal);

    /// Actor of the most recent provenance entry at `stage`.
    fn actor_at(&self, stage: GoodStage) -> Option<&Actor> {
        self.provenance()
            .iter()
            .rev()
            .find(|e| e.stage == stage)
            .map(|e| &e.actor)
    }
}

impl Traceable for Good {
    fn stage(&self) -> GoodStage {
        self.stage
    }

    fn provenance(&self) -> &[ProvenanceEvent] {
        &self.provenance
    }

    fn record(&mut self, event: ProvenanceEvent) {
        self.stage = event.stage;
        self.provenance.push(event);
    }

    fn set_price(&mut self, price: Decimal) {
        self.price = price;
    }
}

impl Traceable for CommercialLot {
    fn stage(&self) -> GoodStage {
        self.stage
    }

    fn provenance(&self) -> &[ProvenanceEvent] {
        &self.provenance
    }

    fn record(&mut self, event: ProvenanceEvent) {
        self.stage = event.stage;
        self.provenance.push(event);
    }

    fn set_price(&mut self, price: Decimal) {
        self.price = price;
    }
}

/// Result of a transition that applies to either goods or lots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackedItem {
    Good(Good),
    Lot(CommercialLot),
}

impl TrackedItem {
    pub fn stage(&self) -> GoodStage {
        match self {
            TrackedItem::Good(g) => g.stage,
            TrackedItem::Lot(l) => l.stage,
        }
    }

    pub fn provenance(&self) -> &[ProvenanceEvent] {
        match self {
            TrackedItem::Good(g) => &g.provenance,
            TrackedItem::Lot(l) => &l.provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn actor(id: &str, role: Role) -> Actor {
        Actor {
            id: id.into(),
            code: String::new(),
            phone: String::new(),
            name: String::new(),
            address: String::new(),
            avatar_ref: String::new(),
            role,
        }
    }

    fn event(stage: GoodStage, who: &str, role: Role) -> ProvenanceEvent {
        ProvenanceEvent {
            stage,
            timestamp: "2025-01-01T00:00:00Z".into(),
            actor: actor(who, role),
        }
    }

    fn good() -> Good {
        Good {
            id: "Good1".into(),
            code: "MNG-01".into(),
            name: "Mango".into(),
            supplier: actor("S1", Role::Supplier),
            provenance: vec![event(GoodStage::Cultivated, "S1", Role::Supplier)],
            images: vec!["mango.png".into()],
            expiry: None,
            price: Decimal::new(250, 2),
            amount: Decimal::from(100),
            unit: "kg".into(),
            stage: GoodStage::Cultivated,
            description: String::new(),
            certificate_ref: String::new(),
            qr_code: String::new(),
        }
    }

    #[test]
    fn stage_wire_names_are_screaming_case() {
        assert_eq!(
            serde_json::to_value(GoodStage::Distributing).unwrap(),
            "DISTRIBUTING"
        );
        assert_eq!("RETAILING".parse::<GoodStage>().unwrap(), GoodStage::Retailing);
        assert!("retailing".parse::<GoodStage>().is_err());
    }

    #[test]
    fn decimals_serialize_as_strings() {
        let json = serde_json::to_value(good()).unwrap();
        assert_eq!(json["price"], "2.50");
        assert_eq!(json["amount"], "100");
        assert_eq!(json["certificateRef"], "");
    }

    #[test]
    fn record_appends_and_moves_stage() {
        let mut g = good();
        g.record(event(GoodStage::Harvested, "S1", Role::Supplier));
        assert_eq!(g.stage, GoodStage::Harvested);
        assert_eq!(g.provenance.len(), 2);
    }

    #[test]
    fn actor_at_finds_most_recent_entry() {
        let mut g = good();
        g.record(event(GoodStage::Imported, "M1", Role::Manufacturer));
        g.record(event(GoodStage::Imported, "M2", Role::Manufacturer));
        assert_eq!(g.actor_at(GoodStage::Imported).unwrap().id, "M2");
        assert!(g.actor_at(GoodStage::Manufactured).is_none());
    }

    #[test]
    fn lot_continues_source_provenance() {
        let g = good();
        let lot = CommercialLot::from_good(&g, "Lot7".into(), "QR-R1".into());
        assert_eq!(lot.id, "Lot7");
        assert_eq!(lot.good_id, "Good1");
        assert_eq!(lot.provenance, g.provenance);
        assert_eq!(lot.stage, g.stage);
        assert_eq!(lot.qr_code, "QR-R1");
    }

    #[test]
    fn tracked_item_deserializes_lot_by_shape() {
        let lot = CommercialLot::from_good(&good(), "Lot1".into(), String::new());
        let json = serde_json::to_value(&lot).unwrap();
        let item: TrackedItem = serde_json::from_value(json).unwrap();
        assert!(matches!(item, TrackedItem::Lot(_)));
    }
}
