//! Goods lifecycle state machine.
//!
//! Every transition follows the same steps:
//! 1. Role check against the capability table
//! 2. Load the item (good or lot, selected by key prefix)
//! 3. Stage precondition
//! 4. Ownership check, for transitions that have one
//! 5. Apply field updates, append one provenance event, write back

use provchain_ledger::LedgerStore;
use rust_decimal::Decimal;

use crate::capability::{authorize, Operation};
use crate::error::ChainError;
use crate::sequence::{self, EntityKind};
use crate::store::EntityStore;
use crate::types::{
    Actor, CommercialLot, CultivateRequest, Good, GoodStage, GoodUpdate, HarvestRequest,
    ImportRequest, InventoryRequest, ItemRef, ManufactureRequest, ProvenanceEvent, StageRequest,
    Traceable, TrackedItem, User,
};

/// A stage transition: where it may start from and where it leads.
pub(crate) struct Transition {
    pub(crate) op: Operation,
    pub(crate) from: &'static [GoodStage],
    pub(crate) to: GoodStage,
    /// When set, only the actor who recorded the item's current stage may
    /// perform the transition.
    pub(crate) owner_checked: bool,
}

impl Transition {
    /// `InvalidStage` unless an item at `current` may take this transition.
    pub(crate) fn check_from(&self, id: &str, current: GoodStage) -> Result<(), ChainError> {
        if self.from.contains(&current) {
            return Ok(());
        }
        Err(ChainError::InvalidStage {
            entity_id: id.to_string(),
            operation: self.op,
            expected: expected_stages(self.from),
            actual: current.to_string(),
        })
    }
}

const HARVEST: Transition = Transition {
    op: Operation::Harvest,
    from: &[GoodStage::Cultivated],
    to: GoodStage::Harvested,
    owner_checked: false,
};

const IMPORT: Transition = Transition {
    op: Operation::Import,
    from: &[GoodStage::Harvested],
    to: GoodStage::Imported,
    owner_checked: false,
};

const MANUFACTURE: Transition = Transition {
    op: Operation::Manufacture,
    from: &[GoodStage::Imported],
    to: GoodStage::Manufactured,
    owner_checked: true,
};

const EXPORT: Transition = Transition {
    op: Operation::Export,
    from: &[GoodStage::Imported, GoodStage::Manufactured],
    to: GoodStage::Exported,
    owner_checked: true,
};

const DISTRIBUTE: Transition = Transition {
    op: Operation::Distribute,
    from: &[GoodStage::Exported],
    to: GoodStage::Distributing,
    owner_checked: false,
};

const RETAIL_IMPORT: Transition = Transition {
    op: Operation::RetailImport,
    from: &[GoodStage::Distributing],
    to: GoodStage::Retailing,
    owner_checked: false,
};

const SELL: Transition = Transition {
    op: Operation::Sell,
    from: &[GoodStage::Retailing],
    to: GoodStage::Sold,
    owner_checked: false,
};

fn expected_stages(from: &[GoodStage]) -> String {
    from.iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Load `id`, check `rule`, run `update` and append the provenance event.
async fn advance<L, T>(
    store: &mut EntityStore<'_, L>,
    rule: &Transition,
    actor: Actor,
    id: &str,
    update: impl FnOnce(&mut T),
) -> Result<T, ChainError>
where
    L: LedgerStore,
    T: Traceable,
{
    let mut item: T = store.get(id).await?;

    let current = item.stage();
    rule.check_from(id, current)?;

    if rule.owner_checked {
        let owner = item.actor_at(current).map(|a| a.id.as_str());
        if owner != Some(actor.id.as_str()) {
            return Err(ChainError::PermissionDenied {
                operation: rule.op,
                actor_id: actor.id,
                entity_id: id.to_string(),
            });
        }
    }

    let timestamp = store.timestamp()?;
    update(&mut item);
    item.record(ProvenanceEvent {
        stage: rule.to,
        timestamp,
        actor,
    });
    store.put(id, &item).await?;
    tracing::debug!(id, stage = %rule.to, "advanced");
    Ok(item)
}

/// Advance a good or a lot, whichever `id` names.
async fn advance_tracked<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    rule: &Transition,
    actor: Actor,
    id: &str,
    price: Option<Decimal>,
) -> Result<TrackedItem, ChainError> {
    match EntityKind::of_key(id) {
        Some(EntityKind::Good) => advance(store, rule, actor, id, |g: &mut Good| {
            if let Some(p) = price {
                g.set_price(p);
            }
        })
        .await
        .map(TrackedItem::Good),
        Some(EntityKind::Lot) => advance(store, rule, actor, id, |l: &mut CommercialLot| {
            if let Some(p) = price {
                l.set_price(p);
            }
        })
        .await
        .map(TrackedItem::Lot),
        _ => Err(ChainError::NotFound(id.to_string())),
    }
}

fn good_id(id: &str) -> Result<&str, ChainError> {
    match EntityKind::of_key(id) {
        Some(EntityKind::Good) => Ok(id),
        _ => Err(ChainError::NotFound(id.to_string())),
    }
}

/// Register a new good at CULTIVATED. The caller becomes its supplier.
pub async fn cultivate<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: CultivateRequest,
) -> Result<Good, ChainError> {
    let actor = authorize(Operation::Cultivate, user)?;
    req.validate()?;

    let timestamp = store.timestamp()?;
    let id = EntityKind::Good.key(sequence::next(store, EntityKind::Good).await?);
    let good = Good {
        id: id.clone(),
        code: req.code,
        name: req.name,
        supplier: actor.clone(),
        provenance: vec![ProvenanceEvent {
            stage: GoodStage::Cultivated,
            timestamp,
            actor,
        }],
        images: req.images,
        expiry: None,
        price: req.price,
        amount: req.amount,
        unit: req.unit,
        stage: GoodStage::Cultivated,
        description: req.description,
        certificate_ref: req.certificate_ref,
        qr_code: String::new(),
    };
    store.put(&id, &good).await?;
    Ok(good)
}

/// Register a manufacturer's own stock directly at MANUFACTURED.
pub async fn inventory<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: InventoryRequest,
) -> Result<Good, ChainError> {
    let actor = authorize(Operation::Inventory, user)?;
    req.validate()?;

    let timestamp = store.timestamp()?;
    let id = EntityKind::Good.key(sequence::next(store, EntityKind::Good).await?);
    let good = Good {
        id: id.clone(),
        code: req.code,
        name: req.name,
        supplier: actor.clone(),
        provenance: vec![ProvenanceEvent {
            stage: GoodStage::Manufactured,
            timestamp,
            actor,
        }],
        images: req.images,
        expiry: req.expiry,
        price: req.price,
        amount: req.amount,
        unit: req.unit,
        stage: GoodStage::Manufactured,
        description: req.description,
        certificate_ref: req.certificate_ref,
        qr_code: req.qr_code,
    };
    store.put(&id, &good).await?;
    Ok(good)
}

pub async fn harvest<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: HarvestRequest,
) -> Result<Good, ChainError> {
    let actor = authorize(Operation::Harvest, user)?;
    req.validate()?;
    advance(store, &HARVEST, actor, good_id(&req.id)?, |g: &mut Good| {
        g.amount = req.amount;
    })
    .await
}

pub async fn import<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: ImportRequest,
) -> Result<Good, ChainError> {
    let actor = authorize(Operation::Import, user)?;
    req.validate()?;
    let ImportRequest { id, images, price } = req;
    advance(store, &IMPORT, actor, good_id(&id)?, |g: &mut Good| {
        if let Some(images) = images {
            g.images = images;
        }
        if let Some(price) = price {
            g.price = price;
        }
    })
    .await
}

/// Only the manufacturer that imported the good may manufacture it.
pub async fn manufacture<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: ManufactureRequest,
) -> Result<Good, ChainError> {
    let actor = authorize(Operation::Manufacture, user)?;
    let ManufactureRequest {
        id,
        expiry,
        qr_code,
        images,
    } = req;
    advance(store, &MANUFACTURE, actor, good_id(&id)?, |g: &mut Good| {
        if expiry.is_some() {
            g.expiry = expiry;
        }
        if let Some(qr) = qr_code {
            g.qr_code = qr;
        }
        if let Some(images) = images {
            g.images = images;
        }
    })
    .await
}

/// Only the manufacturer that recorded the item's current stage (IMPORTED
/// or MANUFACTURED) may export it.
pub async fn export<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: StageRequest,
) -> Result<TrackedItem, ChainError> {
    let actor = authorize(Operation::Export, user)?;
    req.validate()?;
    advance_tracked(store, &EXPORT, actor, &req.id, req.price).await
}

pub async fn distribute<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: ItemRef,
) -> Result<TrackedItem, ChainError> {
    let actor = authorize(Operation::Distribute, user)?;
    advance_tracked(store, &DISTRIBUTE, actor, &req.id, None).await
}

pub async fn retail_import<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: StageRequest,
) -> Result<TrackedItem, ChainError> {
    let actor = authorize(Operation::RetailImport, user)?;
    req.validate()?;
    advance_tracked(store, &RETAIL_IMPORT, actor, &req.id, req.price).await
}

pub async fn sell<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: StageRequest,
) -> Result<TrackedItem, ChainError> {
    let actor = authorize(Operation::Sell, user)?;
    req.validate()?;
    advance_tracked(store, &SELL, actor, &req.id, req.price).await
}

/// Replace a good's descriptive fields. Only the good's own supplier may do
/// this; identity, stage, supplier and provenance are never touched.
pub async fn update_good<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    update: GoodUpdate,
) -> Result<Good, ChainError> {
    let actor = authorize(Operation::UpdateGood, user)?;
    update.validate()?;

    let id = good_id(&update.id)?;
    let mut good: Good = store.get(id).await?;
    if good.supplier.id != actor.id {
        return Err(ChainError::PermissionDenied {
            operation: Operation::UpdateGood,
            actor_id: actor.id,
            entity_id: id.to_string(),
        });
    }

    let GoodUpdate {
        id: _,
        name,
        code,
        images,
        description,
        certificate_ref,
        unit,
        amount,
        price,
    } = update;
    if let Some(v) = name {
        good.name = v;
    }
    if let Some(v) = code {
        good.code = v;
    }
    if let Some(v) = images {
        good.images = v;
    }
    if let Some(v) = description {
        good.description = v;
    }
    if let Some(v) = certificate_ref {
        good.certificate_ref = v;
    }
    if let Some(v) = unit {
        good.unit = v;
    }
    if let Some(v) = amount {
        good.amount = v;
    }
    if let Some(v) = price {
        good.price = v;
    }

    store.put(&good.id, &good).await?;
    Ok(good)
}
