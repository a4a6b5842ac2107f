//! Order lifecycle state machine.
//!
//! PENDING -> APPROVED -> SHIPPING -> SHIPPED, with REJECTED reachable from
//! PENDING only. Approve, ship and finish move every lot of the order one
//! goods stage forward through [`cascade`]. A lot that has already been moved
//! on its own past that stage blocks the order transition.

use provchain_ledger::LedgerStore;

use crate::capability::{authorize, Operation};
use crate::error::ChainError;
use crate::goods::Transition;
use crate::lots::derive_lots;
use crate::sequence::{self, EntityKind};
use crate::store::EntityStore;
use crate::types::{
    Actor, CommercialLot, CreateOrderRequest, DeliveryEvent, GoodStage, Order,
    OrderProgressRequest, OrderRef, OrderStage, ProvenanceEvent, Traceable, User,
};

async fn load_at<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    op: Operation,
    order_id: &str,
    expected: OrderStage,
) -> Result<Order, ChainError> {
    if EntityKind::of_key(order_id) != Some(EntityKind::Order) {
        return Err(ChainError::NotFound(order_id.to_string()));
    }
    let order: Order = store.get(order_id).await?;
    if order.stage != expected {
        return Err(ChainError::InvalidStage {
            entity_id: order_id.to_string(),
            operation: op,
            expected: expected.to_string(),
            actual: order.stage.to_string(),
        });
    }
    Ok(order)
}

const APPROVE_LOTS: Transition = Transition {
    op: Operation::ApproveOrder,
    from: &[
        GoodStage::Cultivated,
        GoodStage::Harvested,
        GoodStage::Imported,
        GoodStage::Manufactured,
    ],
    to: GoodStage::Exported,
    owner_checked: false,
};

const SHIP_LOTS: Transition = Transition {
    op: Operation::ShipOrder,
    from: &[GoodStage::Exported],
    to: GoodStage::Distributing,
    owner_checked: false,
};

const FINISH_LOTS: Transition = Transition {
    op: Operation::FinishOrder,
    from: &[GoodStage::Distributing],
    to: GoodStage::Retailing,
    owner_checked: false,
};

/// Move every lot of `order` along `rule`.
///
/// Each lot is read from its own key, so the stage check sees anything
/// recorded on the lot directly. Any lot outside `rule.from` fails the whole
/// order transition with `InvalidStage`. The lot record and the order's
/// embedded copy are both rewritten.
async fn cascade<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    order: &mut Order,
    rule: &Transition,
    actor: &Actor,
    timestamp: &str,
) -> Result<(), ChainError> {
    for line in &mut order.lines {
        let mut lot: CommercialLot = store.get(&line.lot.id).await?;
        rule.check_from(&lot.id, lot.stage())?;
        lot.record(ProvenanceEvent {
            stage: rule.to,
            timestamp: timestamp.to_string(),
            actor: actor.clone(),
        });
        store.put(&lot.id, &lot).await?;
        line.lot = lot;
    }
    Ok(())
}

/// Place an order: mint a lot per line and record PENDING at the requested
/// delivery address.
pub async fn create<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: CreateOrderRequest,
) -> Result<Order, ChainError> {
    let actor = authorize(Operation::CreateOrder, user)?;
    req.validate()?;

    let timestamp = store.timestamp()?;
    let lines = derive_lots(store, req.lines).await?;
    let id = EntityKind::Order.key(sequence::next(store, EntityKind::Order).await?);
    let order = Order {
        id: id.clone(),
        lines,
        delivery_history: vec![DeliveryEvent {
            stage: OrderStage::Pending,
            date: timestamp.clone(),
            address: req.address,
            actor: actor.clone(),
        }],
        signatures: req.signatures,
        stage: OrderStage::Pending,
        created_at: timestamp,
        updated_at: None,
        finished_at: None,
        qr_code: req.qr_code,
        retailer: actor,
        manufacturer: None,
        distributor: None,
    };
    store.put(&id, &order).await?;
    Ok(order)
}

/// Every lot becomes EXPORTED; APPROVED is recorded at the manufacturer's
/// own address.
pub async fn approve<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: OrderRef,
) -> Result<Order, ChainError> {
    let actor = authorize(Operation::ApproveOrder, user)?;
    let mut order = load_at(
        store,
        Operation::ApproveOrder,
        &req.order_id,
        OrderStage::Pending,
    )
    .await?;
    let timestamp = store.timestamp()?;

    cascade(store, &mut order, &APPROVE_LOTS, &actor, &timestamp).await?;
    order.delivery_history.push(DeliveryEvent {
        stage: OrderStage::Approved,
        date: timestamp.clone(),
        address: actor.address.clone(),
        actor: actor.clone(),
    });
    order.stage = OrderStage::Approved;
    order.manufacturer.get_or_insert(actor);
    order.updated_at = Some(timestamp);

    store.put(&order.id, &order).await?;
    Ok(order)
}

pub async fn reject<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: OrderRef,
) -> Result<Order, ChainError> {
    let actor = authorize(Operation::RejectOrder, user)?;
    let mut order = load_at(
        store,
        Operation::RejectOrder,
        &req.order_id,
        OrderStage::Pending,
    )
    .await?;
    let timestamp = store.timestamp()?;

    order.delivery_history.push(DeliveryEvent {
        stage: OrderStage::Rejected,
        date: timestamp.clone(),
        address: actor.address.clone(),
        actor: actor.clone(),
    });
    order.stage = OrderStage::Rejected;
    order.manufacturer.get_or_insert(actor);
    order.updated_at = Some(timestamp);

    store.put(&order.id, &order).await?;
    Ok(order)
}

/// Every lot becomes DISTRIBUTING; the caller is bound as the order's
/// distributor.
pub async fn ship<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: OrderProgressRequest,
) -> Result<Order, ChainError> {
    let actor = authorize(Operation::ShipOrder, user)?;
    let mut order = load_at(
        store,
        Operation::ShipOrder,
        &req.order_id,
        OrderStage::Approved,
    )
    .await?;
    let timestamp = store.timestamp()?;

    cascade(store, &mut order, &SHIP_LOTS, &actor, &timestamp).await?;
    order.delivery_history.push(DeliveryEvent {
        stage: OrderStage::Shipping,
        date: timestamp.clone(),
        address: req.address,
        actor: actor.clone(),
    });
    order.signatures.push(req.signature);
    order.stage = OrderStage::Shipping;
    order.distributor.get_or_insert(actor);
    order.updated_at = Some(timestamp);

    store.put(&order.id, &order).await?;
    Ok(order)
}

/// Every lot becomes RETAILING. Only the distributor that shipped the order
/// may finish it.
pub async fn finish<L: LedgerStore>(
    store: &mut EntityStore<'_, L>,
    user: &User,
    req: OrderProgressRequest,
) -> Result<Order, ChainError> {
    let actor = authorize(Operation::FinishOrder, user)?;
    let mut order = load_at(
        store,
        Operation::FinishOrder,
        &req.order_id,
        OrderStage::Shipping,
    )
    .await?;
    if order.distributor.as_ref().map(|d| d.id.as_str()) != Some(actor.id.as_str()) {
        return Err(ChainError::PermissionDenied {
            operation: Operation::FinishOrder,
            actor_id: actor.id,
            entity_id: order.id,
        });
    }
    let timestamp = store.timestamp()?;

    cascade(store, &mut order, &FINISH_LOTS, &actor, &timestamp).await?;
    order.delivery_history.push(DeliveryEvent {
        stage: OrderStage::Shipped,
        date: timestamp.clone(),
        address: req.address,
        actor,
    });
    order.signatures.push(req.signature);
    order.stage = OrderStage::Shipped;
    order.finished_at = Some(timestamp);

    store.put(&order.id, &order).await?;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use provchain_ledger::MemoryLedger;
    use rust_decimal::Decimal;

    use super::*;
    use crate::goods;
    use crate::types::{CultivateRequest, OrderLineRequest};

    fn user(id: &str, role: &str, address: &str) -> User {
        serde_json::from_value(serde_json::json!({"id": id, "role": role, "address": address}))
            .unwrap()
    }

    fn retailer() -> User {
        user("R1", "retailer", "12 Market St")
    }

    fn manufacturer() -> User {
        user("M1", "manufacturer", "1 Mill Rd")
    }

    fn distributor(id: &str) -> User {
        user(id, "distributor", "Depot 4")
    }

    async fn pending_order(store: &mut EntityStore<'_, MemoryLedger>) -> Order {
        goods::cultivate(
            store,
            &user("S1", "supplier", "Farm"),
            CultivateRequest {
                code: "TEA".into(),
                name: "Tea leaves".into(),
                images: vec![],
                price: Decimal::from(12),
                amount: Decimal::from(90),
                unit: "kg".into(),
                description: String::new(),
                certificate_ref: String::new(),
            },
        )
        .await
        .unwrap();
        create(
            store,
            &retailer(),
            CreateOrderRequest {
                lines: vec![OrderLineRequest {
                    good_id: "Good1".into(),
                    quantity: Decimal::from(10),
                    qr_code: "QR-R1".into(),
                }],
                address: "12 Market St".into(),
                signatures: vec!["sig-r1".into()],
                qr_code: "QR-ORDER".into(),
            },
        )
        .await
        .unwrap()
    }

    fn order_ref() -> OrderRef {
        OrderRef {
            order_id: "Order1".into(),
        }
    }

    fn progress(address: &str, signature: &str) -> OrderProgressRequest {
        OrderProgressRequest {
            order_id: "Order1".into(),
            address: address.into(),
            signature: signature.into(),
        }
    }

    #[tokio::test]
    async fn create_records_pending_and_mints_lots() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        let order = pending_order(&mut store).await;

        assert_eq!(order.id, "Order1");
        assert_eq!(order.stage, OrderStage::Pending);
        assert_eq!(order.retailer.id, "R1");
        assert!(order.manufacturer.is_none() && order.distributor.is_none());
        assert_eq!(order.delivery_history.len(), 1);
        assert_eq!(order.delivery_history[0].address, "12 Market St");
        assert_eq!(order.lines[0].lot.id, "Lot1");
        assert_eq!(order.lines[0].lot.good_id, "Good1");
    }

    #[tokio::test]
    async fn full_lifecycle_moves_lots_along() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        pending_order(&mut store).await;

        let approved = approve(&mut store, &manufacturer(), order_ref()).await.unwrap();
        assert_eq!(approved.stage, OrderStage::Approved);
        assert_eq!(approved.delivery_history[1].address, "1 Mill Rd");
        assert_eq!(approved.manufacturer.as_ref().unwrap().id, "M1");
        assert!(approved.updated_at.is_some());

        let shipping = ship(&mut store, &distributor("D1"), progress("Hub 9", "sig-d1"))
            .await
            .unwrap();
        assert_eq!(shipping.stage, OrderStage::Shipping);
        assert_eq!(shipping.signatures, vec!["sig-r1", "sig-d1"]);
        assert_eq!(shipping.delivery_history[2].address, "Hub 9");

        let shipped = finish(&mut store, &distributor("D1"), progress("12 Market St", "sig-d1b"))
            .await
            .unwrap();
        assert_eq!(shipped.stage, OrderStage::Shipped);
        assert!(shipped.finished_at.is_some());
        let stages: Vec<_> = shipped.delivery_history.iter().map(|e| e.stage).collect();
        assert_eq!(
            stages,
            vec![
                OrderStage::Pending,
                OrderStage::Approved,
                OrderStage::Shipping,
                OrderStage::Shipped
            ]
        );

        let lot: CommercialLot = store.get("Lot1").await.unwrap();
        assert_eq!(lot.stage, GoodStage::Retailing);
        assert_eq!(lot, shipped.lines[0].lot);
        let tail: Vec<_> = lot.provenance.iter().rev().take(3).map(|e| e.stage).collect();
        assert_eq!(
            tail,
            vec![
                GoodStage::Retailing,
                GoodStage::Distributing,
                GoodStage::Exported
            ]
        );
    }

    #[tokio::test]
    async fn rejected_orders_are_terminal() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        pending_order(&mut store).await;

        let rejected = reject(&mut store, &manufacturer(), order_ref()).await.unwrap();
        assert_eq!(rejected.stage, OrderStage::Rejected);
        let lot: CommercialLot = store.get("Lot1").await.unwrap();
        assert_eq!(lot.stage, GoodStage::Cultivated);

        for result in [
            approve(&mut store, &manufacturer(), order_ref()).await,
            reject(&mut store, &manufacturer(), order_ref()).await,
        ] {
            assert!(matches!(result, Err(ChainError::InvalidStage { .. })));
        }
    }

    #[tokio::test]
    async fn stages_cannot_be_skipped() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        pending_order(&mut store).await;

        assert!(matches!(
            ship(&mut store, &distributor("D1"), progress("x", "s")).await,
            Err(ChainError::InvalidStage { .. })
        ));
        assert!(matches!(
            finish(&mut store, &distributor("D1"), progress("x", "s")).await,
            Err(ChainError::InvalidStage { .. })
        ));
    }

    #[tokio::test]
    async fn lots_moved_ahead_block_the_order_cascade() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        pending_order(&mut store).await;
        approve(&mut store, &manufacturer(), order_ref()).await.unwrap();
        goods::distribute(
            &mut store,
            &distributor("D1"),
            crate::types::ItemRef { id: "Lot1".into() },
        )
        .await
        .unwrap();

        let err = ship(&mut store, &distributor("D1"), progress("Hub", "s1"))
            .await
            .unwrap_err();
        match err {
            ChainError::InvalidStage {
                entity_id,
                operation,
                actual,
                ..
            } => {
                assert_eq!(entity_id, "Lot1");
                assert_eq!(operation, Operation::ShipOrder);
                assert_eq!(actual, "DISTRIBUTING");
            }
            other => panic!("expected InvalidStage, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn approve_requires_lots_before_export() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        pending_order(&mut store).await;
        let mut lot: CommercialLot = store.get("Lot1").await.unwrap();
        lot.stage = GoodStage::Sold;
        store.put("Lot1", &lot).await.unwrap();

        assert!(matches!(
            approve(&mut store, &manufacturer(), order_ref()).await,
            Err(ChainError::InvalidStage { .. })
        ));
    }

    #[tokio::test]
    async fn only_the_shipping_distributor_may_finish() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);
        pending_order(&mut store).await;
        approve(&mut store, &manufacturer(), order_ref()).await.unwrap();
        ship(&mut store, &distributor("D1"), progress("Hub", "s1"))
            .await
            .unwrap();

        let err = finish(&mut store, &distributor("D2"), progress("Shop", "s2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::PermissionDenied { .. }));
        let order: Order = store.get("Order1").await.unwrap();
        assert_eq!(order.stage, OrderStage::Shipping);
    }

    #[tokio::test]
    async fn empty_and_unknown_orders_fail() {
        let ledger = MemoryLedger::new();
        let mut txn = ledger.begin().await.unwrap();
        let mut store = EntityStore::new(&ledger, &mut txn);

        let empty = CreateOrderRequest {
            lines: vec![],
            address: String::new(),
            signatures: vec![],
            qr_code: String::new(),
        };
        assert!(matches!(
            create(&mut store, &retailer(), empty).await,
            Err(ChainError::InvalidPayload(_))
        ));
        assert!(matches!(
            approve(&mut store, &manufacturer(), order_ref()).await,
            Err(ChainError::NotFound(_))
        ));
        assert!(matches!(
            approve(
                &mut store,
                &manufacturer(),
                OrderRef {
                    order_id: "Good1".into()
                }
            )
            .await,
            Err(ChainError::NotFound(_))
        ));
    }
}
