//! Invocation boundary.
//!
//! [`SupplyChain`] runs every operation as one ledger transaction: begin,
//! run the operation through an [`EntityStore`], then commit on success or
//! abort on error. A commit rejected by the ledger surfaces as
//! [`ChainError::ConflictingWrite`] and nothing is applied.

use provchain_ledger::LedgerStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::Operation;
use crate::enumerate::{self, ListFilter};
use crate::error::ChainError;
use crate::goods;
use crate::history::{self, HistoryEntry};
use crate::orders;
use crate::sequence::{self, EntityKind};
use crate::store::EntityStore;
use crate::types::{
    CommercialLot, CreateOrderRequest, CultivateRequest, Good, GoodUpdate, HarvestRequest,
    ImportRequest, InventoryRequest, ItemRef, ManufactureRequest, Order, OrderProgressRequest,
    OrderRef, StageRequest, TrackedItem, User,
};

/// The supply-chain contract over a ledger `L`.
pub struct SupplyChain<L: LedgerStore> {
    ledger: L,
}

impl<L: LedgerStore> SupplyChain<L> {
    pub fn new(ledger: L) -> Self {
        SupplyChain { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    async fn settle<T>(
        &self,
        label: &str,
        txn: L::Transaction,
        result: Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let value = match result {
            Ok(value) => value,
            Err(e) => {
                self.ledger.abort(txn).await?;
                if e.is_authorization() {
                    tracing::warn!(error = %e, kind = e.kind(), "{label} denied");
                } else {
                    tracing::debug!(error = %e, kind = e.kind(), "{label} failed");
                }
                return Err(e);
            }
        };
        match self.ledger.commit(txn).await {
            Ok(receipt) => {
                let tx_id = receipt.tx_id;
                tracing::info!(%tx_id, writes = receipt.writes, "{label} committed");
                Ok(value)
            }
            Err(e) => {
                let e = ChainError::from(e);
                if e.is_retryable() {
                    tracing::warn!(error = %e, "{label} lost a commit race");
                }
                Err(e)
            }
        }
    }

    /// Run a read-only query inside a transaction that is always discarded.
    async fn discard<T>(
        &self,
        txn: L::Transaction,
        result: Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        self.ledger.abort(txn).await?;
        result
    }

    // ── Lifecycle operations ─────────────────────────────────────────────────

    /// Create the sequence counters. Safe to call more than once.
    #[tracing::instrument(skip_all)]
    pub async fn init(&self) -> Result<(), ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = sequence::init(&mut store).await;
        self.settle("init", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn cultivate(&self, user: &User, req: CultivateRequest) -> Result<Good, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::cultivate(&mut store, user, req).await;
        self.settle("cultivate", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn inventory(&self, user: &User, req: InventoryRequest) -> Result<Good, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::inventory(&mut store, user, req).await;
        self.settle("inventory", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn harvest(&self, user: &User, req: HarvestRequest) -> Result<Good, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::harvest(&mut store, user, req).await;
        self.settle("harvest", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn import(&self, user: &User, req: ImportRequest) -> Result<Good, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::import(&mut store, user, req).await;
        self.settle("import", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn manufacture(
        &self,
        user: &User,
        req: ManufactureRequest,
    ) -> Result<Good, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::manufacture(&mut store, user, req).await;
        self.settle("manufacture", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn export(&self, user: &User, req: StageRequest) -> Result<TrackedItem, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::export(&mut store, user, req).await;
        self.settle("export", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn distribute(&self, user: &User, req: ItemRef) -> Result<TrackedItem, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::distribute(&mut store, user, req).await;
        self.settle("distribute", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn retail_import(
        &self,
        user: &User,
        req: StageRequest,
    ) -> Result<TrackedItem, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::retail_import(&mut store, user, req).await;
        self.settle("retailImport", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn sell(&self, user: &User, req: StageRequest) -> Result<TrackedItem, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::sell(&mut store, user, req).await;
        self.settle("sell", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn update_good(&self, user: &User, update: GoodUpdate) -> Result<Good, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = goods::update_good(&mut store, user, update).await;
        self.settle("updateGood", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn create_order(
        &self,
        user: &User,
        req: CreateOrderRequest,
    ) -> Result<Order, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = orders::create(&mut store, user, req).await;
        self.settle("createOrder", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn approve_order(&self, user: &User, req: OrderRef) -> Result<Order, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = orders::approve(&mut store, user, req).await;
        self.settle("approveOrder", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn reject_order(&self, user: &User, req: OrderRef) -> Result<Order, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = orders::reject(&mut store, user, req).await;
        self.settle("rejectOrder", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn ship_order(
        &self,
        user: &User,
        req: OrderProgressRequest,
    ) -> Result<Order, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = orders::ship(&mut store, user, req).await;
        self.settle("shipOrder", txn, result).await
    }

    #[tracing::instrument(skip_all, fields(actor = %user.id, role = %user.role))]
    pub async fn finish_order(
        &self,
        user: &User,
        req: OrderProgressRequest,
    ) -> Result<Order, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = orders::finish(&mut store, user, req).await;
        self.settle("finishOrder", txn, result).await
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub async fn get_good(&self, id: &str) -> Result<Good, ChainError> {
        self.get_kind(EntityKind::Good, id).await
    }

    pub async fn get_lot(&self, id: &str) -> Result<CommercialLot, ChainError> {
        self.get_kind(EntityKind::Lot, id).await
    }

    pub async fn get_order(&self, id: &str) -> Result<Order, ChainError> {
        self.get_kind(EntityKind::Order, id).await
    }

    async fn get_kind<E>(&self, kind: EntityKind, id: &str) -> Result<E, ChainError>
    where
        E: serde::de::DeserializeOwned,
    {
        if kind.parse_key(id).is_none() {
            return Err(ChainError::NotFound(id.to_string()));
        }
        let mut txn = self.ledger.begin().await?;
        let result = EntityStore::new(&self.ledger, &mut txn).get(id).await;
        self.discard(txn, result).await
    }

    /// Whatever is stored under `key`, as JSON.
    pub async fn get_raw(&self, key: &str) -> Result<Value, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let result = EntityStore::new(&self.ledger, &mut txn).get(key).await;
        self.discard(txn, result).await
    }

    pub async fn list_goods(&self, filter: &ListFilter) -> Result<Vec<Good>, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = enumerate::list_goods(&mut store, filter).await;
        self.discard(txn, result).await
    }

    pub async fn list_lots(&self, filter: &ListFilter) -> Result<Vec<CommercialLot>, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = enumerate::list_lots(&mut store, filter).await;
        self.discard(txn, result).await
    }

    pub async fn list_orders(&self, filter: &ListFilter) -> Result<Vec<Order>, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = enumerate::list_orders(&mut store, filter).await;
        self.discard(txn, result).await
    }

    /// List any kind as JSON.
    pub async fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Value, ChainError> {
        let label = kind.prefix();
        match kind {
            EntityKind::Good => to_json(label, &self.list_goods(filter).await?),
            EntityKind::Lot => to_json(label, &self.list_lots(filter).await?),
            EntityKind::Order => to_json(label, &self.list_orders(filter).await?),
        }
    }

    pub async fn good_history(&self, id: &str) -> Result<Vec<HistoryEntry<Good>>, ChainError> {
        history::history_of(&self.ledger, id).await
    }

    pub async fn lot_history(
        &self,
        id: &str,
    ) -> Result<Vec<HistoryEntry<CommercialLot>>, ChainError> {
        history::history_of(&self.ledger, id).await
    }

    pub async fn order_history(&self, id: &str) -> Result<Vec<HistoryEntry<Order>>, ChainError> {
        history::history_of(&self.ledger, id).await
    }

    /// History of an arbitrary key, values as raw JSON.
    pub async fn key_history(&self, key: &str) -> Result<Vec<HistoryEntry<Value>>, ChainError> {
        history::history_of(&self.ledger, key).await
    }

    /// Last id allocated for `kind`.
    pub async fn counter(&self, kind: EntityKind) -> Result<u64, ChainError> {
        let mut txn = self.ledger.begin().await?;
        let mut store = EntityStore::new(&self.ledger, &mut txn);
        let result = sequence::current(&mut store, kind).await;
        self.discard(txn, result).await
    }

    // ── JSON dispatch ────────────────────────────────────────────────────────

    /// Run one invocation and return its result as JSON.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Value, ChainError> {
        let label = invocation.label();
        match invocation {
            Invocation::Init => {
                self.init().await?;
                Ok(Value::Null)
            }
            Invocation::Cultivate { user, request } => {
                to_json(label, &self.cultivate(&user, request).await?)
            }
            Invocation::Inventory { user, request } => {
                to_json(label, &self.inventory(&user, request).await?)
            }
            Invocation::Harvest { user, request } => {
                to_json(label, &self.harvest(&user, request).await?)
            }
            Invocation::Import { user, request } => {
                to_json(label, &self.import(&user, request).await?)
            }
            Invocation::Manufacture { user, request } => {
                to_json(label, &self.manufacture(&user, request).await?)
            }
            Invocation::Export { user, request } => {
                to_json(label, &self.export(&user, request).await?)
            }
            Invocation::Distribute { user, request } => {
                to_json(label, &self.distribute(&user, request).await?)
            }
            Invocation::RetailImport { user, request } => {
                to_json(label, &self.retail_import(&user, request).await?)
            }
            Invocation::Sell { user, request } => to_json(label, &self.sell(&user, request).await?),
            Invocation::UpdateGood { user, request } => {
                to_json(label, &self.update_good(&user, request).await?)
            }
            Invocation::CreateOrder { user, request } => {
                to_json(label, &self.create_order(&user, request).await?)
            }
            Invocation::ApproveOrder { user, request } => {
                to_json(label, &self.approve_order(&user, request).await?)
            }
            Invocation::RejectOrder { user, request } => {
                to_json(label, &self.reject_order(&user, request).await?)
            }
            Invocation::ShipOrder { user, request } => {
                to_json(label, &self.ship_order(&user, request).await?)
            }
            Invocation::FinishOrder { user, request } => {
                to_json(label, &self.finish_order(&user, request).await?)
            }
        }
    }

    /// Resubmit `invocation` while it loses commit races, up to `attempts`
    /// times in total. Any other error is returned at once.
    pub async fn invoke_with_retry(
        &self,
        attempts: usize,
        invocation: &Invocation,
    ) -> Result<Value, ChainError> {
        let mut attempt = 1;
        loop {
            match self.invoke(invocation.clone()).await {
                Err(e) if e.is_retryable() && attempt < attempts.max(1) => {
                    tracing::debug!(attempt, op = invocation.label(), "resubmitting");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn to_json<T: Serialize>(label: &str, value: &T) -> Result<Value, ChainError> {
    serde_json::to_value(value).map_err(|source| ChainError::Encode {
        key: label.to_string(),
        source,
    })
}

/// A JSON-submitted invocation: the operation tag, the caller and the
/// operation's payload.
///
/// ```json
/// {"operation": "harvest",
///  "user": {"id": "S1", "role": "supplier"},
///  "request": {"id": "Good1", "amount": "40"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Invocation {
    Init,
    Cultivate {
        user: User,
        request: CultivateRequest,
    },
    Inventory {
        user: User,
        request: InventoryRequest,
    },
    Harvest {
        user: User,
        request: HarvestRequest,
    },
    Import {
        user: User,
        request: ImportRequest,
    },
    Manufacture {
        user: User,
        request: ManufactureRequest,
    },
    Export {
        user: User,
        request: StageRequest,
    },
    Distribute {
        user: User,
        request: ItemRef,
    },
    RetailImport {
        user: User,
        request: StageRequest,
    },
    Sell {
        user: User,
        request: StageRequest,
    },
    UpdateGood {
        user: User,
        request: GoodUpdate,
    },
    CreateOrder {
        user: User,
        request: CreateOrderRequest,
    },
    ApproveOrder {
        user: User,
        request: OrderRef,
    },
    RejectOrder {
        user: User,
        request: OrderRef,
    },
    ShipOrder {
        user: User,
        request: OrderProgressRequest,
    },
    FinishOrder {
        user: User,
        request: OrderProgressRequest,
    },
}

impl Invocation {
    /// The lifecycle operation this invocation runs; `None` for `init`.
    pub fn operation(&self) -> Option<Operation> {
        Some(match self {
            Invocation::Init => return None,
            Invocation::Cultivate { .. } => Operation::Cultivate,
            Invocation::Inventory { .. } => Operation::Inventory,
            Invocation::Harvest { .. } => Operation::Harvest,
            Invocation::Import { .. } => Operation::Import,
            Invocation::Manufacture { .. } => Operation::Manufacture,
            Invocation::Export { .. } => Operation::Export,
            Invocation::Distribute { .. } => Operation::Distribute,
            Invocation::RetailImport { .. } => Operation::RetailImport,
            Invocation::Sell { .. } => Operation::Sell,
            Invocation::UpdateGood { .. } => Operation::UpdateGood,
            Invocation::CreateOrder { .. } => Operation::CreateOrder,
            Invocation::ApproveOrder { .. } => Operation::ApproveOrder,
            Invocation::RejectOrder { .. } => Operation::RejectOrder,
            Invocation::ShipOrder { .. } => Operation::ShipOrder,
            Invocation::FinishOrder { .. } => Operation::FinishOrder,
        })
    }

    pub fn label(&self) -> &'static str {
        self.operation().map_or("init", Operation::as_str)
    }
}
