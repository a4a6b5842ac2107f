//! Records stored on the ledger and the request payloads that create and
//! advance them.
//!
//! All records serialize as camelCase JSON. Decimal quantities travel as
//! strings (`"10"`, `"2.50"`).

mod actor;
mod good;
mod order;
mod request;

pub use actor::{Actor, Role, User};
pub use good::{CommercialLot, Good, GoodStage, ProvenanceEvent, Traceable, TrackedItem};
pub use order::{DeliveryEvent, Order, OrderLine, OrderStage};
pub use request::{
    CreateOrderRequest, CultivateRequest, GoodUpdate, HarvestRequest, ImportRequest,
    InventoryRequest, ItemRef, ManufactureRequest, OrderLineRequest, OrderProgressRequest,
    OrderRef, StageRequest,
};
