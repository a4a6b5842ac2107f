#![allow(clippy::result_large_err)]
//! provchain-core: supply-chain provenance over a versioned key-value ledger.
//!
//! Goods move through a fixed lifecycle (cultivated, harvested, imported or
//! manufactured, exported, distributing, retailing, sold), each step
//! appending one provenance event. Retailers order goods; every order line
//! becomes a commercial lot that carries the good's history forward, and the
//! order's own lifecycle (pending, approved, shipping, shipped, or rejected)
//! advances its lots in step.
//!
//! # Public API
//!
//! - [`SupplyChain`] -- runs each operation as one ledger transaction
//! - [`Invocation`] -- JSON-tagged operation plus caller and payload
//! - [`ChainError`] -- every failure an invocation can report
//! - [`Operation`] / [`authorize`] -- the role capability table
//! - Records: [`Good`], [`CommercialLot`], [`Order`], [`ProvenanceEvent`],
//!   [`DeliveryEvent`], [`User`], [`Actor`]
//!
//! The per-component modules ([`goods`], [`orders`], [`lots`],
//! [`enumerate`], [`history`], [`sequence`]) work on an [`EntityStore`] and
//! can be composed into larger transactions.

pub mod capability;
pub mod enumerate;
pub mod error;
pub mod goods;
pub mod history;
pub mod lots;
pub mod orders;
pub mod sequence;
pub mod service;
pub mod store;
pub mod types;

pub use capability::{authorize, Operation};
pub use enumerate::{ListFilter, OwnerFilter, OwnerSlot};
pub use error::ChainError;
pub use history::{HistoryEntry, HistoryRecord};
pub use sequence::{EntityKind, SequenceCounter};
pub use service::{Invocation, SupplyChain};
pub use store::EntityStore;
pub use types::*;
