//! Ledger collaborator boundary for provchain.
//!
//! The supply-chain core never talks to a concrete ledger. It talks to the
//! [`LedgerStore`] trait, which models a versioned key-value store with
//! per-invocation transactions, optimistic read-set validation at commit and
//! per-key modification history.
//!
//! [`MemoryLedger`] is the in-process reference backend. The [`conformance`]
//! module holds a backend-agnostic suite any implementation can run.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::LedgerError;
pub use memory::{Clock, MemoryLedger, MemoryTransaction, StepClock, SystemClock};
pub use record::{CommitReceipt, KeyModification, LedgerTimestamp};
pub use traits::LedgerStore;
