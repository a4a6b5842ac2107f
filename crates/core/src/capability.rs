//! Capability table: which role may perform which operation.
//!
//! Every lifecycle operation calls [`authorize`] before touching the ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::types::{Actor, Role, User};

/// Every state-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Cultivate,
    Inventory,
    Harvest,
    Import,
    Manufacture,
    Export,
    Distribute,
    RetailImport,
    Sell,
    UpdateGood,
    CreateOrder,
    ApproveOrder,
    RejectOrder,
    ShipOrder,
    FinishOrder,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Cultivate,
        Operation::Inventory,
        Operation::Harvest,
        Operation::Import,
        Operation::Manufacture,
        Operation::Export,
        Operation::Distribute,
        Operation::RetailImport,
        Operation::Sell,
        Operation::UpdateGood,
        Operation::CreateOrder,
        Operation::ApproveOrder,
        Operation::RejectOrder,
        Operation::ShipOrder,
        Operation::FinishOrder,
    ];

    pub const fn required_role(self) -> Role {
        match self {
            Operation::Cultivate | Operation::Harvest | Operation::UpdateGood => Role::Supplier,
            Operation::Inventory
            | Operation::Import
            | Operation::Manufacture
            | Operation::Export
            | Operation::ApproveOrder
            | Operation::RejectOrder => Role::Manufacturer,
            Operation::Distribute | Operation::ShipOrder | Operation::FinishOrder => {
                Role::Distributor
            }
            Operation::RetailImport | Operation::Sell | Operation::CreateOrder => Role::Retailer,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Cultivate => "cultivate",
            Operation::Inventory => "inventory",
            Operation::Harvest => "harvest",
            Operation::Import => "import",
            Operation::Manufacture => "manufacture",
            Operation::Export => "export",
            Operation::Distribute => "distribute",
            Operation::RetailImport => "retailImport",
            Operation::Sell => "sell",
            Operation::UpdateGood => "updateGood",
            Operation::CreateOrder => "createOrder",
            Operation::ApproveOrder => "approveOrder",
            Operation::RejectOrder => "rejectOrder",
            Operation::ShipOrder => "shipOrder",
            Operation::FinishOrder => "finishOrder",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check the caller's role claim against `op` and project the caller to the
/// [`Actor`] recorded in history.
pub fn authorize(op: Operation, user: &User) -> Result<Actor, ChainError> {
    let claimed = user.role()?;
    let required = op.required_role();
    if claimed != required {
        return Err(ChainError::RoleMismatch {
            operation: op,
            required,
            claimed,
        });
    }
    user.actor()
}
