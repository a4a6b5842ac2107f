use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::actor::Actor;
use super::good::CommercialLot;
use crate::error::ChainError;

/// Order lifecycle: PENDING, APPROVED, SHIPPING, SHIPPED. REJECTED is
/// reachable only from PENDING and is terminal, as is SHIPPED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStage {
    Pending,
    Approved,
    Rejected,
    Shipping,
    Shipped,
}

impl OrderStage {
    pub const ALL: [OrderStage; 5] = [
        OrderStage::Pending,
        OrderStage::Approved,
        OrderStage::Rejected,
        OrderStage::Shipping,
        OrderStage::Shipped,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStage::Pending => "PENDING",
            OrderStage::Approved => "APPROVED",
            OrderStage::Rejected => "REJECTED",
            OrderStage::Shipping => "SHIPPING",
            OrderStage::Shipped => "SHIPPED",
        }
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStage {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| ChainError::InvalidPayload(format!("unknown order stage {s:?}")))
    }
}

/// One line of an order: the lot minted for it and the ordered quantity.
///
/// `lot` is a copy kept in step with the lot's own record by every order
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub lot: CommercialLot,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub stage: OrderStage,
    pub date: String,
    pub address: String,
    pub actor: Actor,
}

/// A buyer order. Stored under `Order<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub delivery_history: Vec<DeliveryEvent>,
    #[serde(default)]
    pub signatures: Vec<String>,
    pub stage: OrderStage,
    pub created_at: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
    #[serde(default)]
    pub qr_code: String,
    pub retailer: Actor,
    /// Bound by the first manufacturer to approve or reject.
    #[serde(default)]
    pub manufacturer: Option<Actor>,
    /// Bound by the first distributor to ship.
    #[serde(default)]
    pub distributor: Option<Actor>,
}
