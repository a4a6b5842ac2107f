use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;

fn non_negative(field: &str, value: Decimal) -> Result<(), ChainError> {
    if value < Decimal::ZERO {
        return Err(ChainError::InvalidPayload(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(())
}

fn non_negative_opt(field: &str, value: Option<Decimal>) -> Result<(), ChainError> {
    value.map_or(Ok(()), |v| non_negative(field, v))
}

/// Supplier registers a freshly cultivated good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CultivateRequest {
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub certificate_ref: String,
}

impl CultivateRequest {
    pub fn validate(&self) -> Result<(), ChainError> {
        non_negative("price", self.price)?;
        non_negative("amount", self.amount)
    }
}

/// Manufacturer registers its own stock, already manufactured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRequest {
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub certificate_ref: String,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub qr_code: String,
}

impl InventoryRequest {
    pub fn validate(&self) -> Result<(), ChainError> {
        non_negative("price", self.price)?;
        non_negative("amount", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

impl HarvestRequest {
    pub fn validate(&self) -> Result<(), ChainError> {
        non_negative("amount", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub id: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
}

impl ImportRequest {
    pub fn validate(&self) -> Result<(), ChainError> {
        non_negative_opt("price", self.price)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManufactureRequest {
    pub id: String,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub qr_code: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

/// Export, retail-import and sell: advance an item, optionally repricing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRequest {
    pub id: String,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
}

impl StageRequest {
    pub fn validate(&self) -> Result<(), ChainError> {
        non_negative_opt("price", self.price)
    }
}

/// Identifies one good or lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    pub id: String,
}

/// Replacement values for a good's descriptive fields. Absent fields are
/// left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodUpdate {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub certificate_ref: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub amount: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub price: Option<Decimal>,
}

impl GoodUpdate {
    pub fn validate(&self) -> Result<(), ChainError> {
        non_negative_opt("price", self.price)?;
        non_negative_opt("amount", self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRequest {
    pub good_id: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    /// QR code the orderer assigns to the minted lot.
    #[serde(default)]
    pub qr_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub lines: Vec<OrderLineRequest>,
    /// Delivery address recorded on the PENDING entry.
    pub address: String,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub qr_code: String,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.lines.is_empty() {
            return Err(ChainError::InvalidPayload(
                "an order needs at least one line".to_string(),
            ));
        }
        for line in &self.lines {
            if line.quantity <= Decimal::ZERO {
                return Err(ChainError::InvalidPayload(format!(
                    "quantity for {} must be positive, got {}",
                    line.good_id, line.quantity
                )));
            }
        }
        Ok(())
    }
}

/// Approve or reject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRef {
    pub order_id: String,
}

/// Ship or finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProgressRequest {
    pub order_id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub signature: String,
}
