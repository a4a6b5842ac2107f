use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ChainError;

/// The closed set of supply-chain roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Supplier,
    Manufacturer,
    Distributor,
    Retailer,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Supplier,
        Role::Manufacturer,
        Role::Distributor,
        Role::Retailer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Supplier => "supplier",
            Role::Manufacturer => "manufacturer",
            Role::Distributor => "distributor",
            Role::Retailer => "retailer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ChainError::UnknownRole(s.to_string()))
    }
}

/// The caller record submitted with every invocation.
///
/// Identity is asserted by the caller, not verified: whoever submits the
/// invocation is trusted to be the user it describes. Deployments that need
/// verified identity must authenticate callers before they reach the core.
/// Password material is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub avatar_ref: String,
    /// Free-form role claim, parsed by [`User::role`].
    pub role: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub signature: String,
}

impl User {
    pub fn role(&self) -> Result<Role, ChainError> {
        self.role.parse()
    }

    /// Public projection of this user, as recorded in provenance.
    pub fn actor(&self) -> Result<Actor, ChainError> {
        Ok(Actor {
            id: self.id.clone(),
            code: self.code.clone(),
            phone: self.phone.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            avatar_ref: self.avatar_ref.clone(),
            role: self.role()?,
        })
    }
}

/// A party as it appears in provenance and delivery history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub avatar_ref: String,
    pub role: Role,
}
