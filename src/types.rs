/// Shared types used across the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tenant identifier. Every company-scoped row carries one.
pub type CompanyId = Uuid;

/// Resource kinds whose item counts are capped by the plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Clients,
    Employees,
    Vehicles,
    Holidays,
    Transactions,
    Modules,
    Invoices,
}

impl ItemType {
    pub const ALL: [ItemType; 7] = [
        ItemType::Clients,
        ItemType::Employees,
        ItemType::Vehicles,
        ItemType::Holidays,
        ItemType::Transactions,
        ItemType::Modules,
        ItemType::Invoices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Clients => "clients",
            ItemType::Employees => "employees",
            ItemType::Vehicles => "vehicles",
            ItemType::Holidays => "holidays",
            ItemType::Transactions => "transactions",
            ItemType::Modules => "modules",
            ItemType::Invoices => "invoices",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .into_iter()
            .find(|item| item.as_str() == s)
            .ok_or_else(|| format!("unknown item type '{}'", s))
    }
}
