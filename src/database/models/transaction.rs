use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::database::store::StoreError;
use crate::types::CompanyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Settled,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Settled => "settled",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(format!("unknown transaction type '{}'", other)),
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "settled" | "paid" => Ok(TransactionStatus::Settled),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Company-scoped financial record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub description: String,
    pub category: Option<String>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Tax portion of `amount`; zero when the transaction carries no tax
    pub tax_amount: Decimal,
    pub status: TransactionStatus,
    pub occurred_at: DateTime<Utc>,
}

impl Transaction {
    pub fn has_tax(&self) -> bool {
        !self.tax_amount.is_zero()
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }
}

/// Body accepted when creating a transaction
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(default)]
    pub tax_amount: Decimal,
    #[serde(default = "default_status")]
    pub status: TransactionStatus,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn default_status() -> TransactionStatus {
    TransactionStatus::Pending
}

impl NewTransaction {
    /// Field-level validation; returns (field, message) pairs
    pub fn validate(&self) -> Vec<(&'static str, String)> {
        let mut errors = Vec::new();
        if self.description.trim().is_empty() {
            errors.push(("description", "This field is required".to_string()));
        }
        if self.amount <= Decimal::ZERO {
            errors.push(("amount", "Amount must be greater than zero".to_string()));
        }
        if self.tax_amount < Decimal::ZERO {
            errors.push(("tax_amount", "Tax amount cannot be negative".to_string()));
        } else if self.tax_amount > self.amount {
            errors.push(("tax_amount", "Tax amount cannot exceed the amount".to_string()));
        }
        errors
    }

    pub fn into_transaction(self, company_id: CompanyId) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            company_id,
            description: self.description.trim().to_string(),
            category: self.category.filter(|c| !c.trim().is_empty()),
            amount: self.amount,
            kind: self.kind,
            tax_amount: self.tax_amount,
            status: self.status,
            occurred_at: self.occurred_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub company_id: CompanyId,
    pub description: String,
    pub category: Option<String>,
    pub amount: Decimal,
    pub kind: String,
    pub tax_amount: Option<Decimal>,
    pub status: String,
    pub occurred_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = StoreError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            company_id: row.company_id,
            description: row.description,
            category: row.category,
            amount: row.amount,
            kind: row.kind.parse().map_err(StoreError::InvalidRow)?,
            tax_amount: row.tax_amount.unwrap_or_default(),
            status: row.status.parse().map_err(StoreError::InvalidRow)?,
            occurred_at: row.occurred_at,
        })
    }
}
