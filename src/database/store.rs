use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::accounting::TransactionFilter;
use crate::database::models::{
    CompanySubscription, ModuleInstance, ModuleRecord, NewTransaction, Transaction,
};
use crate::types::{CompanyId, ItemType};

/// Errors from the data access layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Company-scoped access to the remote store. Injected once at startup and shared
/// by reference; every call is scoped by the caller's company id.
#[async_trait]
pub trait CompanyStore: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Subscription record

    /// `NotFound` when the company does not exist
    async fn get_subscription(&self, company_id: CompanyId) -> Result<CompanySubscription, StoreError>;

    async fn update_subscription(&self, subscription: &CompanySubscription) -> Result<(), StoreError>;

    async fn find_company_by_billing_reference(&self, reference: &str) -> Result<Option<CompanyId>, StoreError>;

    /// Live count used by the plan limiter
    async fn count_items(&self, company_id: CompanyId, item: ItemType) -> Result<i64, StoreError>;

    // Modules

    async fn list_active_modules(&self, company_id: CompanyId) -> Result<Vec<ModuleInstance>, StoreError>;

    /// `Conflict` when the module is already active for the company
    async fn activate_module(
        &self,
        company_id: CompanyId,
        slug: &str,
        manifest: &Value,
    ) -> Result<ModuleInstance, StoreError>;

    /// Returns false when no active instance existed
    async fn deactivate_module(&self, company_id: CompanyId, slug: &str) -> Result<bool, StoreError>;

    async fn insert_module_record(
        &self,
        company_id: CompanyId,
        slug: &str,
        data: &Map<String, Value>,
    ) -> Result<ModuleRecord, StoreError>;

    async fn list_module_records(&self, company_id: CompanyId, slug: &str) -> Result<Vec<ModuleRecord>, StoreError>;

    // Accounting

    /// Filtering happens here, at the fetch boundary
    async fn list_transactions(
        &self,
        company_id: CompanyId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn insert_transaction(&self, company_id: CompanyId, tx: NewTransaction) -> Result<Transaction, StoreError>;

    async fn delete_transaction(&self, company_id: CompanyId, id: Uuid) -> Result<bool, StoreError>;
}
