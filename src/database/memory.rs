use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::accounting::TransactionFilter;
use crate::database::models::{
    CompanySubscription, ModuleInstance, ModuleRecord, NewTransaction, Transaction,
};
use crate::database::store::{CompanyStore, StoreError};
use crate::types::{CompanyId, ItemType};

#[derive(Default)]
struct MemoryData {
    companies: HashMap<CompanyId, CompanySubscription>,
    modules: Vec<ModuleInstance>,
    records: Vec<ModuleRecord>,
    transactions: Vec<Transaction>,
    /// Counts for item kinds this store keeps no rows for (clients, vehicles, ...)
    item_counts: HashMap<(CompanyId, ItemType), i64>,
}

/// In-process store for `--memory` runs and tests
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
    latency: Option<Duration>,
    fetches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay list fetches to mimic a remote round trip
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of list fetches (modules, transactions) served so far
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub async fn insert_company(&self, subscription: CompanySubscription) {
        let mut data = self.data.write().await;
        data.companies.insert(subscription.company_id, subscription);
    }

    pub async fn set_item_count(&self, company_id: CompanyId, item: ItemType, count: i64) {
        let mut data = self.data.write().await;
        data.item_counts.insert((company_id, item), count);
    }

    /// Inserts a module instance as-is, manifest unchecked
    pub async fn insert_module(&self, instance: ModuleInstance) {
        self.data.write().await.modules.push(instance);
    }

    async fn simulate_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl CompanyStore for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get_subscription(&self, company_id: CompanyId) -> Result<CompanySubscription, StoreError> {
        let data = self.data.read().await;
        data.companies
            .get(&company_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("company {}", company_id)))
    }

    async fn update_subscription(&self, subscription: &CompanySubscription) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        match data.companies.get_mut(&subscription.company_id) {
            Some(existing) => {
                *existing = subscription.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("company {}", subscription.company_id))),
        }
    }

    async fn find_company_by_billing_reference(&self, reference: &str) -> Result<Option<CompanyId>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .companies
            .values()
            .find(|c| c.billing_reference.as_deref() == Some(reference))
            .map(|c| c.company_id))
    }

    async fn count_items(&self, company_id: CompanyId, item: ItemType) -> Result<i64, StoreError> {
        let data = self.data.read().await;
        let count = match item {
            ItemType::Modules => data
                .modules
                .iter()
                .filter(|m| m.company_id == company_id && m.is_active)
                .count() as i64,
            ItemType::Transactions => data
                .transactions
                .iter()
                .filter(|t| t.company_id == company_id)
                .count() as i64,
            other => data.item_counts.get(&(company_id, other)).copied().unwrap_or(0),
        };
        Ok(count)
    }

    async fn list_active_modules(&self, company_id: CompanyId) -> Result<Vec<ModuleInstance>, StoreError> {
        let modules = self
            .data
            .read()
            .await
            .modules
            .iter()
            .filter(|m| m.company_id == company_id && m.is_active)
            .cloned()
            .collect();
        // rows are read up front, so writes during the delay are not seen
        self.simulate_fetch().await;
        Ok(modules)
    }

    async fn activate_module(
        &self,
        company_id: CompanyId,
        slug: &str,
        manifest: &Value,
    ) -> Result<ModuleInstance, StoreError> {
        let mut data = self.data.write().await;
        if let Some(existing) = data
            .modules
            .iter_mut()
            .find(|m| m.company_id == company_id && m.slug == slug)
        {
            if existing.is_active {
                return Err(StoreError::Conflict(format!("module '{}' is already active", slug)));
            }
            existing.is_active = true;
            existing.manifest = manifest.clone();
            return Ok(existing.clone());
        }

        let instance = ModuleInstance {
            id: Uuid::new_v4(),
            company_id,
            slug: slug.to_string(),
            manifest: manifest.clone(),
            config: Value::Object(Map::new()),
            is_active: true,
            created_at: Utc::now(),
        };
        data.modules.push(instance.clone());
        Ok(instance)
    }

    async fn deactivate_module(&self, company_id: CompanyId, slug: &str) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        match data
            .modules
            .iter_mut()
            .find(|m| m.company_id == company_id && m.slug == slug && m.is_active)
        {
            Some(instance) => {
                instance.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_module_record(
        &self,
        company_id: CompanyId,
        slug: &str,
        record: &Map<String, Value>,
    ) -> Result<ModuleRecord, StoreError> {
        let row = ModuleRecord {
            id: Uuid::new_v4(),
            company_id,
            module_slug: slug.to_string(),
            data: record.clone(),
            created_at: Utc::now(),
        };
        self.data.write().await.records.push(row.clone());
        Ok(row)
    }

    async fn list_module_records(&self, company_id: CompanyId, slug: &str) -> Result<Vec<ModuleRecord>, StoreError> {
        let data = self.data.read().await;
        let mut rows: Vec<_> = data
            .records
            .iter()
            .filter(|r| r.company_id == company_id && r.module_slug == slug)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_transactions(
        &self,
        company_id: CompanyId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        self.simulate_fetch().await;
        let data = self.data.read().await;
        let mut rows: Vec<_> = data
            .transactions
            .iter()
            .filter(|t| t.company_id == company_id && filter.matches(t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(rows)
    }

    async fn insert_transaction(&self, company_id: CompanyId, tx: NewTransaction) -> Result<Transaction, StoreError> {
        let tx = tx.into_transaction(company_id);
        self.data.write().await.transactions.push(tx.clone());
        Ok(tx)
    }

    async fn delete_transaction(&self, company_id: CompanyId, id: Uuid) -> Result<bool, StoreError> {
        let mut data = self.data.write().await;
        let before = data.transactions.len();
        data.transactions.retain(|t| !(t.company_id == company_id && t.id == id));
        Ok(data.transactions.len() < before)
    }
}
