use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::accounting::TransactionFilter;
use crate::database::manager::Database;
use crate::database::models::module::ModuleRecordRow;
use crate::database::models::subscription::CompanySubscriptionRow;
use crate::database::models::transaction::TransactionRow;
use crate::database::models::{
    CompanySubscription, ModuleInstance, ModuleRecord, NewTransaction, Transaction,
};
use crate::database::store::{CompanyStore, StoreError};
use crate::types::{CompanyId, ItemType};

const TRANSACTION_COLUMNS: &str =
    "id, company_id, description, category, amount, kind, tax_amount, status, occurred_at";

const MODULE_COLUMNS: &str = "id, company_id, slug, manifest, config, is_active, created_at";

/// Postgres-backed store. Row-level security on the remote side is assumed; every
/// query still filters by company id.
#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Table holding the rows counted for each item kind. Fixed whitelist, never
    /// built from user input.
    fn count_table(item: ItemType) -> &'static str {
        match item {
            ItemType::Clients => "clients",
            ItemType::Employees => "employees",
            ItemType::Vehicles => "vehicles",
            ItemType::Holidays => "holidays",
            ItemType::Transactions => "accounting_transactions",
            ItemType::Modules => "company_modules",
            ItemType::Invoices => "invoices",
        }
    }
}

/// Search text matched literally: LIKE wildcards and the escape char itself are escaped
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CompanyStore for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        self.db.health_check().await
    }

    async fn get_subscription(&self, company_id: CompanyId) -> Result<CompanySubscription, StoreError> {
        let row = sqlx::query_as::<_, CompanySubscriptionRow>(
            "SELECT id, plan, subscription_status, subscription_started_at, subscription_ends_at, paypal_subscription_id
             FROM companies
             WHERE id = $1",
        )
        .bind(company_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(CompanySubscription::from)
            .ok_or_else(|| StoreError::NotFound(format!("company {}", company_id)))
    }

    async fn update_subscription(&self, subscription: &CompanySubscription) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE companies
             SET plan = $2,
                 subscription_status = $3,
                 subscription_started_at = $4,
                 subscription_ends_at = $5,
                 paypal_subscription_id = $6,
                 updated_at = now()
             WHERE id = $1",
        )
        .bind(subscription.company_id)
        .bind(subscription.plan.as_str())
        .bind(subscription.status.map(|s| s.as_str()))
        .bind(subscription.started_at)
        .bind(subscription.ends_at)
        .bind(subscription.billing_reference.as_deref())
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("company {}", subscription.company_id)));
        }
        Ok(())
    }

    async fn find_company_by_billing_reference(&self, reference: &str) -> Result<Option<CompanyId>, StoreError> {
        let id: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM companies WHERE paypal_subscription_id = $1")
            .bind(reference)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(id.map(|(id,)| id))
    }

    async fn count_items(&self, company_id: CompanyId, item: ItemType) -> Result<i64, StoreError> {
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE company_id = $1",
            Self::count_table(item)
        );
        if item == ItemType::Modules {
            sql.push_str(" AND is_active = true");
        }

        let (count,): (i64,) = sqlx::query_as(&sql)
            .bind(company_id)
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    async fn list_active_modules(&self, company_id: CompanyId) -> Result<Vec<ModuleInstance>, StoreError> {
        let sql = format!(
            "SELECT {} FROM company_modules WHERE company_id = $1 AND is_active = true ORDER BY created_at",
            MODULE_COLUMNS
        );
        let rows = sqlx::query_as::<_, ModuleInstance>(&sql)
            .bind(company_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(rows)
    }

    async fn activate_module(
        &self,
        company_id: CompanyId,
        slug: &str,
        manifest: &Value,
    ) -> Result<ModuleInstance, StoreError> {
        // Reactivating a previously removed module replaces its manifest wholesale
        let sql = format!(
            "INSERT INTO company_modules (id, company_id, slug, manifest, config, is_active, created_at)
             VALUES ($1, $2, $3, $4, '{{}}'::jsonb, true, now())
             ON CONFLICT (company_id, slug) DO UPDATE
                 SET manifest = EXCLUDED.manifest, is_active = true
                 WHERE company_modules.is_active = false
             RETURNING {}",
            MODULE_COLUMNS
        );

        let row = sqlx::query_as::<_, ModuleInstance>(&sql)
            .bind(Uuid::new_v4())
            .bind(company_id)
            .bind(slug)
            .bind(manifest)
            .fetch_optional(self.db.pool())
            .await?;

        row.ok_or_else(|| StoreError::Conflict(format!("module '{}' is already active", slug)))
    }

    async fn deactivate_module(&self, company_id: CompanyId, slug: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE company_modules SET is_active = false
             WHERE company_id = $1 AND slug = $2 AND is_active = true",
        )
        .bind(company_id)
        .bind(slug)
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_module_record(
        &self,
        company_id: CompanyId,
        slug: &str,
        data: &Map<String, Value>,
    ) -> Result<ModuleRecord, StoreError> {
        let row = sqlx::query_as::<_, ModuleRecordRow>(
            "INSERT INTO module_data (id, company_id, module_slug, data, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, company_id, module_slug, data, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(slug)
        .bind(Value::Object(data.clone()))
        .bind(Utc::now())
        .fetch_one(self.db.pool())
        .await?;
        Ok(row.into())
    }

    async fn list_module_records(&self, company_id: CompanyId, slug: &str) -> Result<Vec<ModuleRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ModuleRecordRow>(
            "SELECT id, company_id, module_slug, data, created_at
             FROM module_data
             WHERE company_id = $1 AND module_slug = $2
             ORDER BY created_at DESC",
        )
        .bind(company_id)
        .bind(slug)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows.into_iter().map(ModuleRecord::from).collect())
    }

    async fn list_transactions(
        &self,
        company_id: CompanyId,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, StoreError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM accounting_transactions WHERE company_id = ",
            TRANSACTION_COLUMNS
        ));
        qb.push_bind(company_id);

        if let Some(from) = filter.from {
            qb.push(" AND occurred_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND occurred_at <= ").push_bind(to);
        }
        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(term) = filter.search_term() {
            let pattern = format!("%{}%", escape_like(term));
            qb.push(" AND (description ILIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR category ILIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        qb.push(" ORDER BY occurred_at DESC");

        let rows: Vec<TransactionRow> = qb.build_query_as().fetch_all(self.db.pool()).await?;
        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn insert_transaction(&self, company_id: CompanyId, tx: NewTransaction) -> Result<Transaction, StoreError> {
        let tx = tx.into_transaction(company_id);
        sqlx::query(
            "INSERT INTO accounting_transactions
                 (id, company_id, description, category, amount, kind, tax_amount, status, occurred_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(tx.id)
        .bind(tx.company_id)
        .bind(&tx.description)
        .bind(tx.category.as_deref())
        .bind(tx.amount)
        .bind(tx.kind.as_str())
        .bind(tx.tax_amount)
        .bind(tx.status.as_str())
        .bind(tx.occurred_at)
        .execute(self.db.pool())
        .await?;
        Ok(tx)
    }

    async fn delete_transaction(&self, company_id: CompanyId, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM accounting_transactions WHERE company_id = $1 AND id = $2")
            .bind(company_id)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
