use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::accounting::filter::TransactionFilter;
use crate::accounting::summary::{summarize, AccountingSummary};
use crate::database::models::Transaction;
use crate::database::store::{CompanyStore, StoreError};
use crate::loader::{Liveness, LoadGuard, LoadOutcome};
use crate::types::CompanyId;

#[derive(Debug, Default)]
struct Inner {
    filter: TransactionFilter,
    transactions: Vec<Transaction>,
    summary: AccountingSummary,
    /// Filter changed since the last successful load
    stale: bool,
}

impl Inner {
    fn set_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
        self.summary = summarize(&self.transactions);
    }
}

/// Cache of one company's fetched transactions with the derived summary.
///
/// The summary is recomputed whenever the transaction set changes. Changing the
/// filter only marks the cache stale: filtering belongs to the fetch, so the
/// next `refresh` pulls the filtered set from the store.
pub struct AccountingState {
    company_id: CompanyId,
    inner: Mutex<Inner>,
    guard: LoadGuard,
    alive: Liveness,
}

impl AccountingState {
    pub fn new(company_id: CompanyId) -> Self {
        Self {
            company_id,
            inner: Mutex::new(Inner::default()),
            guard: LoadGuard::new(),
            alive: Liveness::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn filter(&self) -> TransactionFilter {
        self.lock().filter.clone()
    }

    pub fn set_filter(&self, filter: TransactionFilter) {
        let mut inner = self.lock();
        if inner.filter != filter {
            inner.filter = filter;
            inner.stale = true;
        }
    }

    pub fn is_stale(&self) -> bool {
        self.lock().stale
    }

    pub fn is_loading(&self) -> bool {
        self.guard.is_loading()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    pub fn summary(&self) -> AccountingSummary {
        self.lock().summary.clone()
    }

    /// Fetch with the current filter. A call made while another refresh is in
    /// flight is skipped; on error the loading flag resets so the caller can retry.
    pub async fn refresh(&self, store: &dyn CompanyStore) -> Result<LoadOutcome, StoreError> {
        let Some(_ticket) = self.guard.try_begin() else {
            tracing::debug!("Transaction load already in flight for company {}", self.company_id);
            return Ok(LoadOutcome::Skipped);
        };

        let filter = self.filter();
        let fetched = store.list_transactions(self.company_id, &filter).await?;

        if !self.alive.is_alive() {
            tracing::debug!("Discarding {} transactions for torn-down view", fetched.len());
            return Ok(LoadOutcome::Discarded);
        }

        let mut inner = self.lock();
        // a filter change during the fetch keeps the cache stale
        inner.stale = inner.filter != filter;
        inner.set_transactions(fetched);
        Ok(LoadOutcome::Loaded)
    }

    /// Applies a locally created or edited transaction without refetching
    pub fn upsert(&self, tx: Transaction) {
        let mut inner = self.lock();
        let mut transactions = std::mem::take(&mut inner.transactions);
        match transactions.iter_mut().find(|t| t.id == tx.id) {
            Some(existing) => *existing = tx,
            None => transactions.insert(0, tx),
        }
        inner.set_transactions(transactions);
    }

    pub fn remove(&self, id: Uuid) -> bool {
        let mut inner = self.lock();
        let before = inner.transactions.len();
        let transactions: Vec<_> = std::mem::take(&mut inner.transactions)
            .into_iter()
            .filter(|t| t.id != id)
            .collect();
        let removed = transactions.len() < before;
        inner.set_transactions(transactions);
        removed
    }

    /// Marks the owning view gone; in-flight results are ignored from now on
    pub fn teardown(&self) {
        self.alive.shut_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::database::memory::MemoryStore;
    use crate::database::models::{NewTransaction, TransactionKind, TransactionStatus};

    fn new_tx(kind: TransactionKind, amount: i64, status: TransactionStatus) -> NewTransaction {
        NewTransaction {
            description: format!("{:?} {}", kind, amount),
            category: None,
            amount: Decimal::new(amount, 0),
            kind,
            tax_amount: Decimal::ZERO,
            status,
            occurred_at: None,
        }
    }

    async fn seeded_store(company: CompanyId) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_transaction(company, new_tx(TransactionKind::Income, 100, TransactionStatus::Settled))
            .await
            .unwrap();
        store
            .insert_transaction(company, new_tx(TransactionKind::Expense, 40, TransactionStatus::Pending))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn refresh_loads_and_summarizes() {
        let company = Uuid::new_v4();
        let store = seeded_store(company).await;
        let state = AccountingState::new(company);

        assert_eq!(state.refresh(&store).await.unwrap(), LoadOutcome::Loaded);
        assert_eq!(state.transactions().len(), 2);

        let summary = state.summary();
        assert_eq!(summary.net_cash_flow, Decimal::new(60, 0));
        assert_eq!(summary.pending_count, 1);
    }

    #[tokio::test]
    async fn concurrent_refresh_hits_store_once() {
        let company = Uuid::new_v4();
        let store = seeded_store(company).await.with_latency(Duration::from_millis(50));
        let state = AccountingState::new(company);

        let (first, second) = tokio::join!(state.refresh(&store), state.refresh(&store));

        assert_eq!(first.unwrap(), LoadOutcome::Loaded);
        assert_eq!(second.unwrap(), LoadOutcome::Skipped);
        assert_eq!(store.fetch_count(), 1);
        assert!(!state.is_loading());
    }

    #[tokio::test]
    async fn results_after_teardown_are_discarded() {
        let company = Uuid::new_v4();
        let store = Arc::new(seeded_store(company).await.with_latency(Duration::from_millis(50)));
        let state = Arc::new(AccountingState::new(company));

        let task = {
            let (state, store) = (state.clone(), store.clone());
            tokio::spawn(async move { state.refresh(store.as_ref()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.teardown();

        assert_eq!(task.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert!(state.transactions().is_empty());
    }

    #[tokio::test]
    async fn filter_change_marks_stale_until_refresh() {
        let company = Uuid::new_v4();
        let store = seeded_store(company).await;
        let state = AccountingState::new(company);
        state.refresh(&store).await.unwrap();

        state.set_filter(TransactionFilter {
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        });
        assert!(state.is_stale());
        assert_eq!(state.transactions().len(), 2);

        state.refresh(&store).await.unwrap();
        assert!(!state.is_stale());
        assert_eq!(state.transactions().len(), 1);
        assert_eq!(state.summary().total_income, Decimal::ZERO);
    }

    #[tokio::test]
    async fn local_mutations_recompute_summary() {
        let company = Uuid::new_v4();
        let state = AccountingState::new(company);

        let tx = new_tx(TransactionKind::Income, 30, TransactionStatus::Pending).into_transaction(company);
        let id = tx.id;
        state.upsert(tx.clone());
        assert_eq!(state.summary().pending_amount, Decimal::new(30, 0));

        let mut settled = tx;
        settled.status = TransactionStatus::Settled;
        state.upsert(settled);
        assert_eq!(state.transactions().len(), 1);
        assert_eq!(state.summary().pending_count, 0);

        assert!(state.remove(id));
        assert_eq!(state.summary(), AccountingSummary::default());
    }
}
