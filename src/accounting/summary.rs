use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::database::models::{Transaction, TransactionKind};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub total_taxes: Decimal,
    pub net_cash_flow: Decimal,
    pub pending_count: usize,
    pub pending_amount: Decimal,
}

/// Pure fold over an already-filtered transaction list
pub fn summarize(transactions: &[Transaction]) -> AccountingSummary {
    let mut summary = transactions.iter().fold(AccountingSummary::default(), |mut acc, tx| {
        match tx.kind {
            TransactionKind::Income => acc.total_income += tx.amount,
            TransactionKind::Expense => acc.total_expenses += tx.amount,
        }
        acc.total_taxes += tx.tax_amount;
        if tx.is_pending() {
            acc.pending_count += 1;
            acc.pending_amount += tx.amount;
        }
        acc
    });

    summary.net_cash_flow = summary.total_income - summary.total_expenses;
    summary
}
