use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::models::{Transaction, TransactionKind, TransactionStatus};

/// Transaction list filter. Applied by the store when fetching, never by the
/// summary calculator. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default, rename = "type")]
    pub kind: Option<TransactionKind>,
    #[serde(default)]
    pub status: Option<TransactionStatus>,
    #[serde(default)]
    pub search: Option<String>,
}

impl TransactionFilter {
    /// Trimmed search text, `None` when blank
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// In-process evaluation, case-insensitive on description and category
    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.from.map_or(false, |from| tx.occurred_at < from) {
            return false;
        }
        if self.to.map_or(false, |to| tx.occurred_at > to) {
            return false;
        }
        if self.kind.map_or(false, |kind| tx.kind != kind) {
            return false;
        }
        if self.status.map_or(false, |status| tx.status != status) {
            return false;
        }

        match self.search_term() {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                tx.description.to_lowercase().contains(&term)
                    || tx
                        .category
                        .as_deref()
                        .map_or(false, |c| c.to_lowercase().contains(&term))
            }
        }
    }
}
