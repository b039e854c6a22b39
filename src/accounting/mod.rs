// Accounting: fetch-boundary filters, the summary fold, and the client-side state container

pub mod filter;
pub mod state;
pub mod summary;

pub use filter::TransactionFilter;
pub use state::AccountingState;
pub use summary::{summarize, AccountingSummary};
