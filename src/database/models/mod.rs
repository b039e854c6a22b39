pub mod module;
pub mod subscription;
pub mod transaction;

pub use module::{ModuleInstance, ModuleRecord};
pub use subscription::{CompanySubscription, PlanTier, SubscriptionStatus};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
