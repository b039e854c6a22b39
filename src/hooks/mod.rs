// Module hook system: named extension points that module handlers subscribe to.
// Dispatch runs handlers in (priority, registration) order as a pipeline.

pub mod declarative;
pub mod dispatcher;
pub mod error;
pub mod traits;

pub use declarative::handlers_for_manifest;
pub use dispatcher::{DispatchReport, HookDispatcher, HookFailure, Registration, SubscriptionId};
pub use error::HookError;
pub use traits::*;
