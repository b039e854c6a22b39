pub mod limiter;
pub mod plan;

pub use limiter::SubscriptionLimiter;
pub use plan::{LimitCheck, PlanLimits};
