use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::database::store::{CompanyStore, StoreError};
use crate::subscription::plan::{LimitCheck, PlanLimits};
use crate::types::{CompanyId, ItemType};

/// Plan-tier gate in front of item creation
#[derive(Clone)]
pub struct SubscriptionLimiter {
    store: Arc<dyn CompanyStore>,
}

impl SubscriptionLimiter {
    pub fn new(store: Arc<dyn CompanyStore>) -> Self {
        Self { store }
    }

    /// Caps for the company's effective tier at `now`. A cancelled Pro plan
    /// keeps Pro caps only while `now` is before the end of the paid period.
    pub async fn get_plan_limits(&self, company_id: CompanyId, now: DateTime<Utc>) -> Result<PlanLimits, StoreError> {
        let subscription = self.store.get_subscription(company_id).await?;
        Ok(PlanLimits::for_tier(subscription.effective_tier(now)))
    }

    /// Checks the live count against the cap. Count and plan are fetched concurrently.
    pub async fn can_create_item(
        &self,
        company_id: CompanyId,
        item: ItemType,
        now: DateTime<Utc>,
    ) -> Result<LimitCheck, StoreError> {
        let (limits, current) = futures::try_join!(
            self.get_plan_limits(company_id, now),
            self.store.count_items(company_id, item)
        )?;

        let check = LimitCheck::evaluate(limits.limit_for(item), current);
        tracing::debug!(
            "Limit check for company {} on {}: {}/{:?} (tier {}) -> {}",
            company_id,
            item,
            current,
            check.limit,
            limits.tier,
            if check.allowed { "allowed" } else { "denied" }
        );
        Ok(check)
    }
}
