use serde::Serialize;
use std::collections::BTreeMap;

use crate::database::models::PlanTier;
use crate::types::ItemType;

/// Free tier caps; `None` means unlimited
fn free_cap(item: ItemType) -> Option<u32> {
    match item {
        ItemType::Clients => Some(10),
        ItemType::Employees => Some(3),
        ItemType::Vehicles => Some(2),
        ItemType::Holidays => Some(20),
        ItemType::Transactions => Some(50),
        ItemType::Modules => Some(2),
        ItemType::Invoices => Some(10),
    }
}

/// Per item kind caps for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanLimits {
    pub tier: PlanTier,
    pub limits: BTreeMap<ItemType, Option<u32>>,
}

impl PlanLimits {
    pub fn for_tier(tier: PlanTier) -> Self {
        let limits = ItemType::ALL
            .into_iter()
            .map(|item| {
                let cap = match tier {
                    PlanTier::Free => free_cap(item),
                    PlanTier::Pro => None,
                };
                (item, cap)
            })
            .collect();

        Self { tier, limits }
    }

    pub fn limit_for(&self, item: ItemType) -> Option<u32> {
        self.limits.get(&item).copied().flatten()
    }
}

/// Answer to "may this company create one more item of this kind"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimitCheck {
    pub allowed: bool,
    pub limit: Option<u32>,
    pub current: i64,
}

impl LimitCheck {
    pub fn evaluate(limit: Option<u32>, current: i64) -> Self {
        let allowed = match limit {
            None => true,
            Some(limit) => current < i64::from(limit),
        };
        Self { allowed, limit, current }
    }

    /// Items left before the cap, `None` when unlimited
    pub fn remaining(&self) -> Option<i64> {
        self.limit.map(|limit| (i64::from(limit) - self.current).max(0))
    }
}
