use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

use crate::types::CompanyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
    Expired,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
        }
    }
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
            SubscriptionStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            other => Err(format!("unknown plan tier '{}'", other)),
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            // the billing provider spells it the American way
            "cancelled" | "canceled" => Ok(SubscriptionStatus::Cancelled),
            "expired" => Ok(SubscriptionStatus::Expired),
            other => Err(format!("unknown subscription status '{}'", other)),
        }
    }
}

/// Per-company plan record. Written only by the billing flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanySubscription {
    pub company_id: CompanyId,
    pub plan: PlanTier,
    pub status: Option<SubscriptionStatus>,
    pub started_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    /// External subscription id at the payment provider
    pub billing_reference: Option<String>,
}

impl CompanySubscription {
    /// A company that never subscribed
    pub fn free(company_id: CompanyId) -> Self {
        Self {
            company_id,
            plan: PlanTier::Free,
            status: None,
            started_at: None,
            ends_at: None,
            billing_reference: None,
        }
    }

    /// Pro access holds while the subscription is active, or after a cancellation
    /// until the paid period ends. `now` must be strictly before `ends_at`.
    pub fn has_pro_access(&self, now: DateTime<Utc>) -> bool {
        if self.plan != PlanTier::Pro {
            return false;
        }

        match self.status {
            Some(SubscriptionStatus::Active) => true,
            Some(SubscriptionStatus::Cancelled) => self.ends_at.map_or(false, |ends| now < ends),
            Some(SubscriptionStatus::Expired) | None => false,
        }
    }

    /// Tier used for limit purposes at `now`
    pub fn effective_tier(&self, now: DateTime<Utc>) -> PlanTier {
        if self.has_pro_access(now) {
            PlanTier::Pro
        } else {
            PlanTier::Free
        }
    }
}

/// Raw `companies` row as stored in Postgres
#[derive(Debug, Clone, FromRow)]
pub struct CompanySubscriptionRow {
    pub id: CompanyId,
    pub plan: Option<String>,
    pub subscription_status: Option<String>,
    pub subscription_started_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub paypal_subscription_id: Option<String>,
}

impl From<CompanySubscriptionRow> for CompanySubscription {
    fn from(row: CompanySubscriptionRow) -> Self {
        let plan = row
            .plan
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(PlanTier::Free);

        let status = row.subscription_status.as_deref().and_then(|s| match s.parse() {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::warn!("Ignoring subscription status on company {}: {}", row.id, e);
                None
            }
        });

        Self {
            company_id: row.id,
            plan,
            status,
            started_at: row.subscription_started_at,
            ends_at: row.subscription_ends_at,
            billing_reference: row.paypal_subscription_id.filter(|r| !r.is_empty()),
        }
    }
}
