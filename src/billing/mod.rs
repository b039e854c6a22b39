//! Payment provider seam.
//!
//! The provider hosts checkout; this side only starts a subscription, reads its
//! status back and folds that status into the company's plan record.

pub mod paypal;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::database::models::{CompanySubscription, PlanTier, SubscriptionStatus};
use crate::types::CompanyId;

pub use paypal::PayPalClient;

#[derive(Debug, Error)]
pub enum BillingError {
    #[error("Billing is not configured: {0} is missing")]
    NotConfigured(&'static str),

    #[error("Invalid billing URL: {0}")]
    InvalidUrl(String),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Provider response had no approval link")]
    MissingApprovalLink,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Subscription states as the provider reports them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderStatus {
    ApprovalPending,
    Approved,
    Active,
    Suspended,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub company_id: CompanyId,
    pub return_url: Url,
    pub cancel_url: Url,
}

/// Where to send the user to approve, plus the provider's subscription id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub approval_url: String,
    pub subscription_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSubscription {
    pub id: String,
    pub status: ProviderStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// End of the current paid period
    pub next_billing_at: Option<DateTime<Utc>>,
    /// Company id echoed back from checkout, when the provider kept it
    pub custom_id: Option<String>,
}

#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_subscription(&self, request: &CheckoutRequest) -> Result<CheckoutSession, BillingError>;

    async fn get_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription, BillingError>;
}

/// Return and cancel URLs for the hosted checkout, rooted at the public base URL
pub fn checkout_urls(public_base_url: &str) -> Result<(Url, Url), BillingError> {
    let base = Url::parse(public_base_url).map_err(|e| BillingError::InvalidUrl(format!("{}: {}", public_base_url, e)))?;
    let join = |path: &str| base.join(path).map_err(|e| BillingError::InvalidUrl(e.to_string()));

    Ok((
        join("/dashboard/subscription?status=success")?,
        join("/dashboard/subscription?status=cancelled")?,
    ))
}

/// Folds the provider's view of a subscription into the stored plan record.
/// Pending checkouts only record the reference; the tier changes once the
/// provider reports the subscription active.
pub fn apply_provider_status(current: &CompanySubscription, remote: &ProviderSubscription) -> CompanySubscription {
    let mut next = current.clone();
    next.billing_reference = Some(remote.id.clone());

    match remote.status {
        ProviderStatus::ApprovalPending | ProviderStatus::Approved => {}
        ProviderStatus::Active => {
            next.plan = PlanTier::Pro;
            next.status = Some(SubscriptionStatus::Active);
            next.started_at = remote.started_at.or(current.started_at);
            next.ends_at = remote.next_billing_at;
        }
        ProviderStatus::Cancelled => {
            next.plan = PlanTier::Pro;
            next.status = Some(SubscriptionStatus::Cancelled);
            // paid period still runs to the last known billing date
            next.ends_at = remote.next_billing_at.or(current.ends_at);
        }
        ProviderStatus::Suspended | ProviderStatus::Expired => {
            next.status = Some(SubscriptionStatus::Expired);
        }
    }

    next
}
