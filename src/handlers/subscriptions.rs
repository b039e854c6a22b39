use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::billing::{apply_provider_status, checkout_urls, BillingProvider, CheckoutRequest, CheckoutSession};
use crate::database::models::{CompanySubscription, SubscriptionStatus};
use crate::error::ApiError;
use crate::middleware::AuthUser;
use crate::types::CompanyId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRequest {
    pub company_id: CompanyId,
}

/// Shape returned by the status and sync endpoints
#[derive(Debug, Serialize)]
pub struct SubscriptionStatusBody {
    #[serde(rename = "isActive")]
    pub is_active: bool,
    pub subscription_status: Option<SubscriptionStatus>,
    pub subscription_started_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "hasPayPalSubscriptionId")]
    pub has_paypal_subscription_id: bool,
}

impl SubscriptionStatusBody {
    pub fn from_record(subscription: &CompanySubscription, now: DateTime<Utc>) -> Self {
        Self {
            is_active: subscription.has_pro_access(now),
            subscription_status: subscription.status,
            subscription_started_at: subscription.started_at,
            subscription_ends_at: subscription.ends_at,
            has_paypal_subscription_id: subscription.billing_reference.is_some(),
        }
    }
}

/// Provider handle, or the configuration error naming what is missing
fn billing_provider(state: &AppState) -> Result<&Arc<dyn BillingProvider>, ApiError> {
    state.billing.as_ref().ok_or_else(|| {
        let missing = state.config.billing.missing_credential().unwrap_or("billing provider");
        tracing::error!("Billing endpoint called without {}", missing);
        ApiError::BillingNotConfigured(format!("Billing is not configured: {} is missing", missing))
    })
}

/// POST /api/subscriptions/create - start a hosted checkout for the company
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CompanyRequest>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let company_id = user.ensure_company(body.company_id)?;
    let provider = billing_provider(&state)?;
    let base_url = state.config.billing.public_base_url.as_deref().ok_or_else(|| {
        tracing::error!("Billing endpoint called without PUBLIC_BASE_URL");
        ApiError::BillingNotConfigured("Billing is not configured: PUBLIC_BASE_URL is missing".to_string())
    })?;

    let (return_url, cancel_url) = checkout_urls(base_url)?;
    let current = state.store.get_subscription(company_id).await?;

    let session = provider
        .create_subscription(&CheckoutRequest {
            company_id,
            return_url,
            cancel_url,
        })
        .await?;

    let mut updated = current;
    updated.billing_reference = Some(session.subscription_id.clone());
    state.store.update_subscription(&updated).await?;

    tracing::info!("Checkout started for company {} ({})", company_id, session.subscription_id);
    Ok(Json(session))
}

/// GET /api/subscriptions/status?companyId=
pub async fn status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<CompanyRequest>,
) -> Result<Json<SubscriptionStatusBody>, ApiError> {
    let company_id = user.ensure_company(query.company_id)?;
    let subscription = state.store.get_subscription(company_id).await?;
    Ok(Json(SubscriptionStatusBody::from_record(&subscription, Utc::now())))
}

/// POST /api/subscriptions/sync - pull the provider's view into the stored record
pub async fn sync(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CompanyRequest>,
) -> Result<Json<SubscriptionStatusBody>, ApiError> {
    let company_id = user.ensure_company(body.company_id)?;
    let provider = billing_provider(&state)?;

    let current = state.store.get_subscription(company_id).await?;
    let reference = current
        .billing_reference
        .clone()
        .ok_or_else(|| ApiError::not_found("No billing subscription on record"))?;

    let remote = provider.get_subscription(&reference).await?;
    let updated = apply_provider_status(&current, &remote);
    if updated != current {
        state.store.update_subscription(&updated).await?;
        tracing::info!("Subscription of company {} synced to {:?}", company_id, remote.status);
    }

    Ok(Json(SubscriptionStatusBody::from_record(&updated, Utc::now())))
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event_type: String,
    #[serde(default)]
    pub resource: Value,
}

/// POST /api/subscriptions/webhook - provider notification.
///
/// Only the subscription id is taken from the payload; the state itself is
/// fetched back from the provider. Unknown subscriptions are acknowledged so the
/// provider stops retrying.
pub async fn webhook(State(state): State<AppState>, Json(event): Json<WebhookEvent>) -> Result<Json<Value>, ApiError> {
    if !event.event_type.starts_with("BILLING.SUBSCRIPTION.") {
        tracing::debug!("Ignoring webhook event {}", event.event_type);
        return Ok(Json(json!({ "received": true, "applied": false })));
    }

    let provider = billing_provider(&state)?;
    let subscription_id = event
        .resource
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::bad_request("Webhook resource has no subscription id"))?;

    let remote = provider.get_subscription(subscription_id).await?;

    let company_id = match state.store.find_company_by_billing_reference(&remote.id).await? {
        Some(id) => Some(id),
        None => remote.custom_id.as_deref().and_then(|c| c.parse::<CompanyId>().ok()),
    };
    let Some(company_id) = company_id else {
        tracing::warn!("Webhook {} for unknown subscription {}", event.event_type, remote.id);
        return Ok(Json(json!({ "received": true, "applied": false })));
    };

    let current = state.store.get_subscription(company_id).await?;
    let updated = apply_provider_status(&current, &remote);
    state.store.update_subscription(&updated).await?;

    tracing::info!(
        "Webhook {} applied to company {}: {:?}",
        event.event_type,
        company_id,
        remote.status
    );
    Ok(Json(json!({ "received": true, "applied": true })))
}
