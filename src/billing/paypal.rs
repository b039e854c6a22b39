use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::billing::{BillingError, BillingProvider, CheckoutRequest, CheckoutSession, ProviderStatus, ProviderSubscription};
use crate::config::BillingConfig;

/// Refresh the OAuth token this long before the provider says it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Debug, Default, Deserialize)]
struct BillingInfo {
    next_billing_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionResponse {
    id: String,
    status: ProviderStatus,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    billing_info: Option<BillingInfo>,
    #[serde(default)]
    custom_id: Option<String>,
    #[serde(default)]
    links: Vec<Link>,
}

impl SubscriptionResponse {
    fn approval_url(&self) -> Option<&str> {
        self.links.iter().find(|l| l.rel == "approve").map(|l| l.href.as_str())
    }

    fn into_subscription(self) -> ProviderSubscription {
        ProviderSubscription {
            id: self.id,
            status: self.status,
            started_at: self.start_time,
            next_billing_at: self.billing_info.and_then(|b| b.next_billing_time),
            custom_id: self.custom_id,
        }
    }
}

struct CachedToken {
    value: String,
    valid_until: Instant,
}

/// PayPal subscriptions API client (client-credentials OAuth)
pub struct PayPalClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    plan_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalClient {
    /// Fails with `NotConfigured` naming the first missing credential
    pub fn from_config(config: &BillingConfig) -> Result<Self, BillingError> {
        if let Some(missing) = config.missing_credential() {
            return Err(BillingError::NotConfigured(missing));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone().unwrap_or_default(),
            client_secret: config.client_secret.clone().unwrap_or_default(),
            plan_id: config.plan_id.clone().unwrap_or_default(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, BillingError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.valid_until {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!("Requesting PayPal access token");
        let resp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await?;
        let token: TokenResponse = check_response(resp).await?.json().await?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl BillingProvider for PayPalClient {
    async fn create_subscription(&self, request: &CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let token = self.access_token().await?;
        let body = json!({
            "plan_id": self.plan_id,
            "custom_id": request.company_id.to_string(),
            "application_context": {
                "brand_name": "Gestiogar",
                "user_action": "SUBSCRIBE_NOW",
                "return_url": request.return_url.as_str(),
                "cancel_url": request.cancel_url.as_str(),
            }
        });

        let resp = self
            .http
            .post(format!("{}/v1/billing/subscriptions", self.api_base))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let created: SubscriptionResponse = check_response(resp).await?.json().await?;

        let approval_url = created.approval_url().ok_or(BillingError::MissingApprovalLink)?.to_string();
        tracing::info!(
            "Created PayPal subscription {} for company {}",
            created.id,
            request.company_id
        );

        Ok(CheckoutSession {
            approval_url,
            subscription_id: created.id,
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription, BillingError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{}/v1/billing/subscriptions/{}", self.api_base, subscription_id))
            .bearer_auth(token)
            .send()
            .await?;
        let fetched: SubscriptionResponse = check_response(resp).await?.json().await?;
        Ok(fetched.into_subscription())
    }
}

/// Non-success status becomes `BillingError::Api` with the response body
async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, BillingError> {
    if !resp.status().is_success() {
        return Err(BillingError::Api {
            status: resp.status().as_u16(),
            message: resp.text().await.unwrap_or_default(),
        });
    }
    Ok(resp)
}
