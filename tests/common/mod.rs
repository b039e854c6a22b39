#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use gestiogar_api::auth::{generate_jwt, Claims};
use gestiogar_api::billing::{
    BillingError, BillingProvider, CheckoutRequest, CheckoutSession, ProviderStatus, ProviderSubscription,
};
use gestiogar_api::config::AppConfig;
use gestiogar_api::database::models::CompanySubscription;
use gestiogar_api::database::MemoryStore;
use gestiogar_api::{router, AppState};

/// Stands in for the payment provider; statuses are set by the test
#[derive(Default)]
pub struct FakeBilling {
    subscriptions: Mutex<HashMap<String, ProviderSubscription>>,
}

impl FakeBilling {
    pub fn set_status(&self, id: &str, status: ProviderStatus) {
        let mut subs = self.subscriptions.lock().unwrap();
        let entry = subs.get_mut(id).expect("unknown fake subscription");
        entry.status = status;
        if status == ProviderStatus::Active {
            let now = chrono::Utc::now();
            entry.started_at = Some(now);
            entry.next_billing_at = Some(now + chrono::Duration::days(30));
        }
    }
}

#[async_trait]
impl BillingProvider for FakeBilling {
    async fn create_subscription(&self, request: &CheckoutRequest) -> Result<CheckoutSession, BillingError> {
        let mut subs = self.subscriptions.lock().unwrap();
        let id = format!("I-FAKE{}", subs.len() + 1);
        subs.insert(
            id.clone(),
            ProviderSubscription {
                id: id.clone(),
                status: ProviderStatus::ApprovalPending,
                started_at: None,
                next_billing_at: None,
                custom_id: Some(request.company_id.to_string()),
            },
        );

        Ok(CheckoutSession {
            approval_url: format!("https://paypal.test/approve/{}?return={}", id, request.return_url),
            subscription_id: id,
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<ProviderSubscription, BillingError> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| BillingError::Api {
                status: 404,
                message: "RESOURCE_NOT_FOUND".into(),
            })
    }
}

pub struct TestApp {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub billing: Arc<FakeBilling>,
    pub config: AppConfig,
    pub company_id: Uuid,
    pub token: String,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token_for(&self, company_id: Uuid) -> String {
        let claims = Claims::new(Uuid::new_v4(), company_id, None, 1);
        generate_jwt(&claims, &self.config.security.jwt_secret).unwrap()
    }

    /// Registers another free-tier company and returns its id and token
    pub async fn add_company(&self) -> (Uuid, String) {
        let company_id = Uuid::new_v4();
        self.store.insert_company(CompanySubscription::free(company_id)).await;
        (company_id, self.token_for(company_id))
    }

    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.get(self.url(path)).bearer_auth(&self.token)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.post(self.url(path)).bearer_auth(&self.token)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client.delete(self.url(path)).bearer_auth(&self.token)
    }
}

pub async fn spawn_app() -> Result<TestApp> {
    spawn(true, MemoryStore::new()).await
}

pub async fn spawn_app_without_billing() -> Result<TestApp> {
    spawn(false, MemoryStore::new()).await
}

/// Store list fetches take `latency`, leaving room for overlapping requests
pub async fn spawn_app_with_latency(latency: Duration) -> Result<TestApp> {
    spawn(true, MemoryStore::new().with_latency(latency)).await
}

async fn spawn(with_billing: bool, store: MemoryStore) -> Result<TestApp> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("gestiogar_api=debug"))
        .with_test_writer()
        .try_init();

    let config = AppConfig::for_testing();
    let store = Arc::new(store);
    let billing = Arc::new(FakeBilling::default());

    let company_id = Uuid::new_v4();
    store.insert_company(CompanySubscription::free(company_id)).await;

    let provider = if with_billing {
        Some(billing.clone() as Arc<dyn BillingProvider>)
    } else {
        None
    };
    let app = router(AppState::new(config.clone(), store.clone(), provider));

    // Pick an unused port for isolation
    let port = portpicker::pick_unused_port().context("failed to pick free port")?;
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .context("failed to bind test listener")?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });

    let claims = Claims::new(Uuid::new_v4(), company_id, Some("owner@example.com".into()), 1);
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;

    Ok(TestApp {
        base_url: format!("http://127.0.0.1:{}", port),
        store,
        billing,
        config,
        company_id,
        token,
        client: reqwest::Client::new(),
    })
}
