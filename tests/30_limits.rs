mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use gestiogar_api::database::models::{CompanySubscription, PlanTier, SubscriptionStatus};
use gestiogar_api::types::ItemType;

#[tokio::test]
async fn free_tier_limits_are_listed() -> Result<()> {
    let app = common::spawn_app().await?;

    let body = app.get("/api/limits").send().await?.json::<Value>().await?;
    assert_eq!(body["data"]["tier"], "free");
    assert_eq!(body["data"]["limits"]["vehicles"], 2);
    assert_eq!(body["data"]["limits"]["transactions"], 50);
    Ok(())
}

#[tokio::test]
async fn at_cap_is_denied() -> Result<()> {
    let app = common::spawn_app().await?;
    app.store.set_item_count(app.company_id, ItemType::Vehicles, 2).await;
    app.store.set_item_count(app.company_id, ItemType::Clients, 9).await;

    let vehicles = app.get("/api/limits/vehicles").send().await?.json::<Value>().await?;
    assert_eq!(vehicles["data"]["allowed"], false);
    assert_eq!(vehicles["data"]["limit"], 2);
    assert_eq!(vehicles["data"]["current"], 2);

    let clients = app.get("/api/limits/clients").send().await?.json::<Value>().await?;
    assert_eq!(clients["data"]["allowed"], true);
    Ok(())
}

#[tokio::test]
async fn unknown_item_type_is_bad_request() -> Result<()> {
    let app = common::spawn_app().await?;
    let res = app.get("/api/limits/spaceships").send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

async fn pro_company(app: &common::TestApp, status: SubscriptionStatus, ends_in: Duration) -> String {
    let company_id = Uuid::new_v4();
    app.store
        .insert_company(CompanySubscription {
            plan: PlanTier::Pro,
            status: Some(status),
            started_at: Some(Utc::now() - Duration::days(20)),
            ends_at: Some(Utc::now() + ends_in),
            billing_reference: Some(format!("I-{}", company_id.simple())),
            ..CompanySubscription::free(company_id)
        })
        .await;
    app.store.set_item_count(company_id, ItemType::Vehicles, 40).await;
    app.token_for(company_id)
}

#[tokio::test]
async fn cancelled_pro_is_unlimited_until_it_lapses() -> Result<()> {
    let app = common::spawn_app().await?;

    let current = pro_company(&app, SubscriptionStatus::Cancelled, Duration::days(1)).await;
    let body = app
        .client
        .get(app.url("/api/limits/vehicles"))
        .bearer_auth(&current)
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["data"]["allowed"], true);
    assert!(body["data"]["limit"].is_null());

    let lapsed = pro_company(&app, SubscriptionStatus::Cancelled, Duration::days(-1)).await;
    let body = app
        .client
        .get(app.url("/api/limits/vehicles"))
        .bearer_auth(&lapsed)
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert_eq!(body["data"]["allowed"], false);
    assert_eq!(body["data"]["limit"], 2);
    Ok(())
}
