mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn catalog_lists_installable_modules() -> Result<()> {
    let app = common::spawn_app().await?;

    let body = app.get("/api/modules/catalog").send().await?.json::<Value>().await?;
    let slugs: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["slug"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(slugs, vec!["vehicles", "holidays", "maintenance", "suppliers"]);
    assert!(body["data"].as_array().unwrap().iter().all(|m| m["active"] == false));
    Ok(())
}

#[tokio::test]
async fn activation_is_limited_on_free_plan() -> Result<()> {
    let app = common::spawn_app().await?;

    let res = app.post("/api/modules/vehicles/activate").send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app.post("/api/modules/vehicles/activate").send().await?;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = app.post("/api/modules/holidays/activate").send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);

    let res = app.post("/api/modules/maintenance/activate").send().await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "PLAN_LIMIT_REACHED");
    assert_eq!(body["limit"], 2);

    let res = app.post("/api/modules/teleport/activate").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let stats = app.get("/api/modules/stats").send().await?.json::<Value>().await?;
    assert_eq!(stats["data"]["total_modules"], 2);
    assert_eq!(stats["data"]["by_category"]["operations"], 1);
    assert_eq!(stats["data"]["by_category"]["people"], 1);
    Ok(())
}

#[tokio::test]
async fn sidebar_follows_module_priority() -> Result<()> {
    let app = common::spawn_app().await?;

    // holidays (30) activated first, vehicles (20) still runs first
    app.post("/api/modules/holidays/activate").send().await?;
    app.post("/api/modules/vehicles/activate").send().await?;

    let body = app.get("/api/modules/sidebar").send().await?.json::<Value>().await?;
    let modules: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["module"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(modules, vec!["vehicles", "holidays"]);
    assert_eq!(body["data"][0]["route"], "/dashboard/vehicles");

    let widgets = app.get("/api/modules/dashboard").send().await?.json::<Value>().await?;
    assert_eq!(widgets["data"].as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn records_are_validated_and_defaulted() -> Result<()> {
    let app = common::spawn_app().await?;
    app.post("/api/modules/vehicles/activate").send().await?;

    let res = app
        .post("/api/modules/vehicles/records")
        .json(&json!({ "model": "Transit", "fuel": "steam" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = res.json::<Value>().await?;
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["field_errors"]["plate"].is_string());
    assert!(body["field_errors"]["fuel"].is_string());

    let res = app
        .post("/api/modules/vehicles/records")
        .json(&json!({ "plate": "1234-ABC", "next_inspection": "2026-11-30" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body = res.json::<Value>().await?;
    assert_eq!(body["data"]["record"]["data"]["fuel"], "diesel");
    assert_eq!(body["data"]["record"]["data"]["active"], true);

    let listed = app.get("/api/modules/vehicles/records").send().await?.json::<Value>().await?;
    assert_eq!(listed["data"].as_array().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn inactive_module_is_not_found() -> Result<()> {
    let app = common::spawn_app().await?;

    let res = app.get("/api/modules/vehicles").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    app.post("/api/modules/vehicles/activate").send().await?;
    let body = app.get("/api/modules/vehicles").send().await?.json::<Value>().await?;
    assert_eq!(body["data"]["icon"], "truck");

    let res = app.delete("/api/modules/vehicles").send().await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.get("/api/modules/vehicles/records").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let res = app.delete("/api/modules/vehicles").send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn modules_are_scoped_per_company() -> Result<()> {
    let app = common::spawn_app().await?;
    let (_, other_token) = app.add_company().await;

    app.post("/api/modules/vehicles/activate").send().await?;

    let body = app
        .client
        .get(app.url("/api/modules"))
        .bearer_auth(&other_token)
        .send()
        .await?
        .json::<Value>()
        .await?;
    assert!(body["data"]["modules"].as_array().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn overlapping_first_requests_both_see_active_module() -> Result<()> {
    use gestiogar_api::database::models::ModuleInstance;
    use gestiogar_api::modules::Catalog;
    use std::time::Duration;

    let app = common::spawn_app_with_latency(Duration::from_millis(200)).await?;
    let manifest = Catalog::builtin().get("vehicles").expect("vehicles in catalog");
    app.store
        .insert_module(ModuleInstance {
            id: uuid::Uuid::new_v4(),
            company_id: app.company_id,
            slug: "vehicles".into(),
            manifest: serde_json::to_value(manifest)?,
            config: json!({}),
            is_active: true,
            created_at: chrono::Utc::now(),
        })
        .await;

    let first = app.get("/api/modules/vehicles").send();
    let second = async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        app.get("/api/modules/vehicles").send().await
    };
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first?.status(), StatusCode::OK);
    let second = second?;
    assert_eq!(second.status(), StatusCode::OK);
    let body = second.json::<Value>().await?;
    assert_eq!(body["data"]["slug"], "vehicles");
    assert_eq!(app.store.fetch_count(), 1);
    Ok(())
}
