use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::app::AppState;
use crate::database::models::{ModuleInstance, ModuleRecord};
use crate::error::ApiError;
use crate::handlers::limits::enforce_limit;
use crate::hooks::{DashboardWidget, HookError, HookEvent, RecordSave, SavedRecord, SidebarItem};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::modules::{validate_record, Catalog, InvalidModule, ModuleManifest, RegistrySnapshot, RegistryStats};
use crate::types::ItemType;

/// The company's current registry snapshot, loaded on first use. One request
/// reads manifests and hooks from the same snapshot.
async fn snapshot_for(state: &AppState, user: &AuthUser) -> Result<Arc<RegistrySnapshot>, ApiError> {
    let registry = state.registries.for_company(user.company_id).await;
    registry.ensure_loaded(state.store.as_ref()).await?;
    Ok(registry.snapshot())
}

/// Reload after a write; waits for any load already in flight
async fn reload_registry(state: &AppState, user: &AuthUser) -> Result<(), ApiError> {
    let registry = state.registries.for_company(user.company_id).await;
    registry.load_manifests(state.store.as_ref()).await?;
    Ok(())
}

/// Manifest of an active module, or the reason it cannot be used
fn active_manifest(snapshot: &RegistrySnapshot, slug: &str) -> Result<Arc<ModuleManifest>, ApiError> {
    if let Some(manifest) = snapshot.get(slug) {
        return Ok(manifest.clone());
    }

    match snapshot.invalid().iter().find(|m| m.slug == slug) {
        Some(invalid) => Err(ApiError::InvalidModule(format!(
            "Module '{}' has an invalid configuration: {}",
            slug, invalid.reason
        ))),
        None => Err(ApiError::not_found(format!("Module '{}' not found", slug))),
    }
}

#[derive(Debug, Serialize)]
pub struct ModuleList {
    pub modules: Vec<ModuleManifest>,
    pub invalid: Vec<InvalidModule>,
}

/// GET /api/modules
pub async fn list(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<ModuleList> {
    let snapshot = snapshot_for(&state, &user).await?;

    Ok(ApiResponse::success(ModuleList {
        modules: snapshot.manifests().iter().map(|m| m.as_ref().clone()).collect(),
        invalid: snapshot.invalid().to_vec(),
    }))
}

/// GET /api/modules/stats
pub async fn stats(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<RegistryStats> {
    let snapshot = snapshot_for(&state, &user).await?;
    Ok(ApiResponse::success(snapshot.stats()))
}

#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub manifest: ModuleManifest,
    pub active: bool,
}

/// GET /api/modules/catalog - installable modules, flagged when already active
pub async fn catalog(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<CatalogEntry>> {
    let snapshot = snapshot_for(&state, &user).await?;
    let entries = Catalog::builtin()
        .all()
        .iter()
        .map(|manifest| CatalogEntry {
            active: snapshot.get(&manifest.slug).is_some(),
            manifest: manifest.clone(),
        })
        .collect();

    Ok(ApiResponse::success(entries))
}

/// GET /api/modules/sidebar - sidebar entries contributed through hooks
pub async fn sidebar(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<SidebarItem>> {
    let snapshot = snapshot_for(&state, &user).await?;
    let report = snapshot.hooks().dispatch(HookEvent::SidebarItems(Vec::new())).await;
    Ok(ApiResponse::success(report.result.into_sidebar_items()))
}

/// GET /api/modules/dashboard - dashboard widgets contributed through hooks
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Vec<DashboardWidget>> {
    let snapshot = snapshot_for(&state, &user).await?;
    let report = snapshot.hooks().dispatch(HookEvent::DashboardWidgets(Vec::new())).await;
    Ok(ApiResponse::success(report.result.into_dashboard_widgets()))
}

/// GET /api/modules/:slug
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> ApiResult<ModuleManifest> {
    let snapshot = snapshot_for(&state, &user).await?;
    let manifest = active_manifest(&snapshot, &slug)?;
    Ok(ApiResponse::success(manifest.as_ref().clone()))
}

/// POST /api/modules/:slug/activate - install a catalog module, counted against the plan
pub async fn activate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> ApiResult<ModuleInstance> {
    let manifest = Catalog::builtin()
        .get(&slug)
        .ok_or_else(|| ApiError::not_found(format!("Module '{}' is not in the catalog", slug)))?;

    enforce_limit(&state, &user, ItemType::Modules).await?;

    let stored = serde_json::to_value(manifest)
        .map_err(|e| ApiError::internal_server_error(format!("Failed to store manifest: {}", e)))?;
    let instance = state.store.activate_module(user.company_id, &slug, &stored).await?;
    reload_registry(&state, &user).await?;

    tracing::info!("Company {} activated module '{}'", user.company_id, slug);
    Ok(ApiResponse::created(instance))
}

/// DELETE /api/modules/:slug
pub async fn deactivate(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> ApiResult<Value> {
    if !state.store.deactivate_module(user.company_id, &slug).await? {
        return Err(ApiError::not_found(format!("Module '{}' is not active", slug)));
    }
    reload_registry(&state, &user).await?;

    tracing::info!("Company {} deactivated module '{}'", user.company_id, slug);
    Ok(ApiResponse::success(json!({ "slug": slug, "active": false })))
}

/// GET /api/modules/:slug/records
pub async fn records_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(slug): Path<String>,
) -> ApiResult<Vec<ModuleRecord>> {
    let snapshot = snapshot_for(&state, &user).await?;
    active_manifest(&snapshot, &slug)?;

    let records = state.store.list_module_records(user.company_id, &slug).await?;
    Ok(ApiResponse::success(records))
}

#[derive(Debug, Serialize)]
pub struct CreatedRecord {
    pub record: ModuleRecord,
    pub notices: Vec<String>,
}

/// POST /api/modules/:slug/records - validated against the manifest after
/// `before_record_save` handlers ran. A handler answering with a validation
/// error vetoes the save; any other handler failure is skipped.
pub async fn records_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(slug): Path<String>,
    Json(body): Json<Map<String, Value>>,
) -> ApiResult<CreatedRecord> {
    let snapshot = snapshot_for(&state, &user).await?;
    let manifest = active_manifest(&snapshot, &slug)?;

    let before = snapshot
        .hooks()
        .dispatch(HookEvent::BeforeRecordSave(RecordSave {
            company_id: user.company_id,
            module: slug.clone(),
            record: body,
        }))
        .await;
    if let Some(veto) = before
        .failures
        .iter()
        .find(|f| matches!(f.error, HookError::Validation(_)))
    {
        return Err(veto.error.clone().into());
    }

    let record = match before.result {
        HookEvent::BeforeRecordSave(save) => save.record,
        _ => return Err(ApiError::internal_server_error("Record hook returned an unexpected payload")),
    };

    validate_record(&manifest, &record)
        .map_err(|field_errors| ApiError::validation_error("Record does not match the module fields", field_errors))?;

    let saved = state.store.insert_module_record(user.company_id, &slug, &record).await?;

    let after = snapshot
        .hooks()
        .dispatch(HookEvent::AfterRecordSave(SavedRecord {
            company_id: user.company_id,
            module: slug,
            record_id: saved.id,
            record: saved.data.clone(),
            notices: Vec::new(),
        }))
        .await;
    let notices = match after.result {
        HookEvent::AfterRecordSave(done) => done.notices,
        _ => Vec::new(),
    };

    Ok(ApiResponse::created(CreatedRecord { record: saved, notices }))
}
