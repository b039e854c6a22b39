use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;

use crate::accounting::{AccountingState, AccountingSummary, TransactionFilter};
use crate::app::AppState;
use crate::database::models::{NewTransaction, Transaction};
use crate::error::ApiError;
use crate::handlers::limits::enforce_limit;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::types::ItemType;

#[derive(Debug, Serialize)]
pub struct TransactionList {
    pub filter: TransactionFilter,
    pub transactions: Vec<Transaction>,
    pub summary: AccountingSummary,
}

/// GET /api/accounting/transactions?from=&to=&type=&status=&search=
///
/// Each request builds its own view, so its in-flight guard and liveness flag
/// never see a second caller here. The view only contributes the filter fetch
/// and the summary fold; long-lived holders get the single-flight behaviour.
pub async fn transactions_list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<TransactionFilter>,
) -> ApiResult<TransactionList> {
    let view = AccountingState::new(user.company_id);
    view.set_filter(filter);
    view.refresh(state.store.as_ref()).await?;

    Ok(ApiResponse::success(TransactionList {
        filter: view.filter(),
        transactions: view.transactions(),
        summary: view.summary(),
    }))
}

/// POST /api/accounting/transactions - counted against the plan
pub async fn transactions_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewTransaction>,
) -> ApiResult<Transaction> {
    let errors = body.validate();
    if !errors.is_empty() {
        let field_errors: HashMap<String, String> =
            errors.into_iter().map(|(field, message)| (field.to_string(), message)).collect();
        return Err(ApiError::validation_error("Invalid transaction", field_errors));
    }

    enforce_limit(&state, &user, ItemType::Transactions).await?;

    let created = state.store.insert_transaction(user.company_id, body).await?;
    tracing::debug!("Company {} recorded transaction {}", user.company_id, created.id);
    Ok(ApiResponse::created(created))
}

/// DELETE /api/accounting/transactions/:id
pub async fn transactions_delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    if !state.store.delete_transaction(user.company_id, id).await? {
        return Err(ApiError::not_found(format!("Transaction {} not found", id)));
    }
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}
