use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::subscription::{LimitCheck, PlanLimits};
use crate::types::ItemType;

/// GET /api/limits - caps for the caller's effective tier
pub async fn plan_limits(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<PlanLimits> {
    let limits = state.limiter.get_plan_limits(user.company_id, Utc::now()).await?;
    Ok(ApiResponse::success(limits))
}

/// GET /api/limits/:item_type - may the caller create one more item of this kind
pub async fn can_create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(item_type): Path<String>,
) -> ApiResult<LimitCheck> {
    let item: ItemType = item_type.parse().map_err(ApiError::bad_request)?;
    let check = state.limiter.can_create_item(user.company_id, item, Utc::now()).await?;
    Ok(ApiResponse::success(check))
}

/// Fails with `PLAN_LIMIT_REACHED` when the company is at its cap for `item`
pub(crate) async fn enforce_limit(state: &AppState, user: &AuthUser, item: ItemType) -> Result<(), ApiError> {
    let check = state.limiter.can_create_item(user.company_id, item, Utc::now()).await?;
    match check.limit {
        Some(limit) if !check.allowed => Err(ApiError::LimitReached {
            item,
            limit,
            current: check.current,
        }),
        _ => Ok(()),
    }
}
