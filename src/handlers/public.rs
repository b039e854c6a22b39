use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Instant;

use crate::app::AppState;
use crate::auth::validate_jwt;
use crate::middleware::auth::extract_jwt_from_headers;
use crate::session::SessionGuard;

/// GET / - service info
pub async fn root(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "name": "Gestiogar API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
        }
    }))
}

/// GET /health - store ping
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "success": true, "data": { "status": "ok", "database": "ok" } })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "SERVICE_UNAVAILABLE",
                    "message": "Database unreachable"
                })),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GuardQuery {
    pub route: String,
}

/// GET /api/session/guard?route= - what a page at `route` should do for this caller.
/// The session check is answered on the spot, so the guard never stays in `checking`.
pub async fn session_guard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GuardQuery>,
) -> impl IntoResponse {
    let now = Instant::now();
    let mut guard = SessionGuard::new(&state.config.session, &query.route, now);

    let authenticated = extract_jwt_from_headers(&headers)
        .ok()
        .map_or(false, |token| validate_jwt(&token, &state.config.security.jwt_secret).is_ok());
    let action = guard.resolve(authenticated, now);

    Json(json!({
        "success": true,
        "data": {
            "route": query.route,
            "state": guard.state().as_str(),
            "action": action,
        }
    }))
}
