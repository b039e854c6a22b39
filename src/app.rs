use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::billing::BillingProvider;
use crate::config::AppConfig;
use crate::database::store::CompanyStore;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::modules::RegistryCache;
use crate::subscription::SubscriptionLimiter;

/// Everything a handler needs, built once at startup and cloned per request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CompanyStore>,
    /// `None` when billing credentials are missing; only billing endpoints care
    pub billing: Option<Arc<dyn BillingProvider>>,
    pub registries: Arc<RegistryCache>,
    pub limiter: SubscriptionLimiter,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn CompanyStore>,
        billing: Option<Arc<dyn BillingProvider>>,
    ) -> Self {
        let registries = Arc::new(RegistryCache::new(config.hooks.handler_timeout()));
        let limiter = SubscriptionLimiter::new(store.clone());

        Self {
            config: Arc::new(config),
            store,
            billing,
            registries,
            limiter,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::public::root))
        .route("/health", get(handlers::public::health))
        .route("/api/session/guard", get(handlers::public::session_guard))
        // Called by the payment provider, not by users
        .route("/api/subscriptions/webhook", post(handlers::subscriptions::webhook))
        // Protected API
        .merge(protected_routes(state.clone()))
        // Global middleware
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use handlers::{accounting, limits, modules, subscriptions};

    Router::new()
        // Subscription and billing
        .route("/api/subscriptions/create", post(subscriptions::create))
        .route("/api/subscriptions/status", get(subscriptions::status))
        .route("/api/subscriptions/sync", post(subscriptions::sync))
        // Plan limits
        .route("/api/limits", get(limits::plan_limits))
        .route("/api/limits/:item_type", get(limits::can_create))
        // Modules
        .route("/api/modules", get(modules::list))
        .route("/api/modules/stats", get(modules::stats))
        .route("/api/modules/catalog", get(modules::catalog))
        .route("/api/modules/sidebar", get(modules::sidebar))
        .route("/api/modules/dashboard", get(modules::dashboard))
        .route("/api/modules/:slug", get(modules::show).delete(modules::deactivate))
        .route("/api/modules/:slug/activate", post(modules::activate))
        .route(
            "/api/modules/:slug/records",
            get(modules::records_list).post(modules::records_create),
        )
        // Accounting
        .route(
            "/api/accounting/transactions",
            get(accounting::transactions_list).post(accounting::transactions_create),
        )
        .route("/api/accounting/transactions/:id", delete(accounting::transactions_delete))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.is_production() && config.security.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
