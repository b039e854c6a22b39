use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use gestiogar_api::auth::{generate_jwt, Claims};
use gestiogar_api::billing::{BillingProvider, PayPalClient};
use gestiogar_api::config::AppConfig;
use gestiogar_api::database::models::CompanySubscription;
use gestiogar_api::database::{CompanyStore, Database, MemoryStore, PgStore};
use gestiogar_api::{router, AppState};

#[derive(Parser)]
#[command(name = "gestiogar")]
#[command(about = "Gestiogar API server")]
#[command(version)]
struct Args {
    #[arg(long, env = "GESTIOGAR_PORT", help = "Port to listen on (defaults to config)")]
    port: Option<u16>,

    #[arg(long, help = "Run against an in-memory store seeded with one demo company")]
    memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, PAYPAL_*, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gestiogar_api=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::from_env();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    config.validate(args.memory)?;
    tracing::info!("Starting Gestiogar API in {:?} mode", config.environment);

    let store: Arc<dyn CompanyStore> = if args.memory {
        let store = MemoryStore::new();
        seed_demo_company(&store, &config).await?;
        Arc::new(store)
    } else {
        let database = Database::connect(&config.database).await?;
        Arc::new(PgStore::new(database))
    };

    let billing: Option<Arc<dyn BillingProvider>> = match PayPalClient::from_config(&config.billing) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!("Billing endpoints disabled: {}", e);
            None
        }
    };

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let app = router(AppState::new(config, store, billing));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Gestiogar API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Creates a free-tier company and logs a token for it, for local runs without Postgres
async fn seed_demo_company(store: &MemoryStore, config: &AppConfig) -> anyhow::Result<()> {
    let company_id = Uuid::new_v4();
    store.insert_company(CompanySubscription::free(company_id)).await;

    let claims = Claims::new(
        Uuid::new_v4(),
        company_id,
        Some("demo@gestiogar.local".to_string()),
        config.security.jwt_expiry_hours,
    );
    let token = generate_jwt(&claims, &config.security.jwt_secret)?;
    tracing::info!("In-memory store seeded with company {}", company_id);
    tracing::info!("Demo token: {}", token);
    Ok(())
}
