mod analysis;
mod audit;
mod config;
mod db;
mod errors;
mod extraction;
mod models;
mod prompts;
mod providers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::audit::AuditRecorder;
use crate::config::Config;
use crate::db::create_pool;
use crate::providers::ProviderRegistry;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Sifter API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL and the audit schema
    let pool = create_pool(&config.database_url).await?;
    let audit = AuditRecorder::new(pool);
    audit.init_schema().await?;

    // Build the provider registry; a vendor without credentials is simply
    // left out of the configured set.
    let providers = Arc::new(ProviderRegistry::from_config(&config));
    info!("LLM provider status:");
    for (vendor, status) in providers.health() {
        info!("  - {vendor}: {status}");
    }
    if !providers.has_any() {
        warn!("no LLM provider configured; analysis requests will fail until a vendor API key is set");
    }

    // Build app state
    let state = AppState {
        providers,
        audit: Arc::new(audit),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()), // TODO: tighten CORS in production
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
