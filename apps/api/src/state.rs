use std::sync::Arc;

use crate::audit::AuditRecorder;
use crate::config::Config;
use crate::providers::ProviderRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Configured LLM providers in priority order, built once at startup.
    pub providers: Arc<ProviderRegistry>,
    /// Append-only audit ledger over the Postgres pool.
    pub audit: Arc<AuditRecorder>,
    pub config: Config,
}
