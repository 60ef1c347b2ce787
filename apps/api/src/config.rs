use std::time::Duration;

use anyhow::{Context, Result};

use crate::providers::ProviderKind;

/// Application configuration loaded from environment variables once at
/// startup and treated as immutable for the process lifetime. Vendor API
/// keys are optional — a missing key only removes that vendor from the
/// configured set.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub openai_model: String,
    pub anthropic_model: String,
    pub gemini_model: String,
    /// Default vendor consulted when a request asks for `auto`.
    pub default_provider: Option<ProviderKind>,
    /// Per-provider-call timeout.
    pub provider_timeout: Duration,
    /// Extra same-vendor attempts on transport failure before fallback.
    pub provider_retries: u32,
    /// Deadline for one whole analysis run, fallback included.
    pub analysis_deadline: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            gemini_api_key: optional_env("GEMINI_API_KEY"),
            openai_model: std::env::var("OPENAI_MODEL")
                .unwrap_or_else(|_| "gpt-4-turbo-preview".to_string()),
            anthropic_model: std::env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-5-sonnet-20241022".to_string()),
            gemini_model: std::env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-1.5-pro".to_string()),
            // "auto" or an unknown vendor name falls through to priority order.
            default_provider: optional_env("DEFAULT_LLM_PROVIDER")
                .and_then(|v| ProviderKind::parse(&v)),
            provider_timeout: Duration::from_secs(parse_env("PROVIDER_TIMEOUT_SECS", 120)?),
            provider_retries: parse_env("PROVIDER_RETRIES", 0)?,
            analysis_deadline: Duration::from_secs(parse_env("ANALYSIS_DEADLINE_SECS", 300)?),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("'{key}' must be a valid number")),
        Err(_) => Ok(default),
    }
}
