//! The analysis pipeline: orchestration, response validation, and the HTTP
//! handlers that front them.

pub mod handlers;
pub mod orchestrator;
pub mod validator;

use thiserror::Error;

use crate::extraction::DocumentParseError;
use crate::models::request::FrameworkError;
use crate::prompts::PromptError;
use crate::providers::{ProviderKind, SelectionError};

/// Terminal outcomes of one analysis run. `ProviderCallFailed` and
/// `ResponseValidationError` never surface here directly — they are absorbed
/// by provider fallback and only appear aggregated as `ProvidersExhausted`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("document parsing failed: {0}")]
    DocumentParse(#[from] DocumentParseError),

    #[error(transparent)]
    UnknownPromptVersion(#[from] PromptError),

    #[error("invalid position framework: {0}")]
    InvalidFramework(#[from] FrameworkError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("all {attempts} provider attempts failed; last ({last_provider}): {reason}")]
    ProvidersExhausted {
        attempts: usize,
        last_provider: ProviderKind,
        reason: String,
        /// Last raw model response, kept for the audit trail when the final
        /// failure was a validation failure.
        raw_response: Option<String>,
    },

    #[error("analysis deadline exceeded after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },
}

impl AnalysisError {
    /// Stable identifier recorded in the audit log and returned to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::DocumentParse(_) => "document_parse_error",
            AnalysisError::UnknownPromptVersion(_) => "unknown_prompt_version",
            AnalysisError::InvalidFramework(_) => "invalid_framework",
            AnalysisError::Selection(SelectionError::RequestedProviderUnavailable(_)) => {
                "requested_provider_unavailable"
            }
            AnalysisError::Selection(SelectionError::NoProviderConfigured) => {
                "no_provider_configured"
            }
            AnalysisError::ProvidersExhausted { .. } => "all_providers_failed",
            AnalysisError::Timeout { .. } => "analysis_timeout",
        }
    }
}
