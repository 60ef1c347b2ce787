//! Provider Abstraction & Selector.
//!
//! Each vendor exposes exactly one capability — `submit` — behind the
//! `LlmProvider` trait; after selection no call site branches on vendor
//! identity. The vendor set is a closed enum so health reporting can
//! enumerate it exhaustively. Retry and fallback live in the orchestrator,
//! never in this layer.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::request::{AnalysisDepth, ProviderChoice};
use crate::prompts::AnalysisPrompt;

use anthropic::AnthropicProvider;
use gemini::GeminiProvider;
use openai::OpenAiProvider;

/// Sampling temperature shared by all vendors.
pub(crate) const TEMPERATURE: f32 = 0.3;

/// Per-call token budget by requested depth.
pub(crate) fn max_tokens_for(depth: AnalysisDepth) -> u32 {
    match depth {
        AnalysisDepth::Quick => 2048,
        AnalysisDepth::Detailed => 4096,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Openai,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// Fixed fallback priority order for `auto` selection.
    pub const ALL: [ProviderKind; 3] = [
        ProviderKind::Openai,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Openai => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "openai" => Some(ProviderKind::Openai),
            "anthropic" => Some(ProviderKind::Anthropic),
            "gemini" => Some(ProviderKind::Gemini),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The uniform result of one provider call.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model: String,
    pub latency_ms: u64,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials could not be resolved at construction time.
    #[error("provider {provider} is not configured")]
    Unavailable { provider: ProviderKind },

    /// Transport failure, timeout, rate limit, or a malformed vendor
    /// response envelope.
    #[error("provider {provider} call failed: {message}")]
    CallFailed {
        provider: ProviderKind,
        message: String,
    },
}

/// One LLM vendor integration. Implementations make exactly one outbound
/// call per `submit` invocation, bounded by the configured timeout, and do
/// not retry. A well-formed vendor response is returned as-is even when its
/// content is not valid analysis JSON — that is the validator's concern.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn submit(
        &self,
        prompt: &AnalysisPrompt,
        depth: AnalysisDepth,
    ) -> Result<Completion, ProviderError>;
}

#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("requested provider '{0}' is not configured")]
    RequestedProviderUnavailable(ProviderKind),

    #[error("no LLM provider is configured; set at least one vendor API key")]
    NoProviderConfigured,
}

/// Holds the configured providers in priority order and resolves the ordered
/// candidate list for each request.
pub struct ProviderRegistry {
    /// Configured providers, in `ProviderKind::ALL` priority order.
    providers: Vec<Arc<dyn LlmProvider>>,
    /// Environment-level default consulted for `auto` requests.
    default: Option<ProviderKind>,
}

impl ProviderRegistry {
    /// Builds every vendor whose credentials resolve. Absence of a key only
    /// removes that vendor from the configured set.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

        match OpenAiProvider::new(
            config.openai_api_key.as_deref(),
            &config.openai_model,
            config.provider_timeout,
        ) {
            Ok(p) => providers.push(Arc::new(p)),
            Err(e) => debug!("openai not registered: {e}"),
        }
        match AnthropicProvider::new(
            config.anthropic_api_key.as_deref(),
            &config.anthropic_model,
            config.provider_timeout,
        ) {
            Ok(p) => providers.push(Arc::new(p)),
            Err(e) => debug!("anthropic not registered: {e}"),
        }
        match GeminiProvider::new(
            config.gemini_api_key.as_deref(),
            &config.gemini_model,
            config.provider_timeout,
        ) {
            Ok(p) => providers.push(Arc::new(p)),
            Err(e) => debug!("gemini not registered: {e}"),
        }

        for provider in &providers {
            info!("LLM provider configured: {}", provider.kind());
        }

        Self::new(providers, config.default_provider)
    }

    /// `providers` must be in priority order. Exposed for tests that inject
    /// fake providers.
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>, default: Option<ProviderKind>) -> Self {
        Self { providers, default }
    }

    fn get(&self, kind: ProviderKind) -> Option<Arc<dyn LlmProvider>> {
        self.providers.iter().find(|p| p.kind() == kind).cloned()
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers.iter().any(|p| p.kind() == kind)
    }

    pub fn has_any(&self) -> bool {
        !self.providers.is_empty()
    }

    /// Resolves the ordered candidate list: the selected provider first,
    /// followed by the remaining configured providers in priority order.
    ///
    /// Preference chain: an explicitly named provider wins if configured
    /// (and fails the request if not); `auto` consults the environment
    /// default when that vendor is configured; otherwise the first
    /// configured vendor in priority order is selected.
    pub fn candidates(
        &self,
        choice: ProviderChoice,
    ) -> Result<Vec<Arc<dyn LlmProvider>>, SelectionError> {
        if self.providers.is_empty() {
            return Err(SelectionError::NoProviderConfigured);
        }

        let selected = match choice.named() {
            Some(kind) => self
                .get(kind)
                .ok_or(SelectionError::RequestedProviderUnavailable(kind))?,
            None => match self.default.and_then(|kind| self.get(kind)) {
                Some(provider) => provider,
                None => Arc::clone(&self.providers[0]),
            },
        };

        let mut ordered = vec![Arc::clone(&selected)];
        ordered.extend(
            self.providers
                .iter()
                .filter(|p| p.kind() != selected.kind())
                .cloned(),
        );
        Ok(ordered)
    }

    /// Vendor name → configuration status, over the full closed vendor set.
    pub fn health(&self) -> BTreeMap<&'static str, &'static str> {
        ProviderKind::ALL
            .iter()
            .map(|&kind| {
                let status = if self.is_configured(kind) {
                    "available"
                } else {
                    "not_configured"
                };
                (kind.as_str(), status)
            })
            .collect()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::registry_of;
    use super::*;

    #[test]
    fn test_named_configured_provider_goes_first() {
        let registry = registry_of(
            &[ProviderKind::Openai, ProviderKind::Anthropic, ProviderKind::Gemini],
            Some(ProviderKind::Openai),
        );
        let candidates = registry.candidates(ProviderChoice::Gemini).unwrap();
        assert_eq!(candidates[0].kind(), ProviderKind::Gemini);
        assert_eq!(candidates.len(), 3);
    }

    #[test]
    fn test_named_unconfigured_provider_fails() {
        let registry = registry_of(&[ProviderKind::Openai], None);
        assert!(matches!(
            registry.candidates(ProviderChoice::Anthropic),
            Err(SelectionError::RequestedProviderUnavailable(
                ProviderKind::Anthropic
            ))
        ));
    }

    #[test]
    fn test_auto_uses_environment_default() {
        let registry = registry_of(
            &[ProviderKind::Openai, ProviderKind::Anthropic],
            Some(ProviderKind::Anthropic),
        );
        let candidates = registry.candidates(ProviderChoice::Auto).unwrap();
        assert_eq!(candidates[0].kind(), ProviderKind::Anthropic);
        assert_eq!(candidates[1].kind(), ProviderKind::Openai);
    }

    #[test]
    fn test_auto_with_unconfigured_default_falls_through() {
        let registry = registry_of(&[ProviderKind::Openai], Some(ProviderKind::Gemini));
        let candidates = registry.candidates(ProviderChoice::Auto).unwrap();
        assert_eq!(candidates[0].kind(), ProviderKind::Openai);
    }

    #[test]
    fn test_auto_without_default_selects_first_configured_in_priority_order() {
        // Only the second-priority vendor is configured.
        let registry = registry_of(&[ProviderKind::Anthropic], None);
        let candidates = registry.candidates(ProviderChoice::Auto).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].kind(), ProviderKind::Anthropic);
    }

    #[test]
    fn test_no_provider_configured() {
        let registry = registry_of(&[], None);
        assert!(matches!(
            registry.candidates(ProviderChoice::Auto),
            Err(SelectionError::NoProviderConfigured)
        ));
    }

    #[test]
    fn test_candidate_list_preserves_priority_after_selected() {
        let registry = registry_of(
            &[ProviderKind::Openai, ProviderKind::Anthropic, ProviderKind::Gemini],
            None,
        );
        let candidates = registry.candidates(ProviderChoice::Anthropic).unwrap();
        let kinds: Vec<_> = candidates.iter().map(|p| p.kind()).collect();
        assert_eq!(
            kinds,
            vec![ProviderKind::Anthropic, ProviderKind::Openai, ProviderKind::Gemini]
        );
    }

    #[test]
    fn test_health_enumerates_all_vendors() {
        let registry = registry_of(&[ProviderKind::Anthropic], None);
        let health = registry.health();
        assert_eq!(health["openai"], "not_configured");
        assert_eq!(health["anthropic"], "available");
        assert_eq!(health["gemini"], "not_configured");
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::Openai));
        assert_eq!(ProviderKind::parse("gemini"), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::parse("mistral"), None);
    }

    #[test]
    fn test_max_tokens_by_depth() {
        assert!(max_tokens_for(AnalysisDepth::Quick) < max_tokens_for(AnalysisDepth::Detailed));
    }
}
