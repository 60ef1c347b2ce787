//! Inbound request model — the position framework, company criteria, and
//! per-request analysis configuration, plus the assembled `AnalysisRequest`.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::providers::ProviderKind;

/// Position-specific evaluation framework. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionFramework {
    pub role_title: String,
    #[serde(default)]
    pub key_requirements: Vec<String>,
    /// Section name → weight percentage. Weights must sum to exactly 100.
    pub scoring_weights: BTreeMap<String, u32>,
    #[serde(default)]
    pub must_have_skills: Vec<String>,
    #[serde(default)]
    pub nice_to_have_skills: Vec<String>,
    #[serde(default)]
    pub experience_years_required: Option<u32>,
}

#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("role_title cannot be empty")]
    EmptyRoleTitle,

    #[error("scoring_weights cannot be empty")]
    NoWeights,

    #[error("scoring weights must sum to 100, got {0}")]
    WeightSum(u32),

    #[error("scoring weight for '{section}' out of range: {weight}")]
    WeightRange { section: String, weight: u32 },
}

impl PositionFramework {
    /// Checks the framework invariants. Called at the request boundary before
    /// an analysis is accepted.
    pub fn validate(&self) -> Result<(), FrameworkError> {
        if self.role_title.trim().is_empty() {
            return Err(FrameworkError::EmptyRoleTitle);
        }
        if self.scoring_weights.is_empty() {
            return Err(FrameworkError::NoWeights);
        }
        for (section, &weight) in &self.scoring_weights {
            if weight > 100 {
                return Err(FrameworkError::WeightRange {
                    section: section.clone(),
                    weight,
                });
            }
        }
        let sum: u32 = self.scoring_weights.values().sum();
        if sum != 100 {
            return Err(FrameworkError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Company-wide evaluation criteria. Immutable once received.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyCriteria {
    pub company_name: String,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub evaluation_guidelines: String,
    #[serde(default)]
    pub disqualifiers: Vec<String>,
    #[serde(default)]
    pub preferred_backgrounds: Vec<String>,
}

/// Requested provider: a specific vendor, or `auto` to let the selector pick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    #[default]
    Auto,
    Openai,
    Anthropic,
    Gemini,
}

impl ProviderChoice {
    pub fn named(self) -> Option<ProviderKind> {
        match self {
            ProviderChoice::Auto => None,
            ProviderChoice::Openai => Some(ProviderKind::Openai),
            ProviderChoice::Anthropic => Some(ProviderKind::Anthropic),
            ProviderChoice::Gemini => Some(ProviderKind::Gemini),
        }
    }
}

/// How deep the model should go. Maps to the per-call token budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDepth {
    Quick,
    #[default]
    Detailed,
}

impl AnalysisDepth {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisDepth::Quick => "quick",
            AnalysisDepth::Detailed => "detailed",
        }
    }
}

fn default_prompt_version() -> String {
    crate::prompts::DEFAULT_VERSION.to_string()
}

/// Per-request analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub provider: ProviderChoice,
    /// Prompt template version. The `default` sentinel resolves to the most
    /// recently registered version.
    #[serde(default = "default_prompt_version")]
    pub prompt_version: String,
    #[serde(default)]
    pub depth: AnalysisDepth,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            provider: ProviderChoice::Auto,
            prompt_version: default_prompt_version(),
            depth: AnalysisDepth::Detailed,
        }
    }
}

/// One inbound analysis call: raw CV bytes plus the structured criteria.
/// Created once per request, never mutated. The CV bytes do not outlive the
/// request — only audit metadata persists.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub cv_bytes: Bytes,
    pub cv_filename: String,
    pub position_framework: PositionFramework,
    pub company_criteria: CompanyCriteria,
    pub config: AnalysisConfig,
}
