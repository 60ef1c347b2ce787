//! The analysis result — the sole artifact persisted after a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discretized hiring signal derived from the overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongYes,
    Yes,
    Maybe,
    No,
    StrongNo,
}

impl Recommendation {
    /// Fixed policy bands. The mapping is deterministic and independent of
    /// anything the model says about its own verdict.
    pub fn from_score(overall: u8) -> Self {
        match overall {
            85..=u8::MAX => Recommendation::StrongYes,
            70..=84 => Recommendation::Yes,
            50..=69 => Recommendation::Maybe,
            30..=49 => Recommendation::No,
            _ => Recommendation::StrongNo,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::StrongYes => "strong_yes",
            Recommendation::Yes => "yes",
            Recommendation::Maybe => "maybe",
            Recommendation::No => "no",
            Recommendation::StrongNo => "strong_no",
        }
    }
}

/// A model-assigned rating for one evaluation dimension, with the weighted
/// contribution recomputed server-side from the requested weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionScore {
    pub section: String,
    pub score: f64,
    pub weight: f64,
    /// score × weight / 100
    pub weighted_score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub provider: String,
    pub model: String,
    pub prompt_version: String,
    pub tokens_used: Option<u32>,
    pub processing_time_ms: u64,
    pub cv_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub overall_score: u8,
    pub recommendation: Recommendation,
    pub section_scores: Vec<SectionScore>,
    pub key_strengths: Vec<String>,
    pub critical_gaps: Vec<String>,
    pub follow_up_questions: Vec<String>,
    pub metadata: AnalysisMetadata,
}
