//! Response Validator & Score Aggregator.
//!
//! Parses the model's raw text into the expected analysis structure,
//! validates it against the requested scoring weights, and computes the
//! overall score and recommendation from policy constants. Anything the
//! model claims about its own overall verdict is ignored — the numbers
//! here are derived, not trusted.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::models::analysis::{Recommendation, SectionScore};

/// Validation failure. Keeps the raw model text for audit and debugging.
#[derive(Debug, Error)]
#[error("response validation failed: {reason}")]
pub struct ResponseValidationError {
    pub reason: String,
    pub raw: String,
}

impl ResponseValidationError {
    fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

/// The validated, aggregated outcome of one model response.
#[derive(Debug, Clone)]
pub struct ScoredAnalysis {
    pub overall_score: u8,
    pub recommendation: Recommendation,
    pub section_scores: Vec<SectionScore>,
    pub key_strengths: Vec<String>,
    pub critical_gaps: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

/// The structure the model must return. The model's own `overall_score`,
/// `recommendation`, and per-section `weighted_score` fields are ignored
/// and recomputed server-side.
#[derive(Debug, Deserialize)]
struct ModelAnalysis {
    section_scores: Vec<ModelSection>,
    key_strengths: Vec<String>,
    critical_gaps: Vec<String>,
    follow_up_questions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ModelSection {
    section: String,
    score: f64,
    rationale: String,
}

/// Parses and validates a raw model response against the requested weights,
/// then aggregates the weighted overall score and recommendation.
pub fn parse_and_score(
    raw: &str,
    weights: &BTreeMap<String, u32>,
) -> Result<ScoredAnalysis, ResponseValidationError> {
    let text = strip_json_fences(raw);

    let parsed: ModelAnalysis = serde_json::from_str(text)
        .map_err(|e| ResponseValidationError::new(format!("not valid analysis JSON: {e}"), raw))?;

    // Weight keys are rendered title-cased into the prompt, so the model may
    // echo either form; compare normalized names.
    let normalized_weights: BTreeMap<String, (&String, u32)> = weights
        .iter()
        .map(|(section, &weight)| (normalize_section(section), (section, weight)))
        .collect();

    let mut section_scores = Vec::with_capacity(parsed.section_scores.len());
    let mut seen: Vec<String> = Vec::new();

    for section in &parsed.section_scores {
        if !(0.0..=100.0).contains(&section.score) {
            return Err(ResponseValidationError::new(
                format!(
                    "section '{}' score {} outside [0,100]",
                    section.section, section.score
                ),
                raw,
            ));
        }

        let key = normalize_section(&section.section);
        let Some(&(requested_name, weight)) = normalized_weights.get(&key) else {
            return Err(ResponseValidationError::new(
                format!("unexpected section '{}'", section.section),
                raw,
            ));
        };
        if seen.contains(&key) {
            return Err(ResponseValidationError::new(
                format!("duplicate section '{}'", section.section),
                raw,
            ));
        }
        seen.push(key);

        section_scores.push(SectionScore {
            section: requested_name.clone(),
            score: section.score,
            weight: weight as f64,
            weighted_score: section.score * weight as f64 / 100.0,
            rationale: section.rationale.clone(),
        });
    }

    for (key, &(requested_name, _)) in &normalized_weights {
        if !seen.contains(key) {
            return Err(ResponseValidationError::new(
                format!("missing section '{requested_name}'"),
                raw,
            ));
        }
    }

    let total: f64 = section_scores.iter().map(|s| s.weighted_score).sum();
    let overall_score = total.round().clamp(0.0, 100.0) as u8;
    let recommendation = Recommendation::from_score(overall_score);

    Ok(ScoredAnalysis {
        overall_score,
        recommendation,
        section_scores,
        key_strengths: parsed.key_strengths,
        critical_gaps: parsed.critical_gaps,
        follow_up_questions: parsed.follow_up_questions,
    })
}

/// Strips ```json ... ``` or ``` ... ``` code fences if the model wrapped
/// its JSON in them.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// `Technical Skills` / `technical_skills` → `technical_skills`.
fn normalize_section(section: &str) -> String {
    section.trim().to_lowercase().replace(' ', "_")
}

/// Builds a well-formed model response for the standard four-section weight
/// table, used by tests across the crate.
#[cfg(test)]
pub(crate) fn sample_model_json() -> String {
    r#"{
        "overall_score": 78,
        "recommendation": "yes",
        "section_scores": [
            {"section": "Technical Skills", "score": 85, "weight": 40, "weighted_score": 34.0,
             "rationale": "Strong Python and Rust background."},
            {"section": "Experience", "score": 80, "weight": 30, "weighted_score": 24.0,
             "rationale": "Seven years across two platform teams."},
            {"section": "Education", "score": 70, "weight": 15, "weighted_score": 10.5,
             "rationale": "Relevant CS degree."},
            {"section": "Cultural Fit", "score": 60, "weight": 15, "weighted_score": 9.0,
             "rationale": "Some evidence of collaborative work."}
        ],
        "key_strengths": ["7 years of backend development", "Microservices expertise"],
        "critical_gaps": ["No Kubernetes experience mentioned"],
        "follow_up_questions": ["Describe your experience with event-driven systems."]
    }"#
    .to_string()
}

#[cfg(test)]
pub(crate) fn sample_weights() -> BTreeMap<String, u32> {
    [
        ("technical_skills", 40u32),
        ("experience", 30),
        ("education", 15),
        ("cultural_fit", 15),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), *v))
    .collect()
}
