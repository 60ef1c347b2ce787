//! Prompt Renderer — an append-only registry of versioned analysis templates
//! and the pure string interpolation that fills them.
//!
//! The model's output structure is pinned by these templates; version pinning
//! is what makes analyses reproducible, so versions are never edited in
//! place — a change is a new registered version.

use thiserror::Error;

use crate::models::request::{AnalysisDepth, CompanyCriteria, PositionFramework};

/// The sentinel a caller sends to get the most recently registered version.
pub const DEFAULT_VERSION: &str = "default";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("unknown prompt version '{0}'")]
    UnknownVersion(String),
}

/// A named, immutable template. `system` frames the task and the required
/// JSON shape; `user` carries the interpolated inputs.
#[derive(Debug)]
pub struct PromptTemplate {
    pub version: &'static str,
    pub system: &'static str,
    pub user: &'static str,
}

/// A fully rendered prompt ready for a provider call.
#[derive(Debug, Clone)]
pub struct AnalysisPrompt {
    pub system: String,
    pub user: String,
}

const SYSTEM_V1: &str = r#"You are an expert HR analyst specializing in candidate evaluation.
Your task is to analyze CVs objectively and provide structured, data-driven assessments.

IMPORTANT: You must respond with valid JSON only. Do not include any text outside the JSON structure.

The JSON response must have this exact structure:
{
  "overall_score": <number 0-100>,
  "recommendation": "<strong_yes|yes|maybe|no|strong_no>",
  "section_scores": [
    {
      "section": "<section name>",
      "score": <number 0-100>,
      "weight": <number 0-100>,
      "weighted_score": <calculated: score * weight / 100>,
      "rationale": "<detailed explanation>"
    }
  ],
  "key_strengths": ["<strength 1>", "<strength 2>"],
  "critical_gaps": ["<gap 1>", "<gap 2>"],
  "follow_up_questions": ["<question 1>", "<question 2>"]
}

Be objective, thorough, and ensure all scores are justified with clear rationale."#;

const USER_V1: &str = r#"Analyze the following CV against the position requirements and company criteria.

=== POSITION INFORMATION ===
Role: {role_title}

Key Requirements:
{key_requirements}

Must-Have Skills: {must_have_skills}
Nice-to-Have Skills: {nice_to_have_skills}

Scoring Weights:
{scoring_weights}

=== COMPANY CRITERIA ===
Company: {company_name}
Core Values: {company_values}

Evaluation Guidelines:
{evaluation_guidelines}

Disqualifiers:
{disqualifiers}

=== CANDIDATE CV ===
{cv_text}

=== ANALYSIS INSTRUCTIONS ===
1. Evaluate the candidate across every section listed under Scoring Weights
2. Calculate weighted scores based on the provided weights
3. Identify 3-5 key strengths with specific evidence from the CV
4. Identify 2-4 critical gaps or concerns
5. Generate 4-6 thoughtful follow-up interview questions
6. Provide an overall recommendation (strong_yes, yes, maybe, no, or strong_no)

Analysis Depth: {analysis_depth}

Respond with ONLY the JSON structure specified in the system prompt."#;

const SYSTEM_V2: &str = r#"You are an expert HR analyst specializing in candidate evaluation.
Your task is to analyze CVs objectively and provide structured, data-driven assessments.

IMPORTANT: You must respond with valid JSON only. Do not include any text outside the JSON structure.

The JSON response must have this exact structure:
{
  "overall_score": <number 0-100>,
  "recommendation": "<strong_yes|yes|maybe|no|strong_no>",
  "section_scores": [
    {
      "section": "<section name>",
      "score": <number 0-100>,
      "weight": <number 0-100>,
      "weighted_score": <calculated: score * weight / 100>,
      "rationale": "<detailed explanation>"
    }
  ],
  "key_strengths": ["<strength 1>", "<strength 2>"],
  "critical_gaps": ["<gap 1>", "<gap 2>"],
  "follow_up_questions": ["<question 1>", "<question 2>"]
}

Section names in section_scores must exactly match the sections listed under Scoring Weights.
A disqualifier that clearly applies caps the affected section scores accordingly and must be
named in critical_gaps. Be objective, thorough, and ensure all scores are justified with
clear rationale grounded in the CV text."#;

const USER_V2: &str = r#"Analyze the following CV against the position requirements and company criteria.

=== POSITION INFORMATION ===
Role: {role_title}
Minimum Experience: {experience_years}

Key Requirements:
{key_requirements}

Must-Have Skills: {must_have_skills}
Nice-to-Have Skills: {nice_to_have_skills}

Scoring Weights:
{scoring_weights}

=== COMPANY CRITERIA ===
Company: {company_name}
Core Values: {company_values}
Preferred Backgrounds: {preferred_backgrounds}

Evaluation Guidelines:
{evaluation_guidelines}

Disqualifiers (check each one explicitly against the CV):
{disqualifiers}

=== CANDIDATE CV ===
{cv_text}

=== ANALYSIS INSTRUCTIONS ===
1. Evaluate the candidate across every section listed under Scoring Weights, no more, no fewer
2. Calculate weighted scores based on the provided weights
3. Check every disqualifier; if one applies, name it in critical_gaps
4. Identify 3-5 key strengths with specific evidence from the CV
5. Identify 2-4 critical gaps or concerns
6. Generate 4-6 thoughtful follow-up interview questions
7. Provide an overall recommendation (strong_yes, yes, maybe, no, or strong_no)

Analysis Depth: {analysis_depth}

Respond with ONLY the JSON structure specified in the system prompt."#;

pub const V1: PromptTemplate = PromptTemplate {
    version: "v1",
    system: SYSTEM_V1,
    user: USER_V1,
};

pub const V2: PromptTemplate = PromptTemplate {
    version: "v2",
    system: SYSTEM_V2,
    user: USER_V2,
};

/// Append-only. New versions go at the end; the last entry is the default.
static REGISTRY: &[&PromptTemplate] = &[&V1, &V2];

/// Looks up a registered template. The `default` sentinel resolves to the
/// most recently registered version.
pub fn resolve(version: &str) -> Result<&'static PromptTemplate, PromptError> {
    if version == DEFAULT_VERSION {
        return Ok(REGISTRY[REGISTRY.len() - 1]);
    }
    REGISTRY
        .iter()
        .find(|t| t.version == version)
        .copied()
        .ok_or_else(|| PromptError::UnknownVersion(version.to_string()))
}

pub fn available_versions() -> Vec<&'static str> {
    REGISTRY.iter().map(|t| t.version).collect()
}

/// Fills a template with the request inputs. Pure substitution over a fixed
/// placeholder set — no logic lives here.
pub fn render(
    template: &PromptTemplate,
    cv_text: &str,
    framework: &PositionFramework,
    criteria: &CompanyCriteria,
    depth: AnalysisDepth,
) -> AnalysisPrompt {
    let requirements = bullet_list(&framework.key_requirements);
    let weights = framework
        .scoring_weights
        .iter()
        .map(|(section, weight)| format!("- {}: {}%", title_case(section), weight))
        .collect::<Vec<_>>()
        .join("\n");
    let experience = framework
        .experience_years_required
        .map(|y| format!("{y}+ years"))
        .unwrap_or_else(|| "Not specified".to_string());

    let user = template
        .user
        .replace("{role_title}", &framework.role_title)
        .replace("{experience_years}", &experience)
        .replace("{key_requirements}", &or_not_specified(requirements))
        .replace(
            "{must_have_skills}",
            &or_not_specified(framework.must_have_skills.join(", ")),
        )
        .replace(
            "{nice_to_have_skills}",
            &or_not_specified(framework.nice_to_have_skills.join(", ")),
        )
        .replace("{scoring_weights}", &weights)
        .replace("{company_name}", &criteria.company_name)
        .replace(
            "{company_values}",
            &or_not_specified(criteria.values.join(", ")),
        )
        .replace(
            "{preferred_backgrounds}",
            &or_not_specified(criteria.preferred_backgrounds.join(", ")),
        )
        .replace(
            "{evaluation_guidelines}",
            &or_not_specified(criteria.evaluation_guidelines.clone()),
        )
        .replace(
            "{disqualifiers}",
            &none_specified(bullet_list(&criteria.disqualifiers)),
        )
        .replace("{analysis_depth}", depth.as_str())
        .replace("{cv_text}", cv_text);

    AnalysisPrompt {
        system: template.system.to_string(),
        user,
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_not_specified(value: String) -> String {
    if value.trim().is_empty() {
        "Not specified".to_string()
    } else {
        value
    }
}

fn none_specified(value: String) -> String {
    if value.trim().is_empty() {
        "None specified".to_string()
    } else {
        value
    }
}

/// `technical_skills` → `Technical Skills`, for the weight table.
fn title_case(section: &str) -> String {
    section
        .split(['_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
