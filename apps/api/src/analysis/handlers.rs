//! Axum route handlers for the Analysis API.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::orchestrator::{self, AnalysisOptions};
use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;
use crate::models::audit::{AnalysisLogRow, TokenUsageStat};
use crate::models::request::{AnalysisConfig, AnalysisRequest, CompanyCriteria, PositionFramework};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct RecentResponse {
    pub analyses: Vec<AnalysisLogRow>,
}

#[derive(Debug, Deserialize)]
pub struct UsageParams {
    pub days: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub days: i32,
    pub usage: Vec<TokenUsageStat>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/analyze
///
/// Multipart upload: a `cv_file` part (PDF or DOCX) plus JSON parts
/// `position_framework`, `company_criteria`, and optionally `config`.
/// Returns the full structured analysis, or a structured error naming the
/// failure kind.
pub async fn handle_analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, AppError> {
    let mut cv: Option<(String, Bytes)> = None;
    let mut framework: Option<PositionFramework> = None;
    let mut criteria: Option<CompanyCriteria> = None;
    let mut config: Option<AnalysisConfig> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart payload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "cv_file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| {
                        AppError::Validation("cv_file part must carry a filename".to_string())
                    })?;
                let data = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("unreadable cv_file part: {e}"))
                })?;
                cv = Some((filename, data));
            }
            "position_framework" => {
                framework = Some(json_field(field, "position_framework").await?);
            }
            "company_criteria" => {
                criteria = Some(json_field(field, "company_criteria").await?);
            }
            "config" => {
                config = Some(json_field(field, "config").await?);
            }
            _ => {}
        }
    }

    let (cv_filename, cv_bytes) =
        cv.ok_or_else(|| AppError::Validation("missing cv_file part".to_string()))?;
    let position_framework = framework
        .ok_or_else(|| AppError::Validation("missing position_framework part".to_string()))?;
    let company_criteria = criteria
        .ok_or_else(|| AppError::Validation("missing company_criteria part".to_string()))?;
    let config = config.unwrap_or_default();

    position_framework
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let options = AnalysisOptions {
        provider_retries: state.config.provider_retries,
        deadline: state.config.analysis_deadline,
    };
    let request = AnalysisRequest {
        cv_bytes,
        cv_filename,
        position_framework,
        company_criteria,
        config,
    };

    let result =
        orchestrator::analyze(&state.providers, state.audit.as_ref(), &options, request).await?;

    Ok(Json(result))
}

/// GET /api/v1/analyses/:id
///
/// Returns the audit log row for one analysis.
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    Path(analysis_id): Path<Uuid>,
) -> Result<Json<AnalysisLogRow>, AppError> {
    let row = state
        .audit
        .get_analysis(analysis_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {analysis_id} not found")))?;
    Ok(Json(row))
}

/// GET /api/v1/analyses/recent?limit=10
pub async fn handle_recent_analyses(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentResponse>, AppError> {
    let limit = params.limit.unwrap_or(10).clamp(1, 100);
    let analyses = state.audit.recent_analyses(limit).await?;
    Ok(Json(RecentResponse { analyses }))
}

/// GET /api/v1/usage?days=30
///
/// Per-provider token usage aggregated from the daily rollup.
pub async fn handle_token_usage(
    State(state): State<AppState>,
    Query(params): Query<UsageParams>,
) -> Result<Json<UsageResponse>, AppError> {
    let days = params.days.unwrap_or(30).clamp(1, 365);
    let usage = state.audit.token_usage_stats(days).await?;
    Ok(Json(UsageResponse { days, usage }))
}

async fn json_field<T: DeserializeOwned>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<T, AppError> {
    let text = field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("unreadable {name} part: {e}")))?;
    serde_json::from_str(&text).map_err(|e| AppError::Validation(format!("invalid {name}: {e}")))
}
