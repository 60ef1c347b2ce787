use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the append-only analysis attempt log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisLogRow {
    pub id: i64,
    pub analysis_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub cv_filename: String,
    pub position_title: String,
    pub company_name: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt_version: String,
    pub tokens_used: Option<i32>,
    pub latency_ms: i64,
    pub overall_score: Option<i32>,
    pub recommendation: Option<String>,
    pub section_scores: Option<Value>,
    pub status: String,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub raw_response: Option<String>,
}

/// Aggregated usage over a query window, grouped by provider.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TokenUsageStat {
    pub provider: String,
    pub total_tokens: i64,
    pub total_requests: i64,
    pub avg_tokens_per_request: f64,
}
