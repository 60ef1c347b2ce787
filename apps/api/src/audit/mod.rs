//! Audit Recorder — the durable, append-only ledger of every analysis
//! attempt, plus the daily token-usage rollup derived from it.
//!
//! Each write is a single atomic insert keyed by a fresh analysis id; rows
//! are never updated in place. The `AuditSink` trait keeps the orchestrator
//! testable against an in-memory sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::audit::{AnalysisLogRow, TokenUsageStat};

/// Everything persisted about one analysis attempt, success or failure.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub analysis_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub cv_filename: String,
    pub position_title: String,
    pub company_name: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub prompt_version: String,
    pub tokens_used: Option<u32>,
    pub latency_ms: u64,
    pub overall_score: Option<i32>,
    pub recommendation: Option<String>,
    pub section_scores: Option<Value>,
    pub status: AuditStatus,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Error,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
        }
    }
}

/// The orchestrator's view of the recorder: one append per attempt.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> anyhow::Result<()>;
}

/// Postgres-backed audit recorder.
#[derive(Clone)]
pub struct AuditRecorder {
    pool: PgPool,
}

impl AuditRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the two audit tables if they do not exist. Called once at
    /// startup.
    pub async fn init_schema(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analysis_logs (
                id BIGSERIAL PRIMARY KEY,
                analysis_id UUID UNIQUE NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                cv_filename TEXT NOT NULL,
                position_title TEXT NOT NULL,
                company_name TEXT NOT NULL,
                provider TEXT,
                model TEXT,
                prompt_version TEXT NOT NULL,
                tokens_used INTEGER,
                latency_ms BIGINT NOT NULL,
                overall_score INTEGER,
                recommendation TEXT,
                section_scores JSONB,
                status TEXT NOT NULL,
                error_kind TEXT,
                error_message TEXT,
                raw_response TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_analysis_logs_created_at \
             ON analysis_logs (created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS token_usage (
                id BIGSERIAL PRIMARY KEY,
                usage_date DATE NOT NULL,
                provider TEXT NOT NULL,
                total_tokens BIGINT NOT NULL,
                request_count BIGINT NOT NULL,
                UNIQUE (usage_date, provider)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("audit schema initialized");
        Ok(())
    }

    pub async fn get_analysis(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<AnalysisLogRow>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisLogRow>(
            "SELECT * FROM analysis_logs WHERE analysis_id = $1",
        )
        .bind(analysis_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn recent_analyses(&self, limit: i64) -> Result<Vec<AnalysisLogRow>, sqlx::Error> {
        sqlx::query_as::<_, AnalysisLogRow>(
            "SELECT * FROM analysis_logs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// Per-provider token usage over the last `days` days.
    pub async fn token_usage_stats(&self, days: i32) -> Result<Vec<TokenUsageStat>, sqlx::Error> {
        sqlx::query_as::<_, TokenUsageStat>(
            r#"
            SELECT provider,
                   SUM(total_tokens)::BIGINT AS total_tokens,
                   SUM(request_count)::BIGINT AS total_requests,
                   ROUND(SUM(total_tokens)::NUMERIC / SUM(request_count), 2)::FLOAT8
                       AS avg_tokens_per_request
            FROM token_usage
            WHERE usage_date >= CURRENT_DATE - $1
            GROUP BY provider
            ORDER BY provider
            "#,
        )
        .bind(days)
        .fetch_all(&self.pool)
        .await
    }

    async fn bump_token_usage(&self, provider: &str, tokens: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO token_usage (usage_date, provider, total_tokens, request_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (usage_date, provider)
            DO UPDATE SET total_tokens = token_usage.total_tokens + EXCLUDED.total_tokens,
                          request_count = token_usage.request_count + 1
            "#,
        )
        .bind(Utc::now().date_naive())
        .bind(provider)
        .bind(tokens)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for AuditRecorder {
    async fn record(&self, record: AuditRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO analysis_logs (
                analysis_id, created_at, cv_filename, position_title, company_name,
                provider, model, prompt_version, tokens_used, latency_ms,
                overall_score, recommendation, section_scores, status,
                error_kind, error_message, raw_response
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(record.analysis_id)
        .bind(record.created_at)
        .bind(&record.cv_filename)
        .bind(&record.position_title)
        .bind(&record.company_name)
        .bind(&record.provider)
        .bind(&record.model)
        .bind(&record.prompt_version)
        .bind(record.tokens_used.map(|t| t as i32))
        .bind(record.latency_ms as i64)
        .bind(record.overall_score)
        .bind(&record.recommendation)
        .bind(&record.section_scores)
        .bind(record.status.as_str())
        .bind(&record.error_kind)
        .bind(&record.error_message)
        .bind(&record.raw_response)
        .execute(&self.pool)
        .await?;

        if record.status == AuditStatus::Success {
            if let (Some(provider), Some(tokens)) = (&record.provider, record.tokens_used) {
                self.bump_token_usage(provider, tokens as i64).await?;
            }
        }

        info!(
            "audit record written: {} ({})",
            record.analysis_id,
            record.status.as_str()
        );
        Ok(())
    }
}
