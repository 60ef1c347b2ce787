//! Orchestrator — sequences one analysis run end to end.
//!
//! Received → extract → render → invoke(candidate N) → validate → score →
//! record. Provider call failures and response validation failures move to
//! the next candidate in the precomputed ordered list; everything else is
//! terminal. Whatever the outcome, exactly one audit record is written
//! before the result is returned.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditRecord, AuditSink, AuditStatus};
use crate::extraction::{self, DocumentFormat};
use crate::models::analysis::{AnalysisMetadata, AnalysisResult};
use crate::models::request::AnalysisRequest;
use crate::prompts;
use crate::providers::{ProviderKind, ProviderRegistry};

use super::{validator, AnalysisError};

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Extra same-vendor attempts after a transport failure, before falling
    /// back to the next candidate. Validation failures always fall back
    /// immediately.
    pub provider_retries: u32,
    /// Deadline for the whole run, fallback included.
    pub deadline: Duration,
}

/// Runs one analysis. The CV bytes live only as long as `request` does;
/// nothing but the audit record and the returned result survives the call.
pub async fn analyze(
    registry: &ProviderRegistry,
    audit: &dyn AuditSink,
    options: &AnalysisOptions,
    request: AnalysisRequest,
) -> Result<AnalysisResult, AnalysisError> {
    let analysis_id = Uuid::new_v4();
    let started = Instant::now();
    info!("starting analysis {analysis_id} for {}", request.cv_filename);

    let outcome = match tokio::time::timeout(
        options.deadline,
        execute(registry, options, analysis_id, &request),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(AnalysisError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        }),
    };

    // The audit write is the last core action and happens on every exit
    // path, timeout included.
    let record = build_record(analysis_id, &request, &outcome, started.elapsed());
    if let Err(e) = audit.record(record).await {
        error!("failed to write audit record for {analysis_id}: {e:#}");
    }

    match &outcome {
        Ok(result) => info!(
            "analysis {analysis_id} completed in {}ms: score={} recommendation={}",
            result.metadata.processing_time_ms,
            result.overall_score,
            result.recommendation.as_str()
        ),
        Err(e) => warn!("analysis {analysis_id} failed ({}): {e}", e.kind()),
    }

    outcome
}

async fn execute(
    registry: &ProviderRegistry,
    options: &AnalysisOptions,
    analysis_id: Uuid,
    request: &AnalysisRequest,
) -> Result<AnalysisResult, AnalysisError> {
    let run_started = Instant::now();

    request.position_framework.validate()?;

    let format = DocumentFormat::from_filename(&request.cv_filename)
        .map_err(AnalysisError::DocumentParse)?;
    let document = extraction::extract(&request.cv_bytes, format)?;

    let template = prompts::resolve(&request.config.prompt_version)?;
    let prompt = prompts::render(
        template,
        &document.text,
        &request.position_framework,
        &request.company_criteria,
        request.config.depth,
    );

    let candidates = registry.candidates(request.config.provider)?;

    let mut attempts = 0usize;
    let mut last_failure: Option<(ProviderKind, String, Option<String>)> = None;

    for provider in &candidates {
        let mut vendor_attempts = 0u32;
        loop {
            attempts += 1;
            vendor_attempts += 1;

            let completion = match provider.submit(&prompt, request.config.depth).await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!(
                        "provider {} attempt {} failed: {e}",
                        provider.kind(),
                        vendor_attempts
                    );
                    last_failure = Some((provider.kind(), e.to_string(), None));
                    if vendor_attempts > options.provider_retries {
                        break;
                    }
                    continue;
                }
            };

            debug!(
                "provider {} responded in {}ms",
                provider.kind(),
                completion.latency_ms
            );

            match validator::parse_and_score(
                &completion.text,
                &request.position_framework.scoring_weights,
            ) {
                Ok(scored) => {
                    return Ok(AnalysisResult {
                        analysis_id,
                        timestamp: Utc::now(),
                        overall_score: scored.overall_score,
                        recommendation: scored.recommendation,
                        section_scores: scored.section_scores,
                        key_strengths: scored.key_strengths,
                        critical_gaps: scored.critical_gaps,
                        follow_up_questions: scored.follow_up_questions,
                        metadata: AnalysisMetadata {
                            provider: provider.kind().to_string(),
                            model: completion.model,
                            prompt_version: template.version.to_string(),
                            tokens_used: completion.tokens_used,
                            processing_time_ms: run_started.elapsed().as_millis() as u64,
                            cv_pages: document.pages,
                        },
                    });
                }
                Err(e) => {
                    warn!(
                        "provider {} returned invalid analysis content: {}",
                        provider.kind(),
                        e.reason
                    );
                    last_failure =
                        Some((provider.kind(), e.to_string(), Some(e.raw)));
                    // Invalid content is a vendor output failure: fall back
                    // to the next candidate, never retry the same vendor.
                    break;
                }
            }
        }
    }

    match last_failure {
        Some((last_provider, reason, raw_response)) => Err(AnalysisError::ProvidersExhausted {
            attempts,
            last_provider,
            reason,
            raw_response,
        }),
        None => Err(AnalysisError::Selection(
            crate::providers::SelectionError::NoProviderConfigured,
        )),
    }
}

fn build_record(
    analysis_id: Uuid,
    request: &AnalysisRequest,
    outcome: &Result<AnalysisResult, AnalysisError>,
    elapsed: Duration,
) -> AuditRecord {
    let base = AuditRecord {
        analysis_id,
        created_at: Utc::now(),
        cv_filename: request.cv_filename.clone(),
        position_title: request.position_framework.role_title.clone(),
        company_name: request.company_criteria.company_name.clone(),
        provider: None,
        model: None,
        prompt_version: request.config.prompt_version.clone(),
        tokens_used: None,
        latency_ms: elapsed.as_millis() as u64,
        overall_score: None,
        recommendation: None,
        section_scores: None,
        status: AuditStatus::Error,
        error_kind: None,
        error_message: None,
        raw_response: None,
    };

    match outcome {
        Ok(result) => AuditRecord {
            provider: Some(result.metadata.provider.clone()),
            model: Some(result.metadata.model.clone()),
            prompt_version: result.metadata.prompt_version.clone(),
            tokens_used: result.metadata.tokens_used,
            overall_score: Some(result.overall_score as i32),
            recommendation: Some(result.recommendation.as_str().to_string()),
            section_scores: serde_json::to_value(&result.section_scores).ok(),
            status: AuditStatus::Success,
            ..base
        },
        Err(e) => {
            let (provider, raw_response) = match e {
                AnalysisError::ProvidersExhausted {
                    last_provider,
                    raw_response,
                    ..
                } => (
                    Some(last_provider.to_string()),
                    raw_response.clone(),
                ),
                _ => (None, None),
            };
            AuditRecord {
                provider,
                raw_response,
                error_kind: Some(e.kind().to_string()),
                error_message: Some(e.to_string()),
                ..base
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use bytes::Bytes;

    use crate::analysis::validator::{sample_model_json, sample_weights};
    use crate::extraction::docx_fixture;
    use crate::models::request::{
        AnalysisConfig, AnalysisDepth, AnalysisRequest, CompanyCriteria, PositionFramework,
        ProviderChoice,
    };
    use crate::prompts::AnalysisPrompt;
    use crate::providers::{Completion, LlmProvider, ProviderError};

    use super::*;

    // ────────────────────────────────────────────────────────────────────
    // Test doubles
    // ────────────────────────────────────────────────────────────────────

    struct ScriptedProvider {
        kind: ProviderKind,
        responses: Mutex<VecDeque<Result<Completion, ProviderError>>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(
            kind: ProviderKind,
            responses: Vec<Result<Completion, ProviderError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                kind,
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                delay: None,
            })
        }

        fn slow(kind: ProviderKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                responses: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                delay: Some(delay),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn submit(
            &self,
            _prompt: &AnalysisPrompt,
            _depth: AnalysisDepth,
        ) -> Result<Completion, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::CallFailed {
                    provider: self.kind,
                    message: "script exhausted".to_string(),
                }))
        }
    }

    #[derive(Default)]
    struct MemoryAudit {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl MemoryAudit {
        fn count(&self) -> usize {
            self.records.lock().unwrap().len()
        }

        fn last(&self) -> AuditRecord {
            self.records.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl AuditSink for MemoryAudit {
        async fn record(&self, record: AuditRecord) -> anyhow::Result<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }
    }

    fn completion(text: &str) -> Completion {
        Completion {
            text: text.to_string(),
            tokens_used: Some(1500),
            model: "test-model".to_string(),
            latency_ms: 5,
        }
    }

    fn call_failed(kind: ProviderKind) -> ProviderError {
        ProviderError::CallFailed {
            provider: kind,
            message: "connection reset".to_string(),
        }
    }

    fn request() -> AnalysisRequest {
        let cv = docx_fixture(&[
            "Jane Doe, Senior Backend Engineer with seven years of Python and Rust experience \
             building distributed systems for high-traffic platforms.",
            "Led a team of five engineers migrating a monolith to microservices.",
        ]);
        AnalysisRequest {
            cv_bytes: Bytes::from(cv),
            cv_filename: "jane_doe_cv.docx".to_string(),
            position_framework: PositionFramework {
                role_title: "Senior Backend Engineer".to_string(),
                key_requirements: vec!["5+ years backend experience".to_string()],
                scoring_weights: sample_weights(),
                must_have_skills: vec!["Python".to_string()],
                nice_to_have_skills: vec![],
                experience_years_required: Some(5),
            },
            company_criteria: CompanyCriteria {
                company_name: "ACME Corp".to_string(),
                values: vec!["Ownership".to_string()],
                evaluation_guidelines: String::new(),
                disqualifiers: vec![],
                preferred_backgrounds: vec![],
            },
            config: AnalysisConfig::default(),
        }
    }

    fn options() -> AnalysisOptions {
        AnalysisOptions {
            provider_retries: 0,
            deadline: Duration::from_secs(30),
        }
    }

    fn registry(providers: Vec<Arc<ScriptedProvider>>) -> ProviderRegistry {
        ProviderRegistry::new(
            providers
                .into_iter()
                .map(|p| p as Arc<dyn LlmProvider>)
                .collect(),
            None,
        )
    }

    // ────────────────────────────────────────────────────────────────────
    // Tests
    // ────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_successful_run_records_one_audit_row() {
        let provider = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Ok(completion(&sample_model_json()))],
        );
        let registry = registry(vec![Arc::clone(&provider)]);
        let audit = MemoryAudit::default();

        let result = analyze(&registry, &audit, &options(), request())
            .await
            .unwrap();

        assert_eq!(result.overall_score, 78);
        assert_eq!(result.metadata.provider, "openai");
        assert_eq!(result.metadata.model, "test-model");
        // "default" resolves to the latest registered template.
        assert_eq!(result.metadata.prompt_version, "v2");
        assert_eq!(audit.count(), 1);
        let record = audit.last();
        assert_eq!(record.status, AuditStatus::Success);
        assert_eq!(record.overall_score, Some(78));
        assert!(record.section_scores.is_some());
    }

    #[tokio::test]
    async fn test_fallback_on_provider_call_failure() {
        let first = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Err(call_failed(ProviderKind::Openai))],
        );
        let second = ScriptedProvider::new(
            ProviderKind::Anthropic,
            vec![Ok(completion(&sample_model_json()))],
        );
        let registry = registry(vec![Arc::clone(&first), Arc::clone(&second)]);
        let audit = MemoryAudit::default();

        let result = analyze(&registry, &audit, &options(), request())
            .await
            .unwrap();

        assert_eq!(result.metadata.provider, "anthropic");
        assert_eq!(first.call_count(), 1);
        assert_eq!(second.call_count(), 1);
        assert_eq!(audit.count(), 1);
    }

    #[tokio::test]
    async fn test_fallback_on_validation_failure() {
        let first = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Ok(completion("I cannot produce JSON today."))],
        );
        let second = ScriptedProvider::new(
            ProviderKind::Anthropic,
            vec![Ok(completion(&sample_model_json()))],
        );
        let registry = registry(vec![Arc::clone(&first), Arc::clone(&second)]);
        let audit = MemoryAudit::default();

        let result = analyze(&registry, &audit, &options(), request())
            .await
            .unwrap();

        assert_eq!(result.metadata.provider, "anthropic");
        assert_eq!(audit.count(), 1);
    }

    #[tokio::test]
    async fn test_all_candidates_exhausted() {
        let first = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Err(call_failed(ProviderKind::Openai))],
        );
        let second = ScriptedProvider::new(
            ProviderKind::Anthropic,
            vec![Ok(completion("still not JSON"))],
        );
        let registry = registry(vec![Arc::clone(&first), Arc::clone(&second)]);
        let audit = MemoryAudit::default();

        let err = analyze(&registry, &audit, &options(), request())
            .await
            .unwrap_err();

        match &err {
            AnalysisError::ProvidersExhausted {
                attempts,
                last_provider,
                raw_response,
                ..
            } => {
                assert_eq!(*attempts, 2);
                assert_eq!(*last_provider, ProviderKind::Anthropic);
                // Raw text preserved from the last validation failure.
                assert_eq!(raw_response.as_deref(), Some("still not JSON"));
            }
            other => panic!("expected ProvidersExhausted, got {other:?}"),
        }
        assert_eq!(audit.count(), 1);
        let record = audit.last();
        assert_eq!(record.status, AuditStatus::Error);
        assert_eq!(record.error_kind.as_deref(), Some("all_providers_failed"));
        assert_eq!(record.provider.as_deref(), Some("anthropic"));
        assert_eq!(record.raw_response.as_deref(), Some("still not JSON"));
    }

    #[tokio::test]
    async fn test_named_provider_is_tried_first() {
        let openai = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Ok(completion(&sample_model_json()))],
        );
        let gemini = ScriptedProvider::new(
            ProviderKind::Gemini,
            vec![Ok(completion(&sample_model_json()))],
        );
        let registry = ProviderRegistry::new(
            vec![
                Arc::clone(&openai) as Arc<dyn LlmProvider>,
                Arc::clone(&gemini) as Arc<dyn LlmProvider>,
            ],
            Some(ProviderKind::Openai),
        );
        let audit = MemoryAudit::default();

        let mut req = request();
        req.config.provider = ProviderChoice::Gemini;
        let result = analyze(&registry, &audit, &options(), req).await.unwrap();

        assert_eq!(result.metadata.provider, "gemini");
        assert_eq!(openai.call_count(), 0);
        assert_eq!(gemini.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_document_skips_providers() {
        let provider = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Ok(completion(&sample_model_json()))],
        );
        let registry = registry(vec![Arc::clone(&provider)]);
        let audit = MemoryAudit::default();

        let mut req = request();
        req.cv_bytes = Bytes::from_static(b"definitely not a docx");
        let err = analyze(&registry, &audit, &options(), req).await.unwrap_err();

        assert!(matches!(err, AnalysisError::DocumentParse(_)));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(audit.count(), 1);
        assert_eq!(
            audit.last().error_kind.as_deref(),
            Some("document_parse_error")
        );
    }

    #[tokio::test]
    async fn test_unknown_prompt_version_is_fatal() {
        let provider = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![Ok(completion(&sample_model_json()))],
        );
        let registry = registry(vec![Arc::clone(&provider)]);
        let audit = MemoryAudit::default();

        let mut req = request();
        req.config.prompt_version = "v99".to_string();
        let err = analyze(&registry, &audit, &options(), req).await.unwrap_err();

        assert!(matches!(err, AnalysisError::UnknownPromptVersion(_)));
        assert_eq!(provider.call_count(), 0);
        assert_eq!(audit.count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_framework_is_fatal_and_audited() {
        let registry = registry(vec![ScriptedProvider::new(
            ProviderKind::Openai,
            vec![],
        )]);
        let audit = MemoryAudit::default();

        let mut req = request();
        req.position_framework.scoring_weights =
            [("technical_skills".to_string(), 70u32)].into();
        let err = analyze(&registry, &audit, &options(), req).await.unwrap_err();

        assert!(matches!(err, AnalysisError::InvalidFramework(_)));
        assert_eq!(audit.count(), 1);
        assert_eq!(audit.last().error_kind.as_deref(), Some("invalid_framework"));
    }

    #[tokio::test]
    async fn test_no_provider_configured_is_fatal() {
        let registry = ProviderRegistry::new(vec![], None);
        let audit = MemoryAudit::default();

        let err = analyze(&registry, &audit, &options(), request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "no_provider_configured");
        assert_eq!(audit.count(), 1);
    }

    #[tokio::test]
    async fn test_same_vendor_retry_when_configured() {
        let provider = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![
                Err(call_failed(ProviderKind::Openai)),
                Ok(completion(&sample_model_json())),
            ],
        );
        let registry = registry(vec![Arc::clone(&provider)]);
        let audit = MemoryAudit::default();

        let opts = AnalysisOptions {
            provider_retries: 1,
            deadline: Duration::from_secs(30),
        };
        let result = analyze(&registry, &audit, &opts, request()).await.unwrap();

        assert_eq!(result.metadata.provider, "openai");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(audit.count(), 1);
    }

    #[tokio::test]
    async fn test_no_same_vendor_retry_by_default() {
        let provider = ScriptedProvider::new(
            ProviderKind::Openai,
            vec![
                Err(call_failed(ProviderKind::Openai)),
                Ok(completion(&sample_model_json())),
            ],
        );
        let registry = registry(vec![Arc::clone(&provider)]);
        let audit = MemoryAudit::default();

        let err = analyze(&registry, &audit, &options(), request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "all_providers_failed");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_deadline_exceeded_yields_timeout_with_audit() {
        let provider = ScriptedProvider::slow(ProviderKind::Openai, Duration::from_secs(60));
        let registry = registry(vec![Arc::clone(&provider)]);
        let audit = MemoryAudit::default();

        let opts = AnalysisOptions {
            provider_retries: 0,
            deadline: Duration::from_millis(50),
        };
        let err = analyze(&registry, &audit, &opts, request()).await.unwrap_err();

        assert!(matches!(err, AnalysisError::Timeout { .. }));
        assert_eq!(audit.count(), 1);
        assert_eq!(audit.last().error_kind.as_deref(), Some("analysis_timeout"));
    }
}
