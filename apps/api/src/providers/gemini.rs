//! Google Gemini generateContent provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::request::AnalysisDepth;
use crate::prompts::AnalysisPrompt;

use super::{max_tokens_for, Completion, LlmProvider, ProviderError, ProviderKind, TEMPERATURE};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: ContentPart<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct ContentPart<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: u32,
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: Option<&str>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::Unavailable {
                provider: ProviderKind::Gemini,
            })?;
        Ok(Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("failed to build HTTP client"),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn call_failed(message: String) -> ProviderError {
        ProviderError::CallFailed {
            provider: ProviderKind::Gemini,
            message,
        }
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn submit(
        &self,
        prompt: &AnalysisPrompt,
        depth: AnalysisDepth,
    ) -> Result<Completion, ProviderError> {
        let request_body = GenerateRequest {
            system_instruction: ContentPart {
                parts: vec![Part {
                    text: &prompt.system,
                }],
            },
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: &prompt.user }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: max_tokens_for(depth),
            },
        };

        // The key rides in the query string; keep it out of logs.
        let url = format!("{API_BASE}/{}:generateContent", self.model);

        let started = Instant::now();
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Self::call_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::call_failed(format!("status {status}: {body}")));
        }

        let envelope: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Self::call_failed(format!("malformed response envelope: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text: String = envelope
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();
        let tokens_used = envelope.usage_metadata.map(|u| u.total_token_count);

        debug!(
            "gemini call succeeded: tokens={:?}, latency={}ms",
            tokens_used, latency_ms
        );

        Ok(Completion {
            text,
            tokens_used,
            model: envelope.model_version.unwrap_or_else(|| self.model.clone()),
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_unavailable_at_construction() {
        let result = GeminiProvider::new(None, "gemini-1.5-pro", Duration::from_secs(5));
        assert!(matches!(
            result,
            Err(ProviderError::Unavailable {
                provider: ProviderKind::Gemini
            })
        ));
    }

    #[test]
    fn test_configured_provider_reports_kind() {
        let provider = GeminiProvider::new(Some("key"), "m", Duration::from_secs(5)).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Gemini);
    }

    #[test]
    fn test_response_envelope_deserializes() {
        let json = r#"{
            "candidates": [
                {"content": {"parts": [{"text": "{\"ok\":"}, {"text": "true}"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 2000, "candidatesTokenCount": 400, "totalTokenCount": 2400},
            "modelVersion": "gemini-1.5-pro-002"
        }"#;
        let envelope: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.usage_metadata.unwrap().total_token_count, 2400);
        let text: String = envelope.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        assert_eq!(text, "{\"ok\":true}");
    }

    #[test]
    fn test_empty_candidates_still_deserializes() {
        let envelope: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(envelope.candidates.is_empty());
    }
}
