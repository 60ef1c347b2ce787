//! Anthropic Messages API provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::request::AnalysisDepth;
use crate::prompts::AnalysisPrompt;

use super::{max_tokens_for, Completion, LlmProvider, ProviderError, ProviderKind, TEMPERATURE};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Fails with `ProviderError::Unavailable` when no API key is present —
    /// credential absence surfaces at construction, not at call time.
    pub fn new(
        api_key: Option<&str>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::Unavailable {
                provider: ProviderKind::Anthropic,
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
            provider: ProviderKind::Anthropic,
            message,
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    async fn submit(
        &self,
        prompt: &AnalysisPrompt,
        depth: AnalysisDepth,
    ) -> Result<Completion, ProviderError> {
        let request_body = MessagesRequest {
            model: &self.model,
            max_tokens: max_tokens_for(depth),
            temperature: TEMPERATURE,
            system: &prompt.system,
            messages: vec![Message {
                role: "user",
                content: &prompt.user,
            }],
        };

        let started = Instant::now();
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| Self::call_failed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Self::call_failed(format!("status {status}: {message}")));
        }

        let envelope: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Self::call_failed(format!("malformed response envelope: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text: String = envelope
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text.as_deref())
            .collect();
        let tokens_used = envelope.usage.input_tokens + envelope.usage.output_tokens;

        debug!(
            "anthropic call succeeded: tokens={}, latency={}ms",
            tokens_used, latency_ms
        );

        Ok(Completion {
            text,
            tokens_used: Some(tokens_used),
            model: envelope.model,
            latency_ms,
        })
    }
}
