//! OpenAI Chat Completions provider.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::models::request::AnalysisDepth;
use crate::prompts::AnalysisPrompt;

use super::{max_tokens_for, Completion, LlmProvider, ProviderError, ProviderKind, TEMPERATURE};

const API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    /// Forces the model to emit a JSON object.
    response_format: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Option<&str>,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or(ProviderError::Unavailable {
                provider: ProviderKind::Openai,
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
            provider: ProviderKind::Openai,
            message,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Openai
    }

    async fn submit(
        &self,
        prompt: &AnalysisPrompt,
        depth: AnalysisDepth,
    ) -> Result<Completion, ProviderError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: max_tokens_for(depth),
            response_format: json!({"type": "json_object"}),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
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

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| Self::call_failed(format!("malformed response envelope: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = envelope
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();
        let tokens_used = envelope.usage.map(|u| u.total_tokens);

        debug!(
            "openai call succeeded: tokens={:?}, latency={}ms",
            tokens_used, latency_ms
        );

        Ok(Completion {
            text,
            tokens_used,
            model: envelope.model,
            latency_ms,
        })
    }
}
