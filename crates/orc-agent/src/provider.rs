//! HTTP dispatch to the LLM provider backing the agent layer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::parser::StopReason;

/// What the provider returned, before any parsing of its content.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub stop_reason: StopReason,
}

/// Failure modes the agent layer maps onto the canon: timeouts become F5,
/// everything else an HTTP-level failure becomes F9.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("request to LLM provider timed out")]
    Timeout,
    #[error("LLM provider request failed: {0}")]
    Http(String),
}

/// Abstraction over the LLM backend so the agent layer can be tested without
/// a live provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<CompletionResponse, ProviderError>;
}

/// Chat-completions-style HTTP client: one provider, no model rotation (the
/// token policy table already fixes the one variable the rest of the stack
/// is allowed to control).
#[derive(Debug, Clone)]
pub struct HttpLlmProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpLlmProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client with timeout should always build");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }
}

#[derive(Deserialize)]
struct ChatResponseBody {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl LlmProvider for HttpLlmProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<CompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "max_tokens": max_tokens,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Http(error.to_string())
                }
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http(format!("status {status}: {body}")));
        }

        let body: ChatResponseBody = response
            .json()
            .await
            .map_err(|error| ProviderError::Http(format!("invalid response body: {error}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Http("empty choices in response".to_string()))?;

        let stop_reason = match choice.finish_reason.as_deref() {
            Some("length") => StopReason::Length,
            _ => StopReason::Complete,
        };

        Ok(CompletionResponse { content: choice.message.content, stop_reason })
    }
}
