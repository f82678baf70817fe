//! Anthropic provider — Messages API transport for `LlmProvider`.
//!
//! Non-streaming only, one request per call, no in-call retries: the engine
//! treats the next user turn as the natural retry, so a failed call here
//! simply degrades the turn to the deterministic path.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmProvider, MessageRole,
};

/// Anthropic API version header value.
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic provider.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    api_key: SecretString,
    /// Model to use (e.g. "claude-sonnet-4-20250514").
    pub model: String,
    /// Base URL for the API.
    pub base_url: String,
    /// HTTP request timeout.
    pub timeout: Duration,
}

impl AnthropicConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    /// Convert our request to the wire format. System messages are lifted
    /// out into the dedicated `system` field.
    fn to_wire(&self, request: &CompletionRequest) -> WireRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages = Vec::new();
        for msg in &request.messages {
            match msg.role {
                MessageRole::System => system_parts.push(&msg.content),
                MessageRole::User => messages.push(WireMessage {
                    role: "user",
                    content: msg.content.clone(),
                }),
                MessageRole::Assistant => messages.push(WireMessage {
                    role: "assistant",
                    content: msg.content.clone(),
                }),
            }
        }
        // The API requires at least one message.
        if messages.is_empty() {
            messages.push(WireMessage {
                role: "user",
                content: "Hello".to_string(),
            });
        }
        WireRequest {
            model: self.config.model.clone(),
            messages,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n"))
            },
            max_tokens: request.max_tokens.unwrap_or(1024),
            temperature: request.temperature,
        }
    }

    fn map_status(&self, status: reqwest::StatusCode, body: String) -> LlmError {
        match status.as_u16() {
            401 | 403 => LlmError::AuthFailed {
                provider: "anthropic".to_string(),
            },
            429 => LlmError::RateLimited {
                provider: "anthropic".to_string(),
                retry_after: None,
            },
            _ => LlmError::RequestFailed {
                provider: "anthropic".to_string(),
                reason: format!("status {status}: {body}"),
            },
        }
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let wire = self.to_wire(&request);

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .header("content-type", "application/json")
            .json(&wire)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout {
                        provider: "anthropic".to_string(),
                        timeout: self.config.timeout,
                    }
                } else {
                    LlmError::RequestFailed {
                        provider: "anthropic".to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_status(status, body));
        }

        let wire_response: WireResponse =
            response.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: "anthropic".to_string(),
                reason: e.to_string(),
            })?;

        let content = wire_response
            .content
            .into_iter()
            .filter_map(|block| {
                if block.block_type == "text" {
                    block.text
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");

        let finish_reason = match wire_response.stop_reason.as_deref() {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content,
            input_tokens: wire_response.usage.input_tokens,
            output_tokens: wire_response.usage.output_tokens,
            finish_reason,
        })
    }
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}
