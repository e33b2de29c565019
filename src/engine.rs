//! Reasoning engine abstraction and implementations.
//!
//! The session engine treats the language model as an opaque function from
//! (system instruction, message history) to free text. [`ReasoningEngine`]
//! is that seam; two implementations ship:
//!
//! - **[`DisabledEngine`]**: fails every call with [`EngineError::Disabled`].
//!   Used when `[engine] provider = "disabled"`, so knowledge lookups and
//!   feedback commands work without an API key.
//! - **[`AnthropicEngine`]**: calls the Anthropic Messages API.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error): retry
//! - HTTP 401/403: fail immediately as [`EngineError::Authentication`]
//! - Other HTTP 4xx: fail immediately as [`EngineError::Api`]
//! - Network errors: retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::models::Turn;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Identifier of the backing model, for logs and summaries.
    fn model_name(&self) -> &str;

    /// Send `messages` under the `system` instruction and return the reply
    /// text. `messages` alternates user/assistant and ends with a user turn.
    async fn complete(&self, system: &str, messages: &[Turn]) -> Result<String, EngineError>;
}

pub struct DisabledEngine;

#[async_trait]
impl ReasoningEngine for DisabledEngine {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system: &str, _messages: &[Turn]) -> Result<String, EngineError> {
        Err(EngineError::Disabled)
    }
}

pub struct AnthropicEngine {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    max_tokens: u32,
    max_retries: u32,
}

impl AnthropicEngine {
    /// Build a client, reading the API key from the environment variable
    /// named by `config.api_key_env`.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| EngineError::MissingApiKey(config.api_key_env.clone()))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EngineConfig, api_key: String) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/v1/messages", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ReasoningEngine for AnthropicEngine {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, messages: &[Turn]) -> Result<String, EngineError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system,
            "messages": messages,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, delay_secs = delay.as_secs(), "retrying reasoning engine call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await;

            let response = match resp {
                Ok(response) => response,
                Err(e) => {
                    warn!(attempt, error = %e, "reasoning engine request failed");
                    last_err = Some(EngineError::Network(e));
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                let parsed: MessagesResponse = response
                    .json()
                    .await
                    .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
                return parsed.into_text();
            }

            let code = status.as_u16();
            let message = response.text().await.unwrap_or_default();

            if code == 429 {
                warn!(attempt, "reasoning engine rate limited");
                last_err = Some(EngineError::RateLimited(message));
                continue;
            }
            if status.is_server_error() {
                warn!(attempt, status = code, "reasoning engine server error");
                last_err = Some(EngineError::Api {
                    status: code,
                    message,
                });
                continue;
            }
            if code == 401 || code == 403 {
                return Err(EngineError::Authentication {
                    status: code,
                    message,
                });
            }
            return Err(EngineError::Api {
                status: code,
                message,
            });
        }

        Err(last_err.unwrap_or_else(|| {
            EngineError::InvalidResponse("reasoning engine call failed after retries".to_string())
        }))
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    /// Join all text blocks; non-text blocks are ignored.
    fn into_text(self) -> Result<String, EngineError> {
        let text: String = self
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        if text.trim().is_empty() {
            return Err(EngineError::EmptyReply);
        }
        Ok(text)
    }
}

/// Instantiate the engine named by `config.provider`.
pub fn create_engine(config: &EngineConfig) -> Result<Box<dyn ReasoningEngine>, EngineError> {
    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicEngine::new(config)?)),
        _ => Ok(Box::new(DisabledEngine)),
    }
}
