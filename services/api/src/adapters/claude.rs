//! services/api/src/adapters/claude.rs
//!
//! This module contains the adapter for the Messages API used by every
//! derivation stage. It implements the `LanguageModel` port from the `core` crate.

use std::time::Duration;

use async_trait::async_trait;
use lattice_core::ports::{DerivationError, LanguageModel};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MESSAGES_ENDPOINT: &str = "/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

//=========================================================================================
// Settings
//=========================================================================================

/// How transient failures are retried. Delays grow linearly with the attempt number.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub connect_backoff: Duration,
    pub rate_limit_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            connect_backoff: Duration::from_secs(2),
            rate_limit_backoff: Duration::from_secs(10),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ClaudeSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct ClaudeAdapter {
    client: Client,
    settings: ClaudeSettings,
}

impl ClaudeAdapter {
    pub fn new(settings: ClaudeSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}{}",
            self.settings.base_url.trim_end_matches('/'),
            MESSAGES_ENDPOINT
        )
    }

    /// Sends the request, retrying connection failures and 429s.
    async fn send_with_retry(
        &self,
        api_key: &str,
        body: &MessageRequest<'_>,
    ) -> Result<reqwest::Response, DerivationError> {
        let retry = self.settings.retry;
        let url = self.endpoint();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(body)
                .send()
                .await;

            match sent {
                Err(e) => {
                    if attempt >= retry.max_attempts {
                        return Err(DerivationError::Timeout(e.to_string()));
                    }
                    warn!(attempt, error = %e, "Messages API request failed; retrying");
                    tokio::time::sleep(retry.connect_backoff * attempt).await;
                }
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    if attempt >= retry.max_attempts {
                        return Err(DerivationError::RateLimited);
                    }
                    warn!(attempt, "Messages API rate limited; backing off");
                    tokio::time::sleep(retry.rate_limit_backoff * attempt).await;
                }
                Ok(response) => return Ok(response),
            }
        }
    }
}

//=========================================================================================
// `LanguageModel` Trait Implementation
//=========================================================================================

#[async_trait]
impl LanguageModel for ClaudeAdapter {
    async fn ask(&self, system: Option<&str>, prompt: &str) -> Result<String, DerivationError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(DerivationError::AuthMissing)?;

        let body = MessageRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            system,
            temperature: self.settings.temperature,
        };

        let response = self.send_with_retry(api_key, &body).await?;
        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| DerivationError::Service(format!("failed to read response: {}", e)))?;

        if status != StatusCode::OK {
            let message = serde_json::from_str::<ErrorEnvelope>(&raw)
                .map(|env| env.error.message)
                .unwrap_or_else(|_| format!("status {}, body: {}", status.as_u16(), raw));
            return Err(DerivationError::Service(message));
        }

        let parsed: MessageResponse = serde_json::from_str(&raw)
            .map_err(|e| DerivationError::Service(format!("failed to parse response: {}", e)))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "Messages API call complete"
            );
        }

        match parsed.content.into_iter().next() {
            Some(block) if !block.text.is_empty() => Ok(block.text),
            _ => Err(DerivationError::EmptyResponse),
        }
    }
}
