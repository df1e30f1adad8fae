use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::{PipelineConfig, MAX_TIMEOUT};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call knobs. Planning and synthesis use very different timeouts.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Classified completion failure. Variants that received bytes keep them so
/// callers can attempt their own recovery over the raw body.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompletionFailure {
    #[error("completion timed out after {}s", .elapsed.as_secs())]
    Timeout { elapsed: Duration, partial: String },
    #[error("cannot reach completion endpoint: {0}")]
    ConnectionRefused(String),
    #[error("malformed completion response ({} bytes)", .body.len())]
    MalformedResponse { body: String },
    #[error("completion endpoint returned HTTP {status}")]
    HttpError { status: u16, body: String },
}

impl CompletionFailure {
    /// Whatever the server sent before things went wrong, if anything.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            CompletionFailure::Timeout { partial, .. } if !partial.is_empty() => {
                Some(partial.as_str())
            }
            CompletionFailure::MalformedResponse { body }
            | CompletionFailure::HttpError { body, .. }
                if !body.is_empty() =>
            {
                Some(body.as_str())
            }
            _ => None,
        }
    }
}

pub type CompletionResult = std::result::Result<String, CompletionFailure>;

/// A chat-completion backend. Implementations never retry and never panic;
/// every transport or parse problem comes back as a `CompletionFailure`.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, messages: &[Message], options: CompletionOptions) -> CompletionResult;
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Pull `choices[0].message.content` out of an OpenAI-style response body.
pub fn extract_content(body: &str) -> Option<String> {
    let parsed: ChatResponse = serde_json::from_str(body).ok()?;
    parsed.choices.into_iter().next().map(|c| c.message.content)
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl LlmClient {
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        // No client-wide timeout: each call carries its own deadline.
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.llm_base_url.clone(),
            model: config.llm_model.clone(),
            api_key: config.llm_api_key.clone(),
        })
    }

    /// Resolve the chat completions endpoint from the base URL.
    fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else if base.ends_with("/v1") {
            format!("{}/chat/completions", base)
        } else {
            format!("{}/v1/chat/completions", base)
        }
    }

    fn classify(err: reqwest::Error, elapsed: Duration) -> CompletionFailure {
        if err.is_timeout() {
            CompletionFailure::Timeout {
                elapsed,
                partial: String::new(),
            }
        } else {
            CompletionFailure::ConnectionRefused(err.to_string())
        }
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(&self, messages: &[Message], options: CompletionOptions) -> CompletionResult {
        let started = Instant::now();
        let deadline = started
            .checked_add(options.timeout)
            .unwrap_or_else(|| started + MAX_TIMEOUT);
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
            "stream": false,
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        debug!(
            endpoint = %self.endpoint(),
            messages = messages.len(),
            timeout_secs = options.timeout.as_secs(),
            "Sending completion request"
        );

        let mut resp = match tokio::time::timeout_at(deadline, req.send()).await {
            Err(_) => {
                return Err(CompletionFailure::Timeout {
                    elapsed: started.elapsed(),
                    partial: String::new(),
                })
            }
            Ok(Err(e)) => return Err(Self::classify(e, started.elapsed())),
            Ok(Ok(resp)) => resp,
        };
        let status = resp.status();

        // Read the body chunk by chunk so a deadline hit mid-body still leaves
        // us with whatever arrived. Dropping `resp` closes the connection.
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match tokio::time::timeout_at(deadline, resp.chunk()).await {
                Err(_) => {
                    warn!(received = buf.len(), "Completion body timed out");
                    return Err(CompletionFailure::Timeout {
                        elapsed: started.elapsed(),
                        partial: String::from_utf8_lossy(&buf).into_owned(),
                    });
                }
                Ok(Ok(Some(chunk))) => buf.extend_from_slice(&chunk),
                Ok(Ok(None)) => break,
                Ok(Err(e)) => {
                    warn!(received = buf.len(), "Completion body read failed: {}", e);
                    return Err(CompletionFailure::MalformedResponse {
                        body: String::from_utf8_lossy(&buf).into_owned(),
                    });
                }
            }
        }
        let text = String::from_utf8_lossy(&buf).into_owned();

        if !status.is_success() {
            return Err(CompletionFailure::HttpError {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(
            body_len = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Completion response received"
        );

        extract_content(&text).ok_or(CompletionFailure::MalformedResponse { body: text })
    }
}
