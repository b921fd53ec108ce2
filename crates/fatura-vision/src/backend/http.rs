//! HTTP backend for OpenAI-compatible chat-completions endpoints.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::{CompletionBackend, CompletionRequest};
use crate::{Result, VisionError};

/// Connection settings for the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the service, without the `/chat/completions` suffix.
    pub endpoint: String,

    /// Bearer token. Usually injected from the environment rather than
    /// stored in the config file.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,

    /// Model identifier to request.
    pub model: String,

    /// Per-request timeout in seconds. A timed-out call surfaces as a
    /// transport error and is retried like any other extraction failure.
    pub timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Completion backend speaking the OpenAI chat-completions protocol.
pub struct HttpBackend {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpBackend {
    /// Create a backend from connection settings.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(VisionError::Config("missing API key".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut content = vec![json!({ "type": "text", "text": request.instruction })];

        if let Some(doc) = &request.document {
            let data_url = format!(
                "data:{};base64,{}",
                doc.media_type,
                BASE64.encode(&doc.data)
            );
            content.push(json!({
                "type": "image_url",
                "image_url": { "url": data_url }
            }));
        }

        json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": content }],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        })
    }
}

#[async_trait::async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'));
        let body = self.request_body(request);

        debug!(
            model = %self.config.model,
            has_document = request.document.is_some(),
            "sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        match status.as_u16() {
            429 => {
                warn!("completion service rate limited");
                return Err(VisionError::RateLimited);
            }
            402 => return Err(VisionError::QuotaExhausted),
            code if !status.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(VisionError::Status { status: code, body });
            }
            _ => {}
        }

        let envelope: serde_json::Value = response.json().await?;

        envelope
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                VisionError::InvalidResponse("completion without message content".to_string())
            })
    }

    fn name(&self) -> &str {
        "http"
    }
}
