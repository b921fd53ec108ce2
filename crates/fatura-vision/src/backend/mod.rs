//! Completion backend implementations.

mod http;

pub use http::{HttpBackend, ServiceConfig};

use async_trait::async_trait;

use crate::Result;

/// A rendered document attached to a completion request.
#[derive(Debug, Clone)]
pub struct DocumentPayload {
    /// Declared media type, e.g. `application/pdf` or `image/jpeg`.
    pub media_type: String,
    /// Raw file bytes. Encoding for the wire is the backend's concern.
    pub data: Vec<u8>,
}

/// One request/response call against the extraction service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Natural-language instruction describing what to extract.
    pub instruction: String,
    /// Document to analyse. Absent for follow-up text-only prompts.
    pub document: Option<DocumentPayload>,
    /// Sampling temperature. The pipeline keeps this low to favour
    /// deterministic output.
    pub temperature: f32,
    /// Upper bound on the completion length.
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Build a request with the pipeline's default sampling settings.
    pub fn new(instruction: impl Into<String>, document: Option<DocumentPayload>) -> Self {
        Self {
            instruction: instruction.into(),
            document,
            temperature: 0.1,
            max_tokens: 2048,
        }
    }
}

/// Trait for completion-service backends.
///
/// This trait abstracts over the actual transport so the extraction
/// orchestrator can be driven by an HTTP client in production and by a
/// scripted stand-in under test.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one request and return the raw completion text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Human-readable backend identifier for logging.
    fn name(&self) -> &str;
}
