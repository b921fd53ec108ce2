//! Error types for the extraction-service layer.

use thiserror::Error;

/// Errors that can occur while talking to the completion service.
///
/// `RateLimited` and `QuotaExhausted` are kept as distinct variants so the
/// batch layer can back off on the former and alert an operator on the
/// latter instead of blindly retrying either.
#[derive(Error, Debug)]
pub enum VisionError {
    /// HTTP 429 from the service. Retrying is the caller's decision.
    #[error("extraction service rate limit hit (HTTP 429)")]
    RateLimited,

    /// HTTP 402 from the service. Operator-actionable; retrying won't help.
    #[error("extraction service quota exhausted (HTTP 402)")]
    QuotaExhausted,

    /// Any other non-success HTTP status.
    #[error("extraction service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Network-level failure, including request timeouts.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered 200 but the response envelope was not usable.
    #[error("invalid service response: {0}")]
    InvalidResponse(String),

    /// Missing endpoint, credentials or other client misconfiguration.
    #[error("service configuration error: {0}")]
    Config(String),
}

impl VisionError {
    /// Whether a retry with backoff can plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VisionError::RateLimited => true,
            VisionError::Transport(_) => true,
            VisionError::Status { status, .. } => *status >= 500,
            VisionError::QuotaExhausted
            | VisionError::InvalidResponse(_)
            | VisionError::Config(_) => false,
        }
    }
}
