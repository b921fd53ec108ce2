//! Error types for the fatura-core library.

use thiserror::Error;

/// Main error type for the fatura library.
#[derive(Error, Debug)]
pub enum FaturaError {
    /// Input rejected before any processing.
    #[error("input error: {0}")]
    Input(#[from] InputError),

    /// Extraction pipeline error.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Error from the completion-service layer.
    #[error("service error: {0}")]
    Vision(#[from] fatura_vision::VisionError),

    /// Persistence error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by input validation. These are reported per item and never
/// consume a retry.
#[derive(Error, Debug)]
pub enum InputError {
    /// File exceeds the size limit.
    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    /// Media type outside the allow-list.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// File with no content.
    #[error("empty file")]
    Empty,

    /// Batch submission over the per-call item cap.
    #[error("too many items in batch: {count} (limit {limit})")]
    TooManyItems { count: usize, limit: usize },
}

/// Errors raised while turning service output into a structured record.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The service returned text with no recoverable JSON object.
    #[error("malformed extraction output: {0}")]
    MalformedExtraction(String),

    /// A field without which fiscal math has no basis.
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
}

/// Errors raised by a record store implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Backend-specific failure.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl FaturaError {
    /// Whether the batch layer may retry the item after this error.
    ///
    /// Input rejections and quota exhaustion are terminal; malformed
    /// extraction output and transient service failures are worth another
    /// attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FaturaError::Input(_) => false,
            FaturaError::Vision(e) => e.is_retryable(),
            FaturaError::Extraction(ExtractError::MalformedExtraction(_)) => true,
            FaturaError::Extraction(ExtractError::MissingRequiredField(_)) => false,
            FaturaError::Store(_) => false,
            FaturaError::Config(_) => false,
            FaturaError::Io(_) => true,
        }
    }
}

/// Result type for the fatura library.
pub type Result<T> = std::result::Result<T, FaturaError>;
