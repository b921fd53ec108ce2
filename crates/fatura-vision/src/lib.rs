//! Extraction-service abstraction layer for fatura.
//!
//! This crate provides a unified interface for sending a rendered tax
//! document plus a natural-language instruction to a vision-capable
//! text-completion service and getting raw text back:
//! - `CompletionBackend` is the seam the pipeline programs against
//! - `HttpBackend` talks to an OpenAI-compatible chat-completions endpoint
//!
//! The service is treated as a black box. Everything downstream of the
//! returned text (JSON recovery, field coercion, validation) lives in
//! `fatura-core`.

mod backend;
mod error;

pub use backend::{CompletionBackend, CompletionRequest, DocumentPayload, HttpBackend, ServiceConfig};
pub use error::VisionError;

/// Result type for extraction-service operations.
pub type Result<T> = std::result::Result<T, VisionError>;
