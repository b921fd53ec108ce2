//! Core library for Portuguese tax-document ingestion.
//!
//! This crate provides:
//! - Multi-pass extraction orchestration over a vision-capable completion
//!   service (via `fatura-vision`)
//! - Fiscal field normalization and validation (NIF, NISS, dates, amounts)
//! - Arithmetic reconciliation of VAT figures against the legal rate tables
//! - A single-document ingestion pipeline and a batch orchestrator with
//!   bounded concurrency, retries and progress reporting

pub mod batch;
pub mod error;
pub mod extract;
pub mod input;
pub mod models;
pub mod pipeline;
pub mod rates;
pub mod reconcile;
pub mod rules;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{no_progress, process_batch, ProgressCallback};
pub use error::{ExtractError, FaturaError, InputError, Result, StoreError};
pub use input::DocumentFile;
pub use models::config::FaturaConfig;
pub use models::invoice::{
    ArithmeticChecks, CorrectionEntry, ExtractedInvoice, FiscalRegion, IngestResult, ItemStatus,
    QueueItem, VatTier,
};
pub use pipeline::{ingest, ingest_result, IngestOutcome};
pub use reconcile::{reconcile, Reconciliation};
pub use store::{DuplicateQuery, MemoryStore, RecordStore};

/// Re-export service-layer types consumed by callers.
pub use fatura_vision::{
    CompletionBackend, CompletionRequest, DocumentPayload, HttpBackend, ServiceConfig, VisionError,
};
