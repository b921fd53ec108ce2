//! Configuration structures for the ingestion pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use fatura_vision::ServiceConfig;

/// Main configuration for the fatura pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaturaConfig {
    /// Completion-service connection settings.
    pub service: ServiceConfig,

    /// Multi-pass extraction settings.
    pub extraction: ExtractionConfig,

    /// Arithmetic reconciliation settings.
    pub reconcile: ReconcileConfig,

    /// Multi-section document fallback settings.
    pub fallback: FallbackConfig,

    /// Batch orchestration settings.
    pub batch: BatchConfig,

    /// Input validation settings.
    pub input: InputConfig,
}

/// Multi-pass extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run the focused identifier-only retry pass when warranted.
    pub retry_identifiers: bool,

    /// Run the document-class fallback pass for known multi-section
    /// suppliers.
    pub section_fallback: bool,

    /// Confidence assumed when the service does not self-report one.
    pub default_confidence: u8,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            retry_identifiers: true,
            section_fallback: true,
            default_confidence: 50,
        }
    }
}

/// Arithmetic reconciliation configuration. Tolerances are policy constants;
/// the legal rate tables are not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Per-tier VAT tolerance, in currency units.
    pub line_tolerance: Decimal,

    /// Document-total tolerance, in currency units. Loose enough to absorb
    /// ancillary charges not split into bases/VAT.
    pub doc_tolerance: Decimal,

    /// Confidence points removed per applied correction.
    pub correction_penalty: u8,

    /// Confidence never drops below this after penalties.
    pub confidence_floor: u8,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            line_tolerance: Decimal::new(2, 2),
            doc_tolerance: Decimal::new(10, 2),
            correction_penalty: 20,
            confidence_floor: 10,
        }
    }
}

/// A supplier signature identifying a known multi-section document class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSignature {
    /// Supplier NIF to match exactly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nif: Option<String>,

    /// Case-insensitive fragment matched against the supplier name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_fragment: Option<String>,
}

/// Settings for the document-class fallback pass. The envelope bounds were
/// tuned on utility invoices and should be revalidated before extending the
/// signature list to other document classes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Absolute ceiling on the discrepancy between the fallback VAT total
    /// and the already-computed one, in currency units.
    pub max_abs_delta: Decimal,

    /// Relative ceiling on the same discrepancy.
    pub max_ratio: Decimal,

    /// Upper bound (exclusive) for a same-document regularization amount to
    /// be tracked; larger values are ignored with a warning.
    pub regularization_max: Decimal,

    /// Suppliers whose documents are known to be multi-section.
    pub signatures: Vec<SectionSignature>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            max_abs_delta: Decimal::new(500, 2),
            max_ratio: Decimal::new(50, 2),
            regularization_max: Decimal::new(5000, 2),
            signatures: vec![SectionSignature {
                nif: Some("503504564".to_string()),
                name_fragment: Some("EDP".to_string()),
            }],
        }
    }
}

/// Batch orchestration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum documents in flight against the extraction service.
    pub max_concurrency: usize,

    /// Additional attempts per item after the first failure.
    pub max_retries: u32,

    /// Base backoff delay in milliseconds; doubles per attempt.
    pub base_delay_ms: u64,

    /// Pacing delay per item, to stay under the service's implicit rate
    /// limit. Throughput/latency trade-off, not a correctness requirement.
    pub pacing_delay_ms: u64,

    /// Records with confidence below this are not auto-committed.
    pub confidence_gate: u8,

    /// Maximum items accepted per submission.
    pub max_items: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            max_retries: 3,
            base_delay_ms: 1000,
            pacing_delay_ms: 500,
            confidence_gate: 50,
            max_items: 100,
        }
    }
}

/// Input validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Maximum accepted file size in bytes.
    pub max_file_bytes: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,
        }
    }
}

impl FaturaConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let config = FaturaConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: FaturaConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch.max_concurrency, 5);
        assert_eq!(back.reconcile.line_tolerance, Decimal::new(2, 2));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: FaturaConfig =
            serde_json::from_str(r#"{ "batch": { "max_concurrency": 2 } }"#).unwrap();
        assert_eq!(config.batch.max_concurrency, 2);
        assert_eq!(config.batch.max_retries, 3);
        assert_eq!(config.input.max_file_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_default_signatures_present() {
        let config = FallbackConfig::default();
        assert!(!config.signatures.is_empty());
    }
}
