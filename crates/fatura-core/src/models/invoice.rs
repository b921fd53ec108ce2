//! Structured fiscal-document models produced by the ingestion pipeline.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fiscal region of the document. Determines which VAT rate table applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FiscalRegion {
    /// Mainland Portugal (Continente).
    #[default]
    Mainland,
    /// Autonomous region of the Azores.
    Azores,
    /// Autonomous region of Madeira.
    Madeira,
}

impl FiscalRegion {
    /// Parse a region from free-form extraction output.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "mainland" | "continente" | "continental" | "pt" => Some(FiscalRegion::Mainland),
            "azores" | "açores" | "acores" | "pt-ac" => Some(FiscalRegion::Azores),
            "madeira" | "pt-ma" => Some(FiscalRegion::Madeira),
            _ => None,
        }
    }
}

/// A VAT tier with a non-zero legal rate.
///
/// The exempt tier has a base but no VAT amount, so it is not represented
/// here; tier iteration covers exactly the three rated tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatTier {
    Reduced,
    Intermediate,
    Standard,
}

impl VatTier {
    /// All rated tiers, in ascending rate order.
    pub const ALL: [VatTier; 3] = [VatTier::Reduced, VatTier::Intermediate, VatTier::Standard];

    /// Field name used in correction-log entries.
    pub fn vat_field(&self) -> &'static str {
        match self {
            VatTier::Reduced => "vat_reduced",
            VatTier::Intermediate => "vat_intermediate",
            VatTier::Standard => "vat_standard",
        }
    }
}

/// A validated, structured fiscal record extracted from one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedInvoice {
    /// Supplier legal name as printed on the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,

    /// Checksum-valid national tax identifier (NIF) of the supplier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_nif: Option<String>,

    /// Foreign VAT identifier of the supplier. Mutually exclusive with
    /// `supplier_nif`: at most one is authoritative per document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_vat_id: Option<String>,

    /// Document issue date. Never a banking or due date.
    pub document_date: NaiveDate,

    /// Fiscal period `YYYYMM`, always derived from `document_date`.
    pub fiscal_period: String,

    /// Document number/identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,

    /// Document type (fatura, fatura-recibo, nota de crédito, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,

    /// Unique document code (ATCUD), when printed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atcud: Option<String>,

    /// Region whose rate table governs the VAT arithmetic.
    pub fiscal_region: FiscalRegion,

    /// Tax base exempt from VAT.
    pub base_exempt: Decimal,
    /// Tax base at the reduced rate.
    pub base_reduced: Decimal,
    /// Tax base at the intermediate rate.
    pub base_intermediate: Decimal,
    /// Tax base at the standard rate.
    pub base_standard: Decimal,

    /// VAT amount at the reduced rate.
    pub vat_reduced: Decimal,
    /// VAT amount at the intermediate rate.
    pub vat_intermediate: Decimal,
    /// VAT amount at the standard rate.
    pub vat_standard: Decimal,

    /// Total VAT on the document.
    pub total_vat: Decimal,

    /// Legal document total. Ground truth; never auto-corrected.
    pub total_amount: Decimal,

    /// Same-document regularization (credit adjustment), tracked separately
    /// and excluded from `total_vat`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regularization: Option<Decimal>,

    /// Extraction confidence, 0-100.
    pub confidence: u8,
}

impl ExtractedInvoice {
    /// Sum of all four tax bases.
    pub fn bases_sum(&self) -> Decimal {
        self.base_exempt + self.base_reduced + self.base_intermediate + self.base_standard
    }

    /// Tax base for a rated tier.
    pub fn base(&self, tier: VatTier) -> Decimal {
        match tier {
            VatTier::Reduced => self.base_reduced,
            VatTier::Intermediate => self.base_intermediate,
            VatTier::Standard => self.base_standard,
        }
    }

    /// VAT amount for a rated tier.
    pub fn vat(&self, tier: VatTier) -> Decimal {
        match tier {
            VatTier::Reduced => self.vat_reduced,
            VatTier::Intermediate => self.vat_intermediate,
            VatTier::Standard => self.vat_standard,
        }
    }

    /// Replace the VAT amount of a rated tier.
    pub fn set_vat(&mut self, tier: VatTier, value: Decimal) {
        match tier {
            VatTier::Reduced => self.vat_reduced = value,
            VatTier::Intermediate => self.vat_intermediate = value,
            VatTier::Standard => self.vat_standard = value,
        }
    }

    /// Identifier used for duplicate detection, national or foreign.
    pub fn supplier_id(&self) -> Option<&str> {
        self.supplier_nif
            .as_deref()
            .or(self.supplier_vat_id.as_deref())
    }

    /// Cap confidence at `max`.
    pub fn cap_confidence(&mut self, max: u8) {
        if self.confidence > max {
            self.confidence = max;
        }
    }

    /// Reduce confidence by `penalty`, never dropping below `floor`.
    pub fn penalize_confidence(&mut self, penalty: u8, floor: u8) {
        self.confidence = self.confidence.saturating_sub(penalty).max(floor);
    }
}

/// Outcome of a single per-tier arithmetic check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateCheck {
    /// Tier being checked.
    pub tier: VatTier,
    /// Legal rate applied.
    pub rate: Decimal,
    /// Tax base for the tier.
    pub base: Decimal,
    /// VAT computed from base and rate.
    pub expected_vat: Decimal,
    /// VAT carried by the document.
    pub actual_vat: Decimal,
    /// `|actual - expected|`.
    pub delta: Decimal,
    /// Whether the check passed within tolerance.
    pub passed: bool,
}

/// Document-level total consistency check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentCheck {
    /// `|sum(bases) + total_vat - total_amount|`.
    pub delta: Decimal,
    /// Whether the check passed within tolerance.
    pub passed: bool,
}

/// Derived arithmetic verification, returned alongside the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArithmeticChecks {
    /// Per-tier checks for every rated tier.
    pub rate_checks: Vec<RateCheck>,
    /// Document-total check.
    pub document: DocumentCheck,
    /// Per-line tolerance used, in currency units.
    pub line_tolerance: Decimal,
    /// Document-total tolerance used, in currency units.
    pub doc_tolerance: Decimal,
}

impl ArithmeticChecks {
    /// Whether every check passed.
    pub fn all_passed(&self) -> bool {
        self.document.passed && self.rate_checks.iter().all(|c| c.passed)
    }
}

/// One value override applied by the reconciliation engine. Never silent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    /// Field that was overridden.
    pub field: String,
    /// Value before the override.
    pub old_value: String,
    /// Value after the override.
    pub new_value: String,
}

impl CorrectionEntry {
    pub fn new(field: impl Into<String>, old: impl ToString, new: impl ToString) -> Self {
        Self {
            field: field.into(),
            old_value: old.to_string(),
            new_value: new.to_string(),
        }
    }
}

/// Terminal result of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    /// Whether a structured record was produced.
    pub success: bool,

    /// The reconciled record, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<ExtractedInvoice>,

    /// Arithmetic verification of the record, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<ArithmeticChecks>,

    /// Ordered log of every value the pipeline changed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<CorrectionEntry>,

    /// Human-readable warnings, in the operating language of the audience.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Cause of failure, on hard failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Processing state of one batch item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Enqueued, not yet picked up.
    #[default]
    Pending,
    /// In flight.
    Processing,
    /// Terminal: record produced.
    Completed,
    /// Terminal: failed after retries.
    Error,
}

impl ItemStatus {
    /// Whether the status is terminal. Terminal states are set exactly once.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }
}

/// One unit of batch processing, reported to the caller at every transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    /// Position of the item in the submitted batch.
    pub id: usize,

    /// Original file name, used for display ordering by callers.
    pub file_name: String,

    /// Current lifecycle state.
    pub status: ItemStatus,

    /// Coarse progress, 0-100.
    pub progress: u8,

    /// Extracted record, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<ExtractedInvoice>,

    /// Arithmetic verification of the record, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checks: Option<ArithmeticChecks>,

    /// Corrections applied during reconciliation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<CorrectionEntry>,

    /// Accumulated warnings.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Terminal error message, if the item failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Identifier of the persisted record, once committed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl QueueItem {
    /// Create a fresh pending item for a file.
    pub fn pending(id: usize, file_name: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            status: ItemStatus::Pending,
            progress: 0,
            invoice: None,
            checks: None,
            corrections: Vec::new(),
            warnings: Vec::new(),
            error: None,
            record_id: None,
        }
    }
}
