//! Arithmetic reconciliation of extracted VAT figures against the legal
//! rate tables.
//!
//! The engine verifies each rated tier and the document total, and may
//! auto-correct a tier's VAT to the computed value — but only when the
//! substitution also satisfies the document-level check. A correction that
//! would trade one inconsistency for another is never applied. The legal
//! document total is ground truth and is never modified.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::config::ReconcileConfig;
use crate::models::invoice::{
    ArithmeticChecks, CorrectionEntry, DocumentCheck, ExtractedInvoice, RateCheck, VatTier,
};
use crate::rates::VatRates;
use crate::rules::round2;

/// Output of one reconciliation run.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// The invoice after any applied corrections.
    pub invoice: ExtractedInvoice,
    /// Checks computed on the final figures.
    pub checks: ArithmeticChecks,
    /// Every override applied, with old and new values.
    pub corrections: Vec<CorrectionEntry>,
    /// Human-readable notes on everything that was found.
    pub warnings: Vec<String>,
}

/// Reconcile an invoice against the rate table of its fiscal region.
pub fn reconcile(invoice: &ExtractedInvoice, config: &ReconcileConfig) -> Reconciliation {
    let rates = VatRates::for_region(invoice.fiscal_region);
    let mut corrected = invoice.clone();
    let mut corrections = Vec::new();
    let mut warnings = Vec::new();

    for tier in VatTier::ALL {
        let base = corrected.base(tier);
        if base.is_zero() {
            continue;
        }

        let rate = rates.rate(tier);
        let expected = round2(base * rate);
        let actual = corrected.vat(tier);
        let delta = (actual - expected).abs();

        if delta <= config.line_tolerance {
            continue;
        }

        // Substitute the computed value and re-run the document-level check
        // before committing to the correction.
        let candidate_total_vat = round2(corrected.total_vat - actual + expected);
        let doc_delta =
            (corrected.bases_sum() + candidate_total_vat - corrected.total_amount).abs();

        if doc_delta <= config.doc_tolerance {
            debug!(tier = ?tier, %actual, %expected, "auto-correcting VAT tier");

            corrections.push(CorrectionEntry::new(tier.vat_field(), actual, expected));
            corrected.set_vat(tier, expected);

            if candidate_total_vat != corrected.total_vat {
                corrections.push(CorrectionEntry::new(
                    "total_vat",
                    corrected.total_vat,
                    candidate_total_vat,
                ));
                corrected.total_vat = candidate_total_vat;
            }

            corrected.penalize_confidence(config.correction_penalty, config.confidence_floor);
            warnings.push(format!(
                "IVA à taxa de {}% corrigido de {} para {} (base {})",
                percent(rate),
                actual,
                expected,
                base
            ));
        } else {
            warnings.push(format!(
                "IVA à taxa de {}% difere do esperado ({} vs {}) mas a correção não foi aplicada: o total do documento deixaria de conferir",
                percent(rate),
                actual,
                expected
            ));
        }
    }

    let checks = compute_checks(&corrected, &rates, config);
    if !checks.document.passed {
        warnings.push(format!(
            "Total do documento difere da soma das bases com o IVA em {}",
            checks.document.delta
        ));
    }

    Reconciliation {
        invoice: corrected,
        checks,
        corrections,
        warnings,
    }
}

/// Compute tier and document checks for the given figures.
fn compute_checks(
    invoice: &ExtractedInvoice,
    rates: &VatRates,
    config: &ReconcileConfig,
) -> ArithmeticChecks {
    let rate_checks = VatTier::ALL
        .iter()
        .map(|&tier| {
            let base = invoice.base(tier);
            let rate = rates.rate(tier);
            let expected_vat = round2(base * rate);
            let actual_vat = invoice.vat(tier);
            let delta = (actual_vat - expected_vat).abs();
            RateCheck {
                tier,
                rate,
                base,
                expected_vat,
                actual_vat,
                delta,
                passed: base.is_zero() || delta <= config.line_tolerance,
            }
        })
        .collect();

    let doc_delta = (invoice.bases_sum() + invoice.total_vat - invoice.total_amount).abs();

    ArithmeticChecks {
        rate_checks,
        document: DocumentCheck {
            delta: doc_delta,
            passed: doc_delta <= config.doc_tolerance,
        },
        line_tolerance: config.line_tolerance,
        doc_tolerance: config.doc_tolerance,
    }
}

fn percent(rate: Decimal) -> Decimal {
    (rate * Decimal::ONE_HUNDRED).normalize()
}
