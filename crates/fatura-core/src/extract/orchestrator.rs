//! Multi-pass extraction orchestrator.
//!
//! Drives one to three calls against the completion service for a single
//! document. Pass 1 asks for the full record; pass 2 is a focused
//! identifier-only retry; pass 3 is a document-class fallback for known
//! multi-section documents. Which passes run, and how their outputs merge,
//! is decided by an explicit decision table so the policy can be unit-tested
//! away from the network.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use fatura_vision::{CompletionBackend, CompletionRequest, DocumentPayload, VisionError};

use crate::error::{FaturaError, Result};
use crate::models::config::{ExtractionConfig, FallbackConfig, FaturaConfig, SectionSignature};
use crate::rules::{extract_nif, extract_vat_id, validate_nif};

use super::payload::{recover_json, RawExtraction};
use super::prompts;

/// Identifier candidates resolved from one extraction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IdResolution {
    /// Checksum-valid national identifier.
    pub valid_nif: Option<String>,
    /// 9-digit candidate that failed the checksum, kept for warnings.
    pub invalid_nif: Option<String>,
    /// Foreign VAT identifier.
    pub vat_id: Option<String>,
}

impl IdResolution {
    /// Resolve identifiers from the fields of a raw extraction.
    pub fn from_raw(raw: &RawExtraction) -> Self {
        let mut resolution = Self::default();

        if let Some(text) = &raw.supplier_nif {
            match extract_nif(text) {
                Some(nif) if validate_nif(&nif).is_ok() => resolution.valid_nif = Some(nif),
                Some(nif) => resolution.invalid_nif = Some(nif),
                None => {
                    // The national field sometimes carries a foreign id.
                    resolution.vat_id = extract_vat_id(text);
                }
            }
        }

        if resolution.vat_id.is_none() {
            if let Some(text) = &raw.supplier_vat_id {
                resolution.vat_id = extract_vat_id(text);
            }
        }

        resolution
    }

    /// Whether any identifier usable downstream was found.
    pub fn has_usable_id(&self) -> bool {
        self.valid_nif.is_some() || self.vat_id.is_some()
    }

    /// Merge a pass-2 resolution under the defined precedence: a valid NIF
    /// overrides an invalid or missing one; a foreign id only fills a gap.
    pub fn merge_retry(&mut self, retry: IdResolution) {
        if self.valid_nif.is_none() {
            if let Some(nif) = retry.valid_nif {
                self.valid_nif = Some(nif);
                self.invalid_nif = None;
            }
        }
        if self.vat_id.is_none() {
            self.vat_id = retry.vat_id;
        }
        if self.invalid_nif.is_none() && self.valid_nif.is_none() {
            self.invalid_nif = retry.invalid_nif;
        }
    }
}

/// Which optional passes to run for a document. One row of the decision
/// table per trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassPlan {
    pub retry_identifiers: bool,
    pub section_fallback: bool,
}

impl PassPlan {
    /// Decide the optional passes from the pass-1 outcome.
    pub fn decide(ids: &IdResolution, multi_section: bool, config: &ExtractionConfig) -> Self {
        Self {
            retry_identifiers: config.retry_identifiers && !ids.has_usable_id(),
            section_fallback: config.section_fallback && multi_section,
        }
    }
}

/// Whether the supplier matches a known multi-section document class.
pub fn matches_section_signature(
    signatures: &[SectionSignature],
    nif: Option<&str>,
    name: Option<&str>,
) -> bool {
    signatures.iter().any(|sig| {
        let nif_match = match (&sig.nif, nif) {
            (Some(expected), Some(found)) => expected == found,
            _ => false,
        };
        let name_match = match (&sig.name_fragment, name) {
            (Some(fragment), Some(found)) => {
                found.to_lowercase().contains(&fragment.to_lowercase())
            }
            _ => false,
        };
        nif_match || name_match
    })
}

/// Merged output of all passes, before field validation.
#[derive(Debug, Clone)]
pub struct ExtractionDraft {
    pub raw: RawExtraction,
    pub ids: IdResolution,
    pub warnings: Vec<String>,
}

/// Drives the extraction passes for one document.
pub struct Orchestrator<'a> {
    backend: &'a dyn CompletionBackend,
    config: &'a FaturaConfig,
}

impl<'a> Orchestrator<'a> {
    pub fn new(backend: &'a dyn CompletionBackend, config: &'a FaturaConfig) -> Self {
        Self { backend, config }
    }

    /// Run the passes for one document and merge their outputs.
    pub async fn run(&self, document: &DocumentPayload) -> Result<ExtractionDraft> {
        let mut warnings = Vec::new();

        // Pass 1: the full record. Failure here is failure of the document.
        let text = self
            .backend
            .complete(&CompletionRequest::new(
                prompts::full_extraction(),
                Some(document.clone()),
            ))
            .await?;
        let mut raw = RawExtraction::from_value(&recover_json(&text)?);
        let mut ids = IdResolution::from_raw(&raw);

        let plan = PassPlan::decide(
            &ids,
            matches_section_signature(
                &self.config.fallback.signatures,
                ids.valid_nif.as_deref().or(ids.invalid_nif.as_deref()),
                raw.supplier_name.as_deref(),
            ),
            &self.config.extraction,
        );
        debug!(?plan, "extraction pass plan");

        if plan.retry_identifiers {
            match self.run_identifier_retry(document).await {
                Ok(retry_ids) => ids.merge_retry(retry_ids),
                Err(e) if is_service_fatal(&e) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "identifier retry pass failed");
                    warnings
                        .push("Não foi possível repetir a leitura dos identificadores fiscais".to_string());
                }
            }
        }

        // The retry may have surfaced the supplier of a multi-section class.
        let multi_section = plan.section_fallback
            || (self.config.extraction.section_fallback
                && matches_section_signature(
                    &self.config.fallback.signatures,
                    ids.valid_nif.as_deref().or(ids.invalid_nif.as_deref()),
                    raw.supplier_name.as_deref(),
                ));

        if multi_section {
            match self.run_section_fallback(document).await {
                Ok(fallback) => {
                    apply_section_fallback(&mut raw, &fallback, &self.config.fallback, &mut warnings)
                }
                Err(e) if is_service_fatal(&e) => return Err(e),
                Err(e) => {
                    warn!(error = %e, "section fallback pass failed");
                    warnings.push(
                        "Não foi possível obter o apuramento global de IVA do documento".to_string(),
                    );
                }
            }
        }

        check_regularization(&mut raw, &self.config.fallback, &mut warnings);

        Ok(ExtractionDraft { raw, ids, warnings })
    }

    async fn run_identifier_retry(&self, document: &DocumentPayload) -> Result<IdResolution> {
        let text = self
            .backend
            .complete(&CompletionRequest::new(
                prompts::identifier_retry(),
                Some(document.clone()),
            ))
            .await?;
        let raw = RawExtraction::from_value(&recover_json(&text)?);
        Ok(IdResolution::from_raw(&raw))
    }

    async fn run_section_fallback(&self, document: &DocumentPayload) -> Result<RawExtraction> {
        let text = self
            .backend
            .complete(&CompletionRequest::new(
                prompts::section_totals(),
                Some(document.clone()),
            ))
            .await?;
        Ok(RawExtraction::from_value(&recover_json(&text)?))
    }
}

/// Rate-limit and quota conditions propagate even from best-effort passes,
/// so the batch layer can back off or alert instead of ploughing on.
fn is_service_fatal(error: &FaturaError) -> bool {
    matches!(
        error,
        FaturaError::Vision(VisionError::RateLimited) | FaturaError::Vision(VisionError::QuotaExhausted)
    )
}

/// Accept or reject the fallback VAT total against the envelope.
fn apply_section_fallback(
    raw: &mut RawExtraction,
    fallback: &RawExtraction,
    config: &FallbackConfig,
    warnings: &mut Vec<String>,
) {
    if let Some(r) = fallback.regularization {
        raw.regularization = Some(r);
    }

    let Some(fallback_total) = fallback.total_vat else {
        return;
    };
    let current = raw.total_vat.unwrap_or_else(|| raw.vat_tier_sum());

    let delta = (fallback_total - current).abs();
    let within_envelope = if current.is_zero() {
        fallback_total.is_zero()
    } else {
        delta <= config.max_abs_delta && delta / current.abs() <= config.max_ratio
    };

    if within_envelope {
        if fallback_total != current {
            warnings.push(format!(
                "Total de IVA ajustado pelo apuramento global do documento (de {} para {})",
                current, fallback_total
            ));
            raw.total_vat = Some(fallback_total);
        }
    } else {
        warnings.push(format!(
            "Apuramento global de IVA rejeitado: {} difere de {} além do envelope permitido",
            fallback_total, current
        ));
    }
}

/// Keep a same-document regularization only when inside the accepted bound.
fn check_regularization(
    raw: &mut RawExtraction,
    config: &FallbackConfig,
    warnings: &mut Vec<String>,
) {
    if let Some(r) = raw.regularization {
        if r <= Decimal::ZERO || r >= config.regularization_max {
            warnings.push(format!(
                "Regularização de {} fora dos limites esperados; valor ignorado",
                r
            ));
            raw.regularization = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn payload() -> DocumentPayload {
        DocumentPayload {
            media_type: "application/pdf".to_string(),
            data: vec![0x25, 0x50, 0x44, 0x46],
        }
    }

    fn full_response(nif: &str) -> String {
        format!(
            r#"{{"supplier_name": "Mercearia Central Lda", "supplier_nif": "{nif}",
                "document_date": "2025-03-07", "base_standard": 100.00,
                "vat_standard": 23.00, "total_vat": 23.00, "total_amount": 123.00,
                "confidence": 90}}"#
        )
    }

    #[tokio::test]
    async fn test_single_pass_when_identifier_valid() {
        let backend = ScriptedBackend::new(vec![Ok(full_response("123456789"))]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 1);
        assert_eq!(draft.ids.valid_nif.as_deref(), Some("123456789"));
        assert_eq!(draft.raw.total_amount, Some(dec("123.00")));
    }

    #[tokio::test]
    async fn test_identifier_retry_overrides_invalid_nif() {
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("123456780")), // checksum-invalid
            Ok(r#"{"supplier_nif": "PT123456789"}"#.to_string()),
        ]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(draft.ids.valid_nif.as_deref(), Some("123456789"));
        assert_eq!(draft.ids.invalid_nif, None);
    }

    #[tokio::test]
    async fn test_retry_failure_is_not_fatal() {
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("123456780")),
            Ok("não sei ler".to_string()), // malformed pass 2
        ]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(draft.ids.valid_nif, None);
        assert_eq!(draft.ids.invalid_nif.as_deref(), Some("123456780"));
        assert!(draft.warnings.iter().any(|w| w.contains("identificadores")));
    }

    #[tokio::test]
    async fn test_quota_exhausted_propagates_from_retry() {
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("123456780")),
            Err(VisionError::QuotaExhausted),
        ]);
        let config = FaturaConfig::default();

        let result = Orchestrator::new(&backend, &config).run(&payload()).await;
        assert!(matches!(
            result,
            Err(FaturaError::Vision(VisionError::QuotaExhausted))
        ));
    }

    #[tokio::test]
    async fn test_malformed_pass_one_is_fatal() {
        let backend = ScriptedBackend::new(vec![Ok("o documento está ilegível".to_string())]);
        let config = FaturaConfig::default();

        let result = Orchestrator::new(&backend, &config).run(&payload()).await;
        assert!(matches!(
            result,
            Err(FaturaError::Extraction(
                crate::error::ExtractError::MalformedExtraction(_)
            ))
        ));
    }

    #[tokio::test]
    async fn test_section_fallback_accepts_total_within_envelope() {
        // EDP supplier signature triggers pass 3; 24.50 vs 23.00 is inside
        // the default envelope.
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("503504564")),
            Ok(r#"{"total_vat": 24.50}"#.to_string()),
        ]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(draft.raw.total_vat, Some(dec("24.50")));
        assert!(draft.warnings.iter().any(|w| w.contains("apuramento global")));
    }

    #[tokio::test]
    async fn test_section_fallback_rejects_total_outside_envelope() {
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("503504564")),
            Ok(r#"{"total_vat": 95.00}"#.to_string()),
        ]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(draft.raw.total_vat, Some(dec("23.00")));
        assert!(draft.warnings.iter().any(|w| w.contains("rejeitado")));
    }

    #[tokio::test]
    async fn test_regularization_tracked_within_bound() {
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("503504564")),
            Ok(r#"{"total_vat": 23.00, "regularization": 12.34}"#.to_string()),
        ]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(draft.raw.regularization, Some(dec("12.34")));
    }

    #[tokio::test]
    async fn test_regularization_outside_bound_ignored() {
        let backend = ScriptedBackend::new(vec![
            Ok(full_response("503504564")),
            Ok(r#"{"total_vat": 23.00, "regularization": 75.00}"#.to_string()),
        ]);
        let config = FaturaConfig::default();

        let draft = Orchestrator::new(&backend, &config)
            .run(&payload())
            .await
            .unwrap();

        assert_eq!(draft.raw.regularization, None);
        assert!(draft.warnings.iter().any(|w| w.contains("Regularização")));
    }

    #[test]
    fn test_pass_plan_decision_table() {
        let config = ExtractionConfig::default();

        let none_found = IdResolution::default();
        let plan = PassPlan::decide(&none_found, false, &config);
        assert!(plan.retry_identifiers);

        let invalid_only = IdResolution {
            invalid_nif: Some("123456780".to_string()),
            ..Default::default()
        };
        assert!(PassPlan::decide(&invalid_only, false, &config).retry_identifiers);

        let valid = IdResolution {
            valid_nif: Some("123456789".to_string()),
            ..Default::default()
        };
        assert!(!PassPlan::decide(&valid, false, &config).retry_identifiers);

        let foreign = IdResolution {
            invalid_nif: Some("123456780".to_string()),
            vat_id: Some("DE123456789".to_string()),
            ..Default::default()
        };
        assert!(!PassPlan::decide(&foreign, false, &config).retry_identifiers);

        assert!(PassPlan::decide(&valid, true, &config).section_fallback);
        assert!(!PassPlan::decide(&valid, false, &config).section_fallback);
    }

    #[test]
    fn test_signature_match() {
        let signatures = FallbackConfig::default().signatures;
        assert!(matches_section_signature(&signatures, Some("503504564"), None));
        assert!(matches_section_signature(
            &signatures,
            None,
            Some("EDP Comercial, S.A.")
        ));
        assert!(!matches_section_signature(
            &signatures,
            Some("123456789"),
            Some("Mercearia Central")
        ));
    }
}
