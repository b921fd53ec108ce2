//! Single-document ingestion pipeline.
//!
//! `ingest` is a pure composition of input validation, multi-pass
//! extraction and arithmetic reconciliation. It holds no state between
//! calls; warnings, corrections and confidence travel in the returned
//! value, never through shared state.

use rust_decimal::Decimal;
use tracing::{debug, info};

use fatura_vision::CompletionBackend;

use crate::error::{ExtractError, Result};
use crate::extract::Orchestrator;
use crate::input::{validate_file, DocumentFile};
use crate::models::config::FaturaConfig;
use crate::models::invoice::{
    ArithmeticChecks, CorrectionEntry, ExtractedInvoice, FiscalRegion, IngestResult,
};
use crate::reconcile::reconcile;
use crate::rules::{fiscal_period, normalize_date};

/// Confidence ceiling for a record with no usable supplier identifier.
const NO_IDENTIFIER_CONFIDENCE_CAP: u8 = 40;

/// Successful output of the pipeline.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The reconciled record.
    pub invoice: ExtractedInvoice,
    /// Arithmetic verification of the final figures.
    pub checks: ArithmeticChecks,
    /// Every value the pipeline changed, with old and new values.
    pub corrections: Vec<CorrectionEntry>,
    /// Human-readable warnings accumulated across every stage.
    pub warnings: Vec<String>,
}

/// Ingest one document: raw file in, validated structured record out.
pub async fn ingest(
    file: &DocumentFile,
    backend: &dyn CompletionBackend,
    config: &FaturaConfig,
) -> Result<IngestOutcome> {
    validate_file(file, &config.input)?;

    info!(file = %file.name, "ingesting document");

    let draft = Orchestrator::new(backend, config)
        .run(&file.payload())
        .await?;
    let raw = draft.raw;
    let ids = draft.ids;
    let mut warnings = draft.warnings;

    // Hard requirements: without a document date and a positive total the
    // fiscal math downstream has no basis.
    let document_date = raw
        .document_date
        .as_deref()
        .and_then(normalize_date)
        .ok_or(ExtractError::MissingRequiredField("document_date"))?;

    let total_amount = raw
        .total_amount
        .filter(|t| *t > Decimal::ZERO)
        .ok_or(ExtractError::MissingRequiredField("total_amount"))?;

    let fiscal_region = match raw.fiscal_region.as_deref() {
        Some(text) => match FiscalRegion::parse(text) {
            Some(region) => region,
            None => {
                warnings.push(format!(
                    "Região fiscal \"{}\" não reconhecida; assumido Continente",
                    text
                ));
                FiscalRegion::Mainland
            }
        },
        None => {
            warnings.push("Região fiscal não identificada; assumido Continente".to_string());
            FiscalRegion::Mainland
        }
    };

    let derived_period = fiscal_period(document_date);
    if let Some(reported) = &raw.fiscal_period {
        if reported != &derived_period {
            warnings.push(format!(
                "Período fiscal indicado ({}) difere do derivado da data ({}); usado o derivado",
                reported, derived_period
            ));
        }
    }

    let mut invoice = ExtractedInvoice {
        supplier_name: raw.supplier_name,
        supplier_nif: ids.valid_nif,
        supplier_vat_id: ids.vat_id,
        document_date,
        fiscal_period: derived_period,
        document_number: raw.document_number,
        document_type: raw.document_type,
        atcud: raw.atcud,
        fiscal_region,
        base_exempt: raw.base_exempt.unwrap_or_default(),
        base_reduced: raw.base_reduced.unwrap_or_default(),
        base_intermediate: raw.base_intermediate.unwrap_or_default(),
        base_standard: raw.base_standard.unwrap_or_default(),
        vat_reduced: raw.vat_reduced.unwrap_or_default(),
        vat_intermediate: raw.vat_intermediate.unwrap_or_default(),
        vat_standard: raw.vat_standard.unwrap_or_default(),
        total_vat: raw.total_vat.unwrap_or_default(),
        total_amount,
        regularization: raw.regularization,
        confidence: raw
            .confidence
            .unwrap_or(config.extraction.default_confidence),
    };

    // Identifier soft-failures: proceed, but say so and trust less.
    if invoice.supplier_nif.is_none() {
        if let Some(vat_id) = &invoice.supplier_vat_id {
            warnings.push(format!(
                "Fornecedor com identificador estrangeiro ({}); dedutibilidade sujeita a revisão manual",
                vat_id
            ));
        } else {
            if let Some(invalid) = &ids.invalid_nif {
                warnings.push(format!(
                    "NIF extraído ({}) falhou a validação do dígito de controlo",
                    invalid
                ));
            }
            warnings.push("Sem identificador fiscal do fornecedor utilizável".to_string());
            invoice.cap_confidence(NO_IDENTIFIER_CONFIDENCE_CAP);
        }
    }

    let reconciliation = reconcile(&invoice, &config.reconcile);
    warnings.extend(reconciliation.warnings);

    debug!(
        file = %file.name,
        confidence = reconciliation.invoice.confidence,
        corrections = reconciliation.corrections.len(),
        "document ingested"
    );

    Ok(IngestOutcome {
        invoice: reconciliation.invoice,
        checks: reconciliation.checks,
        corrections: reconciliation.corrections,
        warnings,
    })
}

/// `ingest`, shaped as a terminal per-document result instead of an error.
pub async fn ingest_result(
    file: &DocumentFile,
    backend: &dyn CompletionBackend,
    config: &FaturaConfig,
) -> IngestResult {
    match ingest(file, backend, config).await {
        Ok(outcome) => IngestResult {
            success: true,
            invoice: Some(outcome.invoice),
            checks: Some(outcome.checks),
            corrections: outcome.corrections,
            warnings: outcome.warnings,
            error: None,
        },
        Err(e) => IngestResult {
            success: false,
            invoice: None,
            checks: None,
            corrections: Vec::new(),
            warnings: Vec::new(),
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaturaError;
    use crate::testing::ScriptedBackend;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn file() -> DocumentFile {
        DocumentFile::new("fatura.pdf", "application/pdf", vec![0x25, 0x50, 0x44, 0x46])
    }

    #[tokio::test]
    async fn test_ingest_happy_path() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "supplier_name": "Mercearia Central Lda",
            "supplier_nif": "PT123456789",
            "document_date": "07/03/2025",
            "document_number": "FT 2025/42",
            "fiscal_region": "continente",
            "base_standard": "100,00",
            "vat_standard": 23.00,
            "total_vat": 23.00,
            "total_amount": 123.00,
            "confidence": 90
        }"#
        .to_string())]);

        let outcome = ingest(&file(), &backend, &FaturaConfig::default())
            .await
            .unwrap();

        let invoice = &outcome.invoice;
        assert_eq!(invoice.supplier_nif.as_deref(), Some("123456789"));
        assert_eq!(invoice.document_date.to_string(), "2025-03-07");
        assert_eq!(invoice.fiscal_period, "202503");
        assert_eq!(invoice.total_amount, dec("123.00"));
        assert_eq!(invoice.confidence, 90);
        assert!(outcome.checks.all_passed());
        assert!(outcome.corrections.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_fails_without_date() {
        let backend = ScriptedBackend::new(vec![Ok(
            r#"{"supplier_nif": "123456789", "total_amount": 123.00}"#.to_string(),
        )]);

        let result = ingest(&file(), &backend, &FaturaConfig::default()).await;
        assert!(matches!(
            result,
            Err(FaturaError::Extraction(ExtractError::MissingRequiredField(
                "document_date"
            )))
        ));
    }

    #[tokio::test]
    async fn test_ingest_fails_without_positive_total() {
        for total in [r#""total_amount": 0"#, r#""total_amount": -5"#, r#""atcud": null"#] {
            let backend = ScriptedBackend::new(vec![Ok(format!(
                r#"{{"supplier_nif": "123456789", "document_date": "2025-03-07", {total}}}"#
            ))]);

            let result = ingest(&file(), &backend, &FaturaConfig::default()).await;
            assert!(matches!(
                result,
                Err(FaturaError::Extraction(ExtractError::MissingRequiredField(
                    "total_amount"
                )))
            ));
        }
    }

    #[tokio::test]
    async fn test_ingest_caps_confidence_without_identifier() {
        // Pass 1 and the identifier retry both come back with nothing
        // usable.
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"document_date": "2025-03-07", "total_amount": 123.00,
                   "base_standard": 100.00, "vat_standard": 23.00, "total_vat": 23.00,
                   "confidence": 90}"#
                .to_string()),
            Ok(r#"{"supplier_nif": null}"#.to_string()),
        ]);

        let outcome = ingest(&file(), &backend, &FaturaConfig::default())
            .await
            .unwrap();

        assert_eq!(backend.calls(), 2);
        assert_eq!(outcome.invoice.confidence, 40);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("Sem identificador fiscal")));
    }

    #[tokio::test]
    async fn test_ingest_foreign_supplier_flagged_not_capped() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "supplier_name": "Cloud GmbH",
            "supplier_vat_id": "DE123456789",
            "document_date": "2025-03-07",
            "base_standard": 100.00, "vat_standard": 23.00,
            "total_vat": 23.00, "total_amount": 123.00,
            "confidence": 90
        }"#
        .to_string())]);

        let outcome = ingest(&file(), &backend, &FaturaConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.invoice.supplier_vat_id.as_deref(), Some("DE123456789"));
        assert_eq!(outcome.invoice.confidence, 90);
        assert!(outcome
            .warnings
            .iter()
            .any(|w| w.contains("revisão manual")));
    }

    #[tokio::test]
    async fn test_ingest_derives_period_over_reported_one() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "supplier_nif": "123456789",
            "document_date": "2025-03-07",
            "fiscal_period": "202501",
            "base_standard": 100.00, "vat_standard": 23.00,
            "total_vat": 23.00, "total_amount": 123.00,
            "confidence": 90
        }"#
        .to_string())]);

        let outcome = ingest(&file(), &backend, &FaturaConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.invoice.fiscal_period, "202503");
        assert!(outcome.warnings.iter().any(|w| w.contains("202501")));
    }

    #[tokio::test]
    async fn test_ingest_applies_reconciliation() {
        let backend = ScriptedBackend::new(vec![Ok(r#"{
            "supplier_nif": "123456789",
            "document_date": "2025-03-07",
            "base_standard": 100.00, "vat_standard": 20.00,
            "total_vat": 20.00, "total_amount": 123.00,
            "confidence": 90
        }"#
        .to_string())]);

        let outcome = ingest(&file(), &backend, &FaturaConfig::default())
            .await
            .unwrap();

        assert_eq!(outcome.invoice.vat_standard, dec("23.00"));
        assert_eq!(outcome.invoice.total_amount, dec("123.00"));
        assert_eq!(outcome.invoice.confidence, 70);
        assert_eq!(outcome.corrections[0].field, "vat_standard");
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_input_before_any_call() {
        let backend = ScriptedBackend::new(vec![]);
        let doc = DocumentFile::new("nota.txt", "text/plain", vec![1, 2, 3]);

        let result = ingest(&doc, &backend, &FaturaConfig::default()).await;
        assert!(matches!(result, Err(FaturaError::Input(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_ingest_result_shapes_failure() {
        let backend = ScriptedBackend::new(vec![Ok("ilegível".to_string())]);
        let result = ingest_result(&file(), &backend, &FaturaConfig::default()).await;

        assert!(!result.success);
        assert!(result.invoice.is_none());
        assert!(result.error.is_some());
    }
}
