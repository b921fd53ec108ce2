//! Total, non-throwing parsing of the untyped AI extraction payload.
//!
//! The service returns JSON of unreliable shape. Nothing here trusts field
//! presence or type: every field is coerced individually and silently
//! becomes `None` when unusable.

use rust_decimal::Decimal;
use serde_json::Value;

use crate::error::ExtractError;
use crate::rules::parse_currency;
use crate::rules::patterns::FENCED_JSON;

/// Field-by-field view of one extraction pass, before validation.
#[derive(Debug, Clone, Default)]
pub struct RawExtraction {
    pub supplier_name: Option<String>,
    pub supplier_nif: Option<String>,
    pub supplier_vat_id: Option<String>,
    pub customer_nif: Option<String>,
    pub document_date: Option<String>,
    pub document_number: Option<String>,
    pub document_type: Option<String>,
    pub atcud: Option<String>,
    pub fiscal_region: Option<String>,
    pub fiscal_period: Option<String>,
    pub base_exempt: Option<Decimal>,
    pub base_reduced: Option<Decimal>,
    pub base_intermediate: Option<Decimal>,
    pub base_standard: Option<Decimal>,
    pub vat_reduced: Option<Decimal>,
    pub vat_intermediate: Option<Decimal>,
    pub vat_standard: Option<Decimal>,
    pub total_vat: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub regularization: Option<Decimal>,
    pub confidence: Option<u8>,
}

impl RawExtraction {
    /// Coerce an untyped JSON object into a raw extraction.
    pub fn from_value(value: &Value) -> Self {
        Self {
            supplier_name: str_field(value, "supplier_name"),
            supplier_nif: str_field(value, "supplier_nif"),
            supplier_vat_id: str_field(value, "supplier_vat_id"),
            customer_nif: str_field(value, "customer_nif"),
            document_date: str_field(value, "document_date"),
            document_number: str_field(value, "document_number"),
            document_type: str_field(value, "document_type"),
            atcud: str_field(value, "atcud"),
            fiscal_region: str_field(value, "fiscal_region"),
            fiscal_period: str_field(value, "fiscal_period"),
            base_exempt: money_field(value, "base_exempt"),
            base_reduced: money_field(value, "base_reduced"),
            base_intermediate: money_field(value, "base_intermediate"),
            base_standard: money_field(value, "base_standard"),
            vat_reduced: money_field(value, "vat_reduced"),
            vat_intermediate: money_field(value, "vat_intermediate"),
            vat_standard: money_field(value, "vat_standard"),
            total_vat: money_field(value, "total_vat"),
            total_amount: money_field(value, "total_amount"),
            regularization: money_field(value, "regularization"),
            confidence: confidence_field(value),
        }
    }

    /// Sum of the per-tier VAT amounts that were reported.
    pub fn vat_tier_sum(&self) -> Decimal {
        self.vat_reduced.unwrap_or_default()
            + self.vat_intermediate.unwrap_or_default()
            + self.vat_standard.unwrap_or_default()
    }
}

/// Recover a JSON object from the raw completion text.
///
/// Tries, in order: a direct parse, a fenced ```json block, and the first
/// `{...}` span in the text. When all three fail the pass is unusable.
pub fn recover_json(text: &str) -> Result<Value, ExtractError> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let Some(caps) = FENCED_JSON.captures(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            if value.is_object() {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err(ExtractError::MalformedExtraction(format!(
        "no JSON object in {} bytes of output",
        text.len()
    )))
}

/// A non-empty string field, tolerating numeric values for identifiers.
fn str_field(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A monetary field via the currency parser.
fn money_field(value: &Value, key: &str) -> Option<Decimal> {
    parse_currency(value.get(key)?)
}

/// Self-reported confidence clamped to 0-100.
fn confidence_field(value: &Value) -> Option<u8> {
    let field = value.get("confidence")?;
    let number = match field {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some(number.clamp(0.0, 100.0).round() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_from_value_coerces_field_by_field() {
        let value = json!({
            "supplier_name": "Mercearia Central Lda",
            "supplier_nif": 123456789,
            "document_date": "2025-03-07",
            "base_standard": "100,00",
            "vat_standard": 23.0,
            "total_amount": "€ 123,00",
            "confidence": 85,
            "atcud": null,
        });

        let raw = RawExtraction::from_value(&value);
        assert_eq!(raw.supplier_nif.as_deref(), Some("123456789"));
        assert_eq!(raw.base_standard, Some(Decimal::from_str("100.00").unwrap()));
        assert_eq!(raw.vat_standard, Some(Decimal::from_str("23.00").unwrap()));
        assert_eq!(raw.total_amount, Some(Decimal::from_str("123.00").unwrap()));
        assert_eq!(raw.confidence, Some(85));
        assert_eq!(raw.atcud, None);
        assert_eq!(raw.document_number, None);
    }

    #[test]
    fn test_from_value_ignores_wrong_types() {
        let value = json!({
            "supplier_nif": ["123456789"],
            "total_amount": { "value": 10 },
            "confidence": "alta",
        });

        let raw = RawExtraction::from_value(&value);
        assert_eq!(raw.supplier_nif, None);
        assert_eq!(raw.total_amount, None);
        assert_eq!(raw.confidence, None);
    }

    #[test]
    fn test_recover_json_direct() {
        let value = recover_json(r#"{"total_amount": 10}"#).unwrap();
        assert_eq!(value["total_amount"], 10);
    }

    #[test]
    fn test_recover_json_fenced() {
        let text = "Aqui está o resultado:\n```json\n{\"total_amount\": 10}\n```\nEspero que ajude.";
        let value = recover_json(text).unwrap();
        assert_eq!(value["total_amount"], 10);
    }

    #[test]
    fn test_recover_json_embedded_span() {
        let text = "O documento contém {\"total_amount\": 10} como total.";
        let value = recover_json(text).unwrap();
        assert_eq!(value["total_amount"], 10);
    }

    #[test]
    fn test_recover_json_failure() {
        assert!(recover_json("não consigo ler o documento").is_err());
        assert!(recover_json("[1, 2, 3]").is_err());
        assert!(recover_json("").is_err());
    }
}
