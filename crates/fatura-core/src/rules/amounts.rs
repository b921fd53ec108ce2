//! Currency parsing for extraction output.

use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::Value;
use std::str::FromStr;

/// Round to 2 decimal places with half-up rounding at the cent.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a currency amount out of an untyped extraction field.
///
/// Numbers pass through directly. Strings are stripped of currency symbols
/// and whitespace; when a comma is present, `.` is treated as a thousands
/// separator and `,` becomes the decimal point. The result is rounded to
/// 2 decimal places. Anything else yields `None`.
pub fn parse_currency(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => {
            let parsed = Decimal::from_f64_retain(n.as_f64()?)?;
            Some(round2(parsed))
        }
        Value::String(s) => parse_currency_str(s),
        _ => None,
    }
}

/// Parse a currency amount from a string.
pub fn parse_currency_str(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    Decimal::from_str(&normalized).ok().map(round2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_currency_numbers() {
        assert_eq!(
            parse_currency(&json!(123.456)),
            Some(Decimal::from_str("123.46").unwrap())
        );
        assert_eq!(
            parse_currency(&json!(100)),
            Some(Decimal::from_str("100").unwrap())
        );
    }

    #[test]
    fn test_parse_currency_strings() {
        assert_eq!(
            parse_currency(&json!("€ 1.234,56")),
            Some(Decimal::from_str("1234.56").unwrap())
        );
        assert_eq!(
            parse_currency(&json!("1234.56")),
            Some(Decimal::from_str("1234.56").unwrap())
        );
        assert_eq!(
            parse_currency(&json!("23,00")),
            Some(Decimal::from_str("23.00").unwrap())
        );
        assert_eq!(
            parse_currency(&json!("-12,30")),
            Some(Decimal::from_str("-12.30").unwrap())
        );
    }

    #[test]
    fn test_parse_currency_rejects_junk() {
        assert_eq!(parse_currency(&json!("")), None);
        assert_eq!(parse_currency(&json!("n/a")), None);
        assert_eq!(parse_currency(&json!(null)), None);
        assert_eq!(parse_currency(&json!(true)), None);
        assert_eq!(parse_currency(&json!([1, 2])), None);
    }

    #[test]
    fn test_round2_half_up() {
        assert_eq!(round2(Decimal::from_str("2.005").unwrap()), Decimal::from_str("2.01").unwrap());
        assert_eq!(round2(Decimal::from_str("2.004").unwrap()), Decimal::from_str("2.00").unwrap());
    }
}
