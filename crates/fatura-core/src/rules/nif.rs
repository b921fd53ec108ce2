//! NIF (Portuguese tax identification number) validation and extraction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::patterns::{COUNTRY_PREFIX, FOREIGN_VAT_ID};

/// First digits admitted by the national scheme. 0 and 4 are not assigned
/// to any taxpayer category.
const CATEGORY_DIGITS: &[char] = &['1', '2', '3', '5', '6', '7', '8', '9'];

/// Why a candidate failed NIF validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NifError {
    /// Not exactly 9 ASCII digits after stripping whitespace.
    #[error("NIF must be exactly 9 digits")]
    WrongLength,

    /// First digit outside the assigned taxpayer categories.
    #[error("NIF starts with an invalid category digit")]
    InvalidCategory,

    /// Mod-11 check digit does not match.
    #[error("NIF checksum mismatch")]
    ChecksumMismatch,
}

/// Taxpayer category encoded in the first digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NifCategory {
    /// Natural person (1, 2, 3).
    Individual,
    /// Legal person (5).
    LegalPerson,
    /// Public administration (6).
    PublicEntity,
    /// Sole trader (8).
    SoleTrader,
    /// Other assigned ranges (7, 9).
    Other,
}

/// Validate a Portuguese NIF.
///
/// Checksum: weighted sum of the first 8 digits with descending weights
/// 9..2, `remainder = sum mod 11`; the check digit is 0 when the remainder
/// is 0 or 1, otherwise `11 - remainder`.
///
/// Pure and total: malformed input yields an error value, never a panic.
pub fn validate_nif(nif: &str) -> Result<(), NifError> {
    let cleaned: String = nif.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.len() != 9 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(NifError::WrongLength);
    }

    let first = cleaned.chars().next().unwrap_or('0');
    if !CATEGORY_DIGITS.contains(&first) {
        return Err(NifError::InvalidCategory);
    }

    let digits: Vec<u32> = cleaned.chars().filter_map(|c| c.to_digit(10)).collect();
    if check_digit(&digits[..8]) != digits[8] {
        return Err(NifError::ChecksumMismatch);
    }

    Ok(())
}

/// Expected check digit for the first 8 digits.
fn check_digit(digits: &[u32]) -> u32 {
    let sum: u32 = digits
        .iter()
        .zip((2..=9).rev())
        .map(|(d, w)| d * w)
        .sum();

    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Taxpayer category of a NIF, by first digit.
pub fn category(nif: &str) -> Option<NifCategory> {
    match nif.trim().chars().next()? {
        '1' | '2' | '3' => Some(NifCategory::Individual),
        '5' => Some(NifCategory::LegalPerson),
        '6' => Some(NifCategory::PublicEntity),
        '8' => Some(NifCategory::SoleTrader),
        '7' | '9' => Some(NifCategory::Other),
        _ => None,
    }
}

/// Pull a 9-digit NIF candidate out of noisy extraction output.
///
/// Strips a leading 2-letter country prefix and every non-digit; the result
/// is accepted only if exactly 9 digits remain. Checksum validation is the
/// caller's decision.
pub fn extract_nif(text: &str) -> Option<String> {
    let stripped = COUNTRY_PREFIX.replace(text, "");
    let digits: String = stripped.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == 9 {
        Some(digits)
    } else {
        None
    }
}

/// Recognize a foreign VAT identifier: 2 uppercase letters followed by 2+
/// alphanumerics.
///
/// A candidate that would also parse as a national NIF (9 bare digits or a
/// `PT`-prefixed one) is rejected; the two identifier kinds are mutually
/// exclusive.
pub fn extract_vat_id(text: &str) -> Option<String> {
    let candidate: String = text.chars().filter(|c| !c.is_whitespace()).collect();

    if !FOREIGN_VAT_ID.is_match(&candidate) {
        return None;
    }

    if candidate.to_uppercase().starts_with("PT") && extract_nif(&candidate).is_some() {
        return None;
    }

    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_nif_valid() {
        // 1+2+..+8 weighted 9..2 sums to 156, remainder 2, check digit 9
        assert!(validate_nif("123456789").is_ok());
        assert!(validate_nif(" 123 456 789 ").is_ok());
        // Utility supplier NIF
        assert!(validate_nif("503504564").is_ok());
    }

    #[test]
    fn test_validate_nif_zero_check_digit() {
        // Weighted sum 45, remainder 1, check digit collapses to 0
        assert!(validate_nif("500000000").is_ok());
    }

    #[test]
    fn test_validate_nif_wrong_length() {
        assert_eq!(validate_nif("12345678"), Err(NifError::WrongLength));
        assert_eq!(validate_nif("1234567890"), Err(NifError::WrongLength));
        assert_eq!(validate_nif("12345678a"), Err(NifError::WrongLength));
        assert_eq!(validate_nif(""), Err(NifError::WrongLength));
    }

    #[test]
    fn test_validate_nif_invalid_category() {
        assert_eq!(validate_nif("423456789"), Err(NifError::InvalidCategory));
        assert_eq!(validate_nif("023456789"), Err(NifError::InvalidCategory));
    }

    #[test]
    fn test_single_digit_mutation_fails() {
        // Mutating any digit of a valid NIF breaks the checksum, except a
        // positional weight-coincidence; none applies to this vector.
        assert!(validate_nif("123456789").is_ok());
        for pos in 0..9 {
            let mut chars: Vec<char> = "123456789".chars().collect();
            let original = chars[pos].to_digit(10).unwrap();
            chars[pos] = char::from_digit((original + 1) % 10, 10).unwrap();
            let mutated: String = chars.into_iter().collect();
            assert!(validate_nif(&mutated).is_err(), "mutation at {pos} accepted");
        }
    }

    #[test]
    fn test_category() {
        assert_eq!(category("123456789"), Some(NifCategory::Individual));
        assert_eq!(category("503504564"), Some(NifCategory::LegalPerson));
        assert_eq!(category("600000000"), Some(NifCategory::PublicEntity));
        assert_eq!(category("400000000"), None);
    }

    #[test]
    fn test_extract_nif() {
        assert_eq!(extract_nif("123456789"), Some("123456789".to_string()));
        assert_eq!(extract_nif("PT123456789"), Some("123456789".to_string()));
        assert_eq!(extract_nif("PT 123 456 789"), Some("123456789".to_string()));
        assert_eq!(extract_nif("NIF: 123456789"), Some("123456789".to_string()));
        assert_eq!(extract_nif("12345678"), None);
        assert_eq!(extract_nif("1234567890"), None);
    }

    #[test]
    fn test_extract_vat_id() {
        assert_eq!(extract_vat_id("DE123456789"), Some("DE123456789".to_string()));
        assert_eq!(extract_vat_id("FR 123 456 78901"), Some("FR12345678901".to_string()));
        // Would parse as a national NIF: mutual exclusivity rejects it
        assert_eq!(extract_vat_id("PT123456789"), None);
        assert_eq!(extract_vat_id("123456789"), None);
        assert_eq!(extract_vat_id("D1"), None);
    }
}
