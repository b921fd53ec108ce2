//! NISS (Portuguese social security number) validation.

use thiserror::Error;

/// Weights for the first 10 digits: descending primes.
const WEIGHTS: [u32; 10] = [29, 23, 19, 17, 13, 11, 7, 5, 3, 2];

/// Why a candidate failed NISS validation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NissError {
    /// Not exactly 11 ASCII digits.
    #[error("NISS must be exactly 11 digits")]
    WrongLength,

    /// Check digit does not match.
    #[error("NISS checksum mismatch")]
    ChecksumMismatch,
}

/// Validate a NISS.
///
/// The field is optional on every document that carries it, so empty input
/// is valid for this scheme. Check digit: `9 - (weighted sum mod 10)`.
pub fn validate_niss(niss: &str) -> Result<(), NissError> {
    let cleaned: String = niss.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Ok(());
    }

    if cleaned.len() != 11 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(NissError::WrongLength);
    }

    let digits: Vec<u32> = cleaned.chars().filter_map(|c| c.to_digit(10)).collect();

    let sum: u32 = digits
        .iter()
        .take(10)
        .zip(WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();

    let expected = 9 - (sum % 10);
    if expected != digits[10] {
        return Err(NissError::ChecksumMismatch);
    }

    Ok(())
}
