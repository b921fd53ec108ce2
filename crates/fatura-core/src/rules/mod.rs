//! Normalization and validation rules for fiscal fields.

pub mod amounts;
pub mod dates;
pub mod nif;
pub mod niss;
pub mod patterns;

pub use amounts::{parse_currency, parse_currency_str, round2};
pub use dates::{fiscal_period, normalize_date};
pub use nif::{category, extract_nif, extract_vat_id, validate_nif, NifCategory, NifError};
pub use niss::{validate_niss, NissError};
