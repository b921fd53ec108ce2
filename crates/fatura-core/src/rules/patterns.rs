//! Common regex patterns for identifier and date normalization.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Leading 2-letter country code on a tax identifier ("PT 123456789")
    pub static ref COUNTRY_PREFIX: Regex = Regex::new(
        r"^\s*([A-Za-z]{2})[\s.:-]*"
    ).unwrap();

    // Foreign VAT identifier: 2 uppercase letters + 2 or more alphanumerics
    pub static ref FOREIGN_VAT_ID: Regex = Regex::new(
        r"^[A-Z]{2}[A-Za-z0-9]{2,}$"
    ).unwrap();

    // The four accepted date shapes
    pub static ref DATE_ISO: Regex = Regex::new(
        r"^(\d{4})-(\d{1,2})-(\d{1,2})$"
    ).unwrap();

    pub static ref DATE_DMY_SLASH: Regex = Regex::new(
        r"^(\d{1,2})/(\d{1,2})/(\d{4})$"
    ).unwrap();

    pub static ref DATE_YMD_SLASH: Regex = Regex::new(
        r"^(\d{4})/(\d{1,2})/(\d{1,2})$"
    ).unwrap();

    pub static ref DATE_COMPACT: Regex = Regex::new(
        r"^(\d{4})(\d{2})(\d{2})$"
    ).unwrap();

    // Fiscal period as sometimes echoed by the extraction service
    pub static ref FISCAL_PERIOD: Regex = Regex::new(
        r"^\d{6}$"
    ).unwrap();

    // JSON object inside a fenced code block
    pub static ref FENCED_JSON: Regex = Regex::new(
        r"(?s)```(?:json)?\s*(\{.*?\})\s*```"
    ).unwrap();
}
