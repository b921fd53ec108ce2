//! Date normalization for extraction output.

use chrono::{Datelike, NaiveDate};

use super::patterns::{DATE_COMPACT, DATE_DMY_SLASH, DATE_ISO, DATE_YMD_SLASH};

/// Normalize a textual date into a calendar date.
///
/// Accepts exactly four shapes: `YYYY-MM-DD`, `DD/MM/YYYY`, `YYYY/MM/DD`
/// and `YYYYMMDD`. The (year, month, day) triple must form a real calendar
/// date; impossible combinations like day 31 in April yield `None`. Never
/// panics.
pub fn normalize_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();

    let (year, month, day) = if let Some(caps) = DATE_ISO.captures(input) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else if let Some(caps) = DATE_DMY_SLASH.captures(input) {
        (caps[3].parse().ok()?, caps[2].parse().ok()?, caps[1].parse().ok()?)
    } else if let Some(caps) = DATE_YMD_SLASH.captures(input) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else if let Some(caps) = DATE_COMPACT.captures(input) {
        (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?)
    } else {
        return None;
    };

    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Fiscal period `YYYYMM` for a document date.
///
/// Always derived from the normalized date; a period echoed by the
/// extraction service is never trusted directly.
pub fn fiscal_period(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}
