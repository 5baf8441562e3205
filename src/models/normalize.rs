//! Field-level normalizers shared by every record type.
//!
//! The portal reports the same kind of value in several textual shapes
//! (slash or hyphen dates, compact digit runs, `"1,024"` sizes, `Y`/`N`
//! flags). Every function here is total over "empty" input and returns
//! `Ok(None)` for it; only non-empty garbage is a [`FormatError`].

use std::borrow::Cow;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// Canonical rendering used when a timestamp is written back out.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%d%H%M%S",
    "%Y%m%d%H%M",
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%Y-%m-%d", "%Y%m%d"];

/// A non-empty value that does not match any accepted shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported {kind} format: {value:?}")]
pub struct FormatError {
    pub kind: &'static str,
    pub value: String,
}

impl FormatError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Parse a timestamp in any of the portal's formats.
pub fn parse_timestamp(raw: &str) -> Result<Option<NaiveDateTime>, FormatError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Some(parsed));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(Some(date.and_time(NaiveTime::MIN)));
        }
    }

    Err(FormatError::new("timestamp", raw))
}

/// `Y`/`N` (any case) to a boolean; everything else is unknown.
pub fn parse_yes_no_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        s if s.eq_ignore_ascii_case("y") => Some(true),
        s if s.eq_ignore_ascii_case("n") => Some(false),
        _ => None,
    }
}

/// Integer with optional thousands separators.
pub fn parse_amount(raw: &str) -> Result<Option<i64>, FormatError> {
    let cleaned = strip_number_noise(raw);
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned
        .parse::<i64>()
        .map(Some)
        .map_err(|_| FormatError::new("integer", raw))
}

/// Decimal score with optional thousands separators.
pub fn parse_decimal(raw: &str) -> Result<Option<f64>, FormatError> {
    let cleaned = strip_number_noise(raw);
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned
        .parse::<f64>()
        .map(Some)
        .map_err(|_| FormatError::new("decimal", raw))
}

fn strip_number_noise(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect()
}

/// Trim; empty becomes `None`.
pub fn strip_or_none(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Remove every whitespace character (document numbers are keyed without it).
pub fn collapse_whitespace(raw: &str) -> Option<String> {
    let collapsed: String = raw.split_whitespace().collect();
    (!collapsed.is_empty()).then_some(collapsed)
}

/// Drop hyphens from a business registration number.
pub fn strip_hyphens_or_none(raw: &str) -> Option<String> {
    strip_or_none(&raw.replace('-', ""))
}

/// Decode numeric (`&#40;`, `&#x28;`) and named (`&amp;`) character references.
pub fn unescape_html(raw: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(raw)
}
