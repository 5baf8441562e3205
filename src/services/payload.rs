//! List request bodies: search window and paging keys.

use std::sync::LazyLock;

use chrono::{Duration, NaiveDate};
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

const POSTING_RANGE: (&str, &str) = ("pbancPstgStDt", "pbancPstgEdDt");
const OPENING_RANGE: (&str, &str) = ("onbsPrnmntStDt", "onbsPrnmntEdDt");
const DATE_FORMAT: &str = "%Y%m%d";

static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{8}$").expect("valid regex"));

/// Template with its date range settled, before paging keys are added.
///
/// With a rolling window of `days`, the posting range (and the opening
/// range, when the template carries one) becomes `today-(days-1)..=today`.
/// Without one, any static range already in the template is checked.
pub fn prepare_list_template(
    template: &Map<String, Value>,
    search_range_days: Option<i64>,
    today: NaiveDate,
) -> Result<Map<String, Value>> {
    let mut payload = template.clone();

    match search_range_days {
        Some(days) if days <= 0 => {
            return Err(AppError::config(format!(
                "search_range_days must be positive, got {days}"
            )));
        }
        Some(days) => {
            let start = (today - Duration::days(days - 1))
                .format(DATE_FORMAT)
                .to_string();
            let end = today.format(DATE_FORMAT).to_string();

            set_range(&mut payload, POSTING_RANGE, &start, &end);
            if payload.contains_key(OPENING_RANGE.0) || payload.contains_key(OPENING_RANGE.1) {
                set_range(&mut payload, OPENING_RANGE, &start, &end);
            }
        }
        None => {
            validate_range(&payload, POSTING_RANGE)?;
            validate_range(&payload, OPENING_RANGE)?;
        }
    }

    Ok(payload)
}

/// Prepared template plus `currentPage` and `recordCountPerPage`.
pub fn list_page_payload(
    prepared: &Map<String, Value>,
    page: u32,
    page_size: u32,
) -> Map<String, Value> {
    let mut payload = prepared.clone();
    payload.insert("currentPage".into(), Value::from(page));
    payload.insert("recordCountPerPage".into(), Value::from(page_size));
    payload
}

fn set_range(payload: &mut Map<String, Value>, keys: (&str, &str), start: &str, end: &str) {
    payload.insert(keys.0.into(), Value::from(start));
    payload.insert(keys.1.into(), Value::from(end));
}

fn validate_range(payload: &Map<String, Value>, keys: (&str, &str)) -> Result<()> {
    let (start_key, end_key) = keys;
    let start = parse_payload_date(payload, start_key)?;
    let end = parse_payload_date(payload, end_key)?;
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(AppError::config(format!(
            "{start_key} ({start}) is after {end_key} ({end})"
        ))),
        _ => Ok(()),
    }
}

fn parse_payload_date(payload: &Map<String, Value>, key: &str) -> Result<Option<NaiveDate>> {
    let raw = match payload.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    };

    if !COMPACT_DATE.is_match(&raw) {
        return Err(AppError::config(format!(
            "{key} must be YYYYMMDD, got {raw:?}"
        )));
    }
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map(Some)
        .map_err(|_| AppError::config(format!("{key} is not a calendar date: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 6).unwrap()
    }

    /// One page in one call, the way the crawler chains the two steps.
    fn build_list_payload(
        template: &Map<String, Value>,
        page: u32,
        page_size: u32,
        search_range_days: Option<i64>,
        today: NaiveDate,
    ) -> Result<Map<String, Value>> {
        let prepared = prepare_list_template(template, search_range_days, today)?;
        Ok(list_page_payload(&prepared, page, page_size))
    }

    #[test]
    fn rolling_window_ends_today() {
        let payload =
            build_list_payload(&template(json!({"bidPbancNm": ""})), 2, 10, Some(3), today())
                .unwrap();
        assert_eq!(payload["pbancPstgStDt"], "20260204");
        assert_eq!(payload["pbancPstgEdDt"], "20260206");
        assert_eq!(payload["currentPage"], 2);
        assert_eq!(payload["recordCountPerPage"], 10);
        assert!(!payload.contains_key("onbsPrnmntStDt"));
    }

    #[test]
    fn rolling_window_overrides_opening_range_when_present() {
        let base = template(json!({"onbsPrnmntStDt": "", "onbsPrnmntEdDt": ""}));
        let payload = build_list_payload(&base, 1, 10, Some(1), today()).unwrap();
        assert_eq!(payload["onbsPrnmntStDt"], "20260206");
        assert_eq!(payload["onbsPrnmntEdDt"], "20260206");
    }

    #[test]
    fn non_positive_window_is_a_config_error() {
        let err = build_list_payload(&Map::new(), 1, 10, Some(0), today()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn inverted_static_range_is_a_config_error() {
        let base = template(json!({"pbancPstgStDt": "20260210", "pbancPstgEdDt": "20260201"}));
        let err = build_list_payload(&base, 1, 10, None, today()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn static_range_must_be_real_dates() {
        let bad_shape = template(json!({"pbancPstgStDt": "2026-02-01"}));
        assert!(build_list_payload(&bad_shape, 1, 10, None, today()).is_err());

        let bad_day = template(json!({"onbsPrnmntEdDt": "20260231"}));
        assert!(build_list_payload(&bad_day, 1, 10, None, today()).is_err());

        let ok = template(json!({"pbancPstgStDt": "20260101", "pbancPstgEdDt": "20260131"}));
        let payload = build_list_payload(&ok, 1, 10, None, today()).unwrap();
        assert_eq!(payload["pbancPstgStDt"], "20260101");
    }
}
