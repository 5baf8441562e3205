// src/services/parser.rs

//! Structural extraction from listing HTML and JSON response envelopes.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::mapping::LIST_FIELDS;
use crate::models::{RawRow, SelectorConfig};

/// A grid row and the position of its detail link.
#[derive(Debug, Clone)]
pub struct ListRow {
    pub raw: RawRow,
    /// Index of the row's first link among every `<list_row> <list_link>`
    /// match on the page, or `None` if the row has no link.
    pub link: Option<usize>,
}

/// Turns rendered pages into raw rows keyed like the JSON API.
#[derive(Debug, Clone)]
pub struct NoticeParser {
    list_row: Selector,
    list_link: Selector,
    cell: Selector,
    column_attr: String,
    detail_fields: Vec<(String, Selector)>,
}

impl NoticeParser {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        let detail_fields = selectors
            .detail_fields
            .iter()
            .map(|(key, css)| Ok((key.clone(), parse_selector(css)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            list_row: parse_selector(&selectors.list_row)?,
            list_link: parse_selector(&selectors.list_link)?,
            cell: parse_selector(&format!("[{}]", selectors.column_attr))?,
            column_attr: selectors.column_attr.clone(),
            detail_fields,
        })
    }

    /// Grid rows to raw list rows. Only cells whose column attribute names a
    /// known list field are kept; rows with none are dropped, but their
    /// links still count toward the link index of later rows.
    pub fn parse_list(&self, html: &str) -> Vec<ListRow> {
        let document = Html::parse_document(html);
        let mut links_before = 0;
        let mut rows = Vec::new();
        for row in document.select(&self.list_row) {
            let links = row.select(&self.list_link).count();
            let link = (links > 0).then_some(links_before);
            links_before += links;

            let raw = self.parse_row(row);
            if !raw.is_empty() {
                rows.push(ListRow { raw, link });
            }
        }
        rows
    }

    fn parse_row(&self, row: ElementRef<'_>) -> RawRow {
        let mut raw = RawRow::new();
        for cell in row.select(&self.cell) {
            let Some(key) = cell.value().attr(&self.column_attr) else {
                continue;
            };
            if !LIST_FIELDS.knows(key) {
                continue;
            }
            raw.insert(key.to_string(), Value::String(element_text(cell)));
        }
        raw
    }

    /// Sweep the configured detail selectors over a rendered detail view.
    pub fn parse_detail(&self, html: &str) -> RawRow {
        let document = Html::parse_document(html);
        let mut raw = RawRow::new();
        for (key, selector) in &self.detail_fields {
            if let Some(element) = document.select(selector).next() {
                let text = element_text(element);
                if !text.is_empty() {
                    raw.insert(key.clone(), Value::String(text));
                }
            }
        }
        raw
    }
}

/// Rows under `result` (or `result.<key>`).
pub fn extract_rows(body: &Value, key: Option<&str>) -> Vec<RawRow> {
    match envelope(body, key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map.clone()),
                other => {
                    log::warn!("Skipping non-object row: {other}");
                    None
                }
            })
            .collect(),
        Some(Value::Null) | None => {
            log::warn!("Response has no row list at {}", describe(key));
            Vec::new()
        }
        Some(other) => {
            log::warn!(
                "Expected a row list at {}, got {}",
                describe(key),
                kind_of(other)
            );
            Vec::new()
        }
    }
}

/// Map under `result` (or `result.<key>`).
pub fn extract_map(body: &Value, key: Option<&str>) -> RawRow {
    match envelope(body, key) {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => {
            log::warn!("Response has no map at {}", describe(key));
            RawRow::new()
        }
        Some(other) => {
            log::warn!("Expected a map at {}, got {}", describe(key), kind_of(other));
            RawRow::new()
        }
    }
}

fn envelope<'a>(body: &'a Value, key: Option<&str>) -> Option<&'a Value> {
    let result = body.get("result")?;
    match key {
        Some(key) => result.get(key),
        None => Some(result),
    }
}

fn describe(key: Option<&str>) -> String {
    match key {
        Some(key) => format!("result.{key}"),
        None => "result".to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a map",
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
