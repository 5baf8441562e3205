//! Page driver seam.
//!
//! The crawler only talks to the portal through [`Page`]: JSON POSTs for the
//! API path, and navigation plus selector queries for the DOM path.
//! [`HttpSession`] / [`HttpPage`] implement it over `reqwest` and `scraper`.

mod http;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

pub use http::{HttpPage, HttpSession};

/// Status and decoded body of a JSON endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// Non-2xx status, or a non-zero `errorCode`/`resultCode`, as an error.
    pub fn ensure_ok(self, endpoint: &str) -> Result<Value> {
        if !(200..300).contains(&self.status) {
            return Err(AppError::api(endpoint, format!("status {}", self.status)));
        }
        for field in ["errorCode", "resultCode"] {
            if let Some(code) = self.body.get(field)
                && !is_zero_code(code)
            {
                let message = self
                    .body
                    .get("errorMsg")
                    .or_else(|| self.body.get("resultMsg"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                return Err(AppError::api(
                    endpoint,
                    format!("{field} {code} {message}").trim_end().to_string(),
                ));
            }
        }
        Ok(self.body)
    }
}

fn is_zero_code(code: &Value) -> bool {
    match code {
        Value::Null => true,
        Value::Number(n) => n.as_i64() == Some(0),
        Value::String(s) => {
            let s = s.trim();
            s.is_empty() || s.chars().all(|c| c == '0')
        }
        _ => false,
    }
}

/// One browsing context.
///
/// Element-addressing calls take a CSS selector plus the index of the match.
#[async_trait]
pub trait Page: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        body: &Map<String, Value>,
        headers: &BTreeMap<String, String>,
    ) -> Result<ApiResponse>;

    async fn goto(&self, url: &str) -> Result<()>;

    /// HTML of the current document.
    async fn content(&self) -> Result<String>;

    async fn count(&self, selector: &str) -> Result<usize>;

    async fn inner_text(&self, selector: &str, nth: usize) -> Result<Option<String>>;

    async fn attribute(&self, selector: &str, nth: usize, name: &str) -> Result<Option<String>>;

    async fn click(&self, selector: &str, nth: usize) -> Result<()>;

    /// Click and capture the JSON response of the request whose URL
    /// contains `url_fragment`, if one happens.
    async fn click_expect_json(
        &self,
        selector: &str,
        nth: usize,
        url_fragment: &str,
    ) -> Result<Option<Value>>;

    async fn go_back(&self) -> Result<()>;

    /// Whether `selector` matched before `timeout` ran out.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    async fn wait_for_load_state(&self) -> Result<()>;
}
