//! Application configuration structures.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log filter used when neither `-v` nor `RUST_LOG` is given
    #[serde(default = "defaults::log_level")]
    pub log_level: String,

    /// HTTP and paging behavior
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Where stores and the checkpoint live
    #[serde(default)]
    pub paths: PathsConfig,

    /// JSON endpoints of the portal
    #[serde(default)]
    pub api: ApiConfig,

    /// Post-hoc equality filters on list rows
    #[serde(default)]
    pub filters: FilterConfig,

    /// Raw payload capture
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// DOM mode selectors
    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::config("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::config("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::config("crawler.max_pages must be > 0"));
        }
        if self.crawler.page_size == 0 {
            return Err(AppError::config("crawler.page_size must be > 0"));
        }
        if self.crawler.retry_count == 0 {
            return Err(AppError::config("crawler.retry_count must be > 0"));
        }
        let backoff = self.crawler.retry_backoff_secs;
        if backoff.is_nan() || backoff < 0.0 {
            return Err(AppError::config("crawler.retry_backoff_secs must be >= 0"));
        }
        if self.crawler.search_range_days.is_some_and(|days| days <= 0) {
            return Err(AppError::config("crawler.search_range_days must be > 0"));
        }
        if !self.api.list.is_configured() && self.crawler.list_url.is_none() {
            return Err(AppError::config(
                "either api.list.url or crawler.list_url must be set",
            ));
        }
        if !self.api.list.is_configured() && self.selectors.list_row.trim().is_empty() {
            return Err(AppError::config("selectors.list_row is empty"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level(),
            crawler: CrawlerConfig::default(),
            paths: PathsConfig::default(),
            api: ApiConfig::default(),
            filters: FilterConfig::default(),
            snapshot: SnapshotConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// HTTP client and paging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// Portal root; relative endpoint URLs resolve against it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Listing page for DOM mode
    #[serde(default)]
    pub list_url: Option<String>,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Last page a run walks to
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u32,

    /// Rows requested per list page
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Attempts per fetch, the first one included
    #[serde(default = "defaults::retry_count")]
    pub retry_count: u32,

    /// Fixed pause between attempts
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_secs: f64,

    /// Rolling search window ending today, in days
    #[serde(default)]
    pub search_range_days: Option<i64>,

    /// Delay between per-notice requests in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            list_url: None,
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_pages: defaults::max_pages(),
            page_size: defaults::page_size(),
            retry_count: defaults::retry_count(),
            retry_backoff_secs: defaults::retry_backoff(),
            search_range_days: None,
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "defaults::checkpoint_file")]
    pub checkpoint_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            checkpoint_file: defaults::checkpoint_file(),
        }
    }
}

/// One JSON endpoint: where to POST, with which headers, starting from
/// which body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body template; per-request keys are added on top
    #[serde(default)]
    pub payload: Map<String, Value>,

    /// Key under the `result` envelope holding the rows or map
    #[serde(default)]
    pub result_key: Option<String>,
}

impl EndpointConfig {
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}

/// The opening endpoint answers with a summary map and a result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpeningEndpointConfig {
    #[serde(flatten)]
    pub endpoint: EndpointConfig,

    #[serde(default = "defaults::summary_key")]
    pub summary_key: String,

    #[serde(default = "defaults::results_key")]
    pub results_key: String,
}

impl Default for OpeningEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            summary_key: defaults::summary_key(),
            results_key: defaults::results_key(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub list: EndpointConfig,
    #[serde(default)]
    pub detail: EndpointConfig,
    #[serde(default)]
    pub notice_update: EndpointConfig,
    #[serde(default)]
    pub attachment: EndpointConfig,
    #[serde(default)]
    pub opening: OpeningEndpointConfig,
    /// Fetched once per run when set
    #[serde(default)]
    pub code_dict: EndpointConfig,
}

/// Equality filters applied to list rows after fetching.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub pbanc_knd_cd: Option<String>,
    #[serde(default)]
    pub pbanc_stts_cd: Option<String>,
    #[serde(default)]
    pub bid_pbanc_pgst_cd: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Every list page and every detail/opening response
    All,
    /// Only responses carrying keys outside the allow-list
    #[default]
    Unexpected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub mode: SnapshotMode,

    #[serde(default = "defaults::snapshot_dir")]
    pub dir: PathBuf,

    /// In `all` mode, capture list pages only
    #[serde(default)]
    pub only_list: bool,

    /// Raw detail keys considered known; defaults to the mapping table
    #[serde(default)]
    pub detail_allowed_keys: Option<Vec<String>>,

    /// Raw opening keys considered known; defaults to the mapping tables
    #[serde(default)]
    pub opening_allowed_keys: Option<Vec<String>>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: SnapshotMode::default(),
            dir: defaults::snapshot_dir(),
            only_list: false,
            detail_allowed_keys: None,
            opening_allowed_keys: None,
        }
    }
}

/// CSS selectors for the rendered listing and detail popup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "defaults::list_row")]
    pub list_row: String,

    #[serde(default = "defaults::list_link")]
    pub list_link: String,

    /// Attribute naming the raw field a grid cell holds
    #[serde(default = "defaults::column_attr")]
    pub column_attr: String,

    #[serde(default)]
    pub search_button: Option<String>,

    #[serde(default)]
    pub pagination_next: Option<String>,

    #[serde(default)]
    pub detail_popup: Option<String>,

    #[serde(default)]
    pub detail_close: Option<String>,

    /// Raw detail key to CSS selector
    #[serde(default)]
    pub detail_fields: BTreeMap<String, String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            list_row: defaults::list_row(),
            list_link: defaults::list_link(),
            column_attr: defaults::column_attr(),
            search_button: None,
            pagination_next: None,
            detail_popup: None,
            detail_close: None,
            detail_fields: BTreeMap::new(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn log_level() -> String {
        "info".into()
    }

    // Crawler defaults
    pub fn base_url() -> String {
        "https://www.g2b.go.kr".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; bid-crawler/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_pages() -> u32 {
        10
    }
    pub fn page_size() -> u32 {
        10
    }
    pub fn retry_count() -> u32 {
        3
    }
    pub fn retry_backoff() -> f64 {
        1.0
    }
    pub fn request_delay() -> u64 {
        0
    }

    // Path defaults
    pub fn output_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn checkpoint_file() -> PathBuf {
        PathBuf::from("data/checkpoint.json")
    }
    pub fn snapshot_dir() -> PathBuf {
        PathBuf::from("data/snapshots")
    }

    // Opening envelope keys
    pub fn summary_key() -> String {
        "pbancMap".into()
    }
    pub fn results_key() -> String {
        "oobsRsltList".into()
    }

    // Selector defaults
    pub fn list_row() -> String {
        "tr[data-row-index]".into()
    }
    pub fn list_link() -> String {
        "a".into()
    }
    pub fn column_attr() -> String {
        "col_id".into()
    }
}
