//! Utility functions and helpers.

pub mod http;
pub mod retry;

use url::Url;

pub use retry::RetryPolicy;

/// Join `href` onto `base`; an unjoinable `href` comes back unchanged.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(String::from)
        .unwrap_or_else(|_| href.to_string())
}
