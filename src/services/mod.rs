//! Service layer for the crawler application.
//!
//! - Listing and response parsing (`NoticeParser`)
//! - List request bodies (`payload`)
//! - Page loop and per-notice fan-out (`CrawlerService`)

pub mod crawler;
pub mod parser;
pub mod payload;

pub use crawler::{CrawlerService, PageStats, RunStats};
pub use parser::{ListRow, NoticeParser};
