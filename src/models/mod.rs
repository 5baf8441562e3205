// src/models/mod.rs

//! Domain models for the crawler.
//!
//! Raw portal rows go through a [`FieldMap`] into [`Fields`], and each
//! record's `from_fields` is the only place values get normalized and
//! validated. Records serialize to CSV in struct field order.

mod attachment;
mod code;
mod config;
pub mod mapping;
pub mod normalize;
mod notice;
mod opening;
mod record;
mod validation;

// Re-export all public types
pub use attachment::AttachmentItem;
pub use code::CodeDictEntry;
pub use config::{
    ApiConfig, Config, CrawlerConfig, EndpointConfig, FilterConfig, OpeningEndpointConfig,
    PathsConfig, SelectorConfig, SnapshotConfig, SnapshotMode,
};
pub use mapping::{Fields, RawRow};
pub use normalize::FormatError;
pub use notice::{DetailItem, ListItem, NoticeUpdateItem};
pub use opening::{OpeningResult, OpeningSummary};
pub use record::{Collection, NoticeKey, Record};
pub use validation::{Reason, ValidationError};
