//! Pipeline entry points for crawler operations.
//!
//! - `run_crawler`: One crawl from the checkpoint to the page limit
//! - `run_interval`: Repeat `run_crawler` on a fixed interval

pub mod crawl;

pub use crawl::{run_crawler, run_interval};
