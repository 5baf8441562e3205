// src/lib.rs

//! Bid notice crawler library.
//!
//! Pages through the procurement portal's bid-notice listing, fans out to the
//! per-notice endpoints and appends validated records to deduplicated CSV
//! stores, resuming from a page checkpoint.

pub mod browser;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
