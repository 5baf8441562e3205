// src/pipeline/crawl.rs

//! Notice crawling pipeline.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::browser::HttpSession;
use crate::error::Result;
use crate::models::Config;
use crate::services::{CrawlerService, RunStats};
use crate::storage::CsvRepository;

/// One crawl: open a session, walk the pages, close the session.
///
/// The session is closed whether or not the crawl succeeds.
pub async fn run_crawler(
    config: &Config,
    max_pages: Option<u32>,
    reset_checkpoint: bool,
) -> Result<RunStats> {
    config.validate()?;
    let start_time = Utc::now();
    log::info!("Crawler starting");

    let repo = CsvRepository::new(&config.paths.output_dir);
    let mut crawler = CrawlerService::new(Arc::new(config.clone()), Box::new(repo))?
        .with_reset_checkpoint(reset_checkpoint);

    let session = HttpSession::open(config)?;
    let page = session.new_page();
    let result = crawler.run(&page, max_pages).await;
    drop(page);
    session.close();

    let stats = result?;
    let elapsed = Utc::now() - start_time;
    log::info!(
        "Crawler complete in {}s: {} pages, output in {}",
        elapsed.num_seconds(),
        stats.pages,
        config.paths.output_dir.display()
    );
    Ok(stats)
}

/// Run [`run_crawler`] forever, `interval` apart. A failed run is logged
/// and the loop carries on, unless the error is fatal: a bad configuration
/// fails the same way every round, so it ends the loop.
pub async fn run_interval(
    config: &Config,
    interval: Duration,
    max_pages: Option<u32>,
) -> Result<()> {
    let mut round: u64 = 0;
    loop {
        round += 1;
        log::info!("Interval run {round} starting");
        match run_crawler(config, max_pages, false).await {
            Ok(stats) => log::info!(
                "Interval run {round} finished: {} rows over {} pages",
                stats.rows,
                stats.pages
            ),
            Err(e) if e.is_fatal() => {
                log::error!("Interval run {round} failed, stopping: {e}");
                return Err(e);
            }
            Err(e) => log::error!("Interval run {round} failed: {e}"),
        }
        log::info!("Next run in {}s", interval.as_secs());
        tokio::time::sleep(interval).await;
    }
}
