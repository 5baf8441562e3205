// src/services/crawler.rs

//! Crawl orchestration: the page loop and the per-notice fan-out.
//!
//! Each page goes fetch, parse, validate, filter, fan out, persist, and only
//! then advances the checkpoint. Fetch and validation failures are logged
//! and counted; configuration and local storage errors end the run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use serde_json::{Map, Value};

use crate::browser::Page;
use crate::error::{AppError, Result};
use crate::models::{
    AttachmentItem, CodeDictEntry, Collection, Config, DetailItem, EndpointConfig, ListItem,
    NoticeKey, NoticeUpdateItem, OpeningResult, OpeningSummary, RawRow,
};
use crate::services::parser::{NoticeParser, extract_map, extract_rows};
use crate::services::payload::{list_page_payload, prepare_list_template};
use crate::storage::{CheckpointStore, NoticeRepository, SaveOutcome, SnapshotStore};
use crate::utils::RetryPolicy;

const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters for one page.
#[derive(Debug, Clone, Default)]
pub struct PageStats {
    pub page: u32,
    pub rows: usize,
    pub invalid: usize,
    pub filtered: usize,
    pub fetch_failures: usize,
    pub saved: BTreeMap<Collection, SaveOutcome>,
}

impl PageStats {
    fn new(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    fn record(&mut self, collection: Collection, outcome: SaveOutcome) {
        self.saved.entry(collection).or_default().merge(outcome);
    }

    pub fn outcome(&self, collection: Collection) -> SaveOutcome {
        self.saved.get(&collection).copied().unwrap_or_default()
    }
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub start_page: u32,
    pub last_page: Option<u32>,
    pub pages: usize,
    pub rows: usize,
    pub invalid: usize,
    pub filtered: usize,
    pub fetch_failures: usize,
    pub saved: BTreeMap<Collection, SaveOutcome>,
}

impl RunStats {
    fn absorb(&mut self, page: &PageStats) {
        self.last_page = Some(page.page);
        self.pages += 1;
        self.rows += page.rows;
        self.invalid += page.invalid;
        self.filtered += page.filtered;
        self.fetch_failures += page.fetch_failures;
        for (collection, outcome) in &page.saved {
            self.saved.entry(*collection).or_default().merge(*outcome);
        }
    }

    pub fn outcome(&self, collection: Collection) -> SaveOutcome {
        self.saved.get(&collection).copied().unwrap_or_default()
    }
}

fn describe_saved(saved: &BTreeMap<Collection, SaveOutcome>) -> String {
    if saved.is_empty() {
        return "nothing saved".to_string();
    }
    saved
        .iter()
        .map(|(c, o)| format!("{} +{} ({} dup)", c.label(), o.saved, o.skipped))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Records of one page waiting to be persisted.
#[derive(Debug, Default)]
struct PageBatch {
    list: Vec<ListItem>,
    detail: Vec<DetailItem>,
    notice_updates: Vec<NoticeUpdateItem>,
    attachments: Vec<AttachmentItem>,
    opening_summaries: Vec<OpeningSummary>,
    opening_results: Vec<OpeningResult>,
}

/// Walks the listing and persists everything reachable from it.
pub struct CrawlerService {
    config: Arc<Config>,
    repo: Box<dyn NoticeRepository>,
    checkpoint: CheckpointStore,
    parser: NoticeParser,
    snapshot: Option<SnapshotStore>,
    retry: RetryPolicy,
    reset_checkpoint: bool,
    today: Option<NaiveDate>,
}

impl CrawlerService {
    pub fn new(config: Arc<Config>, repo: Box<dyn NoticeRepository>) -> Result<Self> {
        let parser = NoticeParser::new(&config.selectors)?;
        let snapshot = SnapshotStore::from_config(&config.snapshot);
        if let Some(store) = &snapshot {
            log::info!("Snapshots enabled under {}", store.dir().display());
        }
        Ok(Self {
            checkpoint: CheckpointStore::new(&config.paths.checkpoint_file),
            snapshot,
            retry: RetryPolicy::from_config(&config.crawler),
            parser,
            repo,
            config,
            reset_checkpoint: false,
            today: None,
        })
    }

    /// Start from page 1 regardless of the saved checkpoint.
    pub fn with_reset_checkpoint(mut self, reset: bool) -> Self {
        self.reset_checkpoint = reset;
        self
    }

    /// Fix "today" for the rolling search window.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    /// Crawl from the checkpoint up to `max_pages` (capped by configuration).
    pub async fn run(&mut self, page: &dyn Page, max_pages: Option<u32>) -> Result<RunStats> {
        let config = Arc::clone(&self.config);
        config.validate()?;

        let target = max_pages.map_or(config.crawler.max_pages, |m| {
            m.min(config.crawler.max_pages)
        });
        let today = self.today.unwrap_or_else(|| Local::now().date_naive());
        let prepared = prepare_list_template(
            &config.api.list.payload,
            config.crawler.search_range_days,
            today,
        )?;

        if self.reset_checkpoint {
            self.checkpoint.clear().await?;
        }
        let mut start = self.checkpoint.load().await?.unwrap_or(1);
        if start > target {
            log::info!("Checkpoint page {start} is past target {target}; starting over");
            self.checkpoint.clear().await?;
            start = 1;
        }

        log::info!("Crawl starting at page {start}, target page {target}");
        let mut stats = RunStats {
            start_page: start,
            ..RunStats::default()
        };

        self.load_code_dict(page, &mut stats).await?;

        if config.api.list.is_configured() {
            self.run_api(page, &prepared, start, target, today, &mut stats)
                .await?;
        } else {
            self.run_dom(page, start, target, &mut stats).await?;
        }

        log::info!(
            "Crawl finished: {} pages, {} rows, {} invalid, {} filtered, {} fetch failures; {}",
            stats.pages,
            stats.rows,
            stats.invalid,
            stats.filtered,
            stats.fetch_failures,
            describe_saved(&stats.saved)
        );
        Ok(stats)
    }

    // --- API path ---

    async fn run_api(
        &mut self,
        page: &dyn Page,
        prepared: &Map<String, Value>,
        start: u32,
        target: u32,
        today: NaiveDate,
        stats: &mut RunStats,
    ) -> Result<()> {
        for p in start..=target {
            let page_stats = self.crawl_api_page(page, prepared, p, today).await?;
            self.finish_page(page_stats, stats).await?;
        }
        Ok(())
    }

    async fn crawl_api_page(
        &mut self,
        page: &dyn Page,
        prepared: &Map<String, Value>,
        p: u32,
        today: NaiveDate,
    ) -> Result<PageStats> {
        let config = Arc::clone(&self.config);
        let mut stats = PageStats::new(p);
        let payload = list_page_payload(prepared, p, config.crawler.page_size);

        let label = format!("list page {p}");
        let raw_rows = match self.fetch_json(page, &label, &config.api.list, &payload).await {
            Ok(body) => {
                if let Some(snapshot) = &self.snapshot
                    && let Err(e) = snapshot.save_list_page(today, p, &body).await
                {
                    log::warn!("Snapshot of {label} failed: {e}");
                }
                extract_rows(&body, config.api.list.result_key.as_deref())
            }
            Err(e) => {
                log::warn!("Giving up on {label}: {e}");
                stats.fetch_failures += 1;
                Vec::new()
            }
        };

        let items = self.build_list_items(raw_rows, &mut stats);
        let mut batch = PageBatch::default();
        for (_, item) in &items {
            self.process_item(page, item, None, &mut batch, &mut stats)
                .await;
            self.pause().await;
        }
        batch.list = items.into_iter().map(|(_, item)| item).collect();

        self.persist(batch, &mut stats).await?;
        Ok(stats)
    }

    // --- DOM path ---

    async fn run_dom(
        &mut self,
        page: &dyn Page,
        start: u32,
        target: u32,
        stats: &mut RunStats,
    ) -> Result<()> {
        let config = Arc::clone(&self.config);
        let list_url = config
            .crawler
            .list_url
            .as_deref()
            .ok_or_else(|| AppError::config("crawler.list_url is not set"))?;

        if let Err(e) = self.retry.run("listing page", || page.goto(list_url)).await {
            log::warn!("Could not open listing {list_url}: {e}");
            stats.fetch_failures += 1;
            return Ok(());
        }
        if let Some(search) = &config.selectors.search_button
            && page.count(search).await? > 0
        {
            page.click(search, 0).await?;
            page.wait_for_load_state().await?;
        }
        if !page
            .wait_for_selector(&config.selectors.list_row, WAIT_TIMEOUT)
            .await?
        {
            log::warn!("Listing shows no rows for {}", config.selectors.list_row);
        }

        let mut current = 1;
        while current < start {
            if !self.next_page(page).await {
                log::warn!("Listing ended at page {current} before reaching page {start}");
                return Ok(());
            }
            current += 1;
        }

        loop {
            let page_stats = self.crawl_dom_page(page, current).await?;
            self.finish_page(page_stats, stats).await?;
            if current >= target || !self.next_page(page).await {
                break;
            }
            current += 1;
        }
        Ok(())
    }

    async fn crawl_dom_page(&mut self, page: &dyn Page, p: u32) -> Result<PageStats> {
        let mut stats = PageStats::new(p);
        let html = page.content().await?;
        let rows = self.parser.parse_list(&html);
        let links: Vec<Option<usize>> = rows.iter().map(|row| row.link).collect();

        let raw_rows = rows.into_iter().map(|row| row.raw).collect();
        let items = self.build_list_items(raw_rows, &mut stats);
        let mut batch = PageBatch::default();
        for (index, item) in &items {
            let link = links.get(*index).copied().flatten();
            let detail = self.dom_detail(page, link, &item.notice_key()).await;
            self.process_item(page, item, detail, &mut batch, &mut stats)
                .await;
            self.pause().await;
        }
        batch.list = items.into_iter().map(|(_, item)| item).collect();

        self.persist(batch, &mut stats).await?;
        Ok(stats)
    }

    /// Detail through the row's popup, or `None` to use the detail API.
    ///
    /// `link` is the row's position among the page's detail links.
    async fn dom_detail(
        &self,
        page: &dyn Page,
        link: Option<usize>,
        key: &NoticeKey,
    ) -> Option<RawRow> {
        let config = &self.config;
        let selectors = &config.selectors;
        let detail_api = &config.api.detail;

        let uses_popup = selectors.detail_popup.is_some() || !selectors.detail_fields.is_empty();
        if !uses_popup {
            return (!detail_api.is_configured()).then(RawRow::new);
        }

        let id = key.notice_id();
        let Some(nth) = link else {
            log::warn!("Row {id} has no detail link");
            return (!detail_api.is_configured()).then(RawRow::new);
        };

        let selector = format!("{} {}", selectors.list_row, selectors.list_link);
        let raw = match self.open_popup(page, &selector, nth, &id, detail_api).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Detail popup for {id} failed: {e}");
                RawRow::new()
            }
        };

        if let Err(e) = self.close_popup(page).await {
            log::warn!("Closing detail popup for {id} failed: {e}");
        }
        Some(raw)
    }

    async fn open_popup(
        &self,
        page: &dyn Page,
        selector: &str,
        nth: usize,
        id: &str,
        detail_api: &EndpointConfig,
    ) -> Result<RawRow> {
        match detail_api.url.as_deref().filter(|_| detail_api.is_configured()) {
            Some(url) => {
                if let Some(body) = page.click_expect_json(selector, nth, url).await? {
                    let raw = extract_map(&body, detail_api.result_key.as_deref());
                    if let Some(snapshot) = &self.snapshot
                        && let Err(e) = snapshot.save_detail(id, &body, &raw).await
                    {
                        log::warn!("Snapshot of detail {id} failed: {e}");
                    }
                    return Ok(raw);
                }
            }
            None => page.click(selector, nth).await?,
        }
        // No JSON came back: read the rendered view.
        if let Some(popup) = &self.config.selectors.detail_popup {
            page.wait_for_selector(popup, WAIT_TIMEOUT).await?;
        }
        let html = page.content().await?;
        Ok(self.parser.parse_detail(&html))
    }

    async fn close_popup(&self, page: &dyn Page) -> Result<()> {
        if let Some(close) = &self.config.selectors.detail_close
            && page.count(close).await? > 0
        {
            return page.click(close, 0).await;
        }
        page.go_back().await
    }

    async fn next_page(&self, page: &dyn Page) -> bool {
        match self.try_next_page(page).await {
            Ok(moved) => moved,
            Err(e) => {
                log::warn!("Could not move to the next listing page: {e}");
                false
            }
        }
    }

    async fn try_next_page(&self, page: &dyn Page) -> Result<bool> {
        let Some(next) = &self.config.selectors.pagination_next else {
            return Ok(false);
        };
        if page.count(next).await? == 0 {
            return Ok(false);
        }
        page.click(next, 0).await?;
        page.wait_for_load_state().await?;
        page.wait_for_selector(&self.config.selectors.list_row, WAIT_TIMEOUT)
            .await
    }

    // --- Shared per-page steps ---

    /// Validated, filter-passing list items with their row index.
    fn build_list_items(&self, rows: Vec<RawRow>, stats: &mut PageStats) -> Vec<(usize, ListItem)> {
        stats.rows += rows.len();
        let mut items = Vec::new();
        for (index, raw) in rows.iter().enumerate() {
            match ListItem::from_raw(raw) {
                Ok(item) if self.passes_filters(&item) => items.push((index, item)),
                Ok(_) => stats.filtered += 1,
                Err(e) => {
                    log::warn!("Page {}: list row {index} rejected: {e}", stats.page);
                    stats.invalid += 1;
                }
            }
        }
        items
    }

    fn passes_filters(&self, item: &ListItem) -> bool {
        let filters = &self.config.filters;
        let matches = |wanted: &Option<String>, actual: Option<&str>| match wanted {
            Some(wanted) => actual == Some(wanted.as_str()),
            None => true,
        };
        matches(&filters.pbanc_knd_cd, Some(&item.pbanc_knd_cd))
            && matches(&filters.pbanc_stts_cd, Some(&item.pbanc_stts_cd))
            && matches(&filters.bid_pbanc_pgst_cd, item.bid_pbanc_pgst_cd.as_deref())
    }

    /// Detail, notice updates, attachments and opening results of one notice.
    async fn process_item(
        &self,
        page: &dyn Page,
        item: &ListItem,
        dom_detail: Option<RawRow>,
        batch: &mut PageBatch,
        stats: &mut PageStats,
    ) {
        let list_key = item.notice_key();
        let raw_detail = match dom_detail {
            Some(raw) => raw,
            None => self.fetch_detail(page, &list_key, stats).await,
        };

        let detail = match DetailItem::build(item, &raw_detail) {
            Ok(detail) => detail,
            Err(e) => {
                log::warn!("Detail of {} rejected: {e}", list_key.notice_id());
                stats.invalid += 1;
                return;
            }
        };
        let key = detail.notice_key();

        let updates = self.fetch_notice_updates(page, &key, stats).await;

        let mut groups: Vec<&str> = Vec::new();
        let candidates = detail
            .unty_atch_file_no
            .iter()
            .chain(updates.iter().filter_map(|u| u.unty_atch_file_no.as_ref()));
        for group in candidates {
            if !groups.contains(&group.as_str()) {
                groups.push(group);
            }
        }
        for group in groups {
            let attachments = self.fetch_attachments(page, group, stats).await;
            batch.attachments.extend(attachments);
        }

        if key.phase().is_some() {
            let (summary, results) = self.fetch_opening(page, &detail, stats).await;
            batch.opening_summaries.extend(summary);
            batch.opening_results.extend(results);
        }

        batch.notice_updates.extend(updates);
        batch.detail.push(detail);
    }

    async fn fetch_detail(
        &self,
        page: &dyn Page,
        key: &NoticeKey,
        stats: &mut PageStats,
    ) -> RawRow {
        let endpoint = &self.config.api.detail;
        if !endpoint.is_configured() {
            return RawRow::new();
        }

        let mut payload = endpoint.payload.clone();
        payload.insert("bidPbancNo".into(), key.bid_pbanc_no.clone().into());
        payload.insert("bidPbancOrd".into(), key.bid_pbanc_ord.clone().into());
        if let Some((clsf, prgrs)) = key.phase() {
            payload.insert("bidClsfNo".into(), clsf.into());
            payload.insert("bidPrgrsOrd".into(), prgrs.into());
        }

        let id = key.notice_id();
        match self.fetch_json(page, &format!("detail {id}"), endpoint, &payload).await {
            Ok(body) => {
                let raw = extract_map(&body, endpoint.result_key.as_deref());
                if let Some(snapshot) = &self.snapshot
                    && let Err(e) = snapshot.save_detail(&id, &body, &raw).await
                {
                    log::warn!("Snapshot of detail {id} failed: {e}");
                }
                raw
            }
            Err(e) => {
                log::warn!("Giving up on detail {id}: {e}");
                stats.fetch_failures += 1;
                RawRow::new()
            }
        }
    }

    async fn fetch_notice_updates(
        &self,
        page: &dyn Page,
        key: &NoticeKey,
        stats: &mut PageStats,
    ) -> Vec<NoticeUpdateItem> {
        let endpoint = &self.config.api.notice_update;
        if !endpoint.is_configured() {
            return Vec::new();
        }

        let mut payload = endpoint.payload.clone();
        payload.insert("bidPbancNo".into(), key.bid_pbanc_no.clone().into());
        payload.insert("bidPbancOrd".into(), key.bid_pbanc_ord.clone().into());

        let label = format!("notice updates {}", key.notice_id());
        let rows = self.fetch_rows(page, &label, endpoint, &payload, stats).await;
        collect_valid(&label, rows, stats, |row| NoticeUpdateItem::build(key, row))
    }

    async fn fetch_attachments(
        &self,
        page: &dyn Page,
        group: &str,
        stats: &mut PageStats,
    ) -> Vec<AttachmentItem> {
        let endpoint = &self.config.api.attachment;
        if !endpoint.is_configured() {
            return Vec::new();
        }

        let mut payload = endpoint.payload.clone();
        payload.insert("untyAtchFileNo".into(), group.into());

        let label = format!("attachments {group}");
        let rows = self.fetch_rows(page, &label, endpoint, &payload, stats).await;
        collect_valid(&label, rows, stats, |row| AttachmentItem::build(group, row))
    }

    async fn fetch_opening(
        &self,
        page: &dyn Page,
        detail: &DetailItem,
        stats: &mut PageStats,
    ) -> (Option<OpeningSummary>, Vec<OpeningResult>) {
        let opening = &self.config.api.opening;
        let endpoint = &opening.endpoint;
        if !endpoint.is_configured() {
            return (None, Vec::new());
        }

        let key = detail.notice_key();
        let id = key.notice_id();
        let mut payload = endpoint.payload.clone();
        payload.insert("bidPbancNo".into(), key.bid_pbanc_no.clone().into());
        payload.insert("bidPbancOrd".into(), key.bid_pbanc_ord.clone().into());
        payload.insert("bidClsfNo".into(), key.bid_clsf_no.clone().into());
        payload.insert("bidPrgrsOrd".into(), key.bid_prgrs_ord.clone().into());

        let label = format!("opening {id}");
        let body = match self.fetch_json(page, &label, endpoint, &payload).await {
            Ok(body) => body,
            Err(e) => {
                log::warn!("Giving up on {label}: {e}");
                stats.fetch_failures += 1;
                return (None, Vec::new());
            }
        };

        let summary_map = extract_map(&body, Some(opening.summary_key.as_str()));
        let result_rows = extract_rows(&body, Some(opening.results_key.as_str()));
        if let Some(snapshot) = &self.snapshot
            && let Err(e) = snapshot
                .save_opening(&id, &body, &summary_map, &result_rows)
                .await
        {
            log::warn!("Snapshot of {label} failed: {e}");
        }

        let summary = if summary_map.is_empty() {
            None
        } else {
            match OpeningSummary::build(detail, &summary_map) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    log::warn!("{label}: summary rejected: {e}");
                    stats.invalid += 1;
                    None
                }
            }
        };
        let results = collect_valid(&label, result_rows, stats, |row| {
            OpeningResult::build(&key, row)
        });
        (summary, results)
    }

    async fn load_code_dict(&mut self, page: &dyn Page, stats: &mut RunStats) -> Result<()> {
        let config = Arc::clone(&self.config);
        let endpoint = &config.api.code_dict;
        if !endpoint.is_configured() {
            return Ok(());
        }

        let mut page_stats = PageStats::default();
        let rows = self
            .fetch_rows(page, "code dictionary", endpoint, &endpoint.payload, &mut page_stats)
            .await;
        let entries = collect_valid(
            "code dictionary",
            rows,
            &mut page_stats,
            CodeDictEntry::from_raw,
        );
        let outcome = self.repo.save_code_dict_items(&entries).await?;

        stats.invalid += page_stats.invalid;
        stats.fetch_failures += page_stats.fetch_failures;
        stats.saved.entry(Collection::CodeDict).or_default().merge(outcome);
        log::info!(
            "Code dictionary: {} saved, {} already known",
            outcome.saved,
            outcome.skipped
        );
        Ok(())
    }

    async fn fetch_rows(
        &self,
        page: &dyn Page,
        label: &str,
        endpoint: &EndpointConfig,
        payload: &Map<String, Value>,
        stats: &mut PageStats,
    ) -> Vec<RawRow> {
        match self.fetch_json(page, label, endpoint, payload).await {
            Ok(body) => extract_rows(&body, endpoint.result_key.as_deref()),
            Err(e) => {
                log::warn!("Giving up on {label}: {e}");
                stats.fetch_failures += 1;
                Vec::new()
            }
        }
    }

    /// POST with retry; error statuses and error codes count as failures.
    async fn fetch_json(
        &self,
        page: &dyn Page,
        label: &str,
        endpoint: &EndpointConfig,
        payload: &Map<String, Value>,
    ) -> Result<Value> {
        let url = endpoint
            .url
            .as_deref()
            .ok_or_else(|| AppError::config(format!("no endpoint url for {label}")))?;
        self.retry
            .run_if(
                label,
                || async move {
                    page.post_json(url, payload, &endpoint.headers)
                        .await?
                        .ensure_ok(label)
                },
                AppError::is_transient,
            )
            .await
    }

    async fn persist(&mut self, batch: PageBatch, stats: &mut PageStats) -> Result<()> {
        if !batch.list.is_empty() {
            let outcome = self.repo.save_list_items(&batch.list).await?;
            stats.record(Collection::List, outcome);
        }
        if !batch.detail.is_empty() {
            let outcome = self.repo.save_detail_items(&batch.detail).await?;
            stats.record(Collection::Detail, outcome);
        }
        if !batch.notice_updates.is_empty() {
            let outcome = self
                .repo
                .save_notice_update_items(&batch.notice_updates)
                .await?;
            stats.record(Collection::NoticeUpdate, outcome);
        }
        if !batch.attachments.is_empty() {
            let outcome = self.repo.save_attachment_items(&batch.attachments).await?;
            stats.record(Collection::Attachment, outcome);
        }
        if !batch.opening_summaries.is_empty() {
            let outcome = self
                .repo
                .save_opening_summary_items(&batch.opening_summaries)
                .await?;
            stats.record(Collection::OpeningSummary, outcome);
        }
        if !batch.opening_results.is_empty() {
            let outcome = self
                .repo
                .save_opening_result_items(&batch.opening_results)
                .await?;
            stats.record(Collection::OpeningResult, outcome);
        }
        Ok(())
    }

    async fn finish_page(&mut self, page_stats: PageStats, stats: &mut RunStats) -> Result<()> {
        self.checkpoint.save(page_stats.page + 1).await?;
        log::info!(
            "Page {}: {} rows, {} invalid, {} filtered, {} fetch failures; {}",
            page_stats.page,
            page_stats.rows,
            page_stats.invalid,
            page_stats.filtered,
            page_stats.fetch_failures,
            describe_saved(&page_stats.saved)
        );
        stats.absorb(&page_stats);
        Ok(())
    }

    async fn pause(&self) {
        let delay = self.config.crawler.request_delay_ms;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}

/// Build records from rows, logging and counting the rejects.
fn collect_valid<T, E: std::fmt::Display>(
    label: &str,
    rows: Vec<RawRow>,
    stats: &mut PageStats,
    build: impl Fn(&RawRow) -> std::result::Result<T, E>,
) -> Vec<T> {
    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        match build(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("{label}: row {index} rejected: {e}");
                stats.invalid += 1;
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use scraper::Html;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::browser::ApiResponse;
    use crate::models::SnapshotMode;
    use crate::services::parser::parse_selector;
    use crate::storage::CsvRepository;

    const LIST_URL: &str = "/o/o/bidPbancList.do";
    const DETAIL_URL: &str = "/o/o/bidPbancDetail.do";
    const UPDATE_URL: &str = "/o/o/pbancChgList.do";
    const ATTACHMENT_URL: &str = "/o/o/atchFileList.do";
    const OPENING_URL: &str = "/o/o/oobsRslt.do";

    /// Navigation state of the scripted listing.
    #[derive(Default)]
    struct DomState {
        page: usize,
        popup_open: bool,
        clicks: Vec<(String, usize)>,
        backs: usize,
    }

    /// Scripted responses by URL; every POST is recorded.
    ///
    /// `pages` are listing pages advanced by clicks on `next`; any other
    /// click on the listing opens `popup`, and the next click or back closes it.
    #[derive(Default)]
    struct StubPage {
        bodies: HashMap<String, Value>,
        failing: HashSet<String>,
        malformed: HashSet<String>,
        pages: Vec<String>,
        next: Option<String>,
        popup: Option<String>,
        captured: Option<Value>,
        dom: Mutex<DomState>,
        calls: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl StubPage {
        fn respond(mut self, url: &str, body: Value) -> Self {
            self.bodies.insert(url.to_string(), body);
            self
        }

        fn listing(mut self, html: String) -> Self {
            self.pages.push(html);
            self
        }

        fn calls_to(&self, url: &str) -> Vec<Map<String, Value>> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(called, _)| called == url)
                .map(|(_, payload)| payload.clone())
                .collect()
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn clicks_on(&self, selector: &str) -> Vec<usize> {
            self.dom
                .lock()
                .unwrap()
                .clicks
                .iter()
                .filter(|(clicked, _)| clicked == selector)
                .map(|(_, nth)| *nth)
                .collect()
        }

        fn backs(&self) -> usize {
            self.dom.lock().unwrap().backs
        }

        fn current_html(&self) -> String {
            let dom = self.dom.lock().unwrap();
            match &self.popup {
                Some(popup) if dom.popup_open => popup.clone(),
                _ => self.pages.get(dom.page).cloned().unwrap_or_default(),
            }
        }

        fn select_count(&self, selector: &str) -> Result<usize> {
            let selector = parse_selector(selector)?;
            Ok(Html::parse_document(&self.current_html())
                .select(&selector)
                .count())
        }
    }

    #[async_trait]
    impl Page for StubPage {
        async fn post_json(
            &self,
            url: &str,
            body: &Map<String, Value>,
            _headers: &BTreeMap<String, String>,
        ) -> Result<ApiResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone()));
            if self.malformed.contains(url) {
                return Err(AppError::Url(url::ParseError::RelativeUrlWithoutBase));
            }
            if self.failing.contains(url) {
                return Ok(ApiResponse {
                    status: 503,
                    body: Value::Null,
                });
            }
            Ok(match self.bodies.get(url) {
                Some(body) => ApiResponse {
                    status: 200,
                    body: body.clone(),
                },
                None => ApiResponse {
                    status: 404,
                    body: Value::Null,
                },
            })
        }

        async fn goto(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn content(&self) -> Result<String> {
            Ok(self.current_html())
        }

        async fn count(&self, selector: &str) -> Result<usize> {
            self.select_count(selector)
        }

        async fn inner_text(&self, _selector: &str, _nth: usize) -> Result<Option<String>> {
            Ok(None)
        }

        async fn attribute(
            &self,
            _selector: &str,
            _nth: usize,
            _name: &str,
        ) -> Result<Option<String>> {
            Ok(None)
        }

        async fn click(&self, selector: &str, nth: usize) -> Result<()> {
            let mut dom = self.dom.lock().unwrap();
            dom.clicks.push((selector.to_string(), nth));
            if dom.popup_open {
                dom.popup_open = false;
            } else if self.next.as_deref() == Some(selector) {
                dom.page += 1;
            } else {
                dom.popup_open = self.popup.is_some();
            }
            Ok(())
        }

        async fn click_expect_json(
            &self,
            selector: &str,
            nth: usize,
            _url_fragment: &str,
        ) -> Result<Option<Value>> {
            let mut dom = self.dom.lock().unwrap();
            dom.clicks.push((selector.to_string(), nth));
            dom.popup_open = self.popup.is_some();
            Ok(self.captured.clone())
        }

        async fn go_back(&self) -> Result<()> {
            let mut dom = self.dom.lock().unwrap();
            dom.backs += 1;
            dom.popup_open = false;
            Ok(())
        }

        async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
            Ok(self.select_count(selector)? > 0)
        }

        async fn wait_for_load_state(&self) -> Result<()> {
            Ok(())
        }
    }

    fn list_row(no: &str) -> Value {
        json!({
            "bidPbancNo": no,
            "bidPbancOrd": "000",
            "bidPbancNm": "청사 시설관리 용역",
            "bidPbancNum": format!("{no}-000"),
            "pbancSttsCd": "01",
            "pbancSttsCdNm": "등록공고",
            "prcmBsneSeCd": "A",
            "prcmBsneSeCdNm": "용역",
            "bidMthdCd": "B",
            "bidMthdCdNm": "일반경쟁",
            "stdCtrtMthdCd": "C",
            "stdCtrtMthdCdNm": "일반",
            "scsbdMthdCd": "D",
            "scsbdMthdCdNm": "적격심사",
            "pbancPstgDt": "2026/02/06 19:11",
            "pbancKndCd": "E",
            "pbancKndCdNm": "신규",
            "grpNm": "조달청",
            "slprRcptDdlnDt": "2026/02/07 10:00",
            "pbancSttsGridCdNm": "입찰개시",
            "rowNum": "1",
            "totCnt": "1",
            "currentPage": "1",
            "recordCountPerPage": "10",
            "nextRowYn": "N"
        })
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.crawler.max_pages = 1;
        config.crawler.retry_count = 2;
        config.crawler.retry_backoff_secs = 0.0;
        config.paths.output_dir = dir.join("out");
        config.paths.checkpoint_file = dir.join("checkpoint.json");
        config.api.list.url = Some(LIST_URL.into());
        config
    }

    fn service(config: &Config) -> CrawlerService {
        let repo = CsvRepository::new(&config.paths.output_dir);
        CrawlerService::new(Arc::new(config.clone()), Box::new(repo)).unwrap()
    }

    async fn rows(config: &Config, collection: Collection) -> usize {
        CsvRepository::new(&config.paths.output_dir)
            .row_count(collection)
            .await
            .unwrap()
    }

    /// Listing-page configuration, no list API.
    fn dom_config(dir: &Path) -> Config {
        let mut config = config(dir);
        config.api.list.url = None;
        config.crawler.list_url = Some("/pn/pnp/bidPbancList.do".into());
        config
    }

    /// A grid row holding every list field, after `links` detail anchors.
    fn grid_row(no: &str, links: usize) -> String {
        let row = list_row(no);
        let cells: String = row
            .as_object()
            .unwrap()
            .iter()
            .map(|(key, value)| {
                format!(r#"<td col_id="{key}">{}</td>"#, value.as_str().unwrap())
            })
            .collect();
        let anchors = r##"<td><a href="#">보기</a></td>"##.repeat(links);
        format!(r#"<tr data-row-index="{no}">{anchors}{cells}<td col_id="etc">x</td></tr>"#)
    }

    fn grid(rows: &[String], has_next: bool) -> String {
        let next = if has_next {
            r##"<a class="next" href="#">다음</a>"##
        } else {
            ""
        };
        format!("<table>{}</table>{next}", rows.concat())
    }

    fn stored(config: &Config, collection: Collection) -> String {
        std::fs::read_to_string(config.paths.output_dir.join(collection.file_name()))
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_single_row_without_sub_endpoints() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}));

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.rows, 1);
        assert_eq!(stats.outcome(Collection::List).saved, 1);
        assert_eq!(rows(&config, Collection::List).await, 1);
        assert_eq!(rows(&config, Collection::Detail).await, 1);
        assert_eq!(rows(&config, Collection::OpeningResult).await, 0);
        let checkpoint = CheckpointStore::new(&config.paths.checkpoint_file);
        assert_eq!(checkpoint.load().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_rerun_restarts_and_does_not_duplicate() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}));

        service(&config).run(&page, None).await.unwrap();
        // Checkpoint now says page 2, past the one-page target.
        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.start_page, 1);
        assert_eq!(stats.outcome(Collection::List).skipped, 1);
        assert_eq!(rows(&config, Collection::List).await, 1);
        assert_eq!(rows(&config, Collection::Detail).await, 1);
    }

    #[tokio::test]
    async fn test_list_payload_carries_window_and_paging() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.crawler.max_pages = 2;
        config.crawler.search_range_days = Some(3);
        let page = StubPage::default().respond(LIST_URL, json!({"result": []}));

        let today = NaiveDate::from_ymd_opt(2026, 2, 6).unwrap();
        service(&config)
            .with_today(today)
            .run(&page, None)
            .await
            .unwrap();

        let calls = page.calls_to(LIST_URL);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["pbancPstgStDt"], "20260204");
        assert_eq!(calls[0]["pbancPstgEdDt"], "20260206");
        assert_eq!(calls[0]["currentPage"], 1);
        assert_eq!(calls[1]["currentPage"], 2);
        assert_eq!(calls[1]["recordCountPerPage"], 10);
    }

    #[tokio::test]
    async fn test_max_pages_override_is_capped_by_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.crawler.max_pages = 2;
        let page = StubPage::default().respond(LIST_URL, json!({"result": []}));

        let stats = service(&config).run(&page, Some(5)).await.unwrap();
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.last_page, Some(2));
    }

    #[tokio::test]
    async fn test_reset_ignores_saved_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.crawler.max_pages = 10;
        let checkpoint = CheckpointStore::new(&config.paths.checkpoint_file);
        checkpoint.save(9).await.unwrap();
        let page = StubPage::default().respond(LIST_URL, json!({"result": []}));

        let stats = service(&config)
            .with_reset_checkpoint(true)
            .run(&page, Some(1))
            .await
            .unwrap();

        assert_eq!(stats.start_page, 1);
        assert_eq!(page.calls_to(LIST_URL)[0]["currentPage"], 1);
        assert_eq!(checkpoint.load().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_resumes_from_checkpoint() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.crawler.max_pages = 5;
        CheckpointStore::new(&config.paths.checkpoint_file)
            .save(4)
            .await
            .unwrap();
        let page = StubPage::default().respond(LIST_URL, json!({"result": []}));

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.start_page, 4);
        let pages: Vec<_> = page
            .calls_to(LIST_URL)
            .iter()
            .map(|payload| payload["currentPage"].clone())
            .collect();
        assert_eq!(pages, vec![json!(4), json!(5)]);
    }

    #[tokio::test]
    async fn test_inverted_range_fails_before_any_request() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        let payload = json!({"pbancPstgStDt": "20260210", "pbancPstgEdDt": "20260201"});
        config.api.list.payload = payload.as_object().cloned().unwrap();
        let page = StubPage::default();

        let err = service(&config).run(&page, None).await.unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(page.call_count(), 0);
        assert!(!config.paths.checkpoint_file.exists());
    }

    #[tokio::test]
    async fn test_exhausted_list_fetch_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let config = config(dir.path());
        let mut page = StubPage::default();
        page.failing.insert(LIST_URL.to_string());

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(page.calls_to(LIST_URL).len(), 2);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(rows(&config, Collection::List).await, 0);
        let checkpoint = CheckpointStore::new(&config.paths.checkpoint_file);
        assert_eq!(checkpoint.load().await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_invalid_and_filtered_rows_are_counted() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.filters.pbanc_knd_cd = Some("E".into());
        let mut other_kind = list_row("R26BK00000002");
        other_kind["pbancKndCd"] = json!("Z");
        let mut broken = list_row("R26BK00000003");
        broken["pbancPstgDt"] = json!("yesterday");
        let body = json!({"result": [list_row("R26BK00000001"), other_kind, broken]});
        let page = StubPage::default().respond(LIST_URL, body);

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.rows, 3);
        assert_eq!(stats.filtered, 1);
        assert_eq!(stats.invalid, 1);
        assert_eq!(rows(&config, Collection::List).await, 1);
    }

    #[tokio::test]
    async fn test_fans_out_to_every_configured_endpoint() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.api.detail.url = Some(DETAIL_URL.into());
        config.api.notice_update.url = Some(UPDATE_URL.into());
        config.api.attachment.url = Some(ATTACHMENT_URL.into());
        config.api.opening.endpoint.url = Some(OPENING_URL.into());

        let detail = json!({"result": {
            "bidClsfNo": "0",
            "bidPrgrsOrd": "000",
            "untyAtchFileNo": "ATCH-1",
            "bidPbancNm": "청사 시설관리 용역(변경)"
        }});
        let updates = json!({"result": [{
            "pstNo": "P1",
            "bbsNo": "B1",
            "pstTtl": "정정 공고",
            "untyAtchFileNo": "ATCH-2"
        }]});
        let attachments = json!({"result": [{
            "atchFileSqno": 1,
            "bsneClsfCd": "BID",
            "atchFileNm": "a1b2c3.hwp",
            "orgnlAtchFileNm": "과업지시서.hwp",
            "fileExtnNm": "hwp",
            "fileSz": "1,024"
        }]});
        let opening = json!({"result": {
            "pbancMap": {"ibxOnbsDt": "2026/02/09 11:00"},
            "oobsRsltList": [
                {
                    "ibxOnbsRnkg": "1",
                    "ibxGrpNm": "가나건설",
                    "ibxBdngAmt": "1,000",
                    "ibxSlprRcptnDt": "2026-02-09 10:28"
                },
                {
                    "ibxOnbsRnkg": "2",
                    "ibxGrpNm": "다라건설",
                    "ibxBdngAmt": "-5",
                    "ibxSlprRcptnDt": "2026-02-09 10:31"
                }
            ]
        }});
        let page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}))
            .respond(DETAIL_URL, detail)
            .respond(UPDATE_URL, updates)
            .respond(ATTACHMENT_URL, attachments)
            .respond(OPENING_URL, opening);

        let stats = service(&config).run(&page, None).await.unwrap();

        let detail_call = &page.calls_to(DETAIL_URL)[0];
        assert_eq!(detail_call["bidPbancNo"], "R26BK00000001");
        assert!(!detail_call.contains_key("bidClsfNo"));

        let groups: Vec<_> = page
            .calls_to(ATTACHMENT_URL)
            .iter()
            .map(|payload| payload["untyAtchFileNo"].clone())
            .collect();
        assert_eq!(groups, vec![json!("ATCH-1"), json!("ATCH-2")]);

        let opening_call = &page.calls_to(OPENING_URL)[0];
        assert_eq!(opening_call["bidClsfNo"], "0");
        assert_eq!(opening_call["bidPrgrsOrd"], "000");

        assert_eq!(rows(&config, Collection::Detail).await, 1);
        assert_eq!(rows(&config, Collection::NoticeUpdate).await, 1);
        assert_eq!(rows(&config, Collection::Attachment).await, 2);
        assert_eq!(rows(&config, Collection::OpeningSummary).await, 1);
        assert_eq!(rows(&config, Collection::OpeningResult).await, 1);
        assert_eq!(stats.invalid, 1);
    }

    #[tokio::test]
    async fn test_opening_needs_a_known_phase() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.api.opening.endpoint.url = Some(OPENING_URL.into());
        let page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}));

        service(&config).run(&page, None).await.unwrap();

        assert!(page.calls_to(OPENING_URL).is_empty());
        assert_eq!(rows(&config, Collection::Detail).await, 1);
    }

    #[tokio::test]
    async fn test_failed_detail_falls_back_to_list_values() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.api.detail.url = Some(DETAIL_URL.into());
        let mut page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}));
        page.failing.insert(DETAIL_URL.to_string());

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(page.calls_to(DETAIL_URL).len(), 2);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(rows(&config, Collection::Detail).await, 1);
    }

    #[tokio::test]
    async fn test_code_dictionary_is_loaded_once_per_run() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.crawler.max_pages = 2;
        config.api.code_dict.url = Some("/co/codeList.do".into());
        let codes = json!({"result": [
            {"grpCd": "PBANC_KND", "cd": "E", "cdNm": "신규", "useYn": "Y"}
        ]});
        let page = StubPage::default()
            .respond(LIST_URL, json!({"result": []}))
            .respond("/co/codeList.do", codes);

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(page.calls_to("/co/codeList.do").len(), 1);
        assert_eq!(stats.outcome(Collection::CodeDict).saved, 1);
    }

    #[tokio::test]
    async fn test_dom_listing_without_api() {
        let dir = TempDir::new().unwrap();
        let config = dom_config(dir.path());
        let page = StubPage::default().listing(grid(&[grid_row("R26BK00000001", 0)], false));

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.rows, 1);
        assert_eq!(page.call_count(), 0);
        assert_eq!(rows(&config, Collection::List).await, 1);
        assert_eq!(rows(&config, Collection::Detail).await, 1);
    }

    #[tokio::test]
    async fn test_dom_paging_stops_when_next_is_missing() {
        let dir = TempDir::new().unwrap();
        let mut config = dom_config(dir.path());
        config.crawler.max_pages = 5;
        config.selectors.pagination_next = Some("a.next".into());
        let page = StubPage {
            next: Some("a.next".into()),
            ..StubPage::default()
        }
        .listing(grid(&[grid_row("R26BK00000001", 0)], true))
        .listing(grid(&[grid_row("R26BK00000002", 0)], false));

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.pages, 2);
        assert_eq!(stats.last_page, Some(2));
        assert_eq!(page.clicks_on("a.next"), vec![0]);
        assert_eq!(rows(&config, Collection::List).await, 2);
        let checkpoint = CheckpointStore::new(&config.paths.checkpoint_file);
        assert_eq!(checkpoint.load().await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_dom_paging_stops_at_target() {
        let dir = TempDir::new().unwrap();
        let mut config = dom_config(dir.path());
        config.crawler.max_pages = 2;
        config.selectors.pagination_next = Some("a.next".into());
        let mut page = StubPage {
            next: Some("a.next".into()),
            ..StubPage::default()
        };
        for no in ["R26BK00000001", "R26BK00000002", "R26BK00000003"] {
            page = page.listing(grid(&[grid_row(no, 0)], true));
        }

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.pages, 2);
        assert_eq!(page.clicks_on("a.next").len(), 1);
        assert!(!stored(&config, Collection::List).contains("R26BK00000003"));
    }

    #[tokio::test]
    async fn test_dom_skips_ahead_to_checkpoint_page() {
        let dir = TempDir::new().unwrap();
        let mut config = dom_config(dir.path());
        config.crawler.max_pages = 3;
        config.selectors.pagination_next = Some("a.next".into());
        CheckpointStore::new(&config.paths.checkpoint_file)
            .save(2)
            .await
            .unwrap();
        let page = StubPage {
            next: Some("a.next".into()),
            ..StubPage::default()
        }
        .listing(grid(&[grid_row("R26BK00000001", 0)], true))
        .listing(grid(&[grid_row("R26BK00000002", 0)], true))
        .listing(grid(&[grid_row("R26BK00000003", 0)], false));

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.start_page, 2);
        assert_eq!(stats.pages, 2);
        assert_eq!(page.clicks_on("a.next").len(), 2);
        let list = stored(&config, Collection::List);
        assert!(!list.contains("R26BK00000001"));
        assert!(list.contains("R26BK00000002"));
        assert!(list.contains("R26BK00000003"));
    }

    #[tokio::test]
    async fn test_dom_popup_captures_detail_json() {
        let dir = TempDir::new().unwrap();
        let mut config = dom_config(dir.path());
        config.api.detail.url = Some(DETAIL_URL.into());
        config.api.opening.endpoint.url = Some(OPENING_URL.into());
        config.selectors.detail_popup = Some("#popup".into());
        config.snapshot.enabled = true;
        config.snapshot.mode = SnapshotMode::Unexpected;
        config.snapshot.dir = dir.path().join("snapshots");
        let page = StubPage {
            captured: Some(json!({"result": {
                "bidClsfNo": "0",
                "bidPrgrsOrd": "000",
                "popupOnlyField": "x"
            }})),
            ..StubPage::default()
        }
        .respond(OPENING_URL, json!({"result": {}}))
        .listing(grid(
            &[grid_row("R26BK00000001", 2), grid_row("R26BK00000002", 2)],
            false,
        ));

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.rows, 2);
        // Two links per row: each row clicks its own first link.
        assert_eq!(page.clicks_on("tr[data-row-index] a"), vec![0, 2]);
        assert_eq!(page.backs(), 2);
        assert!(page.calls_to(DETAIL_URL).is_empty());

        let openings = page.calls_to(OPENING_URL);
        assert_eq!(openings.len(), 2);
        assert_eq!(openings[1]["bidPbancNo"], "R26BK00000002");
        assert_eq!(openings[1]["bidClsfNo"], "0");
        assert_eq!(rows(&config, Collection::Detail).await, 2);

        let snapshot = config.snapshot.dir.join("detail_R26BK00000001-000.json");
        let saved: Value = serde_json::from_slice(&std::fs::read(snapshot).unwrap()).unwrap();
        assert_eq!(saved["unexpected_keys"], json!(["popupOnlyField"]));
    }

    #[tokio::test]
    async fn test_dom_popup_selector_sweep_and_close_button() {
        let dir = TempDir::new().unwrap();
        let mut config = dom_config(dir.path());
        config.api.opening.endpoint.url = Some(OPENING_URL.into());
        config.selectors.detail_popup = Some("#popup".into());
        config.selectors.detail_close = Some("button.close".into());
        config
            .selectors
            .detail_fields
            .insert("bidClsfNo".into(), "#clsf".into());
        config
            .selectors
            .detail_fields
            .insert("bidPrgrsOrd".into(), "#prgrs".into());
        let popup = r#"<div id="popup"><span id="clsf">1</span><span id="prgrs">002</span>
            <button class="close">닫기</button></div>"#;
        let page = StubPage {
            popup: Some(popup.to_string()),
            ..StubPage::default()
        }
        .respond(OPENING_URL, json!({"result": {}}))
        .listing(grid(&[grid_row("R26BK00000001", 1)], false));

        service(&config).run(&page, None).await.unwrap();

        assert_eq!(page.clicks_on("tr[data-row-index] a"), vec![0]);
        assert_eq!(page.clicks_on("button.close"), vec![0]);
        assert_eq!(page.backs(), 0);
        let opening = &page.calls_to(OPENING_URL)[0];
        assert_eq!(opening["bidClsfNo"], "1");
        assert_eq!(opening["bidPrgrsOrd"], "002");
    }

    #[tokio::test]
    async fn test_exhausted_sub_fetches_still_save_detail() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.api.detail.url = Some(DETAIL_URL.into());
        config.api.notice_update.url = Some(UPDATE_URL.into());
        config.api.attachment.url = Some(ATTACHMENT_URL.into());
        config.api.opening.endpoint.url = Some(OPENING_URL.into());
        let detail = json!({"result": {
            "bidClsfNo": "0",
            "bidPrgrsOrd": "000",
            "untyAtchFileNo": "ATCH-1"
        }});
        let mut page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}))
            .respond(DETAIL_URL, detail);
        for url in [UPDATE_URL, ATTACHMENT_URL, OPENING_URL] {
            page.failing.insert(url.to_string());
        }

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(stats.fetch_failures, 3);
        for url in [UPDATE_URL, ATTACHMENT_URL, OPENING_URL] {
            assert_eq!(page.calls_to(url).len(), 2, "{url}");
        }
        assert_eq!(rows(&config, Collection::List).await, 1);
        assert_eq!(rows(&config, Collection::Detail).await, 1);
        assert_eq!(rows(&config, Collection::Attachment).await, 0);
        assert_eq!(rows(&config, Collection::OpeningResult).await, 0);
    }

    #[tokio::test]
    async fn test_unexpected_detail_keys_are_snapshotted() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.api.detail.url = Some(DETAIL_URL.into());
        config.snapshot.enabled = true;
        config.snapshot.mode = SnapshotMode::Unexpected;
        config.snapshot.dir = dir.path().join("snapshots");
        let detail = json!({"result": {"bidClsfNo": "0", "bidPrgrsOrd": "000", "newField": 1}});
        let page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}))
            .respond(DETAIL_URL, detail);

        service(&config).run(&page, None).await.unwrap();

        let path = config.snapshot.dir.join("detail_R26BK00000001-000.json");
        let saved: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(saved["unexpected_keys"], json!(["newField"]));
        assert_eq!(saved["body"]["result"]["newField"], 1);
    }

    #[tokio::test]
    async fn test_local_errors_are_not_retried() {
        let dir = TempDir::new().unwrap();
        let mut config = config(dir.path());
        config.api.detail.url = Some(DETAIL_URL.into());
        let mut page = StubPage::default()
            .respond(LIST_URL, json!({"result": [list_row("R26BK00000001")]}));
        page.malformed.insert(DETAIL_URL.to_string());

        let stats = service(&config).run(&page, None).await.unwrap();

        assert_eq!(page.calls_to(DETAIL_URL).len(), 1);
        assert_eq!(stats.fetch_failures, 1);
        assert_eq!(rows(&config, Collection::Detail).await, 1);
    }
}
