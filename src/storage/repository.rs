//! Dedupe-then-append CSV stores, one file per collection.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{ensure_parent, read_optional};
use crate::error::{AppError, Result};
use crate::models::{
    AttachmentItem, CodeDictEntry, Collection, DetailItem, ListItem, NoticeUpdateItem,
    OpeningResult, OpeningSummary, Record,
};

const KEY_SEPARATOR: char = '\u{1f}';

/// Counts for one `save_*` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub saved: usize,
    pub skipped: usize,
}

impl SaveOutcome {
    pub fn merge(&mut self, other: SaveOutcome) {
        self.saved += other.saved;
        self.skipped += other.skipped;
    }
}

/// Where validated records go.
///
/// Every `save_*` drops records whose unique key was already persisted
/// (or appears earlier in the same batch) and appends the rest.
#[async_trait]
pub trait NoticeRepository: Send {
    async fn save_list_items(&mut self, items: &[ListItem]) -> Result<SaveOutcome>;

    async fn save_detail_items(&mut self, items: &[DetailItem]) -> Result<SaveOutcome>;

    async fn save_notice_update_items(
        &mut self,
        items: &[NoticeUpdateItem],
    ) -> Result<SaveOutcome>;

    async fn save_attachment_items(&mut self, items: &[AttachmentItem]) -> Result<SaveOutcome>;

    async fn save_opening_summary_items(
        &mut self,
        items: &[OpeningSummary],
    ) -> Result<SaveOutcome>;

    async fn save_opening_result_items(
        &mut self,
        items: &[OpeningResult],
    ) -> Result<SaveOutcome>;

    async fn save_code_dict_items(&mut self, items: &[CodeDictEntry]) -> Result<SaveOutcome>;
}

/// How the bytes already in a store file end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Missing, empty, or without a complete header line.
    Fresh,
    /// Ends on a record boundary.
    Clean,
    /// Ends inside a record cut short by an interrupted append.
    Torn,
}

impl Tail {
    fn of(bytes: &[u8]) -> Self {
        match bytes.iter().position(|&b| b == b'\n') {
            Some(end) if !bytes[..end].trim_ascii().is_empty() => {
                if bytes.ends_with(b"\n") {
                    Tail::Clean
                } else {
                    Tail::Torn
                }
            }
            _ => Tail::Fresh,
        }
    }
}

/// Per-collection state, loaded from disk on first write.
#[derive(Debug)]
struct Store {
    seen: HashSet<String>,
    tail: Tail,
}

/// CSV files under one directory.
///
/// Seen keys are loaded lazily per collection, the first time that
/// collection is written, by scanning the existing file.
#[derive(Debug)]
pub struct CsvRepository {
    dir: PathBuf,
    stores: HashMap<Collection, Store>,
}

impl CsvRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            stores: HashMap::new(),
        }
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.dir.join(collection.file_name())
    }

    /// Number of complete data rows currently stored for `collection`.
    pub async fn row_count(&self, collection: Collection) -> Result<usize> {
        let path = self.path(collection);
        let Some(bytes) = read_optional(&path).await? else {
            return Ok(0);
        };
        if Tail::of(&bytes) == Tail::Fresh {
            return Ok(0);
        }
        let (_, rows) = complete_rows(&bytes, &path)?;
        Ok(rows.len())
    }

    async fn load_store(path: &Path, collection: Collection) -> Result<Store> {
        let mut seen = HashSet::new();
        let Some(bytes) = read_optional(path).await? else {
            return Ok(Store {
                seen,
                tail: Tail::Fresh,
            });
        };

        let tail = Tail::of(&bytes);
        match tail {
            Tail::Fresh => {
                if !bytes.is_empty() {
                    log::warn!(
                        "{} has no complete header line, rewriting it",
                        path.display()
                    );
                }
                return Ok(Store { seen, tail });
            }
            Tail::Torn => log::warn!(
                "{} ends in a partial row, appending after it",
                path.display()
            ),
            Tail::Clean => {}
        }

        let (headers, rows) = complete_rows(&bytes, path)?;
        let indices = collection
            .key_columns()
            .iter()
            .map(|column| {
                headers.iter().position(|h| h == *column).ok_or_else(|| {
                    AppError::crawl(
                        path.display().to_string(),
                        format!("header has no key column {column:?}"),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        for row in &rows {
            let parts = indices.iter().map(|&i| row.get(i).unwrap_or_default());
            seen.insert(join_key(parts));
        }

        log::debug!(
            "Loaded {} existing {} keys from {}",
            seen.len(),
            collection.label(),
            path.display()
        );
        Ok(Store { seen, tail })
    }

    async fn save_items<R: Record + Sync>(&mut self, items: &[R]) -> Result<SaveOutcome> {
        let collection = R::COLLECTION;
        let path = self.path(collection);

        let store = match self.stores.entry(collection) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(Self::load_store(&path, collection).await?),
        };

        let mut outcome = SaveOutcome::default();
        let mut fresh_keys = HashSet::new();
        let mut fresh = Vec::new();
        for item in items {
            let key = join_key(item.unique_key().iter().map(String::as_str));
            if store.seen.contains(&key) || !fresh_keys.insert(key) {
                outcome.skipped += 1;
            } else {
                fresh.push(item);
            }
        }

        if !fresh.is_empty() {
            append_rows(&path, &fresh, store.tail).await?;
            store.tail = Tail::Clean;
            outcome.saved = fresh.len();
            store.seen.extend(fresh_keys);
        }

        log::debug!(
            "{}: saved {}, skipped {}",
            collection.label(),
            outcome.saved,
            outcome.skipped
        );
        Ok(outcome)
    }
}

#[async_trait]
impl NoticeRepository for CsvRepository {
    async fn save_list_items(&mut self, items: &[ListItem]) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn save_detail_items(&mut self, items: &[DetailItem]) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn save_notice_update_items(
        &mut self,
        items: &[NoticeUpdateItem],
    ) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn save_attachment_items(&mut self, items: &[AttachmentItem]) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn save_opening_summary_items(
        &mut self,
        items: &[OpeningSummary],
    ) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn save_opening_result_items(
        &mut self,
        items: &[OpeningResult],
    ) -> Result<SaveOutcome> {
        self.save_items(items).await
    }

    async fn save_code_dict_items(&mut self, items: &[CodeDictEntry]) -> Result<SaveOutcome> {
        self.save_items(items).await
    }
}

fn join_key<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut key = String::new();
    for (i, part) in parts.enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part.trim());
    }
    key
}

/// Header plus the data rows that have every column; short or unreadable
/// rows are logged and skipped.
fn complete_rows(
    bytes: &[u8],
    path: &Path,
) -> Result<(csv::StringRecord, Vec<csv::StringRecord>)> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for (i, row) in reader.records().enumerate() {
        match row {
            Ok(row) if row.len() == headers.len() => rows.push(row),
            Ok(row) => log::warn!(
                "{}: skipping row {} with {} of {} fields",
                path.display(),
                i + 1,
                row.len(),
                headers.len()
            ),
            Err(e) => log::warn!("{}: skipping unreadable row {}: {e}", path.display(), i + 1),
        }
    }
    Ok((headers, rows))
}

/// Serialize rows in field order; the header goes in only for a fresh file.
async fn append_rows<R: Record + Sync>(path: &Path, rows: &[&R], tail: Tail) -> Result<()> {
    let mut bytes = Vec::new();
    if tail == Tail::Torn {
        bytes.push(b'\n');
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(tail == Tail::Fresh)
        .from_writer(bytes);
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Io(e.into_error()))?;

    ensure_parent(path).await?;
    let mut options = tokio::fs::OpenOptions::new();
    options.create(true);
    if tail == Tail::Fresh {
        options.write(true).truncate(true);
    } else {
        options.append(true);
    }
    let mut file = options.open(path).await?;
    file.write_all(&bytes).await?;
    file.flush().await?;
    Ok(())
}
