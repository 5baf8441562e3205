//! Raw payload capture for schema-drift triage.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use super::write_atomic;
use crate::error::Result;
use crate::models::mapping::{DETAIL_FIELDS, OPENING_RESULT_FIELDS, OPENING_SUMMARY_FIELDS};
use crate::models::{RawRow, SnapshotConfig, SnapshotMode};

#[derive(Serialize)]
struct Snapshot<'a> {
    saved_at: String,
    unexpected_keys: Vec<String>,
    body: &'a Value,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
    mode: SnapshotMode,
    only_list: bool,
    detail_allowed: HashSet<String>,
    opening_allowed: HashSet<String>,
}

impl SnapshotStore {
    /// `None` when snapshots are disabled.
    pub fn from_config(config: &SnapshotConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }

        let detail_allowed = match &config.detail_allowed_keys {
            Some(keys) => keys.iter().cloned().collect(),
            None => DETAIL_FIELDS.raw_keys().map(String::from).collect(),
        };
        let opening_allowed = match &config.opening_allowed_keys {
            Some(keys) => keys.iter().cloned().collect(),
            None => OPENING_SUMMARY_FIELDS
                .raw_keys()
                .chain(OPENING_RESULT_FIELDS.raw_keys())
                .map(String::from)
                .collect(),
        };

        Some(Self {
            dir: config.dir.clone(),
            mode: config.mode,
            only_list: config.only_list,
            detail_allowed,
            opening_allowed,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List pages are captured in `all` mode only.
    pub async fn save_list_page(&self, date: NaiveDate, page: u32, body: &Value) -> Result<bool> {
        if self.mode != SnapshotMode::All {
            return Ok(false);
        }
        let key = format!("{}_page_{page}", date.format("%Y%m%d"));
        self.save("list", &key, body, Vec::new()).await?;
        Ok(true)
    }

    pub async fn save_detail(
        &self,
        notice_id: &str,
        body: &Value,
        detail: &RawRow,
    ) -> Result<bool> {
        let unexpected = unexpected_keys([detail], &self.detail_allowed);
        self.save_if_wanted("detail", notice_id, body, unexpected).await
    }

    pub async fn save_opening(
        &self,
        notice_id: &str,
        body: &Value,
        summary: &RawRow,
        results: &[RawRow],
    ) -> Result<bool> {
        let rows = std::iter::once(summary).chain(results.iter());
        let unexpected = unexpected_keys(rows, &self.opening_allowed);
        self.save_if_wanted("opening", notice_id, body, unexpected).await
    }

    async fn save_if_wanted(
        &self,
        kind: &str,
        key: &str,
        body: &Value,
        unexpected: Vec<String>,
    ) -> Result<bool> {
        let wanted = match self.mode {
            SnapshotMode::All => !self.only_list,
            SnapshotMode::Unexpected => !unexpected.is_empty(),
        };
        if !wanted {
            return Ok(false);
        }
        if !unexpected.is_empty() {
            log::warn!("{kind} {key}: unexpected keys {unexpected:?}");
        }
        self.save(kind, key, body, unexpected).await?;
        Ok(true)
    }

    async fn save(
        &self,
        kind: &str,
        key: &str,
        body: &Value,
        unexpected: Vec<String>,
    ) -> Result<()> {
        let snapshot = Snapshot {
            saved_at: Local::now().to_rfc3339(),
            unexpected_keys: unexpected,
            body,
        };
        let path = self.path_for(kind, key);
        write_atomic(&path, &serde_json::to_vec_pretty(&snapshot)?).await?;
        log::debug!("Snapshot written: {}", path.display());
        Ok(())
    }

    fn path_for(&self, kind: &str, key: &str) -> PathBuf {
        let safe_key = key.replace(['/', '\\'], "_");
        self.dir.join(format!("{kind}_{safe_key}.json"))
    }
}

fn unexpected_keys<'a>(
    rows: impl IntoIterator<Item = &'a RawRow>,
    allowed: &HashSet<String>,
) -> Vec<String> {
    rows.into_iter()
        .flat_map(|row| row.keys())
        .filter(|key| !allowed.contains(key.as_str()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
