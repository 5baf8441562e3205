//! Durable current-page cursor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::{read_optional, write_atomic};
use crate::error::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
struct Checkpoint {
    current_page: i64,
}

/// Single-writer checkpoint file holding the next page to crawl.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved page, or `None` when there is no usable checkpoint.
    pub async fn load(&self) -> Result<Option<u32>> {
        let Some(bytes) = read_optional(&self.path).await? else {
            return Ok(None);
        };
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;
        if checkpoint.current_page <= 0 {
            return Ok(None);
        }
        Ok(u32::try_from(checkpoint.current_page).ok())
    }

    pub async fn save(&self, page: u32) -> Result<()> {
        let checkpoint = Checkpoint {
            current_page: i64::from(page),
        };
        let bytes = serde_json::to_vec(&checkpoint)?;
        write_atomic(&self.path, &bytes).await?;
        log::debug!("Checkpoint saved: page {page}");
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                log::info!("Checkpoint cleared: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> CheckpointStore {
        CheckpointStore::new(tmp.path().join("checkpoint.json"))
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(store(&tmp).load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_load_clear() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store.save(4).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(4));
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"current_page":4}"#);

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_positive_page_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        std::fs::write(store.path(), r#"{"current_page":0}"#).unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        std::fs::write(store.path(), r#"{"current_page":-3}"#).unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }
}
