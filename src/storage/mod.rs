//! Persistence for crawl output and crawl progress.
//!
//! ## Directory Structure
//!
//! ```text
//! data/
//! ├── checkpoint.json              # {"current_page": N}
//! ├── bid_notice_list.csv          # one file per collection
//! ├── bid_notice_detail.csv
//! ├── ...
//! └── snapshots/                   # raw payloads, when enabled
//!     └── detail_R26BK01292424-001.json
//! ```

pub mod checkpoint;
pub mod repository;
pub mod snapshot;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

// Re-export for convenience
pub use checkpoint::CheckpointStore;
pub use repository::{CsvRepository, NoticeRepository, SaveOutcome};
pub use snapshot::SnapshotStore;

/// `<path>.tmp`, next to the target so the rename stays on one filesystem.
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Write bytes atomically (write to temp, then rename).
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path).await?;

    let tmp = tmp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Read bytes, returning None if file doesn't exist.
pub(crate) async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(AppError::Io(e)),
    }
}
