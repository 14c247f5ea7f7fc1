use crate::models::TeamRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Append-only record sink.
///
/// Records are kept in memory; a directory-backed dataset also writes each
/// record to `<dir>/<index>.json` as it arrives. A record only counts as
/// stored once its file is written.
#[derive(Debug, Default)]
pub struct Dataset {
    dir: Option<PathBuf>,
    records: Mutex<Vec<TeamRecord>>,
    next_file: AtomicUsize,
}

impl Dataset {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Dataset persisted under `dir`, created if missing
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create dataset directory {}", dir.display()))?;

        Ok(Self {
            dir: Some(dir),
            records: Mutex::new(Vec::new()),
            next_file: AtomicUsize::new(1),
        })
    }

    pub async fn push(&self, record: TeamRecord) -> Result<()> {
        if let Some(dir) = &self.dir {
            // File numbers may skip after a failed write
            let index = self.next_file.fetch_add(1, Ordering::SeqCst);
            let path = dir.join(format!("{index:09}.json"));
            let json = serde_json::to_string_pretty(&record)?;
            tokio::fs::write(&path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!(path = %path.display(), "Stored record");
        }

        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record);
        Ok(())
    }

    pub fn records(&self) -> Vec<TeamRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
