//! Recently saved results, newest first, persisted as a JSON array.

use std::path::{Path, PathBuf};

use humanize_core::request::JobParameters;
use humanize_core::status::JobMetrics;
use humanize_core::types::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Number of saved results kept by default.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// One saved transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedResult {
    pub original: String,
    pub humanized: String,
    #[serde(default)]
    pub metrics: Option<JobMetrics>,
    pub parameters: JobParameters,
    pub timestamp: Timestamp,
}

impl SavedResult {
    pub fn new(
        original: impl Into<String>,
        humanized: impl Into<String>,
        metrics: Option<JobMetrics>,
        parameters: JobParameters,
    ) -> Self {
        Self {
            original: original.into(),
            humanized: humanized.into(),
            metrics,
            parameters,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Bounded most-recent-first list of [`SavedResult`]s backed by a file.
#[derive(Debug)]
pub struct RecentResults {
    path: PathBuf,
    capacity: usize,
    entries: Vec<SavedResult>,
}

impl RecentResults {
    /// Load the list at `path`. A missing file is an empty list.
    pub async fn load(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, StorageError> {
        let path = path.into();
        let mut entries: Vec<SavedResult> = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StorageError::Parse {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        entries.truncate(capacity);
        Ok(Self {
            path,
            capacity,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[SavedResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put `entry` at the front, evicting the oldest beyond capacity.
    pub fn push(&mut self, entry: SavedResult) {
        self.entries.insert(0, entry);
        self.entries.truncate(self.capacity);
    }

    /// Push and persist.
    pub async fn record(&mut self, entry: SavedResult) -> Result<(), StorageError> {
        self.push(entry);
        self.save().await
    }

    /// Write the list to its file.
    pub async fn save(&self) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(&self.entries)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Saved recent results"
        );
        Ok(())
    }
}
