//! Batch queue item model, status transitions, and file intake rules.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ItemId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Intake constants
// ---------------------------------------------------------------------------

/// Largest file accepted into the queue (10 MiB), matching the upload limit
/// enforced by the backend.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// File extensions the backend can extract text from.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["txt", "pdf", "docx"];

// ---------------------------------------------------------------------------
// Item status
// ---------------------------------------------------------------------------

/// Client-side status of a batch item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchItemStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchItemStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Items move strictly `pending -> processing -> completed | failed`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        )
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Where a batch item's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFile {
    /// A file on disk, read when the item is processed.
    Path(PathBuf),
    /// Bytes already held in memory.
    Inline(Vec<u8>),
}

// ---------------------------------------------------------------------------
// Item
// ---------------------------------------------------------------------------

/// One row of the batch queue.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub id: ItemId,
    /// Source file name, used for display and export naming.
    pub name: String,
    pub source: SourceFile,
    pub size: u64,
    pub status: BatchItemStatus,
    pub job_id: Option<JobId>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub added_at: Timestamp,
}

impl BatchItem {
    /// Create a pending item after checking the file against the intake rules.
    pub fn new(name: impl Into<String>, source: SourceFile, size: u64) -> Result<Self, CoreError> {
        let name = name.into();
        validate_source_file(&name, size)?;
        Ok(Self {
            id: uuid::Uuid::new_v4(),
            name,
            source,
            size,
            status: BatchItemStatus::Pending,
            job_id: None,
            output: None,
            error: None,
            added_at: chrono::Utc::now(),
        })
    }

    /// Move to `next`, rejecting skipped or backwards transitions.
    pub fn transition(&mut self, next: BatchItemStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition(format!(
                "batch item {} cannot move from {} to {}",
                self.id,
                self.status.label(),
                next.label()
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Size in KiB with one decimal, for display.
    pub fn size_kib(&self) -> String {
        format!("{:.1} KB", self.size as f64 / 1024.0)
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check that a file may enter the queue.
///
/// Rules:
/// - The name must have one of [`ACCEPTED_EXTENSIONS`] (case-insensitive).
/// - The size must not exceed [`MAX_UPLOAD_BYTES`].
pub fn validate_source_file(name: &str, size: u64) -> Result<(), CoreError> {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(CoreError::Validation(format!(
            "Unsupported file type: '{name}'. Accepted: {}",
            ACCEPTED_EXTENSIONS.join(", ")
        )));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "File '{name}' exceeds the {} MB limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}
