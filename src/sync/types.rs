//! Sync types shared by the orchestrator and device backends.

use serde::Serialize;

use crate::sync::codec::StatsRecord;

/// One entry of an export batch, handed to a device writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportEntry {
    pub id: String,
    /// Position in the batch (0-based).
    pub serial: usize,
    pub stats: StatsRecord,
    /// Rendered question with media paths rewritten to staged paths.
    pub question: String,
    /// Rendered answer with media paths rewritten to staged paths.
    pub answer: String,
    pub category: String,
    /// Ids of batch items that are the reverse of this one.
    pub inverse_ids: Vec<String>,
}

/// One record read back from a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedRecord {
    pub id: String,
    pub stats: StatsRecord,
}

/// Statistics for an export operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ExportStats {
    /// Items written to the device.
    pub items: usize,
    /// Items selected because a retention rep falls due.
    pub retention: usize,
    /// Items selected from the acquisition buckets.
    pub acquisition: usize,
    /// Ids renamed by the reconciler before export.
    pub renamed_ids: usize,
    /// Images staged.
    pub images: usize,
    /// Sounds staged.
    pub sounds: usize,
    /// Stale media removed from the staging area.
    pub removed_media: usize,
    /// Export stopped early at a cancellation request.
    pub cancelled: bool,
}

/// Statistics for an import operation.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportStats {
    /// Records read from the device.
    pub read: usize,
    /// Items whose learning state was overwritten.
    pub merged: usize,
    /// Records whose id no longer exists on the desktop.
    pub skipped: usize,
    /// Day offset added to every imported repetition time.
    pub offset_days: u64,
    /// Whether the desktop's own start time and history were moved back.
    pub desktop_start_rewritten: bool,
    /// Device log lines stored in the host diagnostic log.
    pub log_lines: usize,
}

/// Sync-specific errors.
///
/// The orchestrator wraps these into [`crate::error::Error::Interface`]
/// naming the backend in use.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Host database error.
    #[error("Database error: {0}")]
    Database(String),

    /// A required device file is missing.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Invalid record format.
    #[error("invalid record at line {line}: {message}")]
    InvalidRecord {
        /// Line number (1-indexed).
        line: usize,
        /// Error message.
        message: String,
    },

    /// The device container is inconsistent.
    #[error("{0}")]
    Format(String),
}

impl From<crate::error::Error> for SyncError {
    fn from(err: crate::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = std::result::Result<T, SyncError>;
