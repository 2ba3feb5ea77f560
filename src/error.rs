//! Error types for the study sync engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, 6=interface, etc.)
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Every failure that reaches the caller of an export or import is a single
//! [`Error`] carrying a human-readable message. Device backend failures are
//! reported as [`Error::Interface`], which names the backend and the cause.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for studysync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,

    // Not Found (exit 3)
    ItemNotFound,
    BackendNotFound,

    // Validation (exit 4)
    InvalidArgument,
    DuplicateId,

    // Interface (exit 6)
    InterfaceError,
    Cancelled,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ItemNotFound => "ITEM_NOT_FOUND",
            Self::BackendNotFound => "BACKEND_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DuplicateId => "DUPLICATE_ID",
            Self::InterfaceError => "INTERFACE_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::AlreadyInitialized | Self::DatabaseError => 2,
            Self::ItemNotFound | Self::BackendNotFound => 3,
            Self::InvalidArgument | Self::DuplicateId => 4,
            Self::InterfaceError | Self::Cancelled => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying with corrected input can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument | Self::DuplicateId | Self::DatabaseError | Self::Cancelled
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in studysync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `ssync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Study item not found: {id}")]
    ItemNotFound { id: String },

    #[error("Study item id already in use: {id}")]
    DuplicateId { id: String },

    #[error("Unknown device backend: {name}")]
    BackendNotFound {
        name: String,
        /// Names of the registered backends for hint display.
        available: Vec<String>,
    },

    /// A device backend failed; the message names the backend.
    #[error("{backend} interface: {message}")]
    Interface { backend: String, message: String },

    #[error("Sync cancelled after {completed} item(s)")]
    Cancelled { completed: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build an interface error for the named backend.
    pub fn interface(backend: &str, cause: impl std::fmt::Display) -> Self {
        Self::Interface {
            backend: backend.to_string(),
            message: cause.to_string(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::ItemNotFound { .. } => ErrorCode::ItemNotFound,
            Self::DuplicateId { .. } => ErrorCode::DuplicateId,
            Self::BackendNotFound { .. } => ErrorCode::BackendNotFound,
            Self::Interface { .. } => ErrorCode::InterfaceError,
            Self::Cancelled { .. } => ErrorCode::Cancelled,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => Some("Run `ssync init` to create the study database".to_string()),

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::ItemNotFound { id } => Some(format!(
                "No study item with ID '{id}'. Use `ssync item list` to see available items."
            )),

            Self::DuplicateId { id } => Some(format!(
                "'{id}' is taken. Pick another ID or omit `--id` to have one generated."
            )),

            Self::BackendNotFound { available, .. } => {
                if available.is_empty() {
                    Some("No device backends are registered.".to_string())
                } else {
                    Some(format!("Available backends: {}", available.join(", ")))
                }
            }

            Self::Interface { .. } => Some(
                "Nothing was merged into the study database. Fix the device files and retry."
                    .to_string(),
            ),

            Self::Cancelled { .. } => Some(
                "Items written before cancellation are kept; run the sync again to finish."
                    .to_string(),
            ),

            Self::Database(_) | Self::Io(_) | Self::Json(_) | Self::InvalidArgument(_)
            | Self::Config(_) | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_error_names_backend() {
        let err = Error::interface("HTML+CSV", "STATS.CSV: truncated record at line 4");
        assert_eq!(
            err.to_string(),
            "HTML+CSV interface: STATS.CSV: truncated record at line 4"
        );
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let err = Error::BackendNotFound {
            name: "palm".to_string(),
            available: vec!["htmlcsv".to_string()],
        };
        let json = err.to_structured_json();
        assert_eq!(json["error"]["code"], "BACKEND_NOT_FOUND");
        assert_eq!(json["error"]["exit_code"], 3);
        assert!(json["error"]["hint"].as_str().unwrap().contains("htmlcsv"));
    }

    #[test]
    fn test_database_error_has_no_hint() {
        let err = Error::from(rusqlite::Error::InvalidQuery);
        assert!(err.hint().is_none());
        assert_eq!(err.error_code(), ErrorCode::DatabaseError);
    }
}
