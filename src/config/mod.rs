//! Configuration management.
//!
//! Resolves where the study database lives and who is recorded as the
//! actor in audit events. Everything else the engine needs (acquisition
//! budget, log upload, extra factor, macros) is stored in the database
//! itself and read through [`crate::host::HostStore`].

use std::path::{Path, PathBuf};

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "studysync.db";

/// Get the global studysync directory location (`~/.studysync/`).
#[must_use]
pub fn global_data_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".studysync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `SSYNC_TEST_DB=1` (or any non-empty value
/// other than `0`/`false`). It redirects the database to an isolated file.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("SSYNC_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.studysync/test/studysync.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_data_dir().map(|dir| dir.join("test").join(DB_FILE_NAME))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `SSYNC_TEST_DB` environment variable → uses test database
/// 3. `SSYNC_DB` environment variable
/// 4. Global location: `~/.studysync/data/studysync.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Ok(db_path) = std::env::var("SSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_data_dir().map(|dir| dir.join("data").join(DB_FILE_NAME))
}

/// Get the default actor name.
///
/// Priority:
/// 1. `SSYNC_ACTOR` environment variable
/// 2. System username
/// 3. "unknown"
#[must_use]
pub fn default_actor() -> String {
    ["SSYNC_ACTOR", "USER", "USERNAME"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_actor() {
        assert!(!default_actor().is_empty());
    }

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/db.sqlite");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_resolve_db_path_default_name() {
        let path = resolve_db_path(None).unwrap();
        assert!(path.ends_with(DB_FILE_NAME) || std::env::var("SSYNC_DB").is_ok());
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_data_dir().unwrap();
        let test = test_db_path().unwrap();
        assert!(test.starts_with(global.join("test")));
        assert_ne!(global.join("data").join(DB_FILE_NAME), test);
    }

    #[test]
    fn test_truthy_values() {
        for v in ["1", "true", "yes"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["", "0", "false", "FALSE"] {
            assert!(!is_truthy(v), "{v}");
        }
    }
}
