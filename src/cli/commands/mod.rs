//! Command implementations.

pub mod backends;
pub mod completions;
pub mod config;
pub mod export;
pub mod import;
pub mod init;
pub mod item;
pub mod status;
pub mod version;

use crate::config::{default_actor, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use std::path::PathBuf;

/// Open the initialized study database, tagging writes with `actor`.
pub(crate) fn open_storage(db_path: Option<&PathBuf>, actor: Option<&str>) -> Result<SqliteStorage> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path())).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let actor = actor.map(ToString::to_string).unwrap_or_else(default_actor);
    Ok(SqliteStorage::open(&db_path)?.with_actor(&actor))
}
