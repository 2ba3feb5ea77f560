//! Initialize the study database.
//!
//! Creates the database file at the resolved location (see
//! [`crate::config::resolve_db_path`]) and applies the schema, which seeds
//! the default settings and sets the time of study start to now.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::host::HostStore;
use crate::storage::SqliteStorage;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    time_of_start: i64,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the database exists (without `force`), or the
/// directory or database cannot be created.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(|p| p.as_path()))
        .ok_or_else(|| Error::Config("Could not determine database location".to_string()))?;

    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized { path: db_path });
        }
        fs::remove_file(&db_path)?;
        for suffix in ["-wal", "-shm"] {
            let mut side = db_path.clone().into_os_string();
            side.push(suffix);
            let side = PathBuf::from(side);
            if side.exists() {
                fs::remove_file(side)?;
            }
        }
    }

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let storage = SqliteStorage::open(&db_path)?;
    let start = storage.time_of_start()?;

    if json {
        let output = InitOutput {
            database: db_path,
            time_of_start: start.time,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized study database");
        println!("  Database: {}", db_path.display());
        println!();
        println!("Next: add items with 'ssync item add <question> <answer>'.");
    }

    Ok(())
}
