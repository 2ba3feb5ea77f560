//! Import command implementation.

use crate::backend::BackendRegistry;
use crate::cli::ImportArgs;
use crate::error::Result;
use crate::sync::{Importer, SyncSession};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use super::open_storage;

/// Execute the import command.
///
/// # Errors
///
/// Returns an error if the database is not initialized, the backend is
/// unknown, or the device results cannot be read or merged.
pub fn execute(args: &ImportArgs, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    let registry = BackendRegistry::with_defaults();
    let backend = registry.get(&args.backend)?;

    let mut storage = open_storage(db_path, actor)?;

    let mut session = SyncSession::new(&args.path).with_progress(|percent| debug!(percent, "Import progress"));
    let stats = Importer::new(&mut storage, backend).import(&mut session)?;

    if json {
        let output = serde_json::json!({
            "backend": backend.name(),
            "path": args.path.display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} from {}", "Import complete".green().bold(), args.path.display());
    println!();
    println!("  Merged:    {} of {} record(s)", stats.merged, stats.read);
    if stats.skipped > 0 {
        println!("  Skipped:   {} unknown id(s)", stats.skipped);
    }
    if stats.offset_days > 0 {
        let side = if stats.desktop_start_rewritten { "desktop history" } else { "device records" };
        println!("  Skew:      {} day(s), applied to {side}", stats.offset_days);
    }
    if stats.log_lines > 0 {
        println!("  Device log: {} line(s)", stats.log_lines);
    }

    Ok(())
}
