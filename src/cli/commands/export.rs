//! Export command implementation.

use crate::backend::BackendRegistry;
use crate::cli::ExportArgs;
use crate::error::Result;
use crate::render::Renderer;
use crate::sync::{ExportOptions, Exporter, SyncSession};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use super::open_storage;

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the database is not initialized, the backend is
/// unknown, or the export fails.
pub fn execute(args: &ExportArgs, db_path: Option<&PathBuf>, actor: Option<&str>, json: bool) -> Result<()> {
    let registry = BackendRegistry::with_defaults();
    let backend = registry.get(&args.backend)?;

    let mut storage = open_storage(db_path, actor)?;
    let renderer = Renderer::from_store(&storage)?;

    let mut options = ExportOptions::new(args.days);
    options.extra_factor = args.extra;
    options.media_root.clone_from(&args.media_root);

    let mut session = SyncSession::new(&args.path).with_progress(|percent| debug!(percent, "Export progress"));
    let stats = Exporter::new(&mut storage, backend, &renderer).export(&mut session, &options)?;

    if json {
        let output = serde_json::json!({
            "backend": backend.name(),
            "path": args.path.display().to_string(),
            "days": args.days,
            "stats": stats,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if stats.cancelled {
        println!("{}", "Export cancelled".yellow().bold());
    } else {
        println!("{} to {}", "Export complete".green().bold(), args.path.display());
    }
    println!();
    println!("  Items:     {} ({} retention, {} acquisition)", stats.items, stats.retention, stats.acquisition);
    if stats.renamed_ids > 0 {
        println!("  Renamed:   {} duplicate id(s)", stats.renamed_ids);
    }
    if stats.images > 0 || stats.sounds > 0 {
        println!("  Media:     {} image(s), {} sound(s)", stats.images, stats.sounds);
    }
    if stats.removed_media > 0 {
        println!("  Removed:   {} stale media file(s)", stats.removed_media);
    }

    Ok(())
}
