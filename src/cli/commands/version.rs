//! Version command implementation.

use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    images: bool,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) { "dev" } else { "release" };
    let images = cfg!(feature = "images");

    if json {
        let output = VersionOutput { version, build, images };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("ssync version {version} ({build})");
    if !images {
        println!("  image conversion disabled; images are copied as-is");
    }
    Ok(())
}
