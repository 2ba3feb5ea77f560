//! Backends command implementation.

use crate::backend::BackendRegistry;
use crate::error::Result;
use colored::Colorize;

/// List the registered device backends.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let backends = BackendRegistry::with_defaults().list();

    if json {
        println!("{}", serde_json::to_string(&backends)?);
        return Ok(());
    }

    for b in &backends {
        println!("{:<10} {} {}", b.name.bold(), b.description, format!("v{}", b.version).dimmed());
    }
    Ok(())
}
