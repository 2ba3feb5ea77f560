//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// studysync - carry a spaced-repetition database to a device and back
#[derive(Parser, Debug)]
#[command(name = "ssync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.studysync/data/studysync.db)
    #[arg(long, global = true, env = "SSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "SSYNC_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the study database
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show database summary
    Status,

    /// Study item management
    Item {
        #[command(subcommand)]
        command: ItemCommands,
    },

    /// Host settings and render macros
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Export a study batch to a device directory
    Export(ExportArgs),

    /// Merge studied results back from a device directory
    Import(ImportArgs),

    /// List registered device backends
    Backends,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Item Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ItemCommands {
    /// Add a study item
    Add {
        /// Question text (HTML allowed)
        question: String,

        /// Answer text (HTML allowed)
        answer: String,

        /// Item ID (generated when omitted)
        #[arg(long)]
        id: Option<String>,

        /// Category name
        #[arg(short, long, default_value = "default")]
        category: String,
    },

    /// List study items
    List {
        /// Filter by category
        #[arg(short, long)]
        category: Option<String>,

        /// Maximum items to return
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show one study item
    Show {
        /// Item ID
        id: String,
    },
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show one setting, or all of them
    Get {
        /// Setting name
        name: Option<String>,
    },

    /// Change a setting
    Set {
        /// Setting name
        name: String,

        /// New value
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Define a render macro
    Macro {
        /// Text to replace
        name: String,

        /// Replacement
        #[arg(allow_hyphen_values = true)]
        expansion: String,
    },

    /// Show the time of study start
    Start,
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Device backend name
    #[arg(short, long, default_value = "htmlcsv")]
    pub backend: String,

    /// Offline days to cover
    #[arg(short, long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: u32,

    /// Device sync directory
    #[arg(short, long)]
    pub path: PathBuf,

    /// Acquisition budget multiplier (overrides the `extra_factor` setting)
    #[arg(long, allow_negative_numbers = true)]
    pub extra: Option<f64>,

    /// Directory relative media paths are resolved against
    #[arg(long, default_value = ".")]
    pub media_root: PathBuf,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Device backend name
    #[arg(short, long, default_value = "htmlcsv")]
    pub backend: String,

    /// Device sync directory
    #[arg(short, long)]
    pub path: PathBuf,
}
