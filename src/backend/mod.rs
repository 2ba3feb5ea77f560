//! Device backends.
//!
//! A backend knows one device container format. Export hands it a batch of
//! rendered items through an [`ExportWriter`]; import pulls learning records
//! back through an [`ImportReader`]. Backends are trait objects collected in
//! a [`BackendRegistry`] built once at startup.
//!
//! Every capability is a required trait method, so a backend that cannot
//! export or import does not compile.

pub mod htmlcsv;

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::assets::ImagePolicy;
use crate::error::{Error, Result};
use crate::model::TimeOfStart;
use crate::sync::session::SyncSession;
use crate::sync::types::{ExportEntry, ImportedRecord, SyncResult};

pub use htmlcsv::HtmlCsv;

/// Where a backend wants staged media and how images must be shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLayout {
    pub image_dir: String,
    pub sound_dir: String,
    pub image_policy: ImagePolicy,
}

impl Default for MediaLayout {
    fn default() -> Self {
        Self {
            image_dir: "IMG".to_string(),
            sound_dir: "SND".to_string(),
            image_policy: ImagePolicy::default(),
        }
    }
}

/// A device container format.
pub trait DeviceBackend {
    /// Registry key, e.g. `htmlcsv`.
    fn name(&self) -> &'static str;

    /// Human-readable name used in error messages.
    fn description(&self) -> &'static str;

    fn version(&self) -> &'static str;

    /// Media staging layout.
    fn media_layout(&self) -> MediaLayout {
        MediaLayout::default()
    }

    /// Begin an export into `sync_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device container cannot be opened for writing.
    fn start_export(&self, sync_path: &Path) -> SyncResult<Box<dyn ExportWriter>>;

    /// Begin an import from `sync_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the device container cannot be opened for reading.
    fn start_import(&self, sync_path: &Path) -> SyncResult<Box<dyn ImportReader>>;
}

/// Writes one export batch. Calls arrive as `open`, `write_config`, one
/// `write` per entry in serial order, then `close`.
pub trait ExportWriter {
    /// Start a batch of `num_items` entries covering `num_days` days.
    fn open(&mut self, start_time: TimeOfStart, num_days: u32, num_items: usize) -> SyncResult<()>;

    /// Device configuration as key/value pairs.
    fn write_config(&mut self, config: &BTreeMap<String, String>) -> SyncResult<()>;

    fn write(&mut self, session: &mut SyncSession<'_>, entry: &ExportEntry) -> SyncResult<()>;

    /// Finish the batch. Also called after a cancelled export, with the
    /// entries written so far.
    fn close(&mut self, session: &mut SyncSession<'_>) -> SyncResult<()>;
}

/// Reads learning records back from a device.
pub trait ImportReader: Iterator<Item = SyncResult<ImportedRecord>> {
    /// The device's time of study start.
    fn start_time(&self) -> TimeOfStart;
}

/// Summary of a registered backend.
#[derive(Debug, Clone, Serialize)]
pub struct BackendInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub version: &'static str,
}

/// Registered device backends, in registration order.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn DeviceBackend>>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| b.name()))
            .finish()
    }
}

impl BackendRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled backends.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(HtmlCsv));
        registry
    }

    /// Add a backend. Lookups return the first backend with a matching name.
    pub fn register(&mut self, backend: Box<dyn DeviceBackend>) {
        self.backends.push(backend);
    }

    /// Look up a backend by name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackendNotFound`] listing the available names.
    pub fn get(&self, name: &str) -> Result<&dyn DeviceBackend> {
        self.backends
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(name))
            .map(|b| &**b)
            .ok_or_else(|| Error::BackendNotFound {
                name: name.to_string(),
                available: self.backends.iter().map(|b| b.name().to_string()).collect(),
            })
    }

    #[must_use]
    pub fn list(&self) -> Vec<BackendInfo> {
        self.backends
            .iter()
            .map(|b| BackendInfo {
                name: b.name(),
                description: b.description(),
                version: b.version(),
            })
            .collect()
    }
}
