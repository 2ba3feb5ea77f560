//! Import of studied results from a device.
//!
//! The whole device stream is read into memory before anything is written.
//! A read failure at any record aborts the import with the host database
//! untouched. Once every record is in hand, the skew correction and all
//! learning-state updates are applied in a single transaction.
//!
//! After a successful merge the device result file is kept as
//! `OLDSTATS.CSV`, and the device review log, if any, is stored in the host's
//! diagnostic log and removed. These cleanup steps run after the commit, so
//! their failures are logged and never fail the import.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

use crate::backend::DeviceBackend;
use crate::error::{Error, Result};
use crate::host::HostStore;
use crate::sync::codec::decode;
use crate::sync::file::rename_if_exists;
use crate::sync::session::SyncSession;
use crate::sync::skew;
use crate::sync::types::{ImportStats, ImportedRecord};

/// Device result file.
pub const RESULT_FILE: &str = "STATS.CSV";
/// Name the result file is kept under after a merge.
pub const RESULT_BACKUP: &str = "OLDSTATS.CSV";
/// Device review log.
pub const DEVICE_LOG: &str = "LOG";

/// Percentage reached once the device stream is read.
const READ_DONE: u32 = 50;
/// Percentage reached once the merge is committed.
const MERGE_DONE: u32 = 90;

/// Importer for one device backend.
pub struct Importer<'a, S: HostStore + ?Sized> {
    store: &'a mut S,
    backend: &'a dyn DeviceBackend,
}

impl<'a, S: HostStore + ?Sized> Importer<'a, S> {
    #[must_use]
    pub fn new(store: &'a mut S, backend: &'a dyn DeviceBackend) -> Self {
        Self { store, backend }
    }

    /// Merge the device results found in the session's sync path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Interface`] if the device container cannot be read,
    /// [`Error::Cancelled`] if cancelled while reading, or a database error
    /// if the merge fails. In every error case the host database is
    /// unchanged; once the merge commits the import succeeds.
    pub fn import(&mut self, session: &mut SyncSession<'_>) -> Result<ImportStats> {
        let backend_name = self.backend.description();
        let interface = |e| Error::interface(backend_name, e);

        let mut reader = self.backend.start_import(session.sync_path()).map_err(interface)?;
        let device_start = reader.start_time();
        session.set_start_time(device_start);

        let mut records: Vec<ImportedRecord> = Vec::new();
        for record in reader.by_ref() {
            if session.is_cancelled() {
                return Err(Error::Cancelled {
                    completed: records.len(),
                });
            }
            records.push(record.map_err(interface)?);
        }
        drop(reader);
        session.set_progress(READ_DONE);

        let correction = skew::plan(self.store.time_of_start()?, device_start);
        let pending_days = correction.pending_days();

        let mut stats = ImportStats {
            read: records.len(),
            offset_days: correction.offset_days(),
            ..ImportStats::default()
        };
        let mut updates = Vec::with_capacity(records.len());
        for record in records {
            let Some(item) = self.store.item_by_id(&record.id)? else {
                warn!(id = %record.id, "Quietly ignoring item with missing id");
                stats.skipped += 1;
                continue;
            };
            let mut stats_record = record.stats;
            if let Some(days) = pending_days {
                stats_record.shift_days(days);
            }
            let mut state = item.state;
            decode(&stats_record, &mut state);
            updates.push((item.key, state));
        }

        let rewrite = correction.start_rewrite();
        stats.merged = self.store.merge_learning_states(rewrite.as_ref(), &updates)?;
        stats.desktop_start_rewritten = rewrite.is_some();
        info!(
            read = stats.read,
            merged = stats.merged,
            skipped = stats.skipped,
            offset_days = stats.offset_days,
            desktop_start_rewritten = stats.desktop_start_rewritten,
            "Merged device results"
        );
        session.set_progress(MERGE_DONE);

        let root = session.sync_path();
        if let Err(e) = rename_if_exists(&root.join(RESULT_FILE), &root.join(RESULT_BACKUP)) {
            warn!(error = %e, "Could not keep {RESULT_FILE} as {RESULT_BACKUP}");
        }
        stats.log_lines = self.store_device_log(&root.join(DEVICE_LOG));

        session.set_progress(100);
        Ok(stats)
    }

    /// Store the device review log in the host, then remove it from the
    /// device. Returns the number of lines stored.
    ///
    /// Invalid UTF-8 is replaced. A log that cannot be stored stays on the
    /// device for the next import.
    fn store_device_log(&mut self, path: &Path) -> usize {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read device log");
                return 0;
            }
        };

        let lines = log_lines(&bytes);
        info!(target: "device_log", "starting log import");
        for line in &lines {
            info!(target: "device_log", "{line}");
        }
        info!(target: "device_log", lines = lines.len(), "finished log import");

        let stored = match self.store.append_device_log(&lines) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Could not store device log, leaving it on the device");
                return 0;
            }
        };
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "Could not remove device log");
        }
        stored
    }
}

/// Split raw log bytes into lines. A final newline does not start a line.
fn log_lines(bytes: &[u8]) -> Vec<String> {
    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    if body.is_empty() {
        return Vec::new();
    }
    body.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}
