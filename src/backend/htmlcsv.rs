//! The bundled HTML+CSV device container.
//!
//! A sync path holds:
//!
//! | file              | contents                                          |
//! |-------------------|---------------------------------------------------|
//! | `START`           | device time of start, epoch seconds               |
//! | `CONFIG`          | `key=value` lines                                 |
//! | `CARDS`           | item id per line, in serial order                 |
//! | `CARDCATS`        | category index per line, in serial order          |
//! | `CATS`            | category names, by index                          |
//! | `STATS.CSV`       | record count, then one hex stats record per line  |
//! | `cards/Q<n>.htm`  | rendered question of serial `n`                   |
//! | `cards/A<n>.htm`  | rendered answer of serial `n`                     |
//! | `cards/I<n>`      | ids of the items inverse to serial `n`            |
//! | `style.css`       | stylesheet shared by the card pages               |
//! | `IMG/`, `SND/`    | staged media                                      |
//!
//! The device rewrites `STATS.CSV` as it studies and may append review
//! lines to `LOG`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::assets::ImagePolicy;
use crate::backend::{DeviceBackend, ExportWriter, ImportReader, MediaLayout};
use crate::model::TimeOfStart;
use crate::sync::codec::StatsRecord;
use crate::sync::file::{atomic_write, read_lines, write_lines};
use crate::sync::session::SyncSession;
use crate::sync::types::{ExportEntry, ImportedRecord, SyncError, SyncResult};

pub const START_FILE: &str = "START";
pub const CONFIG_FILE: &str = "CONFIG";
pub const CARDS_FILE: &str = "CARDS";
pub const CARD_CATS_FILE: &str = "CARDCATS";
pub const CATS_FILE: &str = "CATS";
pub const STATS_FILE: &str = "STATS.CSV";
pub const STYLE_FILE: &str = "style.css";
pub const CARDS_DIR: &str = "cards";

const STYLE: &str = "body { font-family: sans-serif; margin: 0.5em; }
img { max-width: 100%; }
";

/// HTML+CSV backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCsv;

impl DeviceBackend for HtmlCsv {
    fn name(&self) -> &'static str {
        "htmlcsv"
    }

    fn description(&self) -> &'static str {
        "HTML+CSV"
    }

    fn version(&self) -> &'static str {
        "1.0.0"
    }

    fn media_layout(&self) -> MediaLayout {
        MediaLayout {
            image_policy: ImagePolicy {
                max_width: Some(240),
                max_height: Some(300),
                to_landscape: true,
                to_ext: Some("png".to_string()),
                max_size: Some(64 * 1024),
            },
            ..MediaLayout::default()
        }
    }

    fn start_export(&self, sync_path: &Path) -> SyncResult<Box<dyn ExportWriter>> {
        require_dir(sync_path)?;
        Ok(Box::new(HtmlCsvWriter::new(sync_path)))
    }

    fn start_import(&self, sync_path: &Path) -> SyncResult<Box<dyn ImportReader>> {
        require_dir(sync_path)?;
        Ok(Box::new(HtmlCsvReader::open(sync_path)?))
    }
}

fn require_dir(path: &Path) -> SyncResult<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(SyncError::FileNotFound(format!("sync path {}", path.display())))
    }
}

/// Export side of the container.
#[derive(Debug)]
pub struct HtmlCsvWriter {
    root: PathBuf,
    ids: Vec<String>,
    stats: Vec<String>,
    category_ids: Vec<usize>,
}

impl HtmlCsvWriter {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ids: Vec::new(),
            stats: Vec::new(),
            category_ids: Vec::new(),
        }
    }

    fn card_path(&self, prefix: char, serial: usize, ext: &str) -> PathBuf {
        self.root.join(CARDS_DIR).join(format!("{prefix}{serial}{ext}"))
    }
}

fn card_page(body: &str) -> String {
    format!(
        "<html><head><base href=\"../\"/><link rel=\"stylesheet\" href=\"{STYLE_FILE}\"/></head>\
         <body>{body}</body></html>\n"
    )
}

impl ExportWriter for HtmlCsvWriter {
    fn open(&mut self, start_time: TimeOfStart, num_days: u32, num_items: usize) -> SyncResult<()> {
        let cards = self.root.join(CARDS_DIR);
        if cards.exists() {
            fs::remove_dir_all(&cards)?;
        }
        fs::create_dir_all(&cards)?;

        atomic_write(&self.root.join(START_FILE), format!("{}\n", start_time.time).as_bytes())?;
        atomic_write(&self.root.join(STYLE_FILE), STYLE.as_bytes())?;

        self.ids = Vec::with_capacity(num_items);
        self.stats = Vec::with_capacity(num_items);
        self.category_ids = Vec::with_capacity(num_items);
        debug!(num_days, num_items, "Opened HTML+CSV export");
        Ok(())
    }

    fn write_config(&mut self, config: &BTreeMap<String, String>) -> SyncResult<()> {
        write_lines(
            &self.root.join(CONFIG_FILE),
            config.iter().map(|(key, value)| format!("{key}={value}")),
        )
    }

    fn write(&mut self, session: &mut SyncSession<'_>, entry: &ExportEntry) -> SyncResult<()> {
        if entry.serial != self.ids.len() {
            return Err(SyncError::Format(format!(
                "entry {} written out of order (expected serial {})",
                entry.id,
                self.ids.len()
            )));
        }

        atomic_write(&self.card_path('Q', entry.serial, ".htm"), card_page(&entry.question).as_bytes())?;
        atomic_write(&self.card_path('A', entry.serial, ".htm"), card_page(&entry.answer).as_bytes())?;
        if !entry.inverse_ids.is_empty() {
            write_lines(&self.card_path('I', entry.serial, ""), &entry.inverse_ids)?;
        }

        self.ids.push(entry.id.clone());
        self.stats.push(entry.stats.to_hex());
        self.category_ids.push(session.category_id(&entry.category));
        Ok(())
    }

    fn close(&mut self, session: &mut SyncSession<'_>) -> SyncResult<()> {
        write_lines(&self.root.join(CARDS_FILE), &self.ids)?;
        write_lines(
            &self.root.join(CARD_CATS_FILE),
            self.category_ids.iter().map(ToString::to_string),
        )?;
        write_lines(&self.root.join(CATS_FILE), session.categories())?;
        write_lines(
            &self.root.join(STATS_FILE),
            std::iter::once(self.stats.len().to_string()).chain(self.stats.iter().cloned()),
        )?;
        Ok(())
    }
}

/// Import side of the container.
#[derive(Debug)]
pub struct HtmlCsvReader {
    start: TimeOfStart,
    ids: Vec<String>,
    records: std::vec::IntoIter<(usize, String)>,
    expected: usize,
    serial: usize,
    finished: bool,
}

impl HtmlCsvReader {
    /// Open the container, reading the start time, ids and record count.
    ///
    /// # Errors
    ///
    /// Returns an error if a required file is missing or malformed.
    pub fn open(root: &Path) -> SyncResult<Self> {
        let start = read_start(&root.join(START_FILE))?;
        let ids: Vec<String> = read_lines(&root.join(CARDS_FILE))?
            .into_iter()
            .map(|(_, id)| id)
            .collect();

        let mut lines = read_lines(&root.join(STATS_FILE))?.into_iter();
        let (line, count) = lines
            .next()
            .ok_or_else(|| SyncError::Format(format!("{STATS_FILE} is empty")))?;
        let expected: usize = count.trim().parse().map_err(|_| SyncError::InvalidRecord {
            line,
            message: format!("bad record count: {count}"),
        })?;
        if expected > ids.len() {
            return Err(SyncError::Format(format!(
                "{STATS_FILE} has {expected} records but {CARDS_FILE} lists {} ids",
                ids.len()
            )));
        }

        Ok(Self {
            start,
            ids,
            records: lines.collect::<Vec<_>>().into_iter(),
            expected,
            serial: 0,
            finished: false,
        })
    }
}

fn read_start(path: &Path) -> SyncResult<TimeOfStart> {
    let lines = read_lines(path)?;
    let (line, text) = lines
        .first()
        .ok_or_else(|| SyncError::Format(format!("{START_FILE} is empty")))?;
    text.trim()
        .parse()
        .map(TimeOfStart::new)
        .map_err(|_| SyncError::InvalidRecord {
            line: *line,
            message: format!("bad start time: {text}"),
        })
}

impl Iterator for HtmlCsvReader {
    type Item = SyncResult<ImportedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some((line, text)) = self.records.next() else {
            self.finished = true;
            if self.serial == self.expected {
                return None;
            }
            return Some(Err(SyncError::Format(format!(
                "{STATS_FILE}: expected {} records, found {}",
                self.expected, self.serial
            ))));
        };

        if self.serial >= self.expected {
            self.finished = true;
            return Some(Err(SyncError::Format(format!(
                "{STATS_FILE}: more than {} records",
                self.expected
            ))));
        }

        let result = StatsRecord::from_hex(&text)
            .map_err(|e| SyncError::InvalidRecord {
                line,
                message: e.to_string(),
            })
            .map(|stats| ImportedRecord {
                id: self.ids[self.serial].clone(),
                stats,
            });
        if result.is_err() {
            self.finished = true;
        }
        self.serial += 1;
        Some(result)
    }
}

impl ImportReader for HtmlCsvReader {
    fn start_time(&self) -> TimeOfStart {
        self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LearningState;
    use crate::sync::codec::encode;
    use tempfile::TempDir;

    fn entry(serial: usize, id: &str, category: &str) -> ExportEntry {
        ExportEntry {
            id: id.to_string(),
            serial,
            stats: encode(&LearningState {
                grade: 2,
                last_rep: 1_000,
                next_rep: 5_000,
                unseen: false,
                ..LearningState::default()
            }),
            question: format!("<b>{id}?</b>"),
            answer: format!("{id}!"),
            category: category.to_string(),
            inverse_ids: Vec::new(),
        }
    }

    fn export(dir: &Path, entries: &[ExportEntry]) {
        let mut session = SyncSession::new(dir);
        let mut writer = HtmlCsv.start_export(dir).unwrap();
        writer.open(TimeOfStart::new(1_234), 3, entries.len()).unwrap();
        let config: BTreeMap<String, String> =
            [("grade_0_items_at_once".to_string(), "10".to_string())].into();
        writer.write_config(&config).unwrap();
        for e in entries {
            writer.write(&mut session, e).unwrap();
        }
        writer.close(&mut session).unwrap();
    }

    #[test]
    fn test_export_layout() {
        let dir = TempDir::new().unwrap();
        let mut inverse = entry(1, "b", "French");
        inverse.inverse_ids = vec!["a".to_string()];
        export(dir.path(), &[entry(0, "a", "German"), inverse, entry(2, "c", "German")]);

        let read = |name: &str| fs::read_to_string(dir.path().join(name)).unwrap();
        assert_eq!(read(START_FILE), "1234\n");
        assert_eq!(read(CONFIG_FILE), "grade_0_items_at_once=10\n");
        assert_eq!(read(CARDS_FILE), "a\nb\nc\n");
        assert_eq!(read(CATS_FILE), "German\nFrench\n");
        assert_eq!(read(CARD_CATS_FILE), "0\n1\n0\n");
        assert!(read(STATS_FILE).starts_with("3\n"));
        assert!(read("cards/Q1.htm").contains("<b>b?</b>"));
        assert_eq!(read("cards/I1"), "a\n");
        assert!(!dir.path().join("cards/I0").exists());
    }

    #[test]
    fn test_import_reads_back_exported_stats() {
        let dir = TempDir::new().unwrap();
        let entries = [entry(0, "a", "x"), entry(1, "b", "x")];
        export(dir.path(), &entries);

        let reader = HtmlCsv.start_import(dir.path()).unwrap();
        assert_eq!(reader.start_time(), TimeOfStart::new(1_234));
        let records: Vec<ImportedRecord> = reader.map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "b");
        assert_eq!(records[1].stats, entries[1].stats);
    }

    #[test]
    fn test_out_of_order_write_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut session = SyncSession::new(dir.path());
        let mut writer = HtmlCsv.start_export(dir.path()).unwrap();
        writer.open(TimeOfStart::new(0), 0, 2).unwrap();
        assert!(writer.write(&mut session, &entry(1, "b", "x")).is_err());
    }

    #[test]
    fn test_missing_sync_path() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("device");
        assert!(matches!(HtmlCsv.start_export(&missing), Err(SyncError::FileNotFound(_))));
        assert!(matches!(HtmlCsv.start_import(&missing), Err(SyncError::FileNotFound(_))));
    }

    #[test]
    fn test_corrupt_record_stops_reader() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), &[entry(0, "a", "x"), entry(1, "b", "x"), entry(2, "c", "x")]);
        let stats_path = dir.path().join(STATS_FILE);
        let mut lines: Vec<String> = fs::read_to_string(&stats_path)
            .unwrap()
            .lines()
            .map(ToString::to_string)
            .collect();
        lines[2] = "zz".to_string();
        fs::write(&stats_path, lines.join("\n")).unwrap();

        let results: Vec<_> = HtmlCsv.start_import(dir.path()).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SyncError::InvalidRecord { line: 3, .. })));
    }

    #[test]
    fn test_truncated_stats_file() {
        let dir = TempDir::new().unwrap();
        export(dir.path(), &[entry(0, "a", "x"), entry(1, "b", "x")]);
        let stats_path = dir.path().join(STATS_FILE);
        let text = fs::read_to_string(&stats_path).unwrap();
        let first_two: Vec<&str> = text.lines().take(2).collect();
        fs::write(&stats_path, first_two.join("\n")).unwrap();

        let results: Vec<_> = HtmlCsv.start_import(dir.path()).unwrap().collect();
        assert!(results[0].is_ok());
        assert!(matches!(results.last(), Some(Err(SyncError::Format(_)))));
    }
}
