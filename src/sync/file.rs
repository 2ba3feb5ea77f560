//! File operations for device containers.
//!
//! Device containers are plain directories of small text files. Writes go
//! through [`atomic_write`] so a device unplugged mid-export never sees a
//! half-written file:
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Line reads with 1-indexed positions for error reporting

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::sync::types::{SyncError, SyncResult};

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> SyncResult<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

/// Write lines, each terminated by `\n`, atomically.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_lines<I, S>(path: &Path, lines: I) -> SyncResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut content = String::new();
    for line in lines {
        content.push_str(line.as_ref());
        content.push('\n');
    }
    atomic_write(path, content.as_bytes())
}

/// Read the non-empty lines of a required device file.
///
/// Each line is returned with its 1-indexed line number and trailing
/// whitespace removed.
///
/// # Errors
///
/// Returns [`SyncError::FileNotFound`] if the file is missing, or an IO
/// error if it cannot be read.
pub fn read_lines(path: &Path) -> SyncResult<Vec<(usize, String)>> {
    if !path.exists() {
        return Err(SyncError::FileNotFound(path.display().to_string()));
    }

    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        lines.push((index + 1, trimmed.to_string()));
    }
    Ok(lines)
}

/// Rename `from` to `to` if `from` exists. Returns whether a rename happened.
///
/// An existing `to` is replaced.
///
/// # Errors
///
/// Returns an error if the rename fails.
pub fn rename_if_exists(from: &Path, to: &Path) -> SyncResult<bool> {
    if !from.exists() {
        return Ok(false);
    }
    fs::rename(from, to)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cards").join("Q0.htm");

        atomic_write(&path, b"<p>hello</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>hello</p>");
        let names: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[test]
    fn test_write_and_read_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("CARDS");

        write_lines(&path, ["card1", "card2", "card3"]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "card1\ncard2\ncard3\n");

        fs::write(&path, "a\r\n\nb  \n").unwrap();
        let lines = read_lines(&path).unwrap();
        assert_eq!(lines, vec![(1, "a".to_string()), (3, "b".to_string())]);
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_lines(Path::new("/nonexistent/STATS.CSV"));
        assert!(matches!(result, Err(SyncError::FileNotFound(_))));
    }

    #[test]
    fn test_rename_if_exists() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("STATS.CSV");
        let to = temp_dir.path().join("OLDSTATS.CSV");

        assert!(!rename_if_exists(&from, &to).unwrap());

        fs::write(&to, "old").unwrap();
        fs::write(&from, "new").unwrap();
        assert!(rename_if_exists(&from, &to).unwrap());
        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new");
    }
}
