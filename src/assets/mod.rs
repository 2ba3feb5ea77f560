//! Media staging for device exports.
//!
//! Images and sounds referenced by exported items are mirrored into
//! subdirectories of the sync path. Each staging run:
//! 1. copies (or converts) every referenced source that is missing or stale,
//! 2. reports progress scaled into the caller's percentage band,
//! 3. removes every file in the subdirectory that this run did not stage.
//!
//! Per-file failures are logged and skipped; a broken image must not abort
//! an export.
//!
//! # Submodules
//!
//! - [`filename`] - Device-safe staged file names
//! - [`image`] - Image conversion to device constraints
//! - [`media`] - Media tag extraction and rewriting

pub mod filename;
pub mod image;
pub mod media;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::sync::session::SyncSession;
use crate::sync::types::SyncResult;

pub use self::image::{Conversion, ImagePolicy, convert_image};
pub use media::{MediaKind, MediaRefs, MediaTags};

/// Errors from staging a single media file.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "images")]
    #[error("image error: {0}")]
    Image(#[from] ::image::ImageError),
}

/// Result type for single-file staging.
pub type AssetResult<T> = std::result::Result<T, AssetError>;

/// How a source file becomes its staged copy.
#[derive(Debug, Clone, Copy)]
pub enum Transfer<'a> {
    /// Copy with the given function when the destination is missing or stale.
    Copy(fn(&Path, &Path) -> std::io::Result<()>),
    /// Convert under the given image policy.
    ConvertImage(&'a ImagePolicy),
}

impl Transfer<'_> {
    /// Extension forced on staged names, if any.
    #[must_use]
    pub fn target_ext(&self) -> Option<&str> {
        match self {
            Self::Copy(_) => None,
            Self::ConvertImage(policy) => policy.to_ext.as_deref(),
        }
    }
}

/// Plain byte copy.
///
/// # Errors
///
/// Returns an error if the copy fails.
pub fn copy_file(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::copy(src, dst).map(|_| ())
}

/// Where and how one kind of media is staged.
#[derive(Debug, Clone, Copy)]
pub struct Stage<'a> {
    /// Subdirectory of the sync path.
    pub subdir: &'a str,
    pub transfer: Transfer<'a>,
    /// Progress percentage reached when staging completes.
    pub ceiling: u32,
}

/// Statistics for one staging run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CollectStats {
    /// Sources present in the staging directory afterwards.
    pub staged: usize,
    /// Files (re)written by this run.
    pub written: usize,
    /// Sources that could not be staged.
    pub failed: usize,
    /// Stale files removed.
    pub removed: usize,
}

/// Whether `dst` must be (re)written from `src`.
///
/// Only a destination strictly newer than its source is fresh. Equal or
/// unreadable timestamps count as stale.
#[must_use]
pub fn needs_update(src: &Path, dst: &Path) -> bool {
    let Ok(dst_meta) = fs::metadata(dst) else {
        return true;
    };
    match (fs::metadata(src).and_then(|m| m.modified()), dst_meta.modified()) {
        (Ok(src_time), Ok(dst_time)) => dst_time <= src_time,
        _ => true,
    }
}

/// Stage `sources` into `<sync path>/<stage.subdir>`.
///
/// Relative sources are resolved against `media_root`. `on_written` runs
/// for every destination this run wrote. Progress advances from the
/// session's current percentage to `stage.ceiling`.
///
/// # Errors
///
/// Returns an error only if the staging directory cannot be created or
/// listed; per-file failures are logged.
pub fn collect(
    session: &mut SyncSession<'_>,
    stage: &Stage<'_>,
    sources: &[String],
    media_root: &Path,
    on_written: &mut dyn FnMut(&Path),
) -> SyncResult<CollectStats> {
    let dest_dir = session.sync_path().join(stage.subdir);
    fs::create_dir_all(&dest_dir)?;

    let base = session.percentage_complete();
    let total = sources.len();
    let mut stats = CollectStats::default();
    let mut kept: HashSet<String> = HashSet::with_capacity(total);

    for (done, source) in sources.iter().enumerate() {
        let src = media_root.join(source);
        let name = filename::staged_name(source, stage.transfer.target_ext());
        let dst = dest_dir.join(&name);

        match transfer_one(&src, &dst, stage.transfer) {
            Ok(Some(written)) => {
                stats.written += 1;
                on_written(&written);
            }
            Ok(None) => debug!(file = %name, "Staged copy is fresh"),
            Err(e) => {
                stats.failed += 1;
                warn!(source = %src.display(), error = %e, "Error copying file");
            }
        }
        kept.insert(name);

        session.set_progress_between(base, stage.ceiling, done + 1, total);
    }
    stats.staged = total - stats.failed;

    for entry in fs::read_dir(&dest_dir)? {
        let entry = entry?;
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if kept.contains(&file_name) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => stats.removed += 1,
            Err(e) => warn!(file = %file_name, error = %e, "Could not remove stale media"),
        }
    }

    session.set_progress(stage.ceiling);
    Ok(stats)
}

/// Stage one file. Returns the written path, or `None` if it was fresh.
fn transfer_one(src: &Path, dst: &Path, transfer: Transfer<'_>) -> AssetResult<Option<std::path::PathBuf>> {
    match transfer {
        Transfer::Copy(copy) => {
            if !needs_update(src, dst) {
                return Ok(None);
            }
            copy(src, dst)?;
            Ok(Some(dst.to_path_buf()))
        }
        Transfer::ConvertImage(policy) => {
            let conversion = convert_image(src, dst, policy)?;
            Ok(conversion.written.then_some(conversion.path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    const SOUNDS: Stage<'static> = Stage {
        subdir: "SND",
        transfer: Transfer::Copy(copy_file),
        ceiling: 100,
    };

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
    }

    #[test]
    fn test_needs_update() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, "x").unwrap();
        assert!(needs_update(&src, &dst));

        fs::write(&dst, "x").unwrap();
        let now = SystemTime::now();
        set_mtime(&src, now - Duration::from_secs(60));
        set_mtime(&dst, now);
        assert!(!needs_update(&src, &dst));

        set_mtime(&src, now + Duration::from_secs(60));
        assert!(needs_update(&src, &dst));
    }

    #[test]
    fn test_equal_mtimes_count_as_stale() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a");
        let dst = dir.path().join("b");
        fs::write(&src, "x").unwrap();
        fs::write(&dst, "x").unwrap();

        let then = SystemTime::now() - Duration::from_secs(3_600);
        set_mtime(&src, then);
        set_mtime(&dst, then);
        assert!(needs_update(&src, &dst));
    }

    #[test]
    fn test_staging_mirrors_references() {
        let media = TempDir::new().unwrap();
        let sync = TempDir::new().unwrap();
        let snd = sync.path().join("SND");
        fs::create_dir_all(&snd).unwrap();
        for name in ["A.wav", "B.wav", "C.wav"] {
            fs::write(snd.join(name), "old").unwrap();
        }
        fs::write(media.path().join("B.wav"), "b").unwrap();
        fs::write(media.path().join("D.wav"), "d").unwrap();

        let mut session = SyncSession::new(sync.path());
        let mut written = Vec::new();
        let stats = collect(
            &mut session,
            &SOUNDS,
            &["B.wav".to_string(), "D.wav".to_string()],
            media.path(),
            &mut |p| written.push(p.to_path_buf()),
        )
        .unwrap();

        let mut left: Vec<String> = fs::read_dir(&snd)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["B.wav", "D.wav"]);
        assert_eq!(stats.removed, 2);
        assert_eq!(stats.staged, 2);
        assert!(written.contains(&snd.join("D.wav")));
        assert_eq!(session.percentage_complete(), 100);
    }

    #[test]
    fn test_fresh_copy_is_not_rewritten() {
        let media = TempDir::new().unwrap();
        let sync = TempDir::new().unwrap();
        let src = media.path().join("bell.wav");
        fs::write(&src, "new bell").unwrap();
        let staged = sync.path().join("SND").join("bell.wav");
        fs::create_dir_all(staged.parent().unwrap()).unwrap();
        fs::write(&staged, "kept").unwrap();

        let now = SystemTime::now();
        set_mtime(&src, now - Duration::from_secs(3_600));
        set_mtime(&staged, now);

        let mut session = SyncSession::new(sync.path());
        let stats = collect(&mut session, &SOUNDS, &["bell.wav".to_string()], media.path(), &mut |_| {}).unwrap();

        assert_eq!(stats.written, 0);
        assert_eq!(fs::read_to_string(&staged).unwrap(), "kept");
    }

    #[test]
    fn test_missing_source_is_skipped_and_pruned() {
        let media = TempDir::new().unwrap();
        let sync = TempDir::new().unwrap();
        fs::write(media.path().join("ok.wav"), "ok").unwrap();

        let mut session = SyncSession::new(sync.path());
        let stats = collect(
            &mut session,
            &SOUNDS,
            &["gone.wav".to_string(), "ok.wav".to_string()],
            media.path(),
            &mut |_| {},
        )
        .unwrap();

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.staged, 1);
        assert!(sync.path().join("SND").join("ok.wav").exists());
    }

    #[test]
    fn test_non_ascii_names_are_encoded() {
        let media = TempDir::new().unwrap();
        let sync = TempDir::new().unwrap();
        fs::write(media.path().join("bücher.wav"), "x").unwrap();

        let mut session = SyncSession::new(sync.path());
        collect(&mut session, &SOUNDS, &["bücher.wav".to_string()], media.path(), &mut |_| {}).unwrap();

        assert!(sync.path().join("SND").join("xn--bcher-kva.wav").exists());
    }
}
