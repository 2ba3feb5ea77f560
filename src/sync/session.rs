//! Per-sync session state.
//!
//! A [`SyncSession`] lives for exactly one export or import. It owns the
//! staging path, the running completion percentage reported to an optional
//! progress callback, the device start time, and the categories and media
//! references gathered while items are written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::assets::media::MediaRefs;
use crate::model::TimeOfStart;

/// Cooperative cancellation flag shared with the caller.
///
/// Sessions check it between items only.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Progress callback receiving a percentage in `0..=100`.
pub type ProgressCallback<'a> = Box<dyn FnMut(u32) + 'a>;

/// State of one sync run.
pub struct SyncSession<'a> {
    sync_path: PathBuf,
    percentage_complete: u32,
    start_time: Option<TimeOfStart>,
    categories: Vec<String>,
    category_index: HashMap<String, usize>,
    images: MediaRefs,
    sounds: MediaRefs,
    progress: Option<ProgressCallback<'a>>,
    cancel: CancelFlag,
}

impl std::fmt::Debug for SyncSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSession")
            .field("sync_path", &self.sync_path)
            .field("percentage_complete", &self.percentage_complete)
            .field("start_time", &self.start_time)
            .field("categories", &self.categories)
            .field("images", &self.images.len())
            .field("sounds", &self.sounds.len())
            .finish_non_exhaustive()
    }
}

impl<'a> SyncSession<'a> {
    /// New session staging into `sync_path`.
    #[must_use]
    pub fn new(sync_path: impl Into<PathBuf>) -> Self {
        Self {
            sync_path: sync_path.into(),
            percentage_complete: 0,
            start_time: None,
            categories: Vec::new(),
            category_index: HashMap::new(),
            images: MediaRefs::default(),
            sounds: MediaRefs::default(),
            progress: None,
            cancel: CancelFlag::new(),
        }
    }

    /// Report progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: impl FnMut(u32) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Honour cancellation requests made through `flag`.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    #[must_use]
    pub fn sync_path(&self) -> &Path {
        &self.sync_path
    }

    #[must_use]
    pub fn percentage_complete(&self) -> u32 {
        self.percentage_complete
    }

    /// Advance progress to `percent`.
    ///
    /// Values below the current percentage are ignored and values above 100
    /// are clamped, so observers see a non-decreasing sequence.
    pub fn set_progress(&mut self, percent: u32) {
        let percent = percent.min(100);
        if percent <= self.percentage_complete {
            return;
        }
        self.percentage_complete = percent;
        if let Some(callback) = self.progress.as_mut() {
            callback(percent);
        }
    }

    /// Progress `done` of `total` steps scaled into `[base, ceiling]`.
    pub fn set_progress_between(&mut self, base: u32, ceiling: u32, done: usize, total: usize) {
        if total == 0 {
            self.set_progress(ceiling);
            return;
        }
        let stretch = u64::from(ceiling.saturating_sub(base));
        let done = u64::try_from(done.min(total)).unwrap_or(u64::MAX);
        let total = u64::try_from(total).unwrap_or(u64::MAX);
        let step = u32::try_from(done * stretch / total).unwrap_or(0);
        self.set_progress(base + step);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    #[must_use]
    pub fn start_time(&self) -> Option<TimeOfStart> {
        self.start_time
    }

    pub fn set_start_time(&mut self, start: TimeOfStart) {
        self.start_time = Some(start);
    }

    /// Index of `category`, assigning the next free index on first use.
    pub fn category_id(&mut self, category: &str) -> usize {
        if let Some(&index) = self.category_index.get(category) {
            return index;
        }
        let index = self.categories.len();
        self.categories.push(category.to_string());
        self.category_index.insert(category.to_string(), index);
        index
    }

    /// Categories in index order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn images_mut(&mut self) -> &mut MediaRefs {
        &mut self.images
    }

    pub fn sounds_mut(&mut self) -> &mut MediaRefs {
        &mut self.sounds
    }

    #[must_use]
    pub fn images(&self) -> &MediaRefs {
        &self.images
    }

    #[must_use]
    pub fn sounds(&self) -> &MediaRefs {
        &self.sounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_progress_is_monotonic_and_clamped() {
        let seen = RefCell::new(Vec::new());
        {
            let mut session = SyncSession::new("/tmp/x").with_progress(|p| seen.borrow_mut().push(p));
            session.set_progress(10);
            session.set_progress(5);
            session.set_progress(40);
            session.set_progress(250);
            assert_eq!(session.percentage_complete(), 100);
        }
        assert_eq!(*seen.borrow(), vec![10, 40, 100]);
    }

    #[test]
    fn test_progress_between() {
        let mut session = SyncSession::new("/tmp/x");
        session.set_progress(50);
        session.set_progress_between(50, 80, 1, 3);
        assert_eq!(session.percentage_complete(), 60);
        session.set_progress_between(50, 80, 3, 3);
        assert_eq!(session.percentage_complete(), 80);
        session.set_progress_between(80, 100, 0, 0);
        assert_eq!(session.percentage_complete(), 100);
    }

    #[test]
    fn test_category_ids_are_stable() {
        let mut session = SyncSession::new("/tmp/x");
        assert_eq!(session.category_id("French"), 0);
        assert_eq!(session.category_id("German"), 1);
        assert_eq!(session.category_id("French"), 0);
        assert_eq!(session.categories(), &["French".to_string(), "German".to_string()]);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let session = SyncSession::new("/tmp/x").with_cancel_flag(flag.clone());
        assert!(!session.is_cancelled());
        flag.cancel();
        assert!(session.is_cancelled());
    }

    #[test]
    fn test_sessions_do_not_share_media() {
        let mut first = SyncSession::new("/a");
        first.images_mut().add("dog.png", "dog.png");
        let second = SyncSession::new("/b");
        assert_eq!(first.images().len(), 1);
        assert!(second.images().is_empty());
    }
}
