//! Host collaborator contracts.
//!
//! The sync engine never talks to SQLite directly; it consumes the host
//! study database through [`HostStore`]. [`crate::storage::SqliteStorage`]
//! is the bundled implementation.

use crate::error::{Error, Result};
use crate::model::{LearningState, StudyItem, TimeOfStart};

/// Setting holding the per-session acquisition budget.
pub const SETTING_GRADE_0_ITEMS: &str = "grade_0_items_at_once";
/// Setting enabling upload of the device's review log.
pub const SETTING_UPLOAD_LOGS: &str = "upload_logs";
/// Setting scaling the acquisition budget of an export.
pub const SETTING_EXTRA_FACTOR: &str = "extra_factor";

/// A correction of the desktop's own history: move the time of start and
/// shift every item's repetition times by the same amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartRewrite {
    pub new_start: TimeOfStart,
    pub shift_seconds: i64,
}

/// The host study database as seen by the sync engine.
///
/// Implementations are used exclusively by one sync session at a time.
pub trait HostStore {
    /// All items in database order.
    fn items(&self) -> Result<Vec<StudyItem>>;

    /// Look up an item by its user-visible id; the first by row key when ids
    /// collide.
    fn item_by_id(&self, id: &str) -> Result<Option<StudyItem>>;

    /// Persist a new id for the item with the given row key.
    fn rename_item(&mut self, key: i64, new_id: &str) -> Result<()>;

    /// The scheduler's time of study start.
    fn time_of_start(&self) -> Result<TimeOfStart>;

    /// A named setting, if present.
    fn setting(&self, name: &str) -> Result<Option<String>>;

    /// Render macros as `(name, expansion)` pairs.
    fn macros(&self) -> Result<Vec<(String, String)>>;

    /// Apply a start-time rewrite on its own.
    fn rewrite_start(&mut self, rewrite: &StartRewrite) -> Result<()>;

    /// Atomically apply an optional start-time rewrite and overwrite the
    /// learning state of every listed item (by row key).
    ///
    /// Either all changes become visible or none do. Returns the number of
    /// items updated.
    fn merge_learning_states(
        &mut self,
        rewrite: Option<&StartRewrite>,
        updates: &[(i64, LearningState)],
    ) -> Result<usize>;

    /// Append the lines of a device review log to the host's diagnostic log.
    ///
    /// Returns the number of lines stored.
    fn append_device_log(&mut self, lines: &[String]) -> Result<usize>;

    /// A named integer setting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the setting is missing or not an integer.
    fn setting_int(&self, name: &str) -> Result<i64> {
        let value = self
            .setting(name)?
            .ok_or_else(|| Error::Config(format!("missing setting: {name}")))?;
        value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("setting {name} is not an integer: {value}")))
    }

    /// A named decimal setting, or `default` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the setting is present but not a number.
    fn setting_f64_or(&self, name: &str, default: f64) -> Result<f64> {
        match self.setting(name)? {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("setting {name} is not a number: {value}"))),
        }
    }
}
