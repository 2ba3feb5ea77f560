//! Study item model.
//!
//! A study item is a question/answer pair owned by the host database
//! together with the learning state the scheduler maintains for it. The
//! sync engine only reads items and, on import, rewrites their learning
//! state (and, during reconciliation, their id).

use serde::{Deserialize, Serialize};

/// Seconds in one scheduling day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Learning statistics of a single study item.
///
/// Repetition times are Unix epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningState {
    /// Self-assessed recall quality of the last review (0-5).
    pub grade: u8,
    /// Interval growth factor.
    pub easiness: f64,
    pub acq_reps: u32,
    pub ret_reps: u32,
    pub lapses: u32,
    pub acq_reps_since_lapse: u32,
    pub ret_reps_since_lapse: u32,
    pub last_rep: i64,
    pub next_rep: i64,
    /// Never shown to the learner.
    pub unseen: bool,
}

impl Default for LearningState {
    fn default() -> Self {
        Self {
            grade: 0,
            easiness: 2.5,
            acq_reps: 0,
            ret_reps: 0,
            lapses: 0,
            acq_reps_since_lapse: 0,
            ret_reps_since_lapse: 0,
            last_rep: 0,
            next_rep: 0,
            unseen: true,
        }
    }
}

impl LearningState {
    /// Material not yet reliably retained is reviewed by acquisition reps.
    #[must_use]
    pub fn is_due_for_acquisition_rep(&self) -> bool {
        self.grade < 2
    }

    /// Whether a retention rep falls within the next `days` days.
    #[must_use]
    pub fn is_due_for_retention_rep(&self, days: u32, start: TimeOfStart, now: i64) -> bool {
        self.grade >= 2 && self.days_until_next_rep(start, now) <= i64::from(days)
    }

    /// Whole scheduling days from `now` until the next repetition.
    #[must_use]
    pub fn days_until_next_rep(&self, start: TimeOfStart, now: i64) -> i64 {
        start.day_of(self.next_rep) - start.days_since(now)
    }

    /// Ordering key used to sort an export batch by scheduling interval.
    #[must_use]
    pub fn interval_sort_key(&self) -> i64 {
        self.next_rep - self.last_rep
    }
}

/// The process-wide "time of study start" of a host database.
///
/// Scheduling days are counted from this instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfStart {
    /// Unix epoch seconds.
    pub time: i64,
}

impl TimeOfStart {
    #[must_use]
    pub const fn new(time: i64) -> Self {
        Self { time }
    }

    /// Day index of `t`, counted from the start.
    #[must_use]
    pub fn day_of(&self, t: i64) -> i64 {
        (t - self.time).div_euclid(SECONDS_PER_DAY)
    }

    /// Elapsed scheduling days between the start and `now`.
    #[must_use]
    pub fn days_since(&self, now: i64) -> i64 {
        self.day_of(now)
    }
}

/// A study item as stored by the host database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyItem {
    /// Row key; stable even while ids collide.
    pub key: i64,
    /// User-visible identifier, unique once reconciled.
    pub id: String,
    /// Category name.
    pub category: String,
    pub question: String,
    pub answer: String,
    #[serde(flatten)]
    pub state: LearningState,
}

impl StudyItem {
    /// Whether `other` is the reverse card of `self` (question and answer swapped).
    #[must_use]
    pub fn is_inverse_of(&self, other: &StudyItem) -> bool {
        self.key != other.key && self.question == other.answer && other.question == self.answer
    }
}
