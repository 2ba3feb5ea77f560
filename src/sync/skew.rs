//! Clock skew correction between device and desktop.
//!
//! A device counts scheduling days from its own start time. When that start
//! differs from the desktop's, imported repetition times are measured on a
//! different day grid. The correction works in whole days only:
//!
//! - desktop started later than the device: the desktop history is moved
//!   back onto the device's grid (start time and every item shifted);
//! - otherwise the imported records are shifted forward by the offset.

use tracing::info;

use crate::error::Result;
use crate::host::{HostStore, StartRewrite};
use crate::model::{SECONDS_PER_DAY, TimeOfStart};

/// Result of comparing desktop and device start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkewCorrection {
    /// Rewrite the desktop start time and shift its items.
    RewriteDesktop {
        new_start: TimeOfStart,
        offset_days: u64,
    },
    /// Leave the desktop alone; add this many days to each imported record.
    Pending { offset_days: u64 },
}

impl SkewCorrection {
    /// Day offset, whichever side absorbs it.
    #[must_use]
    pub const fn offset_days(&self) -> u64 {
        match self {
            Self::RewriteDesktop { offset_days, .. } | Self::Pending { offset_days } => *offset_days,
        }
    }

    /// Host rewrite to apply, if the desktop absorbs the offset.
    #[must_use]
    pub fn start_rewrite(&self) -> Option<StartRewrite> {
        match *self {
            Self::RewriteDesktop { new_start, offset_days } => Some(StartRewrite {
                new_start,
                shift_seconds: days_to_seconds(offset_days),
            }),
            Self::Pending { .. } => None,
        }
    }

    /// Days still to add to imported records.
    #[must_use]
    pub const fn pending_days(&self) -> Option<u64> {
        match self {
            Self::RewriteDesktop { .. } => None,
            Self::Pending { offset_days } => Some(*offset_days),
        }
    }
}

/// Whole days between the two start times, rounded to nearest.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn offset_days(desktop: TimeOfStart, device: TimeOfStart) -> u64 {
    let diff = desktop.time.saturating_sub(device.time) as f64;
    (diff / SECONDS_PER_DAY as f64).round().abs() as u64
}

/// Decide how to reconcile `desktop` with a device that started at `device`.
#[must_use]
pub fn plan(desktop: TimeOfStart, device: TimeOfStart) -> SkewCorrection {
    let offset_days = offset_days(desktop, device);
    if desktop.time > device.time {
        SkewCorrection::RewriteDesktop {
            new_start: device,
            offset_days,
        }
    } else {
        SkewCorrection::Pending { offset_days }
    }
}

/// Compare against the device start and apply any desktop rewrite now.
///
/// Returns the pending day offset for imported records, or `None` when the
/// desktop absorbed it.
///
/// # Errors
///
/// Returns an error if the host store cannot be read or updated.
pub fn adjust_start_time<S: HostStore + ?Sized>(store: &mut S, device: TimeOfStart) -> Result<Option<u64>> {
    let correction = plan(store.time_of_start()?, device);
    if let Some(rewrite) = correction.start_rewrite() {
        info!(
            offset_days = correction.offset_days(),
            new_start = rewrite.new_start.time,
            "Moving desktop start time to device start"
        );
        store.rewrite_start(&rewrite)?;
    }
    Ok(correction.pending_days())
}

fn days_to_seconds(days: u64) -> i64 {
    i64::try_from(days)
        .unwrap_or(i64::MAX)
        .saturating_mul(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LearningState;
    use crate::storage::{NewItem, SqliteStorage};

    const T0: i64 = 1_600_000_000;

    fn storage_at(start: i64) -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage.set_time_of_start(TimeOfStart::new(start)).unwrap();
        storage
            .create_item(&NewItem {
                id: "card",
                category: "c",
                question: "q",
                answer: "a",
                state: LearningState {
                    grade: 3,
                    last_rep: T0 + 10 * SECONDS_PER_DAY,
                    next_rep: T0 + 20 * SECONDS_PER_DAY,
                    unseen: false,
                    ..LearningState::default()
                },
            })
            .unwrap();
        storage
    }

    #[test]
    fn test_offset_rounds_to_nearest_day() {
        let a = TimeOfStart::new(T0);
        assert_eq!(offset_days(a, TimeOfStart::new(T0)), 0);
        assert_eq!(offset_days(a, TimeOfStart::new(T0 - SECONDS_PER_DAY / 2 + 1)), 0);
        assert_eq!(offset_days(a, TimeOfStart::new(T0 - 2 * SECONDS_PER_DAY - 3_600)), 2);
        assert_eq!(offset_days(a, TimeOfStart::new(T0 + 3 * SECONDS_PER_DAY)), 3);
    }

    #[test]
    fn test_plan_direction() {
        let desktop = TimeOfStart::new(T0);
        let earlier = TimeOfStart::new(T0 - 5 * SECONDS_PER_DAY);
        let later = TimeOfStart::new(T0 + 3 * SECONDS_PER_DAY);

        assert_eq!(
            plan(desktop, earlier),
            SkewCorrection::RewriteDesktop {
                new_start: earlier,
                offset_days: 5
            }
        );
        assert_eq!(plan(desktop, later), SkewCorrection::Pending { offset_days: 3 });
        assert_eq!(plan(desktop, desktop).pending_days(), Some(0));
    }

    #[test]
    fn test_device_started_earlier_rewrites_desktop() {
        let mut storage = storage_at(T0);
        let device = TimeOfStart::new(T0 - 5 * SECONDS_PER_DAY);

        let pending = adjust_start_time(&mut storage, device).unwrap();

        assert_eq!(pending, None);
        assert_eq!(storage.time_of_start().unwrap(), device);
        let item = storage.get_item("card").unwrap().unwrap();
        assert_eq!(item.state.last_rep, T0 + 15 * SECONDS_PER_DAY);
        assert_eq!(item.state.next_rep, T0 + 25 * SECONDS_PER_DAY);
    }

    #[test]
    fn test_device_started_later_leaves_desktop_alone() {
        let mut storage = storage_at(T0);
        let device = TimeOfStart::new(T0 + 3 * SECONDS_PER_DAY);

        let pending = adjust_start_time(&mut storage, device).unwrap();

        assert_eq!(pending, Some(3));
        assert_eq!(storage.time_of_start().unwrap(), TimeOfStart::new(T0));
        let item = storage.get_item("card").unwrap().unwrap();
        assert_eq!(item.state.last_rep, T0 + 10 * SECONDS_PER_DAY);
    }
}
