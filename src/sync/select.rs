//! Candidate selection for an offline study period.
//!
//! An export carries every item whose retention rep falls due within the
//! offline window, plus a budget of acquisition material picked in priority
//! order: forgotten items first, then items seen but not yet committed,
//! then unseen items. Items are shuffled before bucketing so that repeated
//! exports do not always favour the same material within a bucket.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::model::{StudyItem, TimeOfStart};

/// Acquisition priority classes, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bucket {
    /// Forgotten, graded 0.
    Wrong0,
    /// Forgotten, graded 1.
    Wrong1,
    /// Seen but never committed, graded 0.
    Uncommitted0,
    /// Seen but never committed, graded 1.
    Uncommitted1,
    /// Never shown, or any other acquisition item.
    Unseen,
}

impl Bucket {
    pub const ALL: [Self; 5] = [
        Self::Wrong0,
        Self::Wrong1,
        Self::Uncommitted0,
        Self::Uncommitted1,
        Self::Unseen,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Wrong0 => "wrong_0",
            Self::Wrong1 => "wrong_1",
            Self::Uncommitted0 => "uncommitted_0",
            Self::Uncommitted1 => "uncommitted_1",
            Self::Unseen => "unseen",
        }
    }

    /// Bucket of an item, or `None` if it is not due for acquisition.
    #[must_use]
    pub fn of(item: &StudyItem) -> Option<Self> {
        let s = &item.state;
        if !s.is_due_for_acquisition_rep() {
            return None;
        }
        let bucket = match (s.lapses > 0, s.unseen, s.grade) {
            (true, _, 0) => Self::Wrong0,
            (true, _, 1) => Self::Wrong1,
            (false, false, 0) => Self::Uncommitted0,
            (false, false, 1) => Self::Uncommitted1,
            (false, _, _) => Self::Unseen,
            // Forgotten items outside grades 0 and 1 match no bucket.
            (true, _, _) => return None,
        };
        Some(bucket)
    }
}

/// Inputs of one selection run.
#[derive(Debug, Clone, Copy)]
pub struct SelectionParams {
    /// Offline days to cover.
    pub num_days: u32,
    /// Acquisition items per day.
    pub grade_0_items_at_once: u32,
    /// Multiplier on the acquisition budget.
    pub extra_factor: f64,
    /// Current time (epoch seconds).
    pub now: i64,
    pub time_of_start: TimeOfStart,
}

impl SelectionParams {
    /// Acquisition budget: `floor(grade_0_items_at_once × (num_days + 1) × extra_factor)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn acquisition_limit(&self) -> usize {
        let limit = f64::from(self.grade_0_items_at_once)
            * (f64::from(self.num_days) + 1.0)
            * self.extra_factor;
        if limit.is_finite() && limit > 0.0 {
            limit.floor() as usize
        } else {
            0
        }
    }
}

/// The chosen export batch.
#[derive(Debug, Default, Clone)]
pub struct Selection {
    /// Retention items followed by acquisition items, sorted by interval.
    pub items: Vec<StudyItem>,
    /// How many entries came from the retention half.
    pub retention: usize,
    /// How many entries came from the acquisition half.
    pub acquisition: usize,
}

/// Acquisition candidates of `items` in bucket priority order.
///
/// Within a bucket the input order is kept.
#[must_use]
pub fn extra_candidates(items: &[StudyItem]) -> Vec<&StudyItem> {
    let mut buckets: [Vec<&StudyItem>; 5] = Default::default();
    for item in items {
        if let Some(bucket) = Bucket::of(item) {
            buckets[bucket as usize].push(item);
        }
    }
    buckets.into_iter().flatten().collect()
}

/// Select the items to carry for `params.num_days` offline days.
///
/// `items` is shuffled in place with `rng` before bucketing.
pub fn items_for_days<R: Rng + ?Sized>(
    items: &mut [StudyItem],
    params: &SelectionParams,
    rng: &mut R,
) -> Selection {
    if items.is_empty() {
        return Selection::default();
    }

    items.shuffle(rng);

    let retention: Vec<StudyItem> = items
        .iter()
        .filter(|item| {
            item.state
                .is_due_for_retention_rep(params.num_days, params.time_of_start, params.now)
        })
        .cloned()
        .collect();

    let acquisition: Vec<StudyItem> = extra_candidates(items)
        .into_iter()
        .take(params.acquisition_limit())
        .cloned()
        .collect();

    let (retention_count, acquisition_count) = (retention.len(), acquisition.len());
    let mut batch = retention;
    batch.extend(acquisition);
    batch.sort_by_key(|item| item.state.interval_sort_key());

    Selection {
        items: batch,
        retention: retention_count,
        acquisition: acquisition_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LearningState, SECONDS_PER_DAY};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn item(key: i64, state: LearningState) -> StudyItem {
        StudyItem {
            key,
            id: format!("i{key}"),
            category: "c".to_string(),
            question: format!("q{key}"),
            answer: format!("a{key}"),
            state,
        }
    }

    fn acquiring(lapses: u32, unseen: bool, grade: u8) -> LearningState {
        LearningState {
            grade,
            lapses,
            unseen,
            ..LearningState::default()
        }
    }

    fn params(num_days: u32, budget: u32) -> SelectionParams {
        SelectionParams {
            num_days,
            grade_0_items_at_once: budget,
            extra_factor: 1.0,
            now: 100 * SECONDS_PER_DAY,
            time_of_start: TimeOfStart::new(0),
        }
    }

    #[test]
    fn test_bucket_assignment() {
        assert_eq!(Bucket::of(&item(1, acquiring(2, false, 0))), Some(Bucket::Wrong0));
        assert_eq!(Bucket::of(&item(1, acquiring(1, false, 1))), Some(Bucket::Wrong1));
        assert_eq!(Bucket::of(&item(1, acquiring(0, false, 0))), Some(Bucket::Uncommitted0));
        assert_eq!(Bucket::of(&item(1, acquiring(0, false, 1))), Some(Bucket::Uncommitted1));
        assert_eq!(Bucket::of(&item(1, acquiring(0, true, 0))), Some(Bucket::Unseen));
        assert_eq!(Bucket::of(&item(1, acquiring(0, false, 3))), None);
    }

    #[test]
    fn test_acquisition_limit() {
        assert_eq!(params(0, 10).acquisition_limit(), 10);
        assert_eq!(params(3, 10).acquisition_limit(), 40);
        let mut p = params(1, 5);
        p.extra_factor = 1.25;
        assert_eq!(p.acquisition_limit(), 12);
        p.extra_factor = 0.0;
        assert_eq!(p.acquisition_limit(), 0);
    }

    #[test]
    fn test_empty_host_gives_empty_selection() {
        let mut rng = StdRng::seed_from_u64(1);
        let selection = items_for_days(&mut [], &params(7, 10), &mut rng);
        assert!(selection.items.is_empty());
        assert_eq!(selection.retention + selection.acquisition, 0);
    }

    #[test]
    fn test_budget_bound_and_priority_order() {
        // 3 forgotten, 4 uncommitted, 20 unseen; budget 5 for 0 days.
        let mut items = Vec::new();
        let mut key = 0;
        for _ in 0..3 {
            key += 1;
            items.push(item(key, acquiring(1, false, 0)));
        }
        for _ in 0..4 {
            key += 1;
            items.push(item(key, acquiring(0, false, 1)));
        }
        for _ in 0..20 {
            key += 1;
            items.push(item(key, acquiring(0, true, 0)));
        }

        for seed in 0..8 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut pool = items.clone();
            let selection = items_for_days(&mut pool, &params(0, 5), &mut rng);

            assert_eq!(selection.acquisition, 5);
            assert_eq!(selection.items.len(), 5);
            let buckets: Vec<Bucket> = selection.items.iter().filter_map(Bucket::of).collect();
            assert_eq!(buckets.iter().filter(|b| **b == Bucket::Wrong0).count(), 3);
            assert_eq!(buckets.iter().filter(|b| **b == Bucket::Uncommitted1).count(), 2);
            assert!(!buckets.contains(&Bucket::Unseen));
        }
    }

    #[test]
    fn test_extra_candidates_follow_bucket_order() {
        let items = vec![
            item(1, acquiring(0, true, 0)),
            item(2, acquiring(0, false, 1)),
            item(3, acquiring(0, false, 0)),
            item(4, acquiring(1, false, 1)),
            item(5, acquiring(1, false, 0)),
        ];
        let order: Vec<i64> = extra_candidates(&items).iter().map(|i| i.key).collect();
        assert_eq!(order, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_retention_items_are_not_capped() {
        let start = TimeOfStart::new(0);
        let now = 100 * SECONDS_PER_DAY;
        let mut items: Vec<StudyItem> = (1..=30)
            .map(|key| {
                item(
                    key,
                    LearningState {
                        grade: 4,
                        unseen: false,
                        last_rep: now - 10 * SECONDS_PER_DAY,
                        next_rep: now + (key % 3) * SECONDS_PER_DAY,
                        ..LearningState::default()
                    },
                )
            })
            .collect();
        // Falls due after the window.
        items.push(item(
            99,
            LearningState {
                grade: 5,
                unseen: false,
                next_rep: now + 30 * SECONDS_PER_DAY,
                ..LearningState::default()
            },
        ));

        let mut rng = StdRng::seed_from_u64(7);
        let p = SelectionParams {
            time_of_start: start,
            ..params(2, 1)
        };
        let selection = items_for_days(&mut items, &p, &mut rng);
        assert_eq!(selection.retention, 30);
        assert_eq!(selection.acquisition, 0);
        assert!(selection.items.iter().all(|i| i.key != 99));
    }

    #[test]
    fn test_batch_sorted_by_interval() {
        let now = 100 * SECONDS_PER_DAY;
        let retained = |key, interval_days: i64| {
            item(
                key,
                LearningState {
                    grade: 3,
                    unseen: false,
                    last_rep: now - interval_days * SECONDS_PER_DAY,
                    next_rep: now,
                    ..LearningState::default()
                },
            )
        };
        let mut items = vec![retained(1, 9), retained(2, 2), retained(3, 5), item(4, acquiring(0, true, 0))];

        let mut rng = StdRng::seed_from_u64(3);
        let selection = items_for_days(&mut items, &params(1, 10), &mut rng);
        let keys: Vec<i64> = selection.items.iter().map(|i| i.key).collect();
        assert_eq!(keys, vec![4, 2, 3, 1]);
    }
}
