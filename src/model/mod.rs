//! Data models for the study database.
//!
//! - `StudyItem` and its `LearningState`
//! - `TimeOfStart`, the day origin of the scheduler

pub mod item;

pub use item::{LearningState, SECONDS_PER_DAY, StudyItem, TimeOfStart};
