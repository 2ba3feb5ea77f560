//! Fixed-width encoding of learning statistics.
//!
//! Each field of a [`LearningState`] maps to an unsigned integer of a fixed
//! byte width. Easiness is stored in fixed point with three decimal digits,
//! so it is the one lossy field.
//!
//! | field                  | bytes |
//! |------------------------|-------|
//! | grade                  | 1     |
//! | easiness × 1000        | 4     |
//! | acq_reps               | 4     |
//! | ret_reps               | 4     |
//! | lapses                 | 4     |
//! | acq_reps_since_lapse   | 4     |
//! | ret_reps_since_lapse   | 4     |
//! | last_rep               | 8     |
//! | next_rep               | 8     |
//! | unseen                 | 1     |
//!
//! On the wire the fields are concatenated big-endian (42 bytes), or written
//! as 84 hex digits by text containers.

use crate::model::LearningState;

/// Fixed-point scale of the easiness field.
pub const EASINESS_ACCURACY: f64 = 1000.0;

/// Field names and byte widths, in wire order.
pub const FIELD_WIDTHS: [(&str, usize); 10] = [
    ("grade", 1),
    ("easiness", 4),
    ("acq_reps", 4),
    ("ret_reps", 4),
    ("lapses", 4),
    ("acq_reps_since_lapse", 4),
    ("ret_reps_since_lapse", 4),
    ("last_rep", 8),
    ("next_rep", 8),
    ("unseen", 1),
];

/// Encoded length of one record in bytes.
pub const RECORD_LEN: usize = 42;

/// Wire form of a learning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsRecord {
    pub grade: u8,
    pub easiness: u32,
    pub acq_reps: u32,
    pub ret_reps: u32,
    pub lapses: u32,
    pub acq_reps_since_lapse: u32,
    pub ret_reps_since_lapse: u32,
    pub last_rep: u64,
    pub next_rep: u64,
    pub unseen: u8,
}

/// Errors from parsing the byte or hex form of a record.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("expected {RECORD_LEN} bytes, got {0}")]
    Length(usize),

    #[error("bad hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// Encode a learning state.
///
/// Precondition: the state is within the host's valid ranges. Easiness is
/// non-negative and below 4 294 967.295, repetition times are not before
/// the epoch. Out-of-range values are not detected here; validation is the
/// host's job.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn encode(state: &LearningState) -> StatsRecord {
    StatsRecord {
        grade: state.grade,
        easiness: (state.easiness * EASINESS_ACCURACY).round() as u32,
        acq_reps: state.acq_reps,
        ret_reps: state.ret_reps,
        lapses: state.lapses,
        acq_reps_since_lapse: state.acq_reps_since_lapse,
        ret_reps_since_lapse: state.ret_reps_since_lapse,
        last_rep: state.last_rep as u64,
        next_rep: state.next_rep as u64,
        unseen: u8::from(state.unseen),
    }
}

/// Overwrite `state` with the values carried by `record`.
///
/// Same precondition as [`encode`]: repetition times fit in an `i64`.
#[allow(clippy::cast_possible_wrap)]
pub fn decode(record: &StatsRecord, state: &mut LearningState) {
    state.grade = record.grade;
    state.easiness = f64::from(record.easiness) / EASINESS_ACCURACY;
    state.acq_reps = record.acq_reps;
    state.ret_reps = record.ret_reps;
    state.lapses = record.lapses;
    state.acq_reps_since_lapse = record.acq_reps_since_lapse;
    state.ret_reps_since_lapse = record.ret_reps_since_lapse;
    state.last_rep = record.last_rep as i64;
    state.next_rep = record.next_rep as i64;
    state.unseen = record.unseen != 0;
}

impl StatsRecord {
    /// Add a whole number of days to both repetition times.
    pub fn shift_days(&mut self, days: u64) {
        let seconds = days.saturating_mul(crate::model::SECONDS_PER_DAY.unsigned_abs());
        self.last_rep = self.last_rep.saturating_add(seconds);
        self.next_rep = self.next_rep.saturating_add(seconds);
    }

    /// Big-endian wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0u8; RECORD_LEN];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&[self.grade]);
        put(&self.easiness.to_be_bytes());
        put(&self.acq_reps.to_be_bytes());
        put(&self.ret_reps.to_be_bytes());
        put(&self.lapses.to_be_bytes());
        put(&self.acq_reps_since_lapse.to_be_bytes());
        put(&self.ret_reps_since_lapse.to_be_bytes());
        put(&self.last_rep.to_be_bytes());
        put(&self.next_rep.to_be_bytes());
        put(&[self.unseen]);
        out
    }

    /// Parse the big-endian wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Length`] unless exactly [`RECORD_LEN`] bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: &[u8; RECORD_LEN] = bytes
            .try_into()
            .map_err(|_| DecodeError::Length(bytes.len()))?;

        let u32_at = |at: usize| u32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let u64_at = |at: usize| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[at..at + 8]);
            u64::from_be_bytes(buf)
        };

        Ok(Self {
            grade: bytes[0],
            easiness: u32_at(1),
            acq_reps: u32_at(5),
            ret_reps: u32_at(9),
            lapses: u32_at(13),
            acq_reps_since_lapse: u32_at(17),
            ret_reps_since_lapse: u32_at(21),
            last_rep: u64_at(25),
            next_rep: u64_at(33),
            unseen: bytes[41],
        })
    }

    /// Lowercase hex of the wire bytes.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse the hex form written by [`Self::to_hex`].
    ///
    /// # Errors
    ///
    /// Returns an error for non-hex input or the wrong length.
    pub fn from_hex(text: &str) -> Result<Self, DecodeError> {
        Self::from_bytes(&hex::decode(text.trim())?)
    }
}
