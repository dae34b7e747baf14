//! Leveled practice scheduling.
//!
//! A passed practice moves an entry one level up and schedules it according
//! to [`PRACTICE_INTERVALS`]; a failed practice moves it one level down and
//! schedules it for tomorrow. Levels saturate at 0 and
//! [`MAX_KNOWLEDGE_LEVEL`].

use crate::db::{Db, VocabFilter, VocabOrder};
use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone};
use thiserror::Error;
use vocab_types::{PracticeOutcome, VocabEntry};

pub const MAX_KNOWLEDGE_LEVEL: u8 = 7;

/// Days until the next practice, keyed by the level reached after a pass.
pub const PRACTICE_INTERVALS: [(u8, u64); 7] =
    [(1, 1), (2, 2), (3, 4), (4, 8), (5, 16), (6, 32), (7, 64)];

pub const DEFAULT_DUE_LIMIT: i64 = 10;

#[derive(Error, Debug)]
pub enum PracticeError {
    #[error("Vocab not found: {0}")]
    NotFound(i64),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// New level and due date of an entry after one practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub knowledge_level: u8,
    pub practice_at: DateTime<Local>,
}

pub fn interval_days(level: u8) -> Option<u64> {
    PRACTICE_INTERVALS
        .iter()
        .find(|(l, _)| *l == level)
        .map(|(_, days)| *days)
}

pub fn next_progress(level: u8, passed: bool, today: NaiveDate) -> Progress {
    let (knowledge_level, days) = if passed {
        let level = level.saturating_add(1).min(MAX_KNOWLEDGE_LEVEL);
        // a pass always lands on level 1 or higher
        (level, interval_days(level).unwrap_or(1))
    } else {
        (level.saturating_sub(1), 1)
    };

    Progress {
        knowledge_level,
        practice_at: local_midnight(today + Days::new(days)),
    }
}

/// Local midnight of the current date.
pub fn today() -> DateTime<Local> {
    local_midnight(Local::now().date_naive())
}

/// Local midnight `n` calendar days from today; `n` may be negative.
pub fn in_days(n: i64) -> DateTime<Local> {
    let today = Local::now().date_naive();
    let date = if n >= 0 {
        today + Days::new(n.unsigned_abs())
    } else {
        today - Days::new(n.unsigned_abs())
    };
    local_midnight(date)
}

fn local_midnight(date: NaiveDate) -> DateTime<Local> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        // midnight skipped by a DST jump
        .or_else(|| Local.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Due-set queries and outcome application over the vocab store.
pub struct Scheduler<'a> {
    db: &'a Db,
}

impl<'a> Scheduler<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Entries whose practice date has passed, most overdue first.
    pub fn list_due(&self, limit: i64) -> rusqlite::Result<Vec<VocabEntry>> {
        let (items, _) = self.db.find_all(
            &VocabFilter::due_before(Local::now()),
            VocabOrder::PracticeAt,
            0,
            limit,
        )?;
        Ok(items)
    }

    pub fn count_due(&self) -> rusqlite::Result<i64> {
        self.db.count(&VocabFilter::due_before(Local::now()))
    }

    /// Fetches the entry, applies the outcome and stores the result. The read
    /// and the write are separate statements; a concurrent update of the same
    /// entry is last-write-wins.
    pub fn apply_outcome(&self, id: i64, passed: bool) -> Result<VocabEntry, PracticeError> {
        let mut entry = self
            .db
            .find_by_id(id)?
            .ok_or(PracticeError::NotFound(id))?;

        let progress = next_progress(entry.knowledge_level, passed, Local::now().date_naive());
        entry.knowledge_level = progress.knowledge_level;
        entry.practice_at = progress.practice_at;

        if !self.db.update_progress(&entry)? {
            return Err(PracticeError::NotFound(id));
        }
        Ok(entry)
    }

    /// Applies outcomes in order and stops at the first failure. Outcomes
    /// before the failing one stay applied.
    pub fn apply_outcomes(&self, outcomes: &[PracticeOutcome]) -> Result<usize, PracticeError> {
        for outcome in outcomes {
            let entry = self.apply_outcome(outcome.id, outcome.passed)?;
            log::debug!(
                "Practiced vocab #{} (passed: {}), level {} due {}",
                entry.id,
                outcome.passed,
                entry.knowledge_level,
                entry.practice_at
            );
        }
        Ok(outcomes.len())
    }
}
