//! Score and error ledger.
//!
//! [`Ledger`] is shared by every workflow task. Score increments are
//! lock-free; failures are appended under a short-lived mutex that is
//! never held across an `.await`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;

use crate::failure::{Failure, FailureKind};

/// Named counters incremented once per verified successful operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreTag {
    GetGrades,
    SearchCourse,
    RegisterCourses,
    GetAnnouncements,
    GetAnnouncementDetail,
    AddCourse,
    AddClass,
    SubmitPdf,
    SubmitDocx,
    RegisterScore,
}

const SCORE_TAG_COUNT: usize = 10;

impl ScoreTag {
    pub const ALL: [ScoreTag; SCORE_TAG_COUNT] = [
        ScoreTag::GetGrades,
        ScoreTag::SearchCourse,
        ScoreTag::RegisterCourses,
        ScoreTag::GetAnnouncements,
        ScoreTag::GetAnnouncementDetail,
        ScoreTag::AddCourse,
        ScoreTag::AddClass,
        ScoreTag::SubmitPdf,
        ScoreTag::SubmitDocx,
        ScoreTag::RegisterScore,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Thread-safe accumulator of scores and failures.
#[derive(Debug, Default)]
pub struct Ledger {
    scores: [AtomicU64; SCORE_TAG_COUNT],
    failures: Mutex<Vec<Failure>>,
    timeouts: AtomicU64,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_score(&self, tag: ScoreTag) {
        self.scores[tag.slot()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn score(&self, tag: ScoreTag) -> u64 {
        self.scores[tag.slot()].load(Ordering::Relaxed)
    }

    pub fn add_failure(&self, failure: Failure) {
        tracing::warn!(kind = %failure.kind(), "{failure}");
        self.lock_failures().push(failure);
    }

    pub fn add_failures(&self, failures: impl IntoIterator<Item = Failure>) {
        for failure in failures {
            self.add_failure(failure);
        }
    }

    /// Count a client-side timeout. Timeouts are retried or skipped, never failures.
    pub fn add_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn has_critical(&self) -> bool {
        self.lock_failures().iter().any(Failure::is_critical)
    }

    pub fn failure_count(&self, kind: FailureKind) -> usize {
        self.lock_failures()
            .iter()
            .filter(|f| f.kind() == kind)
            .count()
    }

    /// Snapshot the ledger into a serialisable report.
    pub fn tally(&self) -> Tally {
        let scores = ScoreTag::ALL
            .iter()
            .map(|tag| (*tag, self.score(*tag)))
            .filter(|(_, count)| *count > 0)
            .collect();

        let mut failures_by_kind = BTreeMap::new();
        let mut messages: BTreeMap<String, u64> = BTreeMap::new();
        for failure in self.lock_failures().iter() {
            *failures_by_kind.entry(failure.kind()).or_insert(0) += 1;
            *messages.entry(failure.to_string()).or_insert(0) += 1;
        }

        Tally {
            scores,
            failures_by_kind,
            failure_messages: messages,
            timeouts: self.timeouts.load(Ordering::Relaxed),
        }
    }

    fn lock_failures(&self) -> MutexGuard<'_, Vec<Failure>> {
        // A panic while pushing cannot leave the Vec in a torn state.
        self.failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Final report of a run.
#[derive(Debug, Clone, Serialize)]
pub struct Tally {
    pub scores: BTreeMap<ScoreTag, u64>,
    pub failures_by_kind: BTreeMap<FailureKind, u64>,
    /// Deduplicated failure messages with their occurrence counts.
    pub failure_messages: BTreeMap<String, u64>,
    pub timeouts: u64,
}

impl Tally {
    pub fn total_score_events(&self) -> u64 {
        self.scores.values().sum()
    }

    pub fn has_critical(&self) -> bool {
        self.failures_by_kind.contains_key(&FailureKind::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_accumulate_per_tag() {
        let ledger = Ledger::new();
        ledger.add_score(ScoreTag::AddCourse);
        ledger.add_score(ScoreTag::AddCourse);
        ledger.add_score(ScoreTag::SubmitPdf);

        assert_eq!(ledger.score(ScoreTag::AddCourse), 2);
        assert_eq!(ledger.score(ScoreTag::SubmitPdf), 1);
        assert_eq!(ledger.score(ScoreTag::GetGrades), 0);
    }

    #[test]
    fn tally_deduplicates_messages() {
        let ledger = Ledger::new();
        ledger.add_failure(Failure::application("announcement order is wrong"));
        ledger.add_failure(Failure::application("announcement order is wrong"));
        ledger.add_failure(Failure::StaticResource("missing /app.js".into()));

        let tally = ledger.tally();
        assert_eq!(tally.failures_by_kind[&FailureKind::Application], 2);
        assert_eq!(tally.failures_by_kind[&FailureKind::StaticResource], 1);
        assert_eq!(tally.failure_messages.len(), 2);
        assert!(!tally.has_critical());
    }

    #[test]
    fn critical_is_reported() {
        let ledger = Ledger::new();
        ledger.add_failure(Failure::critical("no course could be created"));
        assert!(ledger.has_critical());
        assert!(ledger.tally().has_critical());
    }

    #[test]
    fn timeouts_are_counted_separately() {
        let ledger = Ledger::new();
        ledger.add_timeout();
        ledger.add_timeout();
        let tally = ledger.tally();
        assert_eq!(tally.timeouts, 2);
        assert!(tally.failures_by_kind.is_empty());
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let ledger = std::sync::Arc::new(Ledger::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        ledger.add_score(ScoreTag::SearchCourse);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ledger.score(ScoreTag::SearchCourse), 8000);
    }
}
