use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;

use serde::Serialize;

use super::partition::{Cycle, CycleIndex};

/// Cycle indices whose report was delivered during this monitoring session.
///
/// Only grows. A new session starts from an empty set instead of clearing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportedSet(BTreeSet<CycleIndex>);

impl ReportedSet {
    pub fn contains(&self, index: CycleIndex) -> bool {
        self.0.contains(&index)
    }

    /// Returns false if the index was already present.
    pub fn insert(&mut self, index: CycleIndex) -> bool {
        self.0.insert(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = CycleIndex> + '_ {
        self.0.iter().copied()
    }
}

/// Complete cycles not yet in `reported`, oldest first.
pub fn detect_newly_completed(cycles: &[Cycle], reported: &ReportedSet) -> Vec<CycleIndex> {
    cycles
        .iter()
        .filter(|cycle| cycle.is_complete() && !reported.contains(cycle.index))
        .map(|cycle| cycle.index)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    Retry { attempts: u32 },
    Abandoned { attempts: u32 },
}

/// Report-once bookkeeping for one monitoring session.
///
/// An index enters the reported set only through `mark_delivered`, so a
/// failed delivery comes back from `due` on the next scan.
#[derive(Debug, Clone, Default)]
pub struct ReportTracker {
    reported: ReportedSet,
    failed_attempts: BTreeMap<CycleIndex, u32>,
    abandoned: BTreeSet<CycleIndex>,
    attempt_limit: Option<NonZeroU32>,
}

impl ReportTracker {
    pub fn new(attempt_limit: Option<NonZeroU32>) -> Self {
        Self {
            attempt_limit,
            ..Self::default()
        }
    }

    pub fn reported(&self) -> &ReportedSet {
        &self.reported
    }

    pub fn abandoned(&self) -> impl Iterator<Item = CycleIndex> + '_ {
        self.abandoned.iter().copied()
    }

    pub fn due(&self, cycles: &[Cycle]) -> Vec<CycleIndex> {
        let mut due = detect_newly_completed(cycles, &self.reported);
        due.retain(|index| !self.abandoned.contains(index));
        due
    }

    /// True while some failed report still waits for another attempt.
    pub fn has_pending_retries(&self) -> bool {
        !self.failed_attempts.is_empty()
    }

    pub fn mark_delivered(&mut self, index: CycleIndex) -> bool {
        self.failed_attempts.remove(&index);
        self.reported.insert(index)
    }

    pub fn record_failure(&mut self, index: CycleIndex) -> FailureOutcome {
        let attempts = {
            let counter = self.failed_attempts.entry(index).or_insert(0);
            *counter = counter.saturating_add(1);
            *counter
        };

        match self.attempt_limit {
            Some(limit) if attempts >= limit.get() => {
                self.failed_attempts.remove(&index);
                self.abandoned.insert(index);
                FailureOutcome::Abandoned { attempts }
            }
            _ => FailureOutcome::Retry { attempts },
        }
    }
}
