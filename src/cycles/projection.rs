use serde::Serialize;

use crate::db::ScrewRecord;

use super::partition::{Cycle, CycleIndex};

/// A record as shown on the board, numbered by its place in the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayScrew {
    #[serde(flatten)]
    pub record: ScrewRecord,
    /// 1-based position within the cycle; unrelated to `record.id`.
    pub display_position: usize,
    pub passed: bool,
}

pub fn project(cycle: &Cycle) -> Vec<DisplayScrew> {
    cycle
        .records
        .iter()
        .enumerate()
        .map(|(offset, record)| DisplayScrew {
            passed: record.passed(),
            display_position: offset + 1,
            record: record.clone(),
        })
        .collect()
}

/// A projected cycle, looked up by display position rather than record id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayCycle {
    pub cycle_index: CycleIndex,
    pub complete: bool,
    pub screws: Vec<DisplayScrew>,
}

impl DisplayCycle {
    pub fn from_cycle(cycle: &Cycle) -> Self {
        Self {
            cycle_index: cycle.index,
            complete: cycle.is_complete(),
            screws: project(cycle),
        }
    }

    /// 1-based cycle number used in report names and headers.
    pub fn cycle_number(&self) -> usize {
        self.cycle_index + 1
    }

    pub fn get(&self, display_position: usize) -> Option<&DisplayScrew> {
        display_position
            .checked_sub(1)
            .and_then(|offset| self.screws.get(offset))
    }

    /// Most recently tightened screw in this cycle.
    pub fn latest_screw(&self) -> Option<&DisplayScrew> {
        self.screws.last()
    }

    pub fn verdict(&self) -> CycleVerdict {
        CycleVerdict::of(&self.screws)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleVerdict {
    pub verdict: Verdict,
    pub passed: usize,
    pub failed: usize,
}

impl CycleVerdict {
    /// FAIL as soon as a single screw is out of tolerance.
    pub fn of(screws: &[DisplayScrew]) -> Self {
        let failed = screws.iter().filter(|screw| !screw.passed).count();
        Self {
            verdict: if failed == 0 { Verdict::Pass } else { Verdict::Fail },
            passed: screws.len() - failed,
            failed,
        }
    }
}
