//! Cycle reports.
//!
//! The monitor hands each newly completed cycle to a [`ReportGenerator`] and
//! only counts the cycle as reported when `deliver` returns `Ok`.

mod diagram;
mod document;
mod outbox;

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::cycles::{CycleIndex, CycleVerdict, DisplayCycle};

pub use diagram::render_status_diagram;
pub use document::{ReportDocument, ReportRow};
pub use outbox::OutboxReportGenerator;

/// A completed cycle ready to be written up.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub session_id: Uuid,
    pub cycle: DisplayCycle,
    pub verdict: CycleVerdict,
    pub generated_at: DateTime<Utc>,
}

impl CycleReport {
    pub fn new(session_id: Uuid, cycle: DisplayCycle, generated_at: DateTime<Utc>) -> Self {
        let verdict = cycle.verdict();
        Self {
            session_id,
            cycle,
            verdict,
            generated_at,
        }
    }

    pub fn cycle_index(&self) -> CycleIndex {
        self.cycle.cycle_index
    }
}

pub trait ReportGenerator: Send + Sync + 'static {
    /// Produce the report artifact and hand it off for delivery.
    fn deliver(&self, report: &CycleReport) -> impl Future<Output = Result<()>> + Send;
}
