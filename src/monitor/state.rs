use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MonitorSettings;
use crate::cycles::{
    order_by_id, partition, reconcile, Cycle, CycleIndex, DisplayCycle, FailureOutcome,
    NavigationSummary, OrderingReport, ReportTracker, ViewState,
};
use crate::db::ScrewRecord;
use crate::render::RenderFrame;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MonitorStatus {
    Idle,
    Running,
}

impl Default for MonitorStatus {
    fn default() -> Self {
        MonitorStatus::Idle
    }
}

/// What one fetched snapshot asks the driver to do.
#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    pub data_changed: bool,
    /// Present only when the board needs redrawing.
    pub frame: Option<RenderFrame>,
    /// Completed cycles still owed a report, oldest first.
    pub due_reports: Vec<DisplayCycle>,
    pub ordering: OrderingReport,
}

/// Read-only view of the monitor for the UI layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub status: MonitorStatus,
    pub session_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub view: ViewState,
    pub navigation: NavigationSummary,
    pub record_count: usize,
    pub reported_cycles: Vec<CycleIndex>,
    pub abandoned_cycles: Vec<CycleIndex>,
    pub consecutive_fetch_failures: u32,
    pub last_error: Option<String>,
}

/// Derived state for one monitoring session.
///
/// Everything here is synchronous. The polling driver feeds it snapshots
/// between awaits, so no two ticks ever interleave inside it.
#[derive(Debug)]
pub struct MonitorEngine {
    settings: MonitorSettings,
    status: MonitorStatus,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    view: ViewState,
    tracker: ReportTracker,
    last_snapshot: Option<Vec<ScrewRecord>>,
    cycles: Vec<Cycle>,
    consecutive_fetch_failures: u32,
    last_error: Option<String>,
}

impl MonitorEngine {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            status: MonitorStatus::Idle,
            session_id: None,
            started_at: None,
            view: ViewState::default(),
            tracker: ReportTracker::new(settings.report_attempt_limit),
            last_snapshot: None,
            cycles: Vec::new(),
            consecutive_fetch_failures: 0,
            last_error: None,
        }
    }

    /// Starts a fresh session: new id, empty reported set, empty cache.
    pub fn begin_session(&mut self, started_at: DateTime<Utc>) -> Uuid {
        let session_id = Uuid::new_v4();
        *self = Self {
            status: MonitorStatus::Running,
            session_id: Some(session_id),
            started_at: Some(started_at),
            ..Self::new(self.settings)
        };
        session_id
    }

    /// Stops the session but leaves the last board visible.
    pub fn end_session(&mut self) {
        self.status = MonitorStatus::Idle;
    }

    pub fn status(&self) -> MonitorStatus {
        self.status
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn total_cycles(&self) -> usize {
        self.cycles.len()
    }

    pub fn tracker(&self) -> &ReportTracker {
        &self.tracker
    }

    pub fn apply_snapshot(&mut self, mut records: Vec<ScrewRecord>) -> TickPlan {
        let ordering = order_by_id(&mut records);
        self.consecutive_fetch_failures = 0;
        self.last_error = None;

        if self.last_snapshot.as_ref() == Some(&records) {
            // Only a failed report gives an unchanged tick any work.
            let due_reports = if self.tracker.has_pending_retries() {
                self.due_reports()
            } else {
                Vec::new()
            };
            return TickPlan {
                data_changed: false,
                frame: None,
                due_reports,
                ordering,
            };
        }

        let prev_total = self.cycles.len();
        self.cycles = partition(&records, self.settings.cycle_size);
        self.view = reconcile(self.view, prev_total, self.cycles.len(), true);
        self.last_snapshot = Some(records);

        TickPlan {
            data_changed: true,
            frame: Some(self.current_frame()),
            due_reports: self.due_reports(),
            ordering,
        }
    }

    /// Leaves view, cycles and reports exactly as they were.
    pub fn record_fetch_failure(&mut self, message: String) -> u32 {
        self.consecutive_fetch_failures = self.consecutive_fetch_failures.saturating_add(1);
        self.last_error = Some(message);
        self.consecutive_fetch_failures
    }

    pub fn mark_delivered(&mut self, index: CycleIndex) -> bool {
        self.tracker.mark_delivered(index)
    }

    pub fn record_report_failure(&mut self, index: CycleIndex) -> FailureOutcome {
        self.tracker.record_failure(index)
    }

    pub fn select_latest(&mut self) -> RenderFrame {
        self.view.select_latest();
        self.current_frame()
    }

    /// `None` when already at the oldest cycle.
    pub fn step_to_older(&mut self) -> Option<RenderFrame> {
        self.view
            .step_to_older(self.cycles.len())
            .then(|| self.current_frame())
    }

    pub fn current_frame(&self) -> RenderFrame {
        let total = self.cycles.len();
        RenderFrame {
            cycle: self
                .view
                .selected_cycle_index(total)
                .and_then(|index| self.cycles.get(index))
                .map(DisplayCycle::from_cycle),
            navigation: self.view.navigation(total),
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            status: self.status,
            session_id: self.session_id,
            started_at: self.started_at,
            view: self.view,
            navigation: self.view.navigation(self.cycles.len()),
            record_count: self.last_snapshot.as_ref().map_or(0, Vec::len),
            reported_cycles: self.tracker.reported().iter().collect(),
            abandoned_cycles: self.tracker.abandoned().collect(),
            consecutive_fetch_failures: self.consecutive_fetch_failures,
            last_error: self.last_error.clone(),
        }
    }

    fn due_reports(&self) -> Vec<DisplayCycle> {
        self.tracker
            .due(&self.cycles)
            .into_iter()
            .filter_map(|index| self.cycles.get(index))
            .map(DisplayCycle::from_cycle)
            .collect()
    }
}
