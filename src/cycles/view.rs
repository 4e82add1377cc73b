use log::warn;
use serde::{Deserialize, Serialize};

use super::partition::CycleIndex;

/// Which cycle the operator is looking at, as a distance from the latest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    pub current_cycle_offset: usize,
    pub pinned_to_history: bool,
}

/// Applies one poll's cycle count to the view.
///
/// Following mode snaps to the newest cycle whenever data changed. A pinned
/// view keeps its offset, clamped to the oldest cycle. Unchanged data never
/// moves the view.
pub fn reconcile(
    prev: ViewState,
    prev_total_cycles: usize,
    new_total_cycles: usize,
    data_changed: bool,
) -> ViewState {
    if new_total_cycles == 0 {
        return ViewState::default();
    }

    if !data_changed {
        return prev;
    }

    if new_total_cycles < prev_total_cycles {
        warn!(
            "cycle count shrank from {} to {}; record store is expected to be append-only",
            prev_total_cycles, new_total_cycles
        );
    }

    if prev.pinned_to_history {
        ViewState {
            current_cycle_offset: prev.current_cycle_offset.min(new_total_cycles - 1),
            pinned_to_history: true,
        }
    } else {
        ViewState {
            current_cycle_offset: 0,
            pinned_to_history: false,
        }
    }
}

impl ViewState {
    pub fn select_latest(&mut self) {
        *self = ViewState::default();
    }

    /// Moves one cycle back in history. Returns false at the oldest cycle.
    pub fn step_to_older(&mut self, total_cycles: usize) -> bool {
        if self.current_cycle_offset + 1 < total_cycles {
            self.current_cycle_offset += 1;
            self.pinned_to_history = true;
            true
        } else {
            false
        }
    }

    /// `None` only when there are no cycles at all.
    pub fn selected_cycle_index(&self, total_cycles: usize) -> Option<CycleIndex> {
        if total_cycles == 0 {
            return None;
        }
        Some(total_cycles.saturating_sub(1 + self.current_cycle_offset))
    }

    pub fn is_latest(&self) -> bool {
        self.current_cycle_offset == 0
    }

    pub fn navigation(&self, total_cycles: usize) -> NavigationSummary {
        NavigationSummary {
            current_offset: self.current_cycle_offset,
            total_cycles,
            is_latest: self.is_latest(),
            selected_index: self.selected_cycle_index(total_cycles),
        }
    }
}

/// Read-only navigation facts handed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationSummary {
    pub current_offset: usize,
    pub total_cycles: usize,
    pub is_latest: bool,
    pub selected_index: Option<CycleIndex>,
}

impl NavigationSummary {
    pub fn can_step_older(&self) -> bool {
        self.current_offset + 1 < self.total_cycles
    }

    pub fn can_select_latest(&self) -> bool {
        !self.is_latest
    }

    pub fn label(&self) -> &'static str {
        if self.is_latest {
            "Present Cycle"
        } else {
            "Previous Cycle"
        }
    }

    pub fn describe(&self) -> String {
        if self.total_cycles == 0 {
            "No cycles recorded yet".to_string()
        } else if self.is_latest {
            format!(
                "Viewing latest data (Cycle {} of {})",
                self.total_cycles, self.total_cycles
            )
        } else {
            format!(
                "Viewing previous cycle {} of {}",
                self.total_cycles - self.current_offset,
                self.total_cycles
            )
        }
    }
}
