use log::{info, warn};

use crate::cycles::DisplayScrew;

use super::{RenderFrame, UiRenderer};

/// Draws the board as a text table through the log output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleRenderer;

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self
    }

    pub fn format_frame(frame: &RenderFrame) -> Vec<String> {
        let mut lines = vec![format!(
            "[{}] {}",
            frame.navigation.label(),
            frame.navigation.describe()
        )];

        let Some(cycle) = &frame.cycle else {
            lines.push("No data available for this cycle.".to_string());
            return lines;
        };

        let verdict = cycle.verdict();
        lines.push(format!(
            "Cycle {} {} ({} ok, {} nok){}",
            cycle.cycle_number(),
            verdict.verdict.as_str(),
            verdict.passed,
            verdict.failed,
            if cycle.complete { "" } else { " in progress" }
        ));
        lines.push(format!(
            "{:>3}  {:>8} {:>8} {:>8}  {:>6} {:>6} {:>6}  {}",
            "#", "ang.min", "ang.max", "angle", "tq.min", "tq.max", "torque", "status"
        ));
        lines.extend(cycle.screws.iter().map(format_row));

        if let Some(latest) = cycle.latest_screw() {
            lines.push(format!(
                "Present screw {}: angle {} torque {:.1}",
                latest.display_position, latest.record.actual_angle, latest.record.actual_torque
            ));
        }

        lines
    }
}

fn format_row(screw: &DisplayScrew) -> String {
    let record = &screw.record;
    format!(
        "{:>3}  {:>8} {:>8} {:>8}  {:>6.1} {:>6.1} {:>6.1}  {}",
        screw.display_position,
        record.angle_min,
        record.angle_max,
        record.actual_angle,
        record.torque_min,
        record.torque_max,
        record.actual_torque,
        if screw.passed { "OK" } else { "NOK" }
    )
}

impl UiRenderer for ConsoleRenderer {
    fn render(&self, frame: &RenderFrame) {
        for line in Self::format_frame(frame) {
            info!("{line}");
        }
    }

    fn notice(&self, message: &str) {
        warn!("{message}");
    }
}
