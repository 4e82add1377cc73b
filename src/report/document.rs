use std::fmt::Display;

use chrono::{Local, TimeZone};
use serde::Serialize;

use crate::config::StationInfo;
use crate::cycles::DisplayScrew;

use super::CycleReport;

pub const REPORT_TITLE: &str = "Screw Measurement Report";

/// Serializable body of a cycle report, one row per screw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDocument {
    pub title: String,
    pub date: String,
    pub time: String,
    pub status: String,
    pub resource: String,
    pub tool_type: String,
    pub model: String,
    pub session_id: String,
    pub cycle_number: usize,
    pub passed: usize,
    pub failed: usize,
    pub generated_at: String,
    pub rows: Vec<ReportRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub screw_id: usize,
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_actual: f64,
    pub torque_min: String,
    pub torque_max: String,
    pub torque_actual: String,
    pub status: String,
}

impl From<&DisplayScrew> for ReportRow {
    fn from(screw: &DisplayScrew) -> Self {
        let record = &screw.record;
        Self {
            screw_id: screw.display_position,
            angle_min: record.angle_min,
            angle_max: record.angle_max,
            angle_actual: record.actual_angle,
            torque_min: format!("{:.1}", record.torque_min),
            torque_max: format!("{:.1}", record.torque_max),
            torque_actual: format!("{:.1}", record.actual_torque),
            status: if screw.passed { "PASS" } else { "FAIL" }.to_string(),
        }
    }
}

impl ReportDocument {
    /// Header date and time are in the station's local zone.
    pub fn build(report: &CycleReport, station: &StationInfo) -> Self {
        Self::build_in(report, station, &Local)
    }

    pub fn build_in<Tz>(report: &CycleReport, station: &StationInfo, zone: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        let stamped = report.generated_at.with_timezone(zone);
        Self {
            title: REPORT_TITLE.to_string(),
            date: stamped.format("%d.%m.%Y").to_string(),
            time: stamped.format("%H:%M:%S").to_string(),
            status: report.verdict.verdict.as_str().to_string(),
            resource: station.resource.clone(),
            tool_type: station.tool_type.clone(),
            model: station.model.clone(),
            session_id: report.session_id.to_string(),
            cycle_number: report.cycle.cycle_number(),
            passed: report.verdict.passed,
            failed: report.verdict.failed,
            generated_at: report.generated_at.to_rfc3339(),
            rows: report.cycle.screws.iter().map(ReportRow::from).collect(),
        }
    }

    /// `Screw_Report_Cycle_<n>_<dd-mm-yyyy>_<hhmmss>`
    pub fn file_stem(&self) -> String {
        format!(
            "Screw_Report_Cycle_{}_{}_{}",
            self.cycle_number,
            self.date.replace('.', "-"),
            self.time.replace(':', "")
        )
    }
}
