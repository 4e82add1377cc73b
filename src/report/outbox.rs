use std::{
    fs,
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::info;

use crate::config::StationInfo;

use super::{diagram::render_status_diagram, CycleReport, ReportDocument, ReportGenerator};

/// Writes each report as `<stem>.json` plus `<stem>.png` into a spool
/// directory that the mail relay drains.
///
/// Files are written under a `.part` name and renamed into place, so the
/// relay never picks up a half-written report.
#[derive(Debug, Clone)]
pub struct OutboxReportGenerator {
    dir: PathBuf,
    station: StationInfo,
}

impl OutboxReportGenerator {
    pub fn new(dir: PathBuf, station: StationInfo) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create outbox directory {}", dir.display()))?;
        Ok(Self { dir, station })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ReportGenerator for OutboxReportGenerator {
    fn deliver(&self, report: &CycleReport) -> impl Future<Output = Result<()>> + Send {
        let document = ReportDocument::build(report, &self.station);
        let screws = report.cycle.screws.clone();
        let dir = self.dir.clone();

        async move {
            let stem = document.file_stem();
            let cycle_number = document.cycle_number;

            let written = tokio::task::spawn_blocking(move || -> Result<PathBuf> {
                let png = render_status_diagram(&screws)?;
                let json = serde_json::to_vec_pretty(&document)
                    .context("failed to serialize report document")?;

                // Diagram first: the relay keys on the JSON file.
                write_atomically(&dir.join(format!("{stem}.png")), &png)?;
                let json_path = dir.join(format!("{stem}.json"));
                write_atomically(&json_path, &json)?;
                Ok(json_path)
            })
            .await
            .context("report writer join failed")??;

            info!(
                "Report for cycle {} queued at {}",
                cycle_number,
                written.display()
            );
            Ok(())
        }
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes)
        .with_context(|| format!("failed to write {}", partial.display()))?;
    fs::rename(&partial, path)
        .with_context(|| format!("failed to move report into {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cycles::{partition, DisplayCycle};
    use crate::db::ScrewRecord;
    use chrono::TimeZone;
    use std::num::NonZeroUsize;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn report() -> CycleReport {
        let records: Vec<ScrewRecord> = (1..=19)
            .map(|id| ScrewRecord {
                id,
                angle_min: 3600.0,
                angle_max: 5500.0,
                actual_angle: 4000.0,
                torque_min: 2.1,
                torque_max: 2.8,
                actual_torque: 2.5,
            })
            .collect();
        let cycle = partition(&records, NonZeroUsize::new(19).unwrap()).remove(0);
        let at = chrono::Utc.with_ymd_and_hms(2025, 3, 7, 14, 30, 0).unwrap();
        CycleReport::new(Uuid::new_v4(), DisplayCycle::from_cycle(&cycle), at)
    }

    #[tokio::test]
    async fn writes_document_and_diagram() {
        let dir = TempDir::new().unwrap();
        let outbox = dir.path().join("outbox");
        let generator = OutboxReportGenerator::new(outbox.clone(), StationInfo::default()).unwrap();

        let report = report();
        generator.deliver(&report).await.unwrap();

        let stem = ReportDocument::build(&report, &StationInfo::default()).file_stem();
        assert!(stem.starts_with("Screw_Report_Cycle_1_"));
        let json_path = outbox.join(format!("{stem}.json"));
        let png_path = outbox.join(format!("{stem}.png"));
        let document: serde_json::Value =
            serde_json::from_slice(&fs::read(&json_path).unwrap()).unwrap();
        assert_eq!(document["status"], "PASS");
        assert_eq!(document["rows"].as_array().unwrap().len(), 19);
        assert!(fs::metadata(&png_path).unwrap().len() > 0);

        let leftovers = fs::read_dir(&outbox)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn missing_outbox_fails_delivery() {
        let dir = TempDir::new().unwrap();
        let outbox = dir.path().join("outbox");
        let generator = OutboxReportGenerator::new(outbox.clone(), StationInfo::default()).unwrap();
        fs::remove_dir_all(&outbox).unwrap();

        assert!(generator.deliver(&report()).await.is_err());
    }
}
