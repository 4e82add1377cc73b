use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{
    helpers::{row_conversion_error, to_i64, to_u64},
    models::ScrewRecord,
    Database,
};

impl Database {
    /// Full current contents of `screw_results`, ascending by step id.
    pub async fn fetch_screw_records(&self) -> Result<Vec<ScrewRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT
                    step_id,
                    angle_low_limit,
                    angle_high_limit,
                    angle_result,
                    torque_low_limit,
                    torque_high_limit,
                    torque_result
                FROM screw_results
                ORDER BY step_id ASC",
            )?;

            let rows = stmt.query_map([], |row| {
                let step_id: i64 = row.get(0)?;
                Ok(ScrewRecord {
                    id: to_u64(step_id, "step_id").map_err(row_conversion_error)?,
                    angle_min: row.get(1)?,
                    angle_max: row.get(2)?,
                    actual_angle: row.get(3)?,
                    torque_min: row.get(4)?,
                    torque_max: row.get(5)?,
                    actual_torque: row.get(6)?,
                })
            })?;

            let mut records = Vec::new();
            for record in rows {
                records.push(record.context("failed to read screw_results row")?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn insert_screw_record(&self, record: &ScrewRecord) -> Result<()> {
        self.insert_screw_records(std::slice::from_ref(record)).await
    }

    /// Appends records in one transaction.
    pub async fn insert_screw_records(&self, records: &[ScrewRecord]) -> Result<()> {
        let batch = records.to_vec();
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open insert transaction")?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO screw_results (
                        step_id,
                        angle_low_limit,
                        angle_high_limit,
                        angle_result,
                        torque_low_limit,
                        torque_high_limit,
                        torque_result
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                )?;

                for record in &batch {
                    stmt.execute(params![
                        to_i64(record.id)?,
                        record.angle_min,
                        record.angle_max,
                        record.actual_angle,
                        record.torque_min,
                        record.torque_max,
                        record.actual_torque,
                    ])
                    .with_context(|| format!("failed to insert screw result {}", record.id))?;
                }
            }
            tx.commit().context("failed to commit screw results")?;
            Ok(())
        })
        .await
    }
}
