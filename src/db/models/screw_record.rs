//! Screw measurement data model.
//!
//! One row per tightened screw, in the order the controller assigned step ids.

use serde::{Deserialize, Serialize};

/// A single screw tightening result with its tolerance window.
///
/// `id` is the store's global sequence number. It orders records across the
/// whole history and carries no per-cycle meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrewRecord {
    pub id: u64,
    pub angle_min: f64,
    pub angle_max: f64,
    pub actual_angle: f64,
    pub torque_min: f64,
    pub torque_max: f64,
    pub actual_torque: f64,
}

impl ScrewRecord {
    pub fn angle_ok(&self) -> bool {
        self.angle_min <= self.actual_angle && self.actual_angle <= self.angle_max
    }

    pub fn torque_ok(&self) -> bool {
        self.torque_min <= self.actual_torque && self.actual_torque <= self.torque_max
    }

    /// Both windows are inclusive. NaN readings never pass.
    pub fn passed(&self) -> bool {
        self.angle_ok() && self.torque_ok()
    }
}
