//! The polling driver and the per-session engine it feeds.

mod controller;
mod loop_worker;
mod source;
mod state;

pub use controller::MonitorController;
pub use loop_worker::TickOutcome;
pub use source::RecordSource;
pub use state::{MonitorEngine, MonitorSnapshot, MonitorStatus, TickPlan};
