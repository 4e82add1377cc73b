pub mod completion;
pub mod partition;
pub mod projection;
pub mod view;

pub use completion::{detect_newly_completed, FailureOutcome, ReportTracker, ReportedSet};
pub use partition::{order_by_id, partition, Cycle, CycleIndex, OrderingReport};
pub use projection::{project, CycleVerdict, DisplayCycle, DisplayScrew, Verdict};
pub use view::{reconcile, NavigationSummary, ViewState};
