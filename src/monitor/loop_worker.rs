use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::{
    sync::Mutex,
    time::{Duration, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    cycles::FailureOutcome,
    render::UiRenderer,
    report::{CycleReport, ReportGenerator},
};

use super::{source::RecordSource, state::MonitorEngine, MonitorStatus};

// Set to false to silence per-tick logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// State shared between the controller and the polling task.
pub(super) struct Shared<S, G, U> {
    pub(super) engine: Mutex<MonitorEngine>,
    pub(super) source: S,
    pub(super) reports: G,
    pub(super) renderer: U,
    pub(super) tick_lock: AtomicBool,
}

/// Held for the whole of one tick. Released on drop, whichever way the tick
/// ends.
struct TickGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still in flight.
    Skipped,
    /// The monitor stopped while this tick was running.
    Discarded,
    FetchFailed,
    Applied {
        data_changed: bool,
        delivered: usize,
        failed: usize,
    },
}

pub(super) async fn polling_loop<S, G, U>(
    shared: std::sync::Arc<Shared<S, G, U>>,
    period: Duration,
    cancel_token: CancellationToken,
) where
    S: RecordSource,
    G: ReportGenerator,
    U: UiRenderer,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    outcome = perform_tick(&shared, &cancel_token) => {
                        log_debug!("tick finished: {:?}", outcome);
                    }
                }
            }
        }
    }

    log_info!("polling loop shutting down");
}

pub(super) async fn perform_tick<S, G, U>(
    shared: &Shared<S, G, U>,
    cancel_token: &CancellationToken,
) -> TickOutcome
where
    S: RecordSource,
    G: ReportGenerator,
    U: UiRenderer,
{
    let Some(_guard) = TickGuard::acquire(&shared.tick_lock) else {
        log_debug!("previous tick still running; skipping");
        return TickOutcome::Skipped;
    };

    if cancel_token.is_cancelled() {
        return TickOutcome::Discarded;
    }

    let fetched = shared.source.fetch_records().await;

    let (plan, session_id) = {
        let mut engine = shared.engine.lock().await;
        if cancel_token.is_cancelled() || engine.status() != MonitorStatus::Running {
            return TickOutcome::Discarded;
        }
        let Some(session_id) = engine.session_id() else {
            return TickOutcome::Discarded;
        };

        let records = match fetched {
            Ok(records) => records,
            Err(err) => {
                let message = format!("{err:#}");
                let failures = engine.record_fetch_failure(message.clone());
                drop(engine);

                log_warn!("record fetch failed ({} in a row): {}", failures, message);
                shared
                    .renderer
                    .notice(&format!("Could not read screw results: {message}"));
                return TickOutcome::FetchFailed;
            }
        };

        let plan = engine.apply_snapshot(records);
        // Drawn under the lock so a navigation frame is never overdrawn.
        if let Some(frame) = &plan.frame {
            shared.renderer.render(frame);
        }
        (plan, session_id)
    };

    if plan.data_changed {
        if !plan.ordering.is_clean() {
            log_warn!(
                "duplicate screw ids in record store: {:?}",
                plan.ordering.duplicate_ids
            );
        }
        if !plan.ordering.was_sorted {
            log_debug!("record store returned rows out of id order");
        }
    }

    let mut delivered = 0;
    let mut failed = 0;

    for cycle in plan.due_reports {
        if cancel_token.is_cancelled() {
            return TickOutcome::Discarded;
        }

        let report = CycleReport::new(session_id, cycle, Utc::now());
        let index = report.cycle_index();
        let result = shared.reports.deliver(&report).await;

        let mut engine = shared.engine.lock().await;
        if !owns_session(&engine, cancel_token, session_id) {
            log_debug!(
                "dropping report result for cycle {} from ended session {}",
                report.cycle.cycle_number(),
                session_id
            );
            return TickOutcome::Discarded;
        }

        match result {
            Ok(()) => {
                if engine.mark_delivered(index) {
                    delivered += 1;
                    log_info!(
                        "cycle {} reported ({})",
                        report.cycle.cycle_number(),
                        report.verdict.verdict.as_str()
                    );
                }
            }
            Err(err) => {
                failed += 1;
                match engine.record_report_failure(index) {
                    FailureOutcome::Retry { attempts } => log_error!(
                        "report for cycle {} failed (attempt {}), retrying next tick: {err:#}",
                        report.cycle.cycle_number(),
                        attempts
                    ),
                    FailureOutcome::Abandoned { attempts } => log_error!(
                        "report for cycle {} abandoned after {} attempts: {err:#}",
                        report.cycle.cycle_number(),
                        attempts
                    ),
                }
            }
        }
    }

    TickOutcome::Applied {
        data_changed: plan.data_changed,
        delivered,
        failed,
    }
}

/// True while the tick's session is still the live one.
fn owns_session(
    engine: &MonitorEngine,
    cancel_token: &CancellationToken,
    session_id: Uuid,
) -> bool {
    !cancel_token.is_cancelled()
        && engine.status() == MonitorStatus::Running
        && engine.session_id() == Some(session_id)
}
