use std::{
    future::Future,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Condvar, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use screwwatch_lib::{
    config::MonitorSettings,
    cycles::CycleIndex,
    db::ScrewRecord,
    monitor::{MonitorController, MonitorStatus, RecordSource, TickOutcome},
    render::{RenderFrame, UiRenderer},
    report::{CycleReport, ReportGenerator},
};
use tokio::{sync::Notify, time::Instant};
use uuid::Uuid;

fn record(id: u64) -> ScrewRecord {
    ScrewRecord {
        id,
        angle_min: 3600.0,
        angle_max: 5500.0,
        actual_angle: 4200.0,
        torque_min: 2.1,
        torque_max: 2.8,
        actual_torque: 2.5,
    }
}

fn records(range: std::ops::RangeInclusive<u64>) -> Vec<ScrewRecord> {
    range.map(record).collect()
}

#[derive(Clone, Default)]
struct FakeSource {
    records: Arc<Mutex<Vec<ScrewRecord>>>,
    failing: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
    gate: Option<Arc<Notify>>,
}

impl FakeSource {
    fn with(records: Vec<ScrewRecord>) -> Self {
        let source = Self::default();
        *source.records.lock().unwrap() = records;
        source
    }

    fn gated(records: Vec<ScrewRecord>, gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::with(records)
        }
    }

    fn append(&self, more: Vec<ScrewRecord>) {
        self.records.lock().unwrap().extend(more);
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl RecordSource for FakeSource {
    fn fetch_records(&self) -> impl Future<Output = Result<Vec<ScrewRecord>>> + Send {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let records = Arc::clone(&self.records);
        let failing = self.failing.load(Ordering::SeqCst);
        let gate = self.gate.clone();

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if failing {
                bail!("connection refused");
            }
            let mut snapshot = records.lock().unwrap().clone();
            // The store makes no ordering promise.
            snapshot.reverse();
            Ok(snapshot)
        }
    }
}

#[derive(Clone, Default)]
struct FakeReports {
    delivered: Arc<Mutex<Vec<(Uuid, CycleIndex)>>>,
    attempts: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    /// 1-based attempt that waits on the gate before finishing.
    held_attempt: Option<(usize, Arc<Notify>)>,
}

impl FakeReports {
    fn failing_first(count: usize) -> Self {
        let reports = Self::default();
        reports.failures_left.store(count, Ordering::SeqCst);
        reports
    }

    fn holding(mut self, attempt: usize, gate: Arc<Notify>) -> Self {
        self.held_attempt = Some((attempt, gate));
        self
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn delivered(&self) -> Vec<CycleIndex> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, index)| *index)
            .collect()
    }

    fn delivered_in(&self, session: Uuid) -> Vec<CycleIndex> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| *id == session)
            .map(|(_, index)| *index)
            .collect()
    }
}

impl ReportGenerator for FakeReports {
    fn deliver(&self, report: &CycleReport) -> impl Future<Output = Result<()>> + Send {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        let gate = match &self.held_attempt {
            Some((held, gate)) if *held == attempt => Some(Arc::clone(gate)),
            _ => None,
        };
        let delivered = Arc::clone(&self.delivered);
        let entry = (report.session_id, report.cycle_index());

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if fail {
                bail!("smtp relay unavailable");
            }
            delivered.lock().unwrap().push(entry);
            Ok(())
        }
    }
}

#[derive(Clone, Default)]
struct RecordingRenderer {
    frames: Arc<Mutex<Vec<RenderFrame>>>,
    notices: Arc<Mutex<Vec<String>>>,
    /// When set, the first render blocks its thread until released.
    hold_first: Option<Arc<RenderHold>>,
}

#[derive(Default)]
struct RenderHold {
    entered: AtomicBool,
    released: Mutex<bool>,
    wake: Condvar,
}

impl RenderHold {
    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.wake.notify_all();
    }
}

impl RecordingRenderer {
    fn holding_first() -> (Self, Arc<RenderHold>) {
        let hold = Arc::new(RenderHold::default());
        let renderer = Self {
            hold_first: Some(Arc::clone(&hold)),
            ..Self::default()
        };
        (renderer, hold)
    }

    fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    fn last_frame(&self) -> RenderFrame {
        self.frames.lock().unwrap().last().cloned().unwrap()
    }
}

impl UiRenderer for RecordingRenderer {
    fn render(&self, frame: &RenderFrame) {
        if let Some(hold) = &self.hold_first {
            if !hold.entered.swap(true, Ordering::SeqCst) {
                let mut released = hold.released.lock().unwrap();
                while !*released {
                    released = hold.wake.wait(released).unwrap();
                }
            }
        }
        self.frames.lock().unwrap().push(frame.clone());
    }

    fn notice(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

type Controller = MonitorController<FakeSource, FakeReports, RecordingRenderer>;

fn settings() -> MonitorSettings {
    MonitorSettings {
        cycle_size: NonZeroUsize::new(19).unwrap(),
        // Only the immediate first tick fires on its own; tests drive the rest.
        poll_interval: Duration::from_secs(3600),
        report_attempt_limit: None,
    }
}

fn controller(
    source: &FakeSource,
    reports: &FakeReports,
    renderer: &RecordingRenderer,
) -> Controller {
    MonitorController::new(
        settings(),
        source.clone(),
        reports.clone(),
        renderer.clone(),
    )
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Runs a manual tick once the timer's tick has let go of the lock.
async fn tick(controller: &Controller) -> TickOutcome {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match controller.poll_now().await.unwrap() {
            TickOutcome::Skipped => {
                assert!(Instant::now() < deadline, "tick lock never released");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            outcome => return outcome,
        }
    }
}

#[tokio::test]
async fn growing_store_reports_each_cycle_once() {
    let source = FakeSource::with(records(1..=19));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    assert!(monitor.start().await);
    wait_until("first report", || reports.delivered() == vec![0]).await;

    source.append(records(20..=38));
    assert_eq!(
        tick(&monitor).await,
        TickOutcome::Applied {
            data_changed: true,
            delivered: 1,
            failed: 0
        }
    );

    source.append(records(39..=39));
    assert_eq!(
        tick(&monitor).await,
        TickOutcome::Applied {
            data_changed: true,
            delivered: 0,
            failed: 0
        }
    );
    assert_eq!(reports.delivered(), vec![0, 1]);

    let frame = renderer.last_frame();
    assert_eq!(frame.navigation.total_cycles, 3);
    assert!(frame.navigation.is_latest);
    let shown = frame.cycle.unwrap();
    assert_eq!(shown.cycle_index, 2);
    assert!(!shown.complete);
    assert_eq!(shown.screws[0].display_position, 1);
    assert_eq!(shown.screws[0].record.id, 39);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn unchanged_data_is_not_redrawn() {
    let source = FakeSource::with(records(1..=7));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("first frame", || renderer.frame_count() == 1).await;

    assert_eq!(
        tick(&monitor).await,
        TickOutcome::Applied {
            data_changed: false,
            delivered: 0,
            failed: 0
        }
    );
    assert_eq!(renderer.frame_count(), 1);
    assert!(reports.delivered().is_empty());

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn failed_delivery_is_retried_on_identical_data() {
    let source = FakeSource::with(records(1..=19));
    let reports = FakeReports::failing_first(1);
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("first attempt", || reports.attempts() == 1).await;

    assert_eq!(
        tick(&monitor).await,
        TickOutcome::Applied {
            data_changed: false,
            delivered: 1,
            failed: 0
        }
    );
    assert_eq!(reports.delivered(), vec![0]);

    tick(&monitor).await;
    assert_eq!(reports.attempts(), 2);
    assert_eq!(monitor.snapshot().await.reported_cycles, vec![0]);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn fetch_failure_keeps_view_and_notifies() {
    let source = FakeSource::with(records(1..=25));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("first report", || reports.delivered() == vec![0]).await;
    let before = monitor.current_frame().await;

    source.failing.store(true, Ordering::SeqCst);
    assert_eq!(tick(&monitor).await, TickOutcome::FetchFailed);
    assert_eq!(tick(&monitor).await, TickOutcome::FetchFailed);

    assert_eq!(monitor.current_frame().await, before);
    assert_eq!(renderer.notices.lock().unwrap().len(), 2);
    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.consecutive_fetch_failures, 2);
    assert!(snapshot.last_error.unwrap().contains("connection refused"));

    source.failing.store(false, Ordering::SeqCst);
    tick(&monitor).await;
    assert_eq!(monitor.snapshot().await.consecutive_fetch_failures, 0);
    assert_eq!(reports.delivered(), vec![0]);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let source = FakeSource::with(records(1..=3));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    assert!(!monitor.stop().await.unwrap());
    assert!(monitor.poll_now().await.is_err());

    assert!(monitor.start().await);
    let session = monitor.snapshot().await.session_id;
    assert!(!monitor.start().await);
    assert_eq!(monitor.snapshot().await.session_id, session);
    assert!(monitor.is_running().await);

    assert!(monitor.stop().await.unwrap());
    assert!(!monitor.stop().await.unwrap());
    assert_eq!(monitor.snapshot().await.status, MonitorStatus::Idle);
    assert!(!monitor.is_running().await);
}

#[tokio::test]
async fn restart_opens_a_new_session() {
    let source = FakeSource::with(records(1..=19));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("first report", || reports.delivered() == vec![0]).await;
    let first = monitor.snapshot().await.session_id;
    monitor.stop().await.unwrap();

    monitor.start().await;
    wait_until("report in new session", || reports.delivered() == vec![0, 0]).await;
    assert_ne!(monitor.snapshot().await.session_id, first);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let gate = Arc::new(Notify::new());
    let source = FakeSource::gated(records(1..=4), Arc::clone(&gate));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("fetch in flight", || source.fetches() == 1).await;

    assert_eq!(monitor.poll_now().await.unwrap(), TickOutcome::Skipped);
    assert_eq!(source.fetches(), 1);

    gate.notify_one();
    wait_until("first frame", || renderer.frame_count() == 1).await;

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn stop_discards_in_flight_tick() {
    let gate = Arc::new(Notify::new());
    let source = FakeSource::gated(records(1..=19), Arc::clone(&gate));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("fetch in flight", || source.fetches() == 1).await;

    let stopped = tokio::time::timeout(Duration::from_secs(2), monitor.stop())
        .await
        .expect("stop waited on the blocked fetch");
    assert!(stopped.unwrap());

    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(renderer.frame_count(), 0);
    assert!(reports.delivered().is_empty());
    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.record_count, 0);
    assert!(snapshot.reported_cycles.is_empty());
}

#[tokio::test]
async fn pinned_view_holds_while_cycles_arrive() {
    let source = FakeSource::with(records(1..=95));
    let reports = FakeReports::default();
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("all five reports", || reports.delivered().len() == 5).await;

    monitor.step_to_older().await.unwrap();
    let frame = monitor.step_to_older().await.unwrap();
    assert_eq!(frame.cycle.unwrap().cycle_index, 2);
    assert_eq!(frame.navigation.label(), "Previous Cycle");

    source.append(records(96..=114));
    tick(&monitor).await;

    let snapshot = monitor.snapshot().await;
    assert_eq!(snapshot.view.current_cycle_offset, 2);
    assert!(snapshot.view.pinned_to_history);
    assert_eq!(snapshot.navigation.total_cycles, 6);
    assert_eq!(renderer.last_frame().navigation.selected_index, Some(3));

    let latest = monitor.select_latest().await;
    assert_eq!(latest.cycle.as_ref().unwrap().cycle_index, 5);
    assert_eq!(
        latest.navigation.describe(),
        "Viewing latest data (Cycle 6 of 6)"
    );
    assert_eq!(renderer.last_frame(), latest);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn result_from_a_stopped_session_is_dropped() {
    let gate = Arc::new(Notify::new());
    let source = FakeSource::with(records(1..=19));
    let reports = FakeReports::failing_first(1).holding(2, Arc::clone(&gate));
    let renderer = RecordingRenderer::default();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    let first_session = monitor.snapshot().await.session_id.unwrap();
    wait_until("failed first attempt", || reports.attempts() == 1).await;

    let retry = tokio::spawn({
        let monitor = monitor.clone();
        async move { tick(&monitor).await }
    });
    wait_until("retry parked in deliver", || reports.attempts() == 2).await;

    assert!(monitor.stop().await.unwrap());
    assert!(monitor.start().await);
    let second_session = monitor.snapshot().await.session_id.unwrap();
    assert_ne!(first_session, second_session);

    gate.notify_one();
    assert_eq!(retry.await.unwrap(), TickOutcome::Discarded);
    assert!(monitor.snapshot().await.reported_cycles.is_empty());

    assert_eq!(
        tick(&monitor).await,
        TickOutcome::Applied {
            data_changed: true,
            delivered: 1,
            failed: 0
        }
    );
    assert_eq!(reports.delivered_in(second_session), vec![0]);
    assert_eq!(monitor.snapshot().await.reported_cycles, vec![0]);

    monitor.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn navigation_during_a_render_is_drawn_last() {
    let source = FakeSource::with(records(1..=38));
    let reports = FakeReports::default();
    let (renderer, hold) = RecordingRenderer::holding_first();
    let monitor = controller(&source, &reports, &renderer);

    monitor.start().await;
    wait_until("tick render in progress", || hold.entered.load(Ordering::SeqCst)).await;

    let navigation = tokio::spawn({
        let monitor = monitor.clone();
        async move { monitor.step_to_older().await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    hold.release();

    let stepped = navigation.await.unwrap().unwrap();
    wait_until("both frames", || renderer.frame_count() == 2).await;

    assert_eq!(stepped.navigation.current_offset, 1);
    assert_eq!(renderer.last_frame(), stepped);
    assert_eq!(renderer.last_frame(), monitor.current_frame().await);

    monitor.stop().await.unwrap();
}
