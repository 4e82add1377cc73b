use std::{
    sync::{atomic::AtomicBool, Arc},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::MonitorSettings,
    render::{RenderFrame, UiRenderer},
    report::ReportGenerator,
};

use super::{
    loop_worker::{perform_tick, polling_loop, Shared, TickOutcome},
    source::RecordSource,
    state::{MonitorEngine, MonitorSnapshot},
};

struct Poller {
    handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

/// Owns one monitoring engine and the task that polls for it.
pub struct MonitorController<S, G, U> {
    shared: Arc<Shared<S, G, U>>,
    poller: Arc<Mutex<Option<Poller>>>,
    poll_interval: Duration,
}

impl<S, G, U> Clone for MonitorController<S, G, U> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            poller: Arc::clone(&self.poller),
            poll_interval: self.poll_interval,
        }
    }
}

impl<S, G, U> MonitorController<S, G, U>
where
    S: RecordSource,
    G: ReportGenerator,
    U: UiRenderer,
{
    pub fn new(settings: MonitorSettings, source: S, reports: G, renderer: U) -> Self {
        Self {
            shared: Arc::new(Shared {
                engine: Mutex::new(MonitorEngine::new(settings)),
                source,
                reports,
                renderer,
                tick_lock: AtomicBool::new(false),
            }),
            poller: Arc::new(Mutex::new(None)),
            poll_interval: settings.poll_interval,
        }
    }

    /// Begins a new session and starts polling. Returns false if already
    /// running.
    pub async fn start(&self) -> bool {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return false;
        }

        let session_id = self.shared.engine.lock().await.begin_session(Utc::now());

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(polling_loop(
            Arc::clone(&self.shared),
            self.poll_interval,
            cancel_token.clone(),
        ));
        *poller = Some(Poller {
            handle,
            cancel_token,
        });

        info!(
            "Monitoring session {} started, polling every {:?}",
            session_id, self.poll_interval
        );
        true
    }

    /// Stops polling and waits for the loop to exit. Returns false if it was
    /// not running.
    pub async fn stop(&self) -> Result<bool> {
        let Some(poller) = self.poller.lock().await.take() else {
            return Ok(false);
        };

        poller.cancel_token.cancel();
        let session_id = {
            let mut engine = self.shared.engine.lock().await;
            engine.end_session();
            engine.session_id()
        };

        poller
            .handle
            .await
            .context("polling loop task failed to join")?;

        if let Some(session_id) = session_id {
            info!("Monitoring session {} stopped", session_id);
        }
        Ok(true)
    }

    pub async fn is_running(&self) -> bool {
        self.poller.lock().await.is_some()
    }

    /// Runs one tick now, outside the timer. Skipped if a tick is in flight.
    pub async fn poll_now(&self) -> Result<TickOutcome> {
        let cancel_token = match self.poller.lock().await.as_ref() {
            Some(poller) => poller.cancel_token.clone(),
            None => bail!("monitor is not running"),
        };
        Ok(perform_tick(&self.shared, &cancel_token).await)
    }

    pub async fn select_latest(&self) -> RenderFrame {
        let mut engine = self.shared.engine.lock().await;
        let frame = engine.select_latest();
        self.shared.renderer.render(&frame);
        frame
    }

    /// `None` when already showing the oldest cycle.
    pub async fn step_to_older(&self) -> Option<RenderFrame> {
        let mut engine = self.shared.engine.lock().await;
        let frame = engine.step_to_older()?;
        self.shared.renderer.render(&frame);
        Some(frame)
    }

    pub async fn current_frame(&self) -> RenderFrame {
        self.shared.engine.lock().await.current_frame()
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        self.shared.engine.lock().await.snapshot()
    }
}
