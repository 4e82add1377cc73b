use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod helpers;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

pub use models::ScrewRecord;

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// The thread that owns the connection. It exits once the job queue closes.
struct StoreThread {
    queue: Option<mpsc::Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for StoreThread {
    fn drop(&mut self) {
        drop(self.queue.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("screw store thread panicked");
            }
        }
    }
}

/// Handle to the screw measurement store.
///
/// The connection lives on one dedicated thread; async callers queue closures
/// and await the reply. Clones share the thread.
#[derive(Clone)]
pub struct Database {
    store: Arc<StoreThread>,
    path: Arc<PathBuf>,
}

impl Database {
    /// Opens and migrates `path` on the calling thread, then hands the
    /// connection to the store thread.
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let mut conn = Connection::open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        // The line controller writes while we read.
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("WAL unavailable for {}: {err}", path.display());
        }
        run_migrations(&mut conn).context("failed to run database migrations")?;

        let (queue, jobs) = mpsc::channel::<Job>();
        let thread = thread::Builder::new()
            .name("screwwatch-db".into())
            .spawn(move || {
                for job in jobs {
                    job(&mut conn);
                }
                info!("screw store thread exiting");
            })
            .context("failed to spawn screw store thread")?;

        info!("Screw results store opened at {}", path.display());

        Ok(Self {
            store: Arc::new(StoreThread {
                queue: Some(queue),
                thread: Some(thread),
            }),
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = Box::new(move |conn| {
            // The caller may have stopped waiting.
            let _ = reply.send(task(conn));
        });

        self.store
            .queue
            .as_ref()
            .ok_or_else(|| anyhow!("screw store is closed"))?
            .send(job)
            .map_err(|_| anyhow!("screw store thread has exited"))?;

        response
            .await
            .context("screw store thread dropped the request")?
    }
}
