//! Bounded concurrent downloader for resolved document links.
//!
//! A [`Downloader`] owns a semaphore sized to the worker pool. Each dispatched
//! [`DownloadTask`] acquires a permit, then runs in its own Tokio task: one GET,
//! and on HTTP 200 the whole body is written to `output_dir/filename`,
//! replacing any existing file. Every other outcome is counted as a failure.
//! Nothing is retried and no task error escapes its task.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use harvester_core::download::{Downloader, NoopObserver};
//! use harvester_core::{CancelToken, PortalSession};
//!
//! # async fn example(session: PortalSession) -> Result<(), Box<dyn std::error::Error>> {
//! let downloader = Downloader::new(10)?;
//! let counters = downloader
//!     .run(Vec::new(), &session, Path::new("./facturas"), &CancelToken::new(), Arc::new(NoopObserver))
//!     .await?;
//! println!("ok: {}, failed: {}", counters.downloaded_ok(), counters.downloaded_failed());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::counters::{ProgressEvent, ProgressObserver, RunCounters};
use super::error::DownloadError;
use super::task::DownloadTask;
use crate::cancel::CancelToken;
use crate::portal::PortalSession;

/// Minimum allowed pool size.
const MIN_POOL_SIZE: usize = 1;

/// Maximum allowed pool size.
const MAX_POOL_SIZE: usize = 100;

/// Default pool size if not specified.
pub const DEFAULT_POOL_SIZE: usize = 10;

/// How often a permit wait re-checks the cancel token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Error type for downloader setup and dispatch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid pool size provided.
    #[error("invalid pool size {value}: must be between {MIN_POOL_SIZE} and {MAX_POOL_SIZE}")]
    InvalidPoolSize {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The output directory could not be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Directory that was requested.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Download worker pool.
#[derive(Debug)]
pub struct Downloader {
    semaphore: Arc<Semaphore>,
    pool_size: usize,
}

impl Downloader {
    /// Creates a downloader allowing `pool_size` concurrent transfers.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidPoolSize`] if the value is outside 1..=100.
    #[instrument(level = "debug")]
    pub fn new(pool_size: usize) -> Result<Self, EngineError> {
        if !(MIN_POOL_SIZE..=MAX_POOL_SIZE).contains(&pool_size) {
            return Err(EngineError::InvalidPoolSize { value: pool_size });
        }
        debug!(pool_size, "creating downloader");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(pool_size)),
            pool_size,
        })
    }

    /// Returns the configured pool size.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Creates the output directory (if absent) and opens a batch that tasks
    /// can be dispatched into.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] if the directory cannot be created.
    #[instrument(skip(self, session, cancel, observer), fields(output_dir = %output_dir.display()))]
    pub async fn begin(
        &self,
        session: &PortalSession,
        output_dir: &Path,
        cancel: &CancelToken,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<DownloadBatch, EngineError> {
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| EngineError::OutputDir {
                path: output_dir.to_path_buf(),
                source,
            })?;
        Ok(DownloadBatch {
            semaphore: Arc::clone(&self.semaphore),
            session: session.clone(),
            output_dir: output_dir.to_path_buf(),
            counters: Arc::new(RunCounters::new()),
            observer,
            cancel: cancel.clone(),
            handles: Vec::new(),
            dispatched: 0,
        })
    }

    /// Downloads every task and returns the run's counters.
    ///
    /// Individual download failures do NOT cause this method to error; they
    /// are counted in [`RunCounters::downloaded_failed`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutputDir`] if the output directory cannot be
    /// created and [`EngineError::SemaphoreClosed`] if permit acquisition fails.
    pub async fn run(
        &self,
        tasks: impl IntoIterator<Item = DownloadTask>,
        session: &PortalSession,
        output_dir: &Path,
        cancel: &CancelToken,
        observer: Arc<dyn ProgressObserver>,
    ) -> Result<RunCounters, EngineError> {
        let mut batch = self.begin(session, output_dir, cancel, observer).await?;
        for task in tasks {
            if !batch.dispatch(task).await? {
                break;
            }
        }
        Ok(batch.finish().await)
    }
}

/// Tasks dispatched into the pool for one run, plus the run's counters.
pub struct DownloadBatch {
    semaphore: Arc<Semaphore>,
    session: PortalSession,
    output_dir: PathBuf,
    counters: Arc<RunCounters>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelToken,
    handles: Vec<JoinHandle<()>>,
    dispatched: usize,
}

impl std::fmt::Debug for DownloadBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadBatch")
            .field("output_dir", &self.output_dir)
            .field("dispatched", &self.dispatched)
            .field("pending", &self.handles.len())
            .finish_non_exhaustive()
    }
}

impl DownloadBatch {
    /// Counters shared with the running tasks.
    #[must_use]
    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// Tasks handed to the pool so far.
    #[must_use]
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Waits for a free worker, then starts `task`.
    ///
    /// Returns `Ok(false)` without starting the task when the run has been
    /// cancelled, including while waiting for a worker.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SemaphoreClosed`] if the semaphore is closed.
    pub async fn dispatch(&mut self, task: DownloadTask) -> Result<bool, EngineError> {
        self.reap_finished().await;
        if self.cancel.is_cancelled() {
            debug!(identifier = %task.identifier, "not dispatching: cancelled");
            return Ok(false);
        }

        let Some(permit) = self.acquire_permit().await? else {
            debug!(identifier = %task.identifier, "cancelled while waiting for a worker");
            return Ok(false);
        };

        let session = self.session.clone();
        let output_dir = self.output_dir.clone();
        let counters = Arc::clone(&self.counters);
        let observer = Arc::clone(&self.observer);
        let cancel = self.cancel.clone();

        self.handles.push(tokio::spawn(async move {
            // Permit is dropped when this block exits (RAII)
            let _permit = permit;
            process_task(&session, task, &output_dir, &counters, observer.as_ref(), &cancel)
                .await;
        }));
        self.dispatched += 1;
        Ok(true)
    }

    /// Waits for every dispatched task and returns the final counters.
    pub async fn finish(mut self) -> RunCounters {
        debug!(task_count = self.handles.len(), "waiting for downloads to complete");
        for handle in std::mem::take(&mut self.handles) {
            if let Err(join_error) = handle.await {
                record_join_error(&self.counters, &join_error);
            }
        }

        let snapshot = self.counters.snapshot();
        info!(
            ok = snapshot.downloaded_ok,
            failed = snapshot.downloaded_failed,
            pdf = snapshot.downloaded_pdf,
            xml = snapshot.downloaded_xml,
            dispatched = self.dispatched,
            "downloads complete"
        );

        // All tasks are joined, so this should be the only owner.
        match Arc::try_unwrap(self.counters) {
            Ok(counters) => counters,
            Err(shared) => copy_counters(&shared),
        }
    }

    async fn acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>, EngineError> {
        let cancel = self.cancel.clone();
        tokio::select! {
            biased;
            () = async move {
                while !cancel.is_cancelled() {
                    tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
                }
            } => Ok(None),
            result = Arc::clone(&self.semaphore).acquire_owned() => {
                result.map(Some).map_err(|_| EngineError::SemaphoreClosed)
            }
        }
    }

    async fn reap_finished(&mut self) {
        let mut idx = 0;
        while idx < self.handles.len() {
            if self.handles[idx].is_finished() {
                let handle = self.handles.swap_remove(idx);
                if let Err(join_error) = handle.await {
                    record_join_error(&self.counters, &join_error);
                }
            } else {
                idx += 1;
            }
        }
    }
}

fn record_join_error(counters: &RunCounters, join_error: &tokio::task::JoinError) {
    warn!(error = %join_error, "download task panicked");
    counters.record_failure();
}

fn copy_counters(shared: &RunCounters) -> RunCounters {
    RunCounters::from_snapshot(shared.snapshot())
}

#[instrument(skip_all, fields(identifier = %task.identifier, kind = %task.kind, url = %task.target_url))]
async fn process_task(
    session: &PortalSession,
    task: DownloadTask,
    output_dir: &Path,
    counters: &RunCounters,
    observer: &dyn ProgressObserver,
    cancel: &CancelToken,
) {
    if cancel.is_cancelled() {
        debug!("skipping download: cancelled");
        return;
    }

    let succeeded = match download_one(session, &task, output_dir).await {
        Ok(path) => {
            debug!(path = %path.display(), "document saved");
            counters.record_success(task.kind);
            true
        }
        Err(error) => {
            warn!(error = %error, "download failed");
            counters.record_failure();
            false
        }
    };

    observer.on_event(&ProgressEvent::TaskFinished {
        kind: task.kind,
        succeeded,
        snapshot: counters.snapshot(),
    });
}

async fn download_one(
    session: &PortalSession,
    task: &DownloadTask,
    output_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let response = session
        .get(&task.target_url)
        .await
        .map_err(|source| DownloadError::network(task.target_url.clone(), source))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(DownloadError::http_status(
            task.target_url.clone(),
            status.as_u16(),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| DownloadError::network(task.target_url.clone(), source))?;

    let path = output_dir.join(&task.destination_filename);
    tokio::fs::write(&path, &body)
        .await
        .map_err(|source| DownloadError::io(path.clone(), source))?;
    Ok(path)
}
