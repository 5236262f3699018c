//! End-to-end harvest: page through the listing and download every linked
//! document.
//!
//! Pages are fetched one after another. Each page's tasks are handed to the
//! worker pool as soon as the page arrives and the next page is requested
//! without waiting for those downloads to finish. All downloads are awaited
//! before [`harvest`] returns.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::cancel::CancelToken;
use crate::download::{
    CounterSnapshot, DEFAULT_POOL_SIZE, Downloader, EngineError, FoundLinks, KindToggles,
    ProgressEvent, ProgressObserver, resolve,
};
use crate::listing::{PageCursor, PageQuery};
use crate::portal::PortalSession;

/// Per-run settings for [`harvest`].
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Prefix for root-relative document links.
    pub base_url: Url,
    /// Which document kinds to download.
    pub toggles: KindToggles,
    /// Directory receiving the documents.
    pub output_dir: PathBuf,
    /// Maximum concurrent downloads.
    pub pool_size: usize,
}

impl HarvestOptions {
    /// Options with both kinds enabled and the default pool size.
    #[must_use]
    pub fn new(base_url: Url, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            toggles: KindToggles::default(),
            output_dir: output_dir.into(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Outcome of a completed (or cancelled) harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestReport {
    /// Final counter values.
    pub counters: CounterSnapshot,
    /// Total records reported by the listing.
    pub records: u64,
    /// Pages the listing spans.
    pub pages: u64,
    /// Listing requests issued.
    pub listing_requests: u64,
    /// Download tasks handed to the pool.
    pub tasks_dispatched: usize,
    /// Whether the run stopped early on cancellation.
    pub cancelled: bool,
}

impl HarvestReport {
    /// True when nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.counters.downloaded_failed == 0
    }
}

/// Fatal harvest errors. Page and download failures are counted, not raised.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// The worker pool could not be set up.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Downloads every document matched by `query`.
///
/// # Errors
///
/// Returns [`HarvestError::Engine`] if the pool size is invalid, the output
/// directory cannot be created, or the pool shuts down unexpectedly.
#[instrument(
    skip(session, query, options, cancel, observer),
    fields(output_dir = %options.output_dir.display(), pool_size = options.pool_size)
)]
pub async fn harvest(
    session: &PortalSession,
    query: &PageQuery,
    options: &HarvestOptions,
    cancel: &CancelToken,
    observer: Arc<dyn ProgressObserver>,
) -> Result<HarvestReport, HarvestError> {
    let downloader = Downloader::new(options.pool_size)?;
    let mut batch = downloader
        .begin(session, &options.output_dir, cancel, Arc::clone(&observer))
        .await?;
    let mut cursor = PageCursor::new(session.clone(), query.clone(), cancel.clone());
    let mut sized = false;

    'pages: while let Some(rows) = cursor.next_page().await {
        if !sized {
            sized = true;
            observer.on_event(&ProgressEvent::ListingSized {
                records: cursor.records().unwrap_or_default(),
                pages: cursor.total_pages(),
            });
        }

        let mut tasks = Vec::new();
        for row in &rows {
            batch.counters().record_found(FoundLinks::of(row));
            tasks.extend(resolve(row, &options.base_url, options.toggles));
        }
        let page = cursor.current_page();
        debug!(page, rows = rows.len(), tasks = tasks.len(), "dispatching page");
        observer.on_event(&ProgressEvent::PageFetched {
            page,
            total_pages: cursor.total_pages(),
            rows: rows.len(),
            tasks: tasks.len(),
        });

        for task in tasks {
            if !batch.dispatch(task).await? {
                break 'pages;
            }
        }
    }

    if !sized {
        // Cancelled before page 1, or an empty listing.
        observer.on_event(&ProgressEvent::ListingSized {
            records: cursor.records().unwrap_or_default(),
            pages: cursor.total_pages(),
        });
    }

    let tasks_dispatched = batch.dispatched();
    let counters = batch.finish().await.snapshot();
    let cancelled = cancel.is_cancelled();
    if cancelled {
        warn!(tasks_dispatched, "harvest cancelled; pending work was skipped");
    }

    let report = HarvestReport {
        counters,
        records: cursor.records().unwrap_or_default(),
        pages: cursor.total_pages(),
        listing_requests: cursor.requests(),
        tasks_dispatched,
        cancelled,
    };
    info!(
        records = report.records,
        pages = report.pages,
        found_pdf = counters.found_pdf,
        found_xml = counters.found_xml,
        ok = counters.downloaded_ok,
        failed = counters.downloaded_failed,
        "harvest finished"
    );
    Ok(report)
}
