//! Run accounting and progress events.
//!
//! Counters are incremented on the task that finished the transfer and can be
//! read from any thread at any time. Observers receive events synchronously
//! from that same task, so they must be cheap and thread-safe.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::task::{DocumentKind, FoundLinks};

/// Found/downloaded totals for one run.
#[derive(Debug, Default)]
pub struct RunCounters {
    found_pdf: AtomicUsize,
    found_xml: AtomicUsize,
    downloaded_ok: AtomicUsize,
    downloaded_failed: AtomicUsize,
    downloaded_pdf: AtomicUsize,
    downloaded_xml: AtomicUsize,
}

/// Point-in-time copy of [`RunCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Rows carrying a PDF link.
    pub found_pdf: usize,
    /// Rows carrying an XML link.
    pub found_xml: usize,
    /// Transfers that completed with HTTP 200 and were written to disk.
    pub downloaded_ok: usize,
    /// Transfers that failed for any reason.
    pub downloaded_failed: usize,
    /// Successful PDF transfers.
    pub downloaded_pdf: usize,
    /// Successful XML transfers.
    pub downloaded_xml: usize,
}

impl CounterSnapshot {
    /// Finished transfers, successful or not.
    #[must_use]
    pub fn finished(&self) -> usize {
        self.downloaded_ok + self.downloaded_failed
    }
}

impl RunCounters {
    /// Creates zeroed counters. One instance per run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds counters holding the values of `snapshot`.
    #[must_use]
    pub fn from_snapshot(snapshot: CounterSnapshot) -> Self {
        Self {
            found_pdf: AtomicUsize::new(snapshot.found_pdf),
            found_xml: AtomicUsize::new(snapshot.found_xml),
            downloaded_ok: AtomicUsize::new(snapshot.downloaded_ok),
            downloaded_failed: AtomicUsize::new(snapshot.downloaded_failed),
            downloaded_pdf: AtomicUsize::new(snapshot.downloaded_pdf),
            downloaded_xml: AtomicUsize::new(snapshot.downloaded_xml),
        }
    }

    /// Records the links present on a listing row.
    pub fn record_found(&self, found: FoundLinks) {
        if found.pdf {
            self.found_pdf.fetch_add(1, Ordering::SeqCst);
        }
        if found.xml {
            self.found_xml.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Records a successful transfer of `kind`.
    pub fn record_success(&self, kind: DocumentKind) {
        match kind {
            DocumentKind::Pdf => self.downloaded_pdf.fetch_add(1, Ordering::SeqCst),
            DocumentKind::Xml => self.downloaded_xml.fetch_add(1, Ordering::SeqCst),
        };
        self.downloaded_ok.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a failed transfer.
    pub fn record_failure(&self) {
        self.downloaded_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns the number of successful transfers.
    #[must_use]
    pub fn downloaded_ok(&self) -> usize {
        self.downloaded_ok.load(Ordering::SeqCst)
    }

    /// Returns the number of failed transfers.
    #[must_use]
    pub fn downloaded_failed(&self) -> usize {
        self.downloaded_failed.load(Ordering::SeqCst)
    }

    /// Copies all counters.
    ///
    /// Each field is read atomically; fields may come from slightly different
    /// instants while tasks are still running.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            found_pdf: self.found_pdf.load(Ordering::SeqCst),
            found_xml: self.found_xml.load(Ordering::SeqCst),
            downloaded_ok: self.downloaded_ok.load(Ordering::SeqCst),
            downloaded_failed: self.downloaded_failed.load(Ordering::SeqCst),
            downloaded_pdf: self.downloaded_pdf.load(Ordering::SeqCst),
            downloaded_xml: self.downloaded_xml.load(Ordering::SeqCst),
        }
    }
}

/// Progress notifications emitted by a harvest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The first listing page reported the total record count.
    ListingSized {
        /// Total records matching the filters.
        records: u64,
        /// Pages that will be requested.
        pages: u64,
    },
    /// A listing page was fetched and its tasks are about to be dispatched.
    PageFetched {
        /// Page number (1-based).
        page: u64,
        /// Total pages.
        total_pages: u64,
        /// Rows on this page.
        rows: usize,
        /// Download tasks derived from those rows.
        tasks: usize,
    },
    /// One transfer finished.
    TaskFinished {
        /// Artifact kind.
        kind: DocumentKind,
        /// Whether the file was written.
        succeeded: bool,
        /// Counters right after this task was recorded.
        snapshot: CounterSnapshot,
    },
}

/// Receives progress events; implemented by the presentation layer.
pub trait ProgressObserver: Send + Sync {
    /// Called for every event. Runs on the emitting task; keep it short.
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}
