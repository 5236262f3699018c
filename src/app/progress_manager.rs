//! Progress UI (indicatif bar) for harvest runs.

use std::time::Duration;

use harvester_core::{CounterSnapshot, ProgressEvent, ProgressObserver};
use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner} [{bar:30}] {pos}/{len} {msg}";

/// Renders harvest events on stderr. Does nothing when disabled.
pub(crate) struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub(crate) fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { bar: None };
        }
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message("listing documents...");
        bar.enable_steady_tick(Duration::from_millis(100));
        Self::with_bar(bar)
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self { bar: Some(bar) }
    }

    pub(crate) fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl ProgressObserver for ProgressReporter {
    fn on_event(&self, event: &ProgressEvent) {
        let Some(bar) = &self.bar else {
            return;
        };
        match event {
            ProgressEvent::ListingSized { records, pages } => {
                bar.set_message(format!("{records} documents on {pages} pages"));
            }
            ProgressEvent::PageFetched {
                page,
                total_pages,
                tasks,
                ..
            } => {
                bar.inc_length(*tasks as u64);
                bar.set_message(format!("page {page}/{total_pages}"));
            }
            ProgressEvent::TaskFinished { snapshot, .. } => {
                bar.inc(1);
                bar.set_message(status_line(snapshot));
            }
        }
    }
}

pub(crate) fn status_line(snapshot: &CounterSnapshot) -> String {
    format!(
        "ok {} | failed {} | found PDF {} XML {}",
        snapshot.downloaded_ok, snapshot.downloaded_failed, snapshot.found_pdf, snapshot.found_xml
    )
}
