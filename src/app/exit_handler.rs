//! Maps a finished harvest to the process exit outcome.

use harvester_core::HarvestReport;

use crate::ProcessExit;

/// Interrupted runs fail regardless of counts. Otherwise any failure with at
/// least one saved file is partial, and failures with nothing saved are a
/// failure. An empty listing is a success.
pub(crate) fn harvest_outcome(report: &HarvestReport) -> ProcessExit {
    if report.cancelled {
        return ProcessExit::Failure;
    }
    match (report.counters.downloaded_ok, report.counters.downloaded_failed) {
        (_, 0) => ProcessExit::Success,
        (0, _) => ProcessExit::Failure,
        _ => ProcessExit::Partial,
    }
}
