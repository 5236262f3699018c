//! Human-readable run summaries printed to stdout.

use std::path::Path;

use harvester_core::HarvestReport;

pub(crate) fn render_harvest_summary(report: &HarvestReport, output_dir: &Path) -> Vec<String> {
    let counters = &report.counters;
    let mut lines = vec![
        format!(
            "Listed {} documents on {} pages",
            report.records, report.pages
        ),
        format!(
            "Found: {} PDF, {} XML",
            counters.found_pdf, counters.found_xml
        ),
        format!(
            "Downloaded: {} PDF, {} XML ({} files)",
            counters.downloaded_pdf, counters.downloaded_xml, counters.downloaded_ok
        ),
    ];
    if counters.downloaded_failed > 0 {
        lines.push(format!("Failed: {}", counters.downloaded_failed));
    }
    if report.cancelled {
        lines.push("Interrupted: remaining documents were not downloaded".to_string());
    }
    lines.push(format!("Saved to: {}", output_dir.display()));
    lines
}

pub(crate) fn print_harvest_summary(report: &HarvestReport, output_dir: &Path) {
    for line in render_harvest_summary(report, output_dir) {
        println!("{line}");
    }
}

pub(crate) fn print_export_summary(rows: usize, path: &Path) {
    println!("Exported {rows} documents to {}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::CounterSnapshot;

    fn report(failed: usize, cancelled: bool) -> HarvestReport {
        HarvestReport {
            counters: CounterSnapshot {
                found_pdf: 25,
                found_xml: 25,
                downloaded_ok: 50 - failed,
                downloaded_failed: failed,
                downloaded_pdf: 25,
                downloaded_xml: 25 - failed,
            },
            records: 25,
            pages: 3,
            listing_requests: 3,
            tasks_dispatched: 50,
            cancelled,
        }
    }

    #[test]
    fn test_summary_clean_run() {
        let lines = render_harvest_summary(&report(0, false), Path::new("/tmp/out"));
        assert_eq!(
            lines,
            vec![
                "Listed 25 documents on 3 pages",
                "Found: 25 PDF, 25 XML",
                "Downloaded: 25 PDF, 25 XML (50 files)",
                "Saved to: /tmp/out",
            ]
        );
    }

    #[test]
    fn test_summary_reports_failures_and_interruption() {
        let lines = render_harvest_summary(&report(2, true), Path::new("/tmp/out"));
        assert!(lines.contains(&"Failed: 2".to_string()));
        assert!(lines.iter().any(|line| line.starts_with("Interrupted")));
    }
}
