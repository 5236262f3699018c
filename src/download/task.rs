//! Mapping listing rows to download tasks.

use std::fmt;

use url::Url;

use crate::listing::{DocumentRow, MISSING_FIELD};

/// Artifact kind linked from a listing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Printable PDF rendition.
    Pdf,
    /// Signed XML document.
    Xml,
}

impl DocumentKind {
    /// File extension written to disk.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Xml => "xml",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => f.write_str("PDF"),
            Self::Xml => f.write_str("XML"),
        }
    }
}

/// Per-run switches selecting which kinds are downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindToggles {
    /// Download PDF renditions.
    pub pdf: bool,
    /// Download XML documents.
    pub xml: bool,
}

impl Default for KindToggles {
    fn default() -> Self {
        Self {
            pdf: true,
            xml: true,
        }
    }
}

impl KindToggles {
    /// Returns whether `kind` is enabled.
    #[must_use]
    pub fn enabled(self, kind: DocumentKind) -> bool {
        match kind {
            DocumentKind::Pdf => self.pdf,
            DocumentKind::Xml => self.xml,
        }
    }
}

/// One GET to perform and where to store its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Absolute URL of the artifact.
    pub target_url: String,
    /// File name inside the output directory: `{series}-{number}.{ext}`.
    pub destination_filename: String,
    /// Artifact kind.
    pub kind: DocumentKind,
    /// Row identifier `{series}-{number}`, for logging.
    pub identifier: String,
}

/// Which links a row carries, independent of the kind toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoundLinks {
    /// Row has a PDF link.
    pub pdf: bool,
    /// Row has an XML link.
    pub xml: bool,
}

impl FoundLinks {
    /// Inspects a row's links.
    #[must_use]
    pub fn of(row: &DocumentRow) -> Self {
        Self {
            pdf: row.pdf().is_some(),
            xml: row.xml().is_some(),
        }
    }
}

/// Derives the download tasks for one row (zero, one, or two; PDF first).
///
/// Root-relative links (starting with `/`) are joined onto `base_url` with
/// their leading separators removed; other links are used unchanged. The
/// destination name never depends on the URL.
#[must_use]
pub fn resolve(row: &DocumentRow, base_url: &Url, toggles: KindToggles) -> Vec<DownloadTask> {
    let identifier = row.identifier();
    let mut tasks = Vec::with_capacity(2);
    for (kind, link) in [
        (DocumentKind::Pdf, row.pdf()),
        (DocumentKind::Xml, row.xml()),
    ] {
        let Some(link) = link else {
            continue;
        };
        if !toggles.enabled(kind) {
            continue;
        }
        tasks.push(DownloadTask {
            target_url: absolutize(link, base_url),
            destination_filename: destination_filename(row, kind),
            kind,
            identifier: identifier.clone(),
        });
    }
    tasks
}

/// `{series}-{number}.{ext}` as one path component inside the output
/// directory. `..`, path separators and control characters in the row values
/// become `_`.
fn destination_filename(row: &DocumentRow, kind: DocumentKind) -> String {
    let series = file_safe(row.series.as_deref().unwrap_or(MISSING_FIELD));
    let number = file_safe(row.number.as_deref().unwrap_or(MISSING_FIELD));
    format!("{series}-{number}.{}", kind.extension())
}

fn file_safe(part: &str) -> String {
    part.replace("..", "_")
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | '\0' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect()
}

fn absolutize(link: &str, base_url: &Url) -> String {
    if !link.starts_with('/') {
        return link.to_string();
    }
    let base = base_url.as_str();
    let relative = link.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{base}{relative}")
    } else {
        format!("{base}/{relative}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://host/base/").unwrap()
    }

    fn row(pdf: Option<&str>, xml: Option<&str>) -> DocumentRow {
        DocumentRow {
            series: Some("F001".to_string()),
            number: Some("0007".to_string()),
            pdf_link: pdf.map(str::to_string),
            xml_link: xml.map(str::to_string),
            ..DocumentRow::default()
        }
    }

    #[test]
    fn test_resolve_relative_pdf_only() {
        let tasks = resolve(&row(Some("/files/a.pdf"), None), &base(), KindToggles::default());
        assert_eq!(
            tasks,
            vec![DownloadTask {
                target_url: "https://host/base/files/a.pdf".to_string(),
                destination_filename: "F001-0007.pdf".to_string(),
                kind: DocumentKind::Pdf,
                identifier: "F001-0007".to_string(),
            }]
        );
    }

    #[test]
    fn test_resolve_absolute_link_unchanged() {
        let tasks = resolve(
            &row(None, Some("https://cdn.example/x/doc.xml?sig=abc")),
            &base(),
            KindToggles::default(),
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].target_url, "https://cdn.example/x/doc.xml?sig=abc");
        assert_eq!(tasks[0].destination_filename, "F001-0007.xml");
        assert_eq!(tasks[0].kind, DocumentKind::Xml);
    }

    #[test]
    fn test_resolve_both_links_pdf_first() {
        let tasks = resolve(
            &row(Some("/p.pdf"), Some("/x.xml")),
            &base(),
            KindToggles::default(),
        );
        let kinds: Vec<_> = tasks.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![DocumentKind::Pdf, DocumentKind::Xml]);
    }

    #[test]
    fn test_resolve_no_links_yields_nothing() {
        assert!(resolve(&row(None, None), &base(), KindToggles::default()).is_empty());
        assert!(resolve(&row(Some(""), Some("")), &base(), KindToggles::default()).is_empty());
    }

    #[test]
    fn test_resolve_pdf_toggle_off_drops_pdf_tasks() {
        let toggles = KindToggles {
            pdf: false,
            xml: true,
        };
        let tasks = resolve(&row(Some("/p.pdf"), Some("/x.xml")), &base(), toggles);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].kind, DocumentKind::Xml);
    }

    #[test]
    fn test_resolve_both_toggles_off_yields_nothing() {
        let toggles = KindToggles {
            pdf: false,
            xml: false,
        };
        assert!(resolve(&row(Some("/p.pdf"), Some("/x.xml")), &base(), toggles).is_empty());
    }

    #[test]
    fn test_resolve_never_doubles_or_drops_separator() {
        let no_slash = Url::parse("https://host/base").unwrap();
        for base_url in [base(), no_slash] {
            for link in ["/files/a.pdf", "//files/a.pdf"] {
                let tasks = resolve(&row(Some(link), None), &base_url, KindToggles::default());
                let url = &tasks[0].target_url;
                assert!(url.ends_with("/files/a.pdf"), "{url}");
                assert!(!url["https://".len()..].contains("//"), "double slash: {url}");
            }
        }
    }

    #[test]
    fn test_filename_ignores_url_path_and_query() {
        let a = resolve(
            &row(Some("/download.php?id=1&name=other.pdf"), None),
            &base(),
            KindToggles::default(),
        );
        let b = resolve(
            &row(Some("https://elsewhere/zz/renamed.bin"), None),
            &base(),
            KindToggles::default(),
        );
        assert_eq!(a[0].destination_filename, "F001-0007.pdf");
        assert_eq!(b[0].destination_filename, "F001-0007.pdf");
    }

    fn named(series: &str, number: &str) -> DocumentRow {
        DocumentRow {
            series: Some(series.to_string()),
            number: Some(number.to_string()),
            pdf_link: Some("/p.pdf".to_string()),
            ..DocumentRow::default()
        }
    }

    fn pdf_name(row: &DocumentRow) -> String {
        resolve(row, &base(), KindToggles::default())
            .remove(0)
            .destination_filename
    }

    #[test]
    fn test_filename_parent_traversal_stays_in_directory() {
        let name = pdf_name(&named("../x", "1"));
        assert_eq!(name, "__x-1.pdf");
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }

    #[test]
    fn test_filename_absolute_series_stays_in_directory() {
        let name = pdf_name(&named("/abs", "2"));
        assert_eq!(name, "_abs-2.pdf");
        let joined = std::path::Path::new("/out").join(&name);
        assert!(joined.starts_with("/out"), "{}", joined.display());
    }

    #[test]
    fn test_filename_replaces_backslash_and_nul_in_number() {
        assert_eq!(pdf_name(&named("F001", "..\\7\0")), "F001-__7_.pdf");
    }

    #[test]
    fn test_filename_plain_values_unchanged() {
        assert_eq!(pdf_name(&named("B002", "00012")), "B002-00012.pdf");
        let unnamed = DocumentRow {
            pdf_link: Some("/p.pdf".to_string()),
            ..DocumentRow::default()
        };
        assert_eq!(pdf_name(&unnamed), "NA-NA.pdf");
    }

    #[test]
    fn test_found_links_ignores_toggles() {
        let found = FoundLinks::of(&row(Some("/p.pdf"), None));
        assert!(found.pdf);
        assert!(!found.xml);
    }
}
