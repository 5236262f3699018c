//! Spreadsheet export of listing rows.
//!
//! Writes a UTF-8 CSV with a header row and one line per row:
//! `Serie-Numero, Fecha, Cliente, Estado, Total`.

use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use thiserror::Error;
use tracing::{info, instrument};

use crate::listing::DocumentRow;

/// Column headers, in order.
pub const EXPORT_HEADERS: [&str; 5] = ["Serie-Numero", "Fecha", "Cliente", "Estado", "Total"];

/// Errors raised while writing the spreadsheet.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The file could not be created or written.
    #[error("cannot write spreadsheet {path}: {source}")]
    Write {
        /// Target file.
        path: PathBuf,
        /// Underlying CSV/IO error.
        #[source]
        source: csv::Error,
    },

    /// Buffered data could not be flushed to disk.
    #[error("cannot flush spreadsheet {path}: {source}")]
    Flush {
        /// Target file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    fn write(path: &Path, source: csv::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes `rows` to `path`, replacing any existing file. Returns the number of
/// data lines written.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be created or written.
#[instrument(skip(rows), fields(path = %path.display(), rows = rows.len()))]
pub fn export_rows(rows: &[DocumentRow], path: &Path) -> Result<usize, ExportError> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|source| ExportError::write(path, source))?;

    writer
        .write_record(EXPORT_HEADERS)
        .map_err(|source| ExportError::write(path, source))?;
    for row in rows {
        writer
            .write_record(export_record(row))
            .map_err(|source| ExportError::write(path, source))?;
    }
    writer.flush().map_err(|source| ExportError::Flush {
        path: path.to_path_buf(),
        source,
    })?;

    info!(rows = rows.len(), "spreadsheet written");
    Ok(rows.len())
}

fn export_record(row: &DocumentRow) -> [String; 5] {
    [
        row.identifier(),
        row.emission_date.clone().unwrap_or_default(),
        row.party_name.clone().unwrap_or_default(),
        row.voided_flag.clone().unwrap_or_default(),
        row.total.map(|total| format!("{total:.2}")).unwrap_or_default(),
    ]
}
