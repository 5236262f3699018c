//! Errors for a single listing page request.

use thiserror::Error;

use crate::portal::PortalError;

/// Why one listing page produced no rows.
///
/// These never stop a traversal; the cursor logs them and treats the page as
/// empty.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The request could not be sent or the body could not be read.
    #[error(transparent)]
    Transport(#[from] PortalError),

    /// The listing endpoint answered with a non-success status.
    #[error("listing page {page} returned HTTP {status}")]
    HttpStatus {
        /// Page that was requested.
        page: u32,
        /// HTTP status code.
        status: u16,
    },

    /// The body was not the expected `{records, rows}` JSON envelope.
    #[error("listing page {page} is not a valid JSON envelope: {source}")]
    Envelope {
        /// Page that was requested.
        page: u32,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },
}
