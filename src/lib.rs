//! Harvester Core Library
//!
//! Logs into an electronic invoicing portal, pages through its document
//! listing for a date range, and downloads each document's PDF and XML
//! renditions concurrently into a local directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`portal`] - HTTP session, endpoints, credentials and login
//! - [`listing`] - Query validation, listing rows and page traversal
//! - [`download`] - Row-to-task mapping, bounded download pool, run counters
//! - [`harvest`] - Listing traversal wired to the download pool
//! - [`export`] - CSV spreadsheet of listing rows
//! - [`gate`] - Startup access checks (open, trial, signed license)
//! - [`cancel`] - Cooperative cancellation token

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod download;
pub mod export;
pub mod gate;
pub mod harvest;
pub mod listing;
pub mod portal;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use download::{
    CounterSnapshot, DEFAULT_POOL_SIZE, DocumentKind, DownloadTask, Downloader, EngineError,
    KindToggles, NoopObserver, ProgressEvent, ProgressObserver, RunCounters, resolve,
};
pub use export::{ExportError, export_rows};
pub use gate::{AccessGate, GateDecision, GateError, OpenGate, SignedLicenseGate, TrialGate};
pub use harvest::{HarvestError, HarvestOptions, HarvestReport, harvest};
pub use listing::{DocumentRow, ListingFilters, PageCursor, PageQuery, QueryError, fetch_all_rows};
pub use portal::{Credentials, HttpSettings, LoginPolicy, PortalEndpoints, PortalError, PortalSession};
