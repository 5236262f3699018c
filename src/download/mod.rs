//! Document downloads: resolving row links into tasks and running them on a
//! bounded worker pool.
//!
//! - [`resolve`] turns a listing row into zero, one or two [`DownloadTask`]s
//! - [`Downloader`] runs tasks concurrently, at most `pool_size` at a time
//! - [`RunCounters`] tracks found/downloaded totals shared by all workers
//!
//! Files are named `{series}-{number}.{pdf|xml}` and written whole into the
//! output directory, replacing any previous file of the same name.

mod counters;
mod engine;
mod error;
mod task;

pub use counters::{CounterSnapshot, NoopObserver, ProgressEvent, ProgressObserver, RunCounters};
pub use engine::{DEFAULT_POOL_SIZE, DownloadBatch, Downloader, EngineError};
pub use error::DownloadError;
pub use task::{DocumentKind, DownloadTask, FoundLinks, KindToggles, resolve};
