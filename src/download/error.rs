//! Why a single document could not be saved.
//!
//! Produced inside a worker, logged at `warn!` and counted as
//! `downloaded_failed`. It never leaves the worker.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of one PDF or XML fetch.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The document link could not be fetched: refused connection, DNS,
    /// TLS, or the body stream broke off.
    #[error("cannot fetch {url}: {source}")]
    Network {
        /// Document link.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The portal did not answer within `read_timeout_secs`.
    #[error("portal timed out serving {url}")]
    Timeout {
        /// Document link.
        url: String,
    },

    /// The portal answered, but not with 200. Redirects and 2xx other than
    /// 200 land here too.
    #[error("portal answered HTTP {status} for {url}")]
    HttpStatus {
        /// Document link.
        url: String,
        /// Status returned instead of 200.
        status: u16,
    },

    /// The body arrived but could not be written into the output directory.
    #[error("cannot save {path}: {source}")]
    Io {
        /// Destination `{series}-{number}.{ext}` file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Classifies a reqwest failure; timeouts get their own variant.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
