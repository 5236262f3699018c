//! Error types for portal session and login operations.

use thiserror::Error;

/// Errors raised while building the portal session or logging in.
#[derive(Debug, Error)]
pub enum PortalError {
    /// The HTTP client could not be built from the configured settings.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// A configured endpoint is not a valid absolute URL.
    #[error("invalid {name} URL: {value}")]
    InvalidEndpoint {
        /// Which endpoint was rejected (login, listing, base).
        name: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Network-level failure talking to the portal.
    #[error("network error calling {url}: {source}")]
    Transport {
        /// The URL being requested.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The login endpoint answered with a non-success status.
    #[error("portal login rejected (HTTP {status}) at {url}")]
    LoginRejected {
        /// The login URL.
        url: String,
        /// HTTP status returned by the portal.
        status: u16,
    },
}

impl PortalError {
    /// Creates a transport error.
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(name: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            name,
            value: value.into(),
        }
    }
}
