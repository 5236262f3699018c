//! Portal session: shared HTTP client, endpoints, and login.
//!
//! The portal keeps its authentication state in cookies, so one
//! [`PortalSession`] is created per run and cloned into every listing and
//! download request. Clones share the same connection pool and cookie jar.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::portal::{Credentials, HttpSettings, LoginPolicy, PortalEndpoints, PortalSession};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoints = PortalEndpoints::new(
//!     "https://portal.example/factura/BL/BL_principal.php",
//!     "https://portal.example/factura/BL/BL_principal2.php",
//!     "https://portal.example/factura/BL/",
//!     None,
//! )?;
//! let session = PortalSession::new(endpoints, &HttpSettings::default())?;
//! let credentials = Credentials::new("20100000001", "user@example.com", "secret");
//! session.authenticate(&credentials, LoginPolicy::Abort).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod session;

use std::fmt;

use url::Url;

pub use error::PortalError;
pub use session::PortalSession;

/// Default HTTP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 15;

/// Default whole-request timeout in seconds.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 30;

/// Browser User-Agent; the portal serves its AJAX endpoints to browsers only.
pub const PORTAL_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// The three portal URLs a run talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalEndpoints {
    login: Url,
    listing: Url,
    base: Url,
    referer: Option<Url>,
}

impl PortalEndpoints {
    /// Parses and validates the portal endpoints.
    ///
    /// `base` is the prefix for root-relative document links and always ends
    /// with `/` after normalization.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidEndpoint`] when any value is not an
    /// absolute `http`/`https` URL.
    pub fn new(
        login: &str,
        listing: &str,
        base: &str,
        referer: Option<&str>,
    ) -> Result<Self, PortalError> {
        let login = parse_http_url("login", login)?;
        let listing = parse_http_url("listing", listing)?;
        let mut base = parse_http_url("base", base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let referer = referer
            .map(|value| parse_http_url("referer", value))
            .transpose()?;
        Ok(Self {
            login,
            listing,
            base,
            referer,
        })
    }

    /// Login endpoint (form POST).
    #[must_use]
    pub fn login(&self) -> &Url {
        &self.login
    }

    /// Listing endpoint (form POST returning the JSON envelope).
    #[must_use]
    pub fn listing(&self) -> &Url {
        &self.listing
    }

    /// Base URL for root-relative document links, always ending in `/`.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Referer sent with POST requests, if configured.
    #[must_use]
    pub fn referer(&self) -> Option<&Url> {
        self.referer.as_ref()
    }

    /// Origin header value derived from the login URL (`scheme://host[:port]`).
    #[must_use]
    pub fn origin(&self) -> String {
        self.login.origin().ascii_serialization()
    }
}

fn parse_http_url(name: &'static str, value: &str) -> Result<Url, PortalError> {
    let parsed = Url::parse(value.trim())
        .map_err(|_| PortalError::invalid_endpoint(name, value.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PortalError::invalid_endpoint(name, value.to_string()));
    }
    Ok(parsed)
}

/// Login credentials for the portal's `mdlaccess` module.
#[derive(Clone)]
pub struct Credentials {
    ruc: String,
    login: String,
    password: String,
}

impl Credentials {
    /// Creates credentials from the company RUC, user login, and password.
    pub fn new(ruc: impl Into<String>, login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ruc: ruc.into(),
            login: login.into(),
            password: password.into(),
        }
    }

    /// Form fields for the login POST, in the order the portal's page sends them.
    pub(crate) fn form_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("module", "mdlaccess"),
            ("fruc", self.ruc.as_str()),
            ("flogin", self.login.as_str()),
            ("fclave", self.password.as_str()),
        ]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("ruc", &self.ruc)
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// HTTP client settings shared by login, listing, and download requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds.
    pub read_timeout_secs: u64,
    /// Verify the server's TLS certificate. Turning this off is logged loudly.
    pub verify_tls: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            read_timeout_secs: DEFAULT_READ_TIMEOUT_SECS,
            verify_tls: true,
        }
    }
}

/// What to do when the login endpoint answers with a non-success status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoginPolicy {
    /// Stop the run with [`PortalError::LoginRejected`].
    #[default]
    Abort,
    /// Log a warning and keep going; later requests fail on their own.
    Continue,
}

impl LoginPolicy {
    /// Stable config label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::Continue => "continue",
        }
    }
}
