//! Cookie-backed HTTP session shared by every portal request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderValue, ORIGIN, REFERER};
use reqwest::{Client, Response};
use tracing::{debug, info, instrument, warn};

use super::{Credentials, HttpSettings, LoginPolicy, PORTAL_USER_AGENT, PortalEndpoints, PortalError};

const X_REQUESTED_WITH: &str = "x-requested-with";

/// Authenticated (or about to be) portal session.
///
/// Cheap to clone: clones share the underlying `reqwest::Client`, its
/// connection pool, and the cookie jar, so concurrent download tasks all use
/// the login cookies set by [`authenticate`](Self::authenticate).
#[derive(Debug, Clone)]
pub struct PortalSession {
    client: Client,
    endpoints: Arc<PortalEndpoints>,
}

impl PortalSession {
    /// Builds the shared HTTP client for a run.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(endpoints), fields(login = %endpoints.login()))]
    pub fn new(endpoints: PortalEndpoints, settings: &HttpSettings) -> Result<Self, PortalError> {
        if !settings.verify_tls {
            warn!(
                host = endpoints.login().host_str().unwrap_or_default(),
                "TLS certificate verification is DISABLED; responses from the portal cannot be authenticated"
            );
        }

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.read_timeout_secs))
            .gzip(true)
            .user_agent(PORTAL_USER_AGENT)
            .cookie_provider(jar)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|source| PortalError::ClientBuild { source })?;

        debug!(
            connect_timeout_secs = settings.connect_timeout_secs,
            read_timeout_secs = settings.read_timeout_secs,
            verify_tls = settings.verify_tls,
            "portal session created"
        );

        Ok(Self {
            client,
            endpoints: Arc::new(endpoints),
        })
    }

    /// Returns the endpoints this session talks to.
    #[must_use]
    pub fn endpoints(&self) -> &PortalEndpoints {
        &self.endpoints
    }

    /// Logs in with one form POST; the portal answers with session cookies.
    ///
    /// There is no retry. A non-success status is handled according to
    /// `policy`.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::Transport`] if the request cannot be sent, and
    /// [`PortalError::LoginRejected`] for a non-success status under
    /// [`LoginPolicy::Abort`].
    #[instrument(skip(self, credentials), fields(url = %self.endpoints.login()))]
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
        policy: LoginPolicy,
    ) -> Result<(), PortalError> {
        let url = self.endpoints.login().clone();
        let response = self.post_form(url.as_str(), &credentials.form_fields()).await?;
        let status = response.status();

        if status.is_success() {
            info!(status = status.as_u16(), "logged in to portal");
            return Ok(());
        }

        match policy {
            LoginPolicy::Abort => Err(PortalError::LoginRejected {
                url: url.to_string(),
                status: status.as_u16(),
            }),
            LoginPolicy::Continue => {
                warn!(
                    status = status.as_u16(),
                    login_failure = policy.as_str(),
                    "portal login rejected; continuing without a session"
                );
                Ok(())
            }
        }
    }

    /// Sends a form-encoded POST with the portal's AJAX headers.
    pub(crate) async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        fields: &T,
    ) -> Result<Response, PortalError> {
        self.client
            .post(url)
            .headers(self.ajax_headers())
            .form(fields)
            .send()
            .await
            .map_err(|source| PortalError::transport(url, source))
    }

    /// Sends a plain GET for a document link.
    pub(crate) async fn get(&self, url: &str) -> Result<Response, reqwest::Error> {
        self.client.get(url).send().await
    }

    fn ajax_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUESTED_WITH, HeaderValue::from_static("XMLHttpRequest"));
        if let Ok(origin) = HeaderValue::from_str(&self.endpoints.origin()) {
            headers.insert(ORIGIN, origin);
        }
        if let Some(referer) = self.endpoints.referer()
            && let Ok(value) = HeaderValue::from_str(referer.as_str())
        {
            headers.insert(REFERER, value);
        }
        headers
    }
}
