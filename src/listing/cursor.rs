//! Page-by-page traversal of the listing endpoint.

use tracing::{debug, info, instrument, warn};

use super::error::ListingError;
use super::query::PageQuery;
use super::row::{DocumentRow, ListingEnvelope};
use crate::cancel::CancelToken;
use crate::portal::{PortalError, PortalSession};

/// Number of pages needed for `records` rows at `page_size` rows per page.
///
/// Ceiling division; zero records means zero pages. A zero page size is
/// treated as one row per page.
#[must_use]
pub fn page_count(records: u64, page_size: u32) -> u64 {
    records.div_ceil(u64::from(page_size.max(1)))
}

/// Restartable cursor over every page of one listing query.
///
/// The first [`next_page`](Self::next_page) call requests page 1, learns the
/// total record count from the envelope, and yields page 1's rows. Later
/// calls request pages `2..=total_pages`. A page that fails is yielded as an
/// empty row set and the traversal continues. Cancellation is checked before
/// each request.
#[derive(Debug)]
pub struct PageCursor {
    session: PortalSession,
    query: PageQuery,
    cancel: CancelToken,
    records: Option<u64>,
    total_pages: u64,
    next: u64,
    requests: u64,
}

impl PageCursor {
    /// Creates a cursor positioned before page 1.
    #[must_use]
    pub fn new(session: PortalSession, mut query: PageQuery, cancel: CancelToken) -> Self {
        query.set_page(1);
        Self {
            session,
            query,
            cancel,
            records: None,
            total_pages: 0,
            next: 1,
            requests: 0,
        }
    }

    /// Total records reported by the server, once page 1 has been requested.
    #[must_use]
    pub fn records(&self) -> Option<u64> {
        self.records
    }

    /// Total pages, once page 1 has been requested.
    #[must_use]
    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    /// Listing requests issued so far.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Page number of the most recently yielded page.
    #[must_use]
    pub fn current_page(&self) -> u64 {
        self.next.saturating_sub(1)
    }

    /// Returns the next page's rows, or `None` when the traversal is finished
    /// or cancelled.
    #[instrument(skip(self), fields(page = self.next))]
    pub async fn next_page(&mut self) -> Option<Vec<DocumentRow>> {
        if self.cancel.is_cancelled() {
            debug!("listing traversal cancelled");
            return None;
        }

        if self.records.is_none() {
            let envelope = match self.request_page(1).await {
                Ok(envelope) => envelope,
                Err(error) => {
                    warn!(error = %error, "first listing page failed; treating result as empty");
                    ListingEnvelope::default()
                }
            };
            self.records = Some(envelope.records);
            self.total_pages = page_count(envelope.records, self.query.page_size());
            info!(
                records = envelope.records,
                pages = self.total_pages,
                page_size = self.query.page_size(),
                "listing sized"
            );
            if self.total_pages == 0 {
                return None;
            }
            self.next = 2;
            return Some(envelope.rows);
        }

        if self.next > self.total_pages {
            return None;
        }
        let page = self.next;
        self.next += 1;

        let Ok(page_number) = u32::try_from(page) else {
            warn!(page, "page number out of range; stopping traversal");
            return None;
        };
        match self.request_page(page_number).await {
            Ok(envelope) => Some(envelope.rows),
            Err(error) => {
                warn!(page, error = %error, "listing page failed; continuing with next page");
                Some(Vec::new())
            }
        }
    }

    async fn request_page(&mut self, page: u32) -> Result<ListingEnvelope, ListingError> {
        self.query.set_page(page);
        self.requests += 1;
        let url = self.session.endpoints().listing().to_string();
        debug!(page, total_pages = self.total_pages, "requesting listing page");

        let response = self
            .session
            .post_form(&url, &self.query.form_fields())
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ListingError::HttpStatus {
                page,
                status: status.as_u16(),
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|source| PortalError::transport(url, source))?;
        let envelope: ListingEnvelope = serde_json::from_slice(&body)
            .map_err(|source| ListingError::Envelope { page, source })?;
        debug!(page, rows = envelope.rows.len(), "listing page received");
        Ok(envelope)
    }
}

/// Collects every row of a listing query, in server order.
///
/// A fresh call re-issues all page requests.
#[instrument(skip(session, query, cancel))]
pub async fn fetch_all_rows(
    session: &PortalSession,
    query: &PageQuery,
    cancel: &CancelToken,
) -> Vec<DocumentRow> {
    let mut cursor = PageCursor::new(session.clone(), query.clone(), cancel.clone());
    let mut rows = Vec::new();
    while let Some(page_rows) = cursor.next_page().await {
        rows.extend(page_rows);
    }
    info!(
        rows = rows.len(),
        requests = cursor.requests(),
        "listing traversal complete"
    );
    rows
}
