//! Listing filters and the paginated query sent to the listing endpoint.

use chrono::NaiveDate;
use thiserror::Error;

/// Date format used by the portal's filter form.
pub const PORTAL_DATE_FORMAT: &str = "%d/%m/%Y";

/// Default number of rows requested per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Largest page size accepted.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Input validation errors, raised before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// A required date was empty.
    #[error("missing {field} date: both start and end dates are required")]
    MissingDate {
        /// "start" or "end".
        field: &'static str,
    },

    /// A date did not match `dd/mm/yyyy`.
    #[error("invalid {field} date '{value}': expected dd/mm/yyyy")]
    InvalidDate {
        /// "start" or "end".
        field: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Start date is after end date.
    #[error("start date {start} is after end date {end}")]
    DateRangeReversed {
        /// Start date as entered.
        start: String,
        /// End date as entered.
        end: String,
    },

    /// Page size outside `1..=MAX_PAGE_SIZE`.
    #[error("invalid page size {value}: must be between 1 and {MAX_PAGE_SIZE}")]
    InvalidPageSize {
        /// The rejected value.
        value: u32,
    },
}

/// Filter fields held constant for a whole listing traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingFilters {
    start: NaiveDate,
    end: NaiveDate,
    series: String,
    ruc: String,
    number_from: String,
    number_to: String,
}

impl ListingFilters {
    /// Validates a `dd/mm/yyyy` date range. Both dates are required.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for empty, malformed, or reversed dates.
    pub fn new(start: &str, end: &str) -> Result<Self, QueryError> {
        let start_date = parse_date("start", start)?;
        let end_date = parse_date("end", end)?;
        if start_date > end_date {
            return Err(QueryError::DateRangeReversed {
                start: start.trim().to_string(),
                end: end.trim().to_string(),
            });
        }
        Ok(Self {
            start: start_date,
            end: end_date,
            series: String::new(),
            ruc: String::new(),
            number_from: String::new(),
            number_to: String::new(),
        })
    }

    /// Restricts the listing to one document series (e.g. `F001`).
    #[must_use]
    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series = series.into().trim().to_string();
        self
    }

    /// Restricts the listing to one customer tax id.
    #[must_use]
    pub fn with_ruc(mut self, ruc: impl Into<String>) -> Self {
        self.ruc = ruc.into().trim().to_string();
        self
    }

    /// Restricts the listing to a document-number range; empty bounds are open.
    #[must_use]
    pub fn with_number_range(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.number_from = from.into().trim().to_string();
        self.number_to = to.into().trim().to_string();
        self
    }

    /// Start of the emission-date range.
    #[must_use]
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// End of the emission-date range.
    #[must_use]
    pub fn end(&self) -> NaiveDate {
        self.end
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, QueryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(QueryError::MissingDate { field });
    }
    NaiveDate::parse_from_str(trimmed, PORTAL_DATE_FORMAT).map_err(|_| QueryError::InvalidDate {
        field,
        value: trimmed.to_string(),
    })
}

/// Mutable request state for one traversal: page number, page size, filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    page: u32,
    page_size: u32,
    filters: ListingFilters,
}

impl PageQuery {
    /// Creates a query positioned at page 1.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidPageSize`] if `page_size` is 0 or above
    /// [`MAX_PAGE_SIZE`].
    pub fn new(filters: ListingFilters, page_size: u32) -> Result<Self, QueryError> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(QueryError::InvalidPageSize { value: page_size });
        }
        Ok(Self {
            page: 1,
            page_size,
            filters,
        })
    }

    /// Current page number (1-based).
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Rows per page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Filters for this traversal.
    #[must_use]
    pub fn filters(&self) -> &ListingFilters {
        &self.filters
    }

    /// Moves to another page. The only mutation made during a traversal.
    pub(crate) fn set_page(&mut self, page: u32) {
        self.page = page;
    }

    /// Form fields for the listing POST.
    ///
    /// Filters the portal supports but this client never sets are sent empty.
    #[must_use]
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("pCurrentPage", self.page.to_string()),
            ("pPageSize", self.page_size.to_string()),
            ("order", "f_emision desc".to_string()),
            ("action", "mdlLoadData2".to_string()),
            ("fstart", self.filters.start.format(PORTAL_DATE_FORMAT).to_string()),
            ("fend", self.filters.end.format(PORTAL_DATE_FORMAT).to_string()),
            ("ftipdoc", String::new()),
            ("festado", String::new()),
            ("fserie", self.filters.series.clone()),
            ("fnumDesde", self.filters.number_from.clone()),
            ("fnumHasta", self.filters.number_to.clone()),
            ("fusuario", String::new()),
            ("fruc", self.filters.ruc.clone()),
            ("festacion", String::new()),
        ]
    }
}
