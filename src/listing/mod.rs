//! Paginated listing of portal documents.
//!
//! The listing endpoint takes a form-encoded POST with filter and paging
//! fields and answers with `{"records": int, "rows": [...]}`. [`PageCursor`]
//! walks the pages one at a time; [`fetch_all_rows`] collects them.

mod cursor;
mod error;
mod query;
mod row;

pub use cursor::{PageCursor, fetch_all_rows, page_count};
pub use error::ListingError;
pub use query::{
    DEFAULT_PAGE_SIZE, ListingFilters, MAX_PAGE_SIZE, PORTAL_DATE_FORMAT, PageQuery, QueryError,
};
pub use row::{DocumentRow, ListingEnvelope, MISSING_FIELD};
