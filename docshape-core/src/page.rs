//! Pagination arithmetic and paginated result types.
//!
//! A [`Paginator`] is derived from [`PageOptions`] and turns a page request into
//! an offset/limit pair. Once the total number of matching rows is known it also
//! computes the total page count and the previous/next page numbers.
//!
//! # Example
//!
//! ```ignore
//! use docshape::page::{PageOptions, Paginator};
//!
//! let mut paginator = Paginator::new(PageOptions::new(2, 10));
//! paginator.set_offset();
//! assert_eq!(paginator.offset, 10);
//!
//! paginator.set_total_rows(35);
//! assert_eq!(paginator.total_pages, 4);
//! assert_eq!(paginator.prev_page, 1);
//! assert_eq!(paginator.next_page, 3);
//! ```

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::cursor::DocumentCursor;

/// Page used when none (or a page below 1) is requested.
pub const DEFAULT_PAGE_NUMBER: i64 = 1;

/// Rows per page used when none (or a value below 1) is requested.
pub const DEFAULT_PER_PAGE_ROWS: i64 = 20;

/// A page request. Values are normalized by [`Paginator::new`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageOptions {
    /// The requested page (1-indexed).
    pub page: i64,
    /// Rows per page.
    pub per_page: i64,
}

impl PageOptions {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self { page, per_page }
    }
}

/// Pagination state for a result set.
///
/// `offset` is only meaningful for the store request and is not serialized.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Paginator {
    pub current_page: i64,
    pub next_page: i64,
    pub prev_page: i64,
    pub total_pages: i64,
    pub total_rows: i64,
    pub per_page: i64,
    #[serde(skip)]
    pub offset: i64,
}

impl Paginator {
    /// Creates a paginator, normalizing `page <= 1` to the first page and
    /// `per_page < 1` to [`DEFAULT_PER_PAGE_ROWS`].
    pub fn new(options: PageOptions) -> Self {
        Self {
            current_page: if options.page <= 1 { DEFAULT_PAGE_NUMBER } else { options.page },
            per_page: if options.per_page < 1 { DEFAULT_PER_PAGE_ROWS } else { options.per_page },
            next_page: 0,
            prev_page: 0,
            total_pages: 0,
            total_rows: 0,
            offset: 0,
        }
    }

    /// Computes the number of rows to skip for the current page.
    pub fn set_offset(&mut self) {
        if self.current_page == 1 {
            self.offset = 0;
            return;
        }

        self.offset = (self.current_page - 1).saturating_mul(self.per_page);
    }

    /// Computes the total page count from `total_rows`.
    pub fn set_total_pages(&mut self) {
        if self.total_rows == 0 {
            self.total_pages = 0;
            return;
        }

        // Ceiling division without the `rows + per_page - 1` overflow.
        self.total_pages = self.total_rows / self.per_page + i64::from(self.total_rows % self.per_page != 0);
    }

    /// Computes the previous page; `0` on the first page.
    pub fn set_prev_page(&mut self) {
        self.set_total_pages();

        if self.current_page == 1 {
            self.prev_page = 0;
            return;
        }

        self.prev_page = self.current_page - 1;
    }

    /// Computes the next page; stays on the current page when it is the last.
    pub fn set_next_page(&mut self) {
        self.set_total_pages();

        if self.current_page == self.total_pages {
            self.next_page = self.current_page;
        } else {
            self.next_page = self.current_page.saturating_add(1);
        }
    }

    /// Records the total row count and recomputes every derived field.
    pub fn set_total_rows(&mut self, total_rows: i64) {
        self.total_rows = total_rows;
        self.set_total_pages();
        self.set_prev_page();
        self.set_next_page();
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(PageOptions::default())
    }
}

/// A page of a find query: pagination state plus a cursor over the page's documents.
///
/// The caller owns the cursor and should close it once it has been read.
#[derive(Debug)]
pub struct PaginatedResult {
    pub paginator: Paginator,
    pub cursor: DocumentCursor,
}

/// A page of an aggregation: pagination state plus the page's documents.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPaginatedResult {
    pub paginator: Paginator,
    pub data: Vec<Document>,
}
