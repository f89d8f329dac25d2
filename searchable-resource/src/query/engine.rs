//! Query engine trait
//!
//! The builder never talks to a store directly: it hands the compiled
//! [`Query`] to a [`QueryEngine`], which returns JSON rows. This keeps the
//! compile phase (validation, filter application, ordering) independent of
//! the backing store.
//!
//! Uses RPITIT (return position `impl Trait` in traits), so implementations
//! write plain `async fn`s.
//!
//! # Example
//!
//! ```rust,ignore
//! use searchable_resource::query::{Page, PageRequest, Query, QueryEngine, QueryResult, Row};
//!
//! struct ApiEngine { client: Client }
//!
//! impl QueryEngine for ApiEngine {
//!     async fn fetch(&self, query: &Query) -> QueryResult<Vec<Row>> {
//!         self.client.search(query).await.map_err(Into::into)
//!     }
//!
//!     async fn paginate(&self, query: &Query, request: PageRequest) -> QueryResult<Page> {
//!         self.client.search_page(query, request).await.map_err(Into::into)
//!     }
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::error::QueryError;
use super::handle::Query;

/// A single result row
pub type Row = Map<String, Value>;

/// Result type for engine operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Which page to fetch, and whether to count the full result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number
    pub page: u64,
    /// Items per page
    pub per_page: u64,
    /// Whether the engine should compute the total row count
    pub with_total: bool,
}

impl PageRequest {
    /// Length-aware page request (counts the total)
    ///
    /// Page numbers below 1 are treated as the first page, and a zero page size as one.
    ///
    /// ```rust
    /// use searchable_resource::query::PageRequest;
    ///
    /// let request = PageRequest::new(3, 20);
    /// assert_eq!(request.offset(), 40);
    /// assert_eq!(request.limit(), 20);
    /// assert!(request.with_total);
    ///
    /// assert_eq!(PageRequest::new(0, 20).page, 1);
    /// ```
    pub const fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: if page == 0 { 1 } else { page },
            per_page: if per_page == 0 { 1 } else { per_page },
            with_total: true,
        }
    }

    /// Simple page request (no total count)
    pub const fn simple(page: u64, per_page: u64) -> Self {
        let request = Self::new(page, per_page);
        Self {
            with_total: false,
            ..request
        }
    }

    /// Number of rows to skip
    pub const fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Maximum rows to return
    pub const fn limit(&self) -> u64 {
        self.per_page
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Rows on this page
    pub items: Vec<Row>,
    /// 1-based page number
    pub current_page: u64,
    /// Requested page size
    pub per_page: u64,
    /// Total matching rows, when the page was length-aware
    pub total: Option<u64>,
    /// Whether rows exist past this page (known even without a total)
    pub has_more: bool,
}

impl Page {
    /// Last page number; `None` without a total
    ///
    /// An empty result set still has one (empty) page.
    pub fn last_page(&self) -> Option<u64> {
        self.total
            .map(|total| total.div_ceil(self.per_page.max(1)).max(1))
    }

    /// 1-based index of the first row on this page; `None` when empty
    pub fn from(&self) -> Option<u64> {
        if self.items.is_empty() {
            None
        } else {
            Some((self.current_page - 1) * self.per_page + 1)
        }
    }

    /// 1-based index of the last row on this page; `None` when empty
    pub fn to(&self) -> Option<u64> {
        self.from()
            .map(|from| from + self.items.len() as u64 - 1)
    }

    /// Whether this is the first page
    pub fn is_first_page(&self) -> bool {
        self.current_page == 1
    }

    /// Whether this is the last page; `None` when the total is unknown
    pub fn is_last_page(&self) -> Option<bool> {
        self.last_page()
            .map(|last| self.current_page == last)
    }
}

/// Backing store that executes compiled queries
pub trait QueryEngine: Send + Sync {
    /// Fetch every row matching the query, in order
    fn fetch(&self, query: &Query) -> impl Future<Output = QueryResult<Vec<Row>>> + Send;

    /// Fetch one page of rows matching the query
    fn paginate(
        &self,
        query: &Query,
        request: PageRequest,
    ) -> impl Future<Output = QueryResult<Page>> + Send;
}

impl<E: QueryEngine> QueryEngine for &E {
    fn fetch(&self, query: &Query) -> impl Future<Output = QueryResult<Vec<Row>>> + Send {
        (**self).fetch(query)
    }

    fn paginate(
        &self,
        query: &Query,
        request: PageRequest,
    ) -> impl Future<Output = QueryResult<Page>> + Send {
        (**self).paginate(query, request)
    }
}

impl<E: QueryEngine> QueryEngine for Arc<E> {
    fn fetch(&self, query: &Query) -> impl Future<Output = QueryResult<Vec<Row>>> + Send {
        (**self).fetch(query)
    }

    fn paginate(
        &self,
        query: &Query,
        request: PageRequest,
    ) -> impl Future<Output = QueryResult<Page>> + Send {
        (**self).paginate(query, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                let mut row = Row::new();
                row.insert("id".into(), json!(i));
                row
            })
            .collect()
    }

    fn page(current_page: u64, per_page: u64, items: usize, total: Option<u64>) -> Page {
        Page {
            items: rows(items),
            current_page,
            per_page,
            total,
            has_more: false,
        }
    }

    #[test]
    fn test_page_request_offsets() {
        assert_eq!(PageRequest::new(1, 10).offset(), 0);
        assert_eq!(PageRequest::new(2, 4).offset(), 4);
        assert!(!PageRequest::simple(2, 4).with_total);
        assert_eq!(PageRequest::new(1, 0).per_page, 1);
    }

    #[test]
    fn test_first_of_two_pages() {
        let page = page(1, 4, 4, Some(6));
        assert_eq!(page.from(), Some(1));
        assert_eq!(page.to(), Some(4));
        assert_eq!(page.last_page(), Some(2));
        assert!(page.is_first_page());
        assert_eq!(page.is_last_page(), Some(false));
    }

    #[test]
    fn test_second_of_two_pages() {
        let page = page(2, 4, 2, Some(6));
        assert_eq!(page.from(), Some(5));
        assert_eq!(page.to(), Some(6));
        assert!(!page.is_first_page());
        assert_eq!(page.is_last_page(), Some(true));
    }

    #[test]
    fn test_empty_result_is_single_last_page() {
        let page = page(1, 10, 0, Some(0));
        assert_eq!(page.from(), None);
        assert_eq!(page.to(), None);
        assert_eq!(page.last_page(), Some(1));
        assert_eq!(page.is_last_page(), Some(true));
    }

    #[test]
    fn test_page_past_the_end_is_not_last() {
        let page = page(5, 4, 0, Some(6));
        assert_eq!(page.last_page(), Some(2));
        assert_eq!(page.is_last_page(), Some(false));
        assert!(!page.is_first_page());
    }

    #[test]
    fn test_simple_page_has_unknown_last_page() {
        let page = page(3, 10, 10, None);
        assert_eq!(page.last_page(), None);
        assert_eq!(page.is_last_page(), None);
        assert_eq!(page.from(), Some(21));
    }
}
