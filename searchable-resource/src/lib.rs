//! # searchable-resource
//!
//! Declarative request-to-query builder for list endpoints.
//!
//! Request parameters go in; a filtered, ordered, optionally paginated result
//! comes out, wrapped in a uniform envelope:
//!
//! ```json
//! {
//!   "data": [...],
//!   "query": { "search": "ada", "order_by": "id", "sort": "desc", "page": 1, "per_page": 25 },
//!   "options": { "sort": ["asc", "desc"], "order_by": ["id", "name"], "per_page": [10, 25, 50, 100] },
//!   "pagination": { "current_page": 1, "per_page": 25, "total": 3, "isFirstPage": true, "isLastPage": true, ... }
//! }
//! ```
//!
//! ## Features
//!
//! - **Filter units**: small [`Filter`](filter::Filter) types bind request fields to
//!   predicates and contribute validation rules and option lists
//! - **Validation**: rules for every applicable filter plus the reserved
//!   `search`, `sort`, `order_by`, `page` and `per_page` parameters; failures
//!   become a 422 before any query runs
//! - **Engines**: an in-memory engine for tests and fixtures, and a PostgreSQL
//!   engine behind the `database` feature
//! - **HTTP**: axum extractor and `IntoResponse` impls behind the default `http` feature
//!
//! ## Example
//!
//! ```rust
//! use searchable_resource::prelude::*;
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let engine = MemoryEngine::from_values(vec![
//!     json!({"id": 1, "name": "Ada", "email": "ada@test.com"}),
//!     json!({"id": 2, "name": "Grace", "email": "grace@test.com"}),
//! ]);
//!
//! let response = SearchableBuilder::new(&engine)
//!     .query(SearchFilter::new(["name", "email"]))?
//!     .orderable(["id", "name"])
//!     .paginate(25)
//!     .execute(&RequestParams::parse("search=grace&order_by=name"))
//!     .await?;
//!
//! assert_eq!(response.data.len(), 1);
//! assert_eq!(response.query["search"], "grace");
//! # Ok::<(), searchable_resource::Error>(())
//! # }).unwrap();
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod filter;
pub mod observability;
pub mod options;
pub mod params;
pub mod query;
pub mod registry;
pub mod response;
pub mod responses;
pub mod validation;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "database")]
pub mod database;

pub use error::{ConfigurationError, Error, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::builder::{CompiledQuery, PaginationMode, SearchableBuilder, Stage};
    pub use crate::config::{Config, DatabaseConfig};
    pub use crate::error::{ConfigurationError, Error, ErrorResponse, Result};
    pub use crate::filter::{CallbackFilter, EqualsFilter, Filter, SearchFilter};
    pub use crate::observability::init_tracing;
    pub use crate::options::{FormatOptions, OptionSet, OptionsFormatter};
    pub use crate::params::{ParameterBag, RequestParams};
    pub use crate::query::{
        FilterCondition, FilterOperator, FilterValue, MemoryEngine, Page, PageRequest, Predicate,
        Query, QueryEngine, QueryError, QueryErrorKind, QueryResult, Row, SortDirection,
    };
    pub use crate::registry::{Registry, Resource};
    pub use crate::response::{PaginationMeta, SearchableResponse};
    pub use crate::responses::ValidationError;
    pub use crate::validation::{Rule, RuleSet, Validate, Validator};

    #[cfg(feature = "database")]
    pub use crate::database::PgEngine;
}
