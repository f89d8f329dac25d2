//! Query model and execution engines
//!
//! - [`Query`]: the handle filters mutate (predicates, ordering, projection)
//! - [`Predicate`] / [`FilterCondition`]: the constraint tree
//! - [`QueryEngine`]: executes a compiled query and returns JSON rows
//! - [`MemoryEngine`]: evaluates queries over in-memory rows
//! - [`sql`]: compiles queries to PostgreSQL text with positional bindings

pub mod error;
pub mod engine;
pub mod handle;
pub mod memory;
pub mod predicate;
pub mod sql;

pub use engine::{Page, PageRequest, QueryEngine, QueryResult, Row};
pub use error::{QueryError, QueryErrorKind, QueryOperation};
pub use handle::{OrderClause, Query};
pub use memory::MemoryEngine;
pub use predicate::{FilterCondition, FilterOperator, FilterValue, Predicate, SortDirection};
