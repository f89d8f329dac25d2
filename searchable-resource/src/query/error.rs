//! Query execution errors
//!
//! Structured errors raised by [`QueryEngine`](super::QueryEngine)
//! implementations, carrying the operation that failed and a category.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::query::{QueryError, QueryErrorKind, QueryOperation};
//!
//! let error = QueryError::timeout(QueryOperation::Paginate, "statement timeout");
//! assert!(matches!(error.kind, QueryErrorKind::Timeout));
//! assert!(error.is_retriable());
//! ```

use std::fmt;

/// Operation being performed when the error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryOperation {
    /// Fetching every matching row
    Fetch,
    /// Fetching one page of rows
    Paginate,
    /// Counting matching rows
    Count,
    /// Translating a query into engine-native form
    Compile,
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => write!(f, "fetch"),
            Self::Paginate => write!(f, "paginate"),
            Self::Count => write!(f, "count"),
            Self::Compile => write!(f, "compile"),
        }
    }
}

/// Category of query error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    /// Failed to reach the backing store
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// The query cannot be expressed by this engine (bad identifier, unsupported predicate)
    InvalidQuery,
    /// Underlying database error
    DatabaseError,
    /// Row decoding failed
    SerializationError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::InvalidQuery => write!(f, "invalid_query"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::SerializationError => write!(f, "serialization_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured query error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    /// The operation being performed when the error occurred
    pub operation: QueryOperation,
    /// The category of error
    pub kind: QueryErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl QueryError {
    /// Create a new query error
    pub fn new(operation: QueryOperation, kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
        }
    }

    /// The query cannot be expressed by the engine
    pub fn invalid_query(operation: QueryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, QueryErrorKind::InvalidQuery, message)
    }

    /// Could not reach the backing store
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::new(QueryOperation::Fetch, QueryErrorKind::ConnectionFailed, message)
    }

    /// Operation timed out
    pub fn timeout(operation: QueryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, QueryErrorKind::Timeout, message)
    }

    /// Underlying database failure
    pub fn database_error(operation: QueryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, QueryErrorKind::DatabaseError, message)
    }

    /// Row decoding failure
    pub fn serialization_error(operation: QueryOperation, message: impl Into<String>) -> Self {
        Self::new(operation, QueryErrorKind::SerializationError, message)
    }

    /// Set the operation that caused the error
    #[must_use]
    pub fn with_operation(mut self, operation: QueryOperation) -> Self {
        self.operation = operation;
        self
    }

    /// Whether the error is transient and the request may succeed on retry
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            QueryErrorKind::ConnectionFailed | QueryErrorKind::Timeout
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Query {} error during {}: {}",
            self.kind, self.operation, self.message
        )
    }
}

impl std::error::Error for QueryError {}

#[cfg(feature = "database")]
impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::Error as E;
        match err {
            E::PoolTimedOut => Self::timeout(QueryOperation::Fetch, "Connection pool timed out"),
            E::PoolClosed => Self::connection_failed("Connection pool is closed"),
            E::Io(e) => Self::connection_failed(e.to_string()),
            E::Tls(e) => Self::connection_failed(format!("TLS error: {e}")),
            E::ColumnDecode { index, source } => Self::serialization_error(
                QueryOperation::Fetch,
                format!("Failed to decode column {index}: {source}"),
            ),
            E::Decode(e) => Self::serialization_error(QueryOperation::Fetch, e.to_string()),
            E::Database(e) => {
                // 57014 is query_canceled, raised by statement_timeout
                if e.code().as_deref() == Some("57014") {
                    Self::timeout(QueryOperation::Fetch, e.message())
                } else {
                    Self::database_error(QueryOperation::Fetch, e.message())
                }
            }
            other => Self::database_error(QueryOperation::Fetch, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_display() {
        assert_eq!(QueryOperation::Fetch.to_string(), "fetch");
        assert_eq!(QueryOperation::Paginate.to_string(), "paginate");
        assert_eq!(QueryOperation::Count.to_string(), "count");
        assert_eq!(QueryOperation::Compile.to_string(), "compile");
    }

    #[test]
    fn test_error_display() {
        let error = QueryError::invalid_query(QueryOperation::Compile, "bad column");
        assert_eq!(
            error.to_string(),
            "Query invalid_query error during compile: bad column"
        );
    }

    #[test]
    fn test_retriable_kinds() {
        assert!(QueryError::connection_failed("refused").is_retriable());
        assert!(!QueryError::database_error(QueryOperation::Count, "syntax").is_retriable());
    }

    #[test]
    fn test_with_operation() {
        let error = QueryError::connection_failed("reset").with_operation(QueryOperation::Count);
        assert_eq!(error.operation, QueryOperation::Count);
        assert_eq!(error.kind, QueryErrorKind::ConnectionFailed);
    }
}
