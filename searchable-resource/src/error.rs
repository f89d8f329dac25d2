//! Error types and HTTP response conversion

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::{QueryError, QueryErrorKind};
use crate::responses::ValidationError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Builder misconfiguration, detected while declaring filters and rules
///
/// These are programmer errors rather than client errors: they surface as
/// HTTP 500 and are logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A filter declared no fields
    #[error("filter `{filter}` declares no fields")]
    NoFields {
        /// Filter type name
        filter: String,
    },

    /// A filter name was not found in the registry
    #[error("no filter registered under `{0}`")]
    UnknownFilter(String),

    /// A resource name was not found in the registry
    #[error("no resource registered under `{0}`")]
    UnknownResource(String),

    /// A rule string could not be parsed
    #[error("invalid rule `{rule}`: {reason}")]
    InvalidRule {
        /// The rule text as written
        rule: String,
        /// Why it was rejected
        reason: String,
    },
}

impl ConfigurationError {
    /// Rule parse failure
    pub fn invalid_rule(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Main error type for searchable list requests
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration loading error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Builder misconfiguration
    #[error("Builder misconfigured: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Request parameters failed validation (422)
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Query execution failed
    #[error("{0}")]
    Execution(#[from] QueryError),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl Error {
    /// HTTP status code this error maps to
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 422,
            Error::Execution(e) if e.kind == QueryErrorKind::Timeout => 504,
            _ => 500,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: u16, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status,
        }
    }

    /// Create error response with a code
    pub fn with_code(status: u16, code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status,
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = self.status_code();
        let body = match self {
            Error::Validation(errors) => return errors.into_response(),

            Error::Config(e) => {
                tracing::error!(error = %e, "Configuration error");
                ErrorResponse::with_code(status, "CONFIG_ERROR", "Service misconfigured")
            }

            Error::Configuration(e) => {
                tracing::error!(error = %e, "Searchable builder misconfigured");
                ErrorResponse::with_code(status, "CONFIGURATION_ERROR", "Service misconfigured")
            }

            Error::Execution(e) => {
                tracing::error!(
                    operation = %e.operation,
                    kind = %e.kind,
                    retriable = e.is_retriable(),
                    "Query error: {}", e.message
                );

                let code = format!("QUERY_{}", e.kind.to_string().to_uppercase());
                let message = match e.kind {
                    QueryErrorKind::Timeout => "Query timed out",
                    _ => "Query failed",
                };
                ErrorResponse::with_code(status, code, message)
            }

            Error::Serialization(e) => {
                tracing::error!(error = %e, "Serialization error");
                ErrorResponse::with_code(status, "SERIALIZATION_ERROR", "Failed to encode response")
            }
        };

        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryOperation;

    #[test]
    fn test_configuration_error_display() {
        let error = ConfigurationError::NoFields {
            filter: "RoleFilter".into(),
        };
        assert_eq!(error.to_string(), "filter `RoleFilter` declares no fields");

        let error = ConfigurationError::invalid_rule("max:x", "expected a number");
        assert_eq!(error.to_string(), "invalid rule `max:x`: expected a number");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::from(ValidationError::default()).status_code(), 422);
        assert_eq!(
            Error::from(ConfigurationError::UnknownFilter("x".into())).status_code(),
            500
        );
        assert_eq!(
            Error::from(QueryError::timeout(QueryOperation::Paginate, "slow")).status_code(),
            504
        );
        assert_eq!(
            Error::from(QueryError::database_error(QueryOperation::Fetch, "boom")).status_code(),
            500
        );
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_query_error_response() {
        use axum::response::IntoResponse;

        let response =
            Error::from(QueryError::timeout(QueryOperation::Fetch, "slow")).into_response();
        assert_eq!(response.status(), axum::http::StatusCode::GATEWAY_TIMEOUT);

        let response = Error::from(ConfigurationError::UnknownResource("user".into())).into_response();
        assert_eq!(
            response.status(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_body() {
        let body = ErrorResponse::with_code(500, "QUERY_OTHER", "Query failed");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "QUERY_OTHER");
        assert_eq!(json["status"], 500);

        let json = serde_json::to_value(ErrorResponse::new(500, "x")).unwrap();
        assert!(json.get("code").is_none());
    }
}
