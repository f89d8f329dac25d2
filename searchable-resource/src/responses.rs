//! Validation failure response
//!
//! [`ValidationError`] collects every rule violation found in a request and
//! renders as an HTTP 422 body:
//!
//! ```json
//! {
//!   "error": "The given parameters were invalid.",
//!   "code": "VALIDATION_ERROR",
//!   "status": 422,
//!   "errors": {
//!     "per_page": ["The selected per page is invalid."]
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP status code used for validation failures
pub const UNPROCESSABLE_ENTITY: u16 = 422;

/// Every rule violation found in a request
///
/// ```rust
/// use searchable_resource::responses::ValidationError;
///
/// let mut error = ValidationError::new("The given parameters were invalid.");
/// error.add_field_error("page", "The page field must be at least 1.");
///
/// assert!(error.has_errors());
/// assert_eq!(error.fields().collect::<Vec<_>>(), vec!["page"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    error: String,
    code: String,
    status: u16,
    /// Violation messages, keyed by field name
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationError {
    /// Create an empty validation error with a summary message
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: "VALIDATION_ERROR".to_string(),
            status: UNPROCESSABLE_ENTITY,
            errors: BTreeMap::new(),
        }
    }

    /// Add a field-level error
    pub fn add_field_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Check if there are any validation errors
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Get the number of field errors
    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    /// Names of the fields that failed, sorted
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Messages recorded for one field
    pub fn messages(&self, field: &str) -> Vec<&str> {
        self.errors
            .get(field)
            .map(|messages| messages.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Summary message
    pub fn message(&self) -> &str {
        &self.error
    }

    /// HTTP status code (always 422)
    pub fn status(&self) -> u16 {
        self.status
    }
}

impl Default for ValidationError {
    fn default() -> Self {
        Self::new("The given parameters were invalid.")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let fields: Vec<&str> = self.fields().collect();
        if !fields.is_empty() {
            write!(f, " [{}]", fields.join(", "))?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ValidationError {
    fn into_response(self) -> axum::response::Response {
        (
            axum::http::StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(self),
        )
            .into_response()
    }
}
