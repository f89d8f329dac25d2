//! Named filters and resources
//!
//! Lets an application register its filters and row transformers once, under
//! stable names, and have endpoints refer to them by name. Filter factories run
//! on every lookup so each request gets its own filter instances.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::filter::{EqualsFilter, SearchFilter};
//! use searchable_resource::registry::Registry;
//! use serde_json::json;
//!
//! let registry = Registry::new()
//!     .filter("role", || EqualsFilter::new("role"))
//!     .filter("search", || SearchFilter::new(["name", "email"]))
//!     .resource("user", |row| json!({"id": row["id"], "name": row["name"]}));
//!
//! assert!(registry.resolve("role").is_ok());
//! assert!(registry.resolve("missing").is_err());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ConfigurationError;
use crate::filter::Filter;
use crate::query::Row;

/// Row transformer applied to every result row
pub type Resource = Arc<dyn Fn(Row) -> Value + Send + Sync>;

type FilterFactory = Arc<dyn Fn() -> Box<dyn Filter> + Send + Sync>;

/// Registry of named filter factories and resources
#[derive(Clone, Default)]
pub struct Registry {
    filters: HashMap<String, FilterFactory>,
    resources: HashMap<String, Resource>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter factory under a name, replacing any previous one
    #[must_use]
    pub fn filter<F, T>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Filter + 'static,
    {
        let factory: FilterFactory = Arc::new(move || Box::new(factory()) as Box<dyn Filter>);
        self.filters.insert(name.into(), factory);
        self
    }

    /// Register a resource under a name, replacing any previous one
    #[must_use]
    pub fn resource<F>(mut self, name: impl Into<String>, resource: F) -> Self
    where
        F: Fn(Row) -> Value + Send + Sync + 'static,
    {
        self.resources.insert(name.into(), Arc::new(resource));
        self
    }

    /// Build a fresh instance of a named filter
    pub fn resolve(&self, name: &str) -> Result<Box<dyn Filter>, ConfigurationError> {
        self.filters
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ConfigurationError::UnknownFilter(name.to_string()))
    }

    /// Look up a named resource
    pub fn resolve_resource(&self, name: &str) -> Result<Resource, ConfigurationError> {
        self.resources
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownResource(name.to_string()))
    }

    /// Registered filter names, sorted
    pub fn filter_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.filters.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources: Vec<&str> = self.resources.keys().map(String::as_str).collect();
        resources.sort_unstable();
        f.debug_struct("Registry")
            .field("filters", &self.filter_names())
            .field("resources", &resources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::EqualsFilter;
    use serde_json::json;

    #[test]
    fn test_resolve_builds_fresh_instances() {
        let registry = Registry::new().filter("role", || EqualsFilter::new("role"));

        let first = registry.resolve("role").unwrap();
        let second = registry.resolve("role").unwrap();
        assert_eq!(first.fields(), second.fields());
        assert_eq!(registry.filter_names(), vec!["role"]);
    }

    #[test]
    fn test_unknown_names() {
        let registry = Registry::new();
        assert_eq!(
            registry.resolve("nope").err(),
            Some(ConfigurationError::UnknownFilter("nope".into()))
        );
        assert_eq!(
            registry.resolve_resource("nope").err(),
            Some(ConfigurationError::UnknownResource("nope".into()))
        );
    }

    #[test]
    fn test_resource_lookup() {
        let registry = Registry::new().resource("id_only", |row| json!({"id": row["id"]}));
        let resource = registry.resolve_resource("id_only").unwrap();

        let mut row = Row::new();
        row.insert("id".into(), json!(9));
        row.insert("secret".into(), json!("x"));
        assert_eq!(resource(row), json!({"id": 9}));
    }
}
