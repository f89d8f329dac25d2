//! Request parameters
//!
//! Two views of the incoming query string live here:
//!
//! - [`RequestParams`]: the raw, string-typed parameters exactly as the client sent them
//! - [`ParameterBag`]: the validated view produced by the validator, with values coerced
//!   to the types their rules declare (numbers, booleans, lists)
//!
//! Filters only ever see a [`ParameterBag`], and only the slice of it covering the
//! fields they declared.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::params::RequestParams;
//!
//! let params = RequestParams::parse("search=ali%20ce&role[]=admin&role[]=editor&page=2");
//!
//! assert_eq!(params.get_str("search"), Some("ali ce"));
//! assert_eq!(params.get("role").and_then(|v| v.as_array()).map(Vec::len), Some(2));
//! assert!(params.filled("page"));
//! assert!(!params.filled("sort"));
//! ```

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Returns true when a value counts as "filled": present, not null, not a blank
/// string and not an empty list.
pub fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

/// Raw request parameters
///
/// Scalars are stored as JSON strings, list parameters (`key[]=a&key[]=b`) as
/// JSON arrays of strings. A repeated scalar key keeps the last value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams {
    values: Map<String, Value>,
}

impl RequestParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL query string (without the leading `?`)
    ///
    /// `+` decodes to a space and percent escapes are decoded leniently.
    pub fn parse(query: &str) -> Self {
        let mut params = Self::new();

        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key);
            let value = decode_component(raw_value);

            if key.is_empty() {
                continue;
            }

            match key.strip_suffix("[]") {
                Some(list_key) if !list_key.is_empty() => params.push(list_key, value),
                _ => params.insert(key, value),
            }
        }

        params
    }

    /// Set a scalar parameter, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    /// Append a value to a list parameter
    ///
    /// An existing scalar under the same key is promoted to a list.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = Value::String(value.into());
        match self.values.entry(key.into()) {
            serde_json::map::Entry::Vacant(entry) => {
                entry.insert(Value::Array(vec![value]));
            }
            serde_json::map::Entry::Occupied(mut entry) => match entry.get_mut() {
                Value::Array(items) => items.push(value),
                other => {
                    let previous = other.take();
                    *other = Value::Array(vec![previous, value]);
                }
            },
        }
    }

    /// Set a list parameter, replacing any previous value
    pub fn insert_list<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let list = values
            .into_iter()
            .map(|value| Value::String(value.into()))
            .collect();
        self.values.insert(key.into(), Value::Array(list));
    }

    /// Builder-style variant of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder-style variant of [`insert_list`](Self::insert_list)
    #[must_use]
    pub fn with_list<I, S>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert_list(key, values);
        self
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a scalar value as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Whether the key was sent at all, even if empty
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether the key was sent with a non-blank value
    pub fn filled(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(is_filled)
    }

    /// Iterate over all parameters
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no parameters were sent
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Unvalidated view of these parameters as a bag
    ///
    /// Used for applicability checks, which run before validation.
    pub fn to_bag(&self) -> ParameterBag {
        ParameterBag {
            values: self.values.clone(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for RequestParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Validated request parameters
///
/// Values carry the types their rules coerced them to. Built by the validator;
/// handed to filters already restricted to the fields each filter declared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBag {
    values: Map<String, Value>,
}

impl ParameterBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Get an integer value
    ///
    /// Numeric strings are accepted too, so unvalidated bags behave the same way.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get a non-negative integer value
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get_i64(key).and_then(|n| u64::try_from(n).ok())
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.values.get(key).and_then(Value::as_bool)
    }

    /// Whether the key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Whether the key is present with a non-blank value
    pub fn filled(&self, key: &str) -> bool {
        self.values.get(key).is_some_and(is_filled)
    }

    /// Restrict the bag to the given keys, keeping only those present
    pub fn only<S: AsRef<str>>(&self, keys: &[S]) -> ParameterBag {
        let values = keys
            .iter()
            .filter_map(|key| {
                let key = key.as_ref();
                self.values
                    .get(key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect();
        ParameterBag { values }
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Consume the bag into its underlying map
    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}

impl From<Map<String, Value>> for ParameterBag {
    fn from(values: Map<String, Value>) -> Self {
        Self { values }
    }
}
