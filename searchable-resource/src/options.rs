//! Option lists and labeling
//!
//! Every list response advertises the values clients may send back: sort
//! directions, orderable columns, page sizes, and whatever filters contribute.
//! In labeled mode each raw value becomes a `{label, value}` pair.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::options::{FormatOptions, OptionsFormatter};
//! use serde_json::json;
//!
//! let formatter = OptionsFormatter::new();
//!
//! assert_eq!(
//!     formatter.format("order_by", vec![json!("created_at")]),
//!     vec![json!({"label": "Created At", "value": "created_at"})]
//! );
//! assert_eq!(
//!     formatter.format("per_page", vec![json!(10)]),
//!     vec![json!({"label": "10 / Page", "value": 10})]
//! );
//! ```

use convert_case::{Case, Casing};
use serde_json::{Map, Value};

/// Ordered map of option key to the values offered for it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionSet {
    entries: Vec<(String, Vec<Value>)>,
}

impl OptionSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values under a key, creating it if needed
    ///
    /// Values already present under the key are not added twice.
    pub fn extend<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let key = key.into();
        let index = match self.entries.iter().position(|(name, _)| *name == key) {
            Some(index) => index,
            None => {
                self.entries.push((key, Vec::new()));
                self.entries.len() - 1
            }
        };

        let list = &mut self.entries[index].1;
        for value in values {
            let value = value.into();
            if !list.contains(&value) {
                list.push(value);
            }
        }
    }

    /// Replace the values under a key
    pub fn set<I, V>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let key = key.into();
        self.entries.retain(|(name, _)| *name != key);
        self.extend(key, values);
    }

    /// Builder-style variant of [`extend`](Self::extend)
    #[must_use]
    pub fn with<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.extend(key, values);
        self
    }

    /// Merge another set into this one, key by key
    pub fn merge(&mut self, other: OptionSet) {
        for (key, values) in other.entries {
            self.extend(key, values);
        }
    }

    /// Values under a key
    pub fn get(&self, key: &str) -> Option<&[Value]> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, values)| values.as_slice())
    }

    /// Iterate `(key, values)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.entries
            .iter()
            .map(|(key, values)| (key.as_str(), values.as_slice()))
    }

    /// Whether no keys are present
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl IntoIterator for OptionSet {
    type Item = (String, Vec<Value>);
    type IntoIter = std::vec::IntoIter<(String, Vec<Value>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Turns raw option values into client-facing entries
pub trait FormatOptions: Send + Sync {
    /// Format the values offered under `key`
    fn format(&self, key: &str, values: Vec<Value>) -> Vec<Value>;
}

impl<F> FormatOptions for F
where
    F: Fn(&str, Vec<Value>) -> Vec<Value> + Send + Sync,
{
    fn format(&self, key: &str, values: Vec<Value>) -> Vec<Value> {
        self(key, values)
    }
}

/// Default `{label, value}` formatter
///
/// - entries that are already `{label, value}` pairs are kept as they are
/// - `sort` and `order_by` values are title-cased (`created_at` → `Created At`)
/// - `per_page` values are labeled `"<n> / Page"`
/// - every other key uses the raw value as its label
///
/// Title-cased labels for any other key (`my_option` → `My Option`) need
/// [`with_title_case`](Self::with_title_case).
#[derive(Debug, Clone)]
pub struct OptionsFormatter {
    title_case_keys: Vec<String>,
    per_page_key: String,
    per_page_suffix: String,
}

impl Default for OptionsFormatter {
    fn default() -> Self {
        Self {
            title_case_keys: vec!["sort".to_string(), "order_by".to_string()],
            per_page_key: "per_page".to_string(),
            per_page_suffix: " / Page".to_string(),
        }
    }
}

impl OptionsFormatter {
    /// Formatter with the default key rules
    pub fn new() -> Self {
        Self::default()
    }

    /// Also title-case the labels of this key
    #[must_use]
    pub fn with_title_case(mut self, key: impl Into<String>) -> Self {
        self.title_case_keys.push(key.into());
        self
    }

    /// Change the suffix appended to page-size labels
    #[must_use]
    pub fn with_per_page_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.per_page_suffix = suffix.into();
        self
    }

    fn label_for(&self, key: &str, value: &Value) -> Value {
        if key == self.per_page_key {
            Value::String(format!("{}{}", plain_text(value), self.per_page_suffix))
        } else if self.title_case_keys.iter().any(|k| k == key) {
            Value::String(title_case(&plain_text(value)))
        } else {
            value.clone()
        }
    }
}

impl FormatOptions for OptionsFormatter {
    fn format(&self, key: &str, values: Vec<Value>) -> Vec<Value> {
        if values.iter().all(is_labeled) {
            return values;
        }

        values
            .into_iter()
            .map(|value| {
                if is_labeled(&value) {
                    return value;
                }
                let mut entry = Map::new();
                entry.insert("label".to_string(), self.label_for(key, &value));
                entry.insert("value".to_string(), value);
                Value::Object(entry)
            })
            .collect()
    }
}

fn is_labeled(value: &Value) -> bool {
    value.get("label").is_some() && value.get("value").is_some()
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `created_at` → `Created At`, `DESC` → `Desc`
pub fn title_case(text: &str) -> String {
    text.to_case(Case::Title)
}
