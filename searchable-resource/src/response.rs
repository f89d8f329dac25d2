//! Response envelope
//!
//! Every searchable list endpoint answers with the same shape:
//!
//! ```json
//! {
//!   "data": [ ... ],
//!   "query": { "order_by": "id", "sort": "desc", "page": 1, "per_page": 25 },
//!   "options": { "sort": ["asc", "desc"], "order_by": ["id"], "per_page": [10, 25] },
//!   "pagination": { "current_page": 1, "per_page": 25, "total": 3, ... }
//! }
//! ```
//!
//! `pagination` is present only for paginated requests. Extra top-level keys
//! added with `with(...)` follow the built-in ones.

use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::options::{FormatOptions, OptionSet};
use crate::query::{Page, Row};
use crate::registry::Resource;

/// Computes an extra attribute from a row
pub type Appender = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// Pagination block of the envelope
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct PaginationMeta {
    /// 1-based page number
    pub current_page: u64,
    /// Page size
    pub per_page: u64,
    /// Total matching rows (length-aware pagination only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Last page number (length-aware pagination only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_page: Option<u64>,
    /// 1-based index of the first row on the page
    pub from: Option<u64>,
    /// 1-based index of the last row on the page
    pub to: Option<u64>,
    /// Whether this is page 1
    #[serde(rename = "isFirstPage")]
    pub is_first_page: bool,
    /// Whether this is the last page; `null` when the total is unknown
    #[serde(rename = "isLastPage")]
    pub is_last_page: Option<bool>,
    /// Whether rows exist past this page
    pub has_more_pages: bool,
}

impl PaginationMeta {
    /// Describe a fetched page
    pub fn from_page(page: &Page) -> Self {
        Self {
            current_page: page.current_page,
            per_page: page.per_page,
            total: page.total,
            last_page: page.last_page(),
            from: page.from(),
            to: page.to(),
            is_first_page: page.is_first_page(),
            is_last_page: page.is_last_page(),
            has_more_pages: page.has_more,
        }
    }
}

/// The envelope returned by [`SearchableBuilder::execute`](crate::builder::SearchableBuilder::execute)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchableResponse {
    /// Transformed rows
    pub data: Vec<Value>,
    /// Echoed, validated request parameters
    pub query: Map<String, Value>,
    /// Values clients may send back, per parameter
    pub options: Map<String, Value>,
    /// Page metadata, for paginated requests
    pub pagination: Option<PaginationMeta>,
    /// Extra top-level data
    pub with: Map<String, Value>,
}

impl SearchableResponse {
    /// Render the envelope as a JSON object
    ///
    /// Extra data may replace `query`, `options` or `pagination` but never `data`.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        body.insert("data".to_string(), Value::Array(self.data.clone()));
        body.insert("query".to_string(), Value::Object(self.query.clone()));
        body.insert("options".to_string(), Value::Object(self.options.clone()));
        if let Some(pagination) = &self.pagination {
            body.insert(
                "pagination".to_string(),
                serde_json::to_value(pagination).unwrap_or(Value::Null),
            );
        }

        for (key, value) in &self.with {
            if key != "data" {
                body.insert(key.clone(), value.clone());
            }
        }

        Value::Object(body)
    }
}

impl Serialize for SearchableResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Value::Object(body) => {
                let mut map = serializer.serialize_map(Some(body.len()))?;
                for (key, value) in &body {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for SearchableResponse {
    fn into_response(self) -> axum::response::Response {
        (axum::http::StatusCode::OK, axum::Json(self.to_json())).into_response()
    }
}

/// Render option lists, labeling them when `labeled` is set
pub(crate) fn render_options(
    options: OptionSet,
    labeled: bool,
    formatter: &dyn FormatOptions,
) -> Map<String, Value> {
    options
        .into_iter()
        .map(|(key, values)| {
            let values = if labeled {
                formatter.format(&key, values)
            } else {
                values
            };
            (key, Value::Array(values))
        })
        .collect()
}

/// Attach computed attributes to a row, then run it through the resource
pub(crate) fn render_row(
    mut row: Row,
    appendables: &[(String, Appender)],
    resource: Option<&Resource>,
) -> Value {
    for (name, append) in appendables {
        let value = append(&row);
        row.insert(name.clone(), value);
    }

    match resource {
        Some(resource) => resource(row),
        None => Value::Object(row),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionsFormatter;
    use serde_json::json;

    fn page(items: usize, current_page: u64, per_page: u64, total: Option<u64>) -> Page {
        let row: Row = json!({"id": 1}).as_object().cloned().unwrap();
        Page {
            items: vec![row; items],
            current_page,
            per_page,
            total,
            has_more: total.is_some_and(|t| current_page * per_page < t),
        }
    }

    #[test]
    fn test_pagination_meta_length_aware() {
        let meta = PaginationMeta::from_page(&page(2, 2, 4, Some(6)));
        assert_eq!(meta.last_page, Some(2));
        assert_eq!(meta.from, Some(5));
        assert_eq!(meta.to, Some(6));
        assert!(!meta.is_first_page);
        assert_eq!(meta.is_last_page, Some(true));

        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["isFirstPage"], false);
        assert_eq!(json["isLastPage"], true);
        assert_eq!(json["total"], 6);
    }

    #[test]
    fn test_pagination_meta_simple() {
        let meta = PaginationMeta::from_page(&page(4, 1, 4, None));
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("total").is_none());
        assert!(json.get("last_page").is_none());
        assert_eq!(json["isFirstPage"], true);
        assert_eq!(json["isLastPage"], Value::Null);
    }

    #[test]
    fn test_envelope_key_order_and_extra_data() {
        let mut with = Map::new();
        with.insert("meta".into(), json!({"version": 2}));
        with.insert("data".into(), json!("ignored"));

        let response = SearchableResponse {
            data: vec![json!({"id": 1})],
            query: Map::new(),
            options: Map::new(),
            pagination: None,
            with,
        };

        let body = response.to_json();
        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["data", "query", "options", "meta"]);
        assert_eq!(body["data"], json!([{"id": 1}]));

        let serialized = serde_json::to_value(&response).unwrap();
        assert_eq!(serialized, body);

        let paginated = SearchableResponse {
            pagination: Some(PaginationMeta::from_page(&page(1, 1, 10, Some(1)))),
            ..response
        };
        let body = paginated.to_json();
        let keys: Vec<&str> = body.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["data", "query", "options", "pagination", "meta"]);
    }

    #[test]
    fn test_render_options() {
        let options = OptionSet::new()
            .with("sort", ["asc", "desc"])
            .with("per_page", [10]);
        let formatter = OptionsFormatter::new();

        let raw = render_options(options.clone(), false, &formatter);
        assert_eq!(raw["sort"], json!(["asc", "desc"]));

        let labeled = render_options(options, true, &formatter);
        assert_eq!(labeled["sort"][1], json!({"label": "Desc", "value": "desc"}));
        assert_eq!(labeled["per_page"][0], json!({"label": "10 / Page", "value": 10}));
    }

    #[test]
    fn test_render_row_appends_then_transforms() {
        let row: Row = json!({"first": "Ada", "last": "Lovelace"})
            .as_object()
            .cloned()
            .unwrap();
        let full_name: Appender = Arc::new(|row: &Row| {
            json!(format!(
                "{} {}",
                row["first"].as_str().unwrap_or_default(),
                row["last"].as_str().unwrap_or_default()
            ))
        });
        let appendables = vec![("full_name".to_string(), full_name)];

        let plain = render_row(row.clone(), &appendables, None);
        assert_eq!(plain["full_name"], "Ada Lovelace");

        let resource: Resource = Arc::new(|row: Row| json!({"name": row["full_name"]}));
        let shaped = render_row(row, &appendables, Some(&resource));
        assert_eq!(shaped, json!({"name": "Ada Lovelace"}));
    }
}
