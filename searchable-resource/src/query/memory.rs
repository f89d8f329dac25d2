//! In-memory query engine
//!
//! Evaluates [`Query`] predicates against a fixed set of JSON rows. Suitable for
//! tests, fixtures and small reference datasets. Comparison follows SQL
//! conventions: nulls never compare equal, numeric strings compare as numbers
//! against numeric values, `LIKE` is case-insensitive and nulls sort last in
//! ascending order.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use serde_json::Value;

use super::engine::{Page, PageRequest, QueryEngine, QueryResult, Row};
use super::error::{QueryError, QueryOperation};
use super::handle::Query;
use super::predicate::{FilterCondition, FilterOperator, FilterValue, Predicate, SortDirection};

/// Query engine over an in-memory row set
///
/// # Example
///
/// ```rust
/// use searchable_resource::query::{MemoryEngine, Query, QueryEngine};
/// use serde_json::json;
///
/// # tokio_test_block(async {
/// let engine = MemoryEngine::from_values(vec![
///     json!({"id": 1, "name": "Alice"}),
///     json!({"id": 2, "name": "Bob"}),
/// ]);
///
/// let mut query = Query::new();
/// query.where_like("name", "%ali%");
///
/// let rows = engine.fetch(&query).await.unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(engine.executions(), 1);
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryEngine {
    rows: Vec<Row>,
    executions: AtomicUsize,
}

impl MemoryEngine {
    /// Create an engine over the given rows
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            executions: AtomicUsize::new(0),
        }
    }

    /// Create an engine from JSON values; values that are not objects are skipped
    pub fn from_values<I: IntoIterator<Item = Value>>(values: I) -> Self {
        let rows = values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect();
        Self::new(rows)
    }

    /// Number of queries executed against this engine
    pub fn executions(&self) -> usize {
        self.executions.load(AtomicOrdering::SeqCst)
    }

    /// Every row held by the engine
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn select(&self, query: &Query, operation: QueryOperation) -> QueryResult<Vec<Row>> {
        self.executions.fetch_add(1, AtomicOrdering::SeqCst);

        let predicate = query.predicate();
        let mut matched = Vec::new();
        for row in &self.rows {
            let keep = match &predicate {
                Some(predicate) => evaluate(row, predicate, operation)?,
                None => true,
            };
            if keep {
                matched.push(row.clone());
            }
        }

        if !query.orders().is_empty() {
            matched.sort_by(|a, b| {
                query
                    .orders()
                    .iter()
                    .map(|order| {
                        let ordering = compare_json(lookup(a, &order.field), lookup(b, &order.field));
                        match order.direction {
                            SortDirection::Asc => ordering,
                            SortDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| ordering.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }

        tracing::debug!(
            operation = %operation,
            total_rows = self.rows.len(),
            matched = matched.len(),
            "Memory engine evaluated query"
        );

        Ok(matched)
    }
}

impl QueryEngine for MemoryEngine {
    async fn fetch(&self, query: &Query) -> QueryResult<Vec<Row>> {
        let rows = self.select(query, QueryOperation::Fetch)?;
        Ok(rows.into_iter().map(|row| project(row, query)).collect())
    }

    async fn paginate(&self, query: &Query, request: PageRequest) -> QueryResult<Page> {
        let rows = self.select(query, QueryOperation::Paginate)?;
        let matched = rows.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.limit()).unwrap_or(usize::MAX);

        let items: Vec<Row> = rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| project(row, query))
            .collect();

        Ok(Page {
            has_more: request.offset() + (items.len() as u64) < matched,
            items,
            current_page: request.page,
            per_page: request.per_page,
            total: request.with_total.then_some(matched),
        })
    }
}

fn project(row: Row, query: &Query) -> Row {
    if query.selects_all() {
        return row;
    }
    query
        .columns()
        .iter()
        .filter_map(|column| {
            let key = column.rsplit('.').next().unwrap_or(column);
            row.get(key).map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}

fn lookup<'a>(row: &'a Row, field: &str) -> &'a Value {
    row.get(field)
        .or_else(|| field.rsplit('.').next().and_then(|key| row.get(key)))
        .unwrap_or(&Value::Null)
}

fn evaluate(row: &Row, predicate: &Predicate, operation: QueryOperation) -> QueryResult<bool> {
    match predicate {
        Predicate::Condition(condition) => Ok(evaluate_condition(row, condition)),
        Predicate::All(children) => {
            for child in children {
                if !evaluate(row, child, operation)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Any(children) => {
            for child in children {
                if evaluate(row, child, operation)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Predicate::Not(inner) => evaluate(row, inner, operation).map(|matched| !matched),
        Predicate::Raw { sql, .. } => Err(QueryError::invalid_query(
            operation,
            format!("raw predicate `{sql}` requires a SQL engine"),
        )),
    }
}

fn evaluate_condition(row: &Row, condition: &FilterCondition) -> bool {
    let left = lookup(row, &condition.field);
    let right = &condition.value;

    match condition.operator {
        FilterOperator::IsNull => left.is_null(),
        FilterOperator::IsNotNull => !left.is_null(),
        FilterOperator::Equal => compare(left, right) == Some(Ordering::Equal),
        FilterOperator::NotEqual => matches!(compare(left, right), Some(o) if o.is_ne()),
        FilterOperator::GreaterThan => compare(left, right) == Some(Ordering::Greater),
        FilterOperator::GreaterThanOrEqual => {
            matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal))
        }
        FilterOperator::LessThan => compare(left, right) == Some(Ordering::Less),
        FilterOperator::LessThanOrEqual => {
            matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal))
        }
        FilterOperator::Like => match (text_of(left), right) {
            (Some(text), FilterValue::String(pattern)) => like_matches(&text, pattern),
            _ => false,
        },
        FilterOperator::In => right
            .as_list()
            .into_iter()
            .any(|item| compare(left, item) == Some(Ordering::Equal)),
        FilterOperator::NotIn => {
            !left.is_null()
                && right
                    .as_list()
                    .into_iter()
                    .all(|item| compare(left, item) != Some(Ordering::Equal))
        }
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn number_of_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_of_filter(value: &FilterValue) -> Option<f64> {
    match value {
        FilterValue::Integer(i) => Some(*i as f64),
        FilterValue::Float(f) => Some(*f),
        FilterValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        FilterValue::String(s) => s.trim().parse().ok(),
        FilterValue::List(_) | FilterValue::Null => None,
    }
}

/// SQL-style comparison; `None` when either side is null or the types are incomparable
fn compare(left: &Value, right: &FilterValue) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, _) | (_, FilterValue::Null) => None,
        (Value::String(a), FilterValue::String(b)) => Some(a.as_str().cmp(b.as_str())),
        (Value::Bool(a), FilterValue::Boolean(b)) => Some(a.cmp(b)),
        _ => {
            let a = number_of_json(left)?;
            let b = number_of_filter(right)?;
            a.partial_cmp(&b)
        }
    }
}

/// Total order over JSON values for sorting; nulls sort after everything else
fn compare_json(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) => 3,
            Value::Object(_) => 4,
            Value::Null => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Case-insensitive `LIKE` with `%` (any run) and `_` (any single character)
///
/// A backslash makes the next pattern character literal.
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut ti, mut pi) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi + 1 < pattern.len() && pattern[pi] == '\\' && pattern[pi + 1] == text[ti] {
            ti += 1;
            pi += 2;
        } else if pi < pattern.len() && pattern[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < pattern.len()
            && pattern[pi] != '\\'
            && (pattern[pi] == '_' || pattern[pi] == text[ti])
        {
            ti += 1;
            pi += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|c| *c == '%')
}
