//! Predicate and ordering types for list queries
//!
//! Filters express their constraints as [`Predicate`]s built from
//! [`FilterCondition`]s. Engines either evaluate them directly
//! ([`MemoryEngine`](super::MemoryEngine)) or compile them to SQL
//! ([`compile`](super::sql::compile)).
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::query::{FilterCondition, Predicate};
//!
//! // name LIKE %ali% OR email LIKE %ali%
//! let search = Predicate::any([
//!     FilterCondition::contains("name", "ali"),
//!     FilterCondition::contains("email", "ali"),
//! ]);
//!
//! let scoped = Predicate::all([search, FilterCondition::eq("active", true).into()]);
//! assert_eq!(scoped.condition_count(), 3);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Direction for ordering results
///
/// # Example
///
/// ```rust
/// use searchable_resource::query::SortDirection;
///
/// assert_eq!(SortDirection::Asc.to_string(), "asc");
/// assert_eq!("DESC".parse::<SortDirection>(), Ok(SortDirection::Desc));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A-Z, 0-9)
    Asc,
    /// Descending order (Z-A, 9-0)
    #[default]
    Desc,
}

impl SortDirection {
    /// Every direction, in the order they are offered to clients
    pub const ALL: [SortDirection; 2] = [SortDirection::Asc, SortDirection::Desc];

    /// SQL keyword for this direction
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort direction: {other}")),
        }
    }
}

/// Comparison operators for filter conditions
///
/// ```rust
/// use searchable_resource::query::FilterOperator;
///
/// assert_eq!(FilterOperator::Equal.to_string(), "=");
/// assert_eq!(FilterOperator::NotIn.to_string(), "NOT IN");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Equal to (=)
    Equal,
    /// Not equal to (!=)
    NotEqual,
    /// Greater than (>)
    GreaterThan,
    /// Greater than or equal to (>=)
    GreaterThanOrEqual,
    /// Less than (<)
    LessThan,
    /// Less than or equal to (<=)
    LessThanOrEqual,
    /// Case-insensitive pattern matching with `%` and `_` wildcards
    Like,
    /// Value is in a list (IN)
    In,
    /// Value is not in a list (NOT IN)
    NotIn,
    /// Value is null (IS NULL)
    IsNull,
    /// Value is not null (IS NOT NULL)
    IsNotNull,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => write!(f, "="),
            Self::NotEqual => write!(f, "!="),
            Self::GreaterThan => write!(f, ">"),
            Self::GreaterThanOrEqual => write!(f, ">="),
            Self::LessThan => write!(f, "<"),
            Self::LessThanOrEqual => write!(f, "<="),
            Self::Like => write!(f, "LIKE"),
            Self::In => write!(f, "IN"),
            Self::NotIn => write!(f, "NOT IN"),
            Self::IsNull => write!(f, "IS NULL"),
            Self::IsNotNull => write!(f, "IS NOT NULL"),
        }
    }
}

/// A value that can be used in filter conditions
///
/// ```rust
/// use searchable_resource::query::FilterValue;
/// use serde_json::json;
///
/// let role: FilterValue = "admin".into();
/// assert_eq!(role, FilterValue::String("admin".into()));
///
/// let ids = FilterValue::from_json(&json!([1, 2]));
/// assert_eq!(ids, FilterValue::List(vec![1_i64.into(), 2_i64.into()]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// String value
    String(String),
    /// 64-bit integer value
    Integer(i64),
    /// 64-bit floating point value
    Float(f64),
    /// Boolean value
    Boolean(bool),
    /// List of values (for IN / NOT IN)
    List(Vec<FilterValue>),
    /// Null value
    Null,
}

impl FilterValue {
    /// Convert a validated parameter value into a filter value
    ///
    /// Objects have no filter representation and become their JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(_) => Self::String(value.to_string()),
        }
    }

    /// JSON representation, used when comparing against rows
    pub fn to_json(&self) -> Value {
        match self {
            Self::String(s) => Value::String(s.clone()),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Boolean(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Null => Value::Null,
        }
    }

    /// Items of a list value; scalars behave as a single-item list
    pub fn as_list(&self) -> Vec<&FilterValue> {
        match self {
            Self::List(items) => items.iter().collect(),
            other => vec![other],
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        Self::Integer(i64::from(n))
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&Value> for FilterValue {
    fn from(value: &Value) -> Self {
        Self::from_json(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

/// A single comparison against one column
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// The column to filter on
    pub field: String,
    /// The comparison operator
    pub operator: FilterOperator,
    /// The value to compare against
    pub value: FilterValue,
}

impl FilterCondition {
    /// Create a new filter condition
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::Equal, value.into())
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::NotEqual, value.into())
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThan, value.into())
    }

    /// `field >= value`
    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::GreaterThanOrEqual, value.into())
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThan, value.into())
    }

    /// `field <= value`
    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::new(field, FilterOperator::LessThanOrEqual, value.into())
    }

    /// `field LIKE pattern`, with the pattern used verbatim
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            field,
            FilterOperator::Like,
            FilterValue::String(pattern.into()),
        )
    }

    /// `field LIKE %term%`, matching `term` literally
    ///
    /// Wildcards in the term are escaped with a backslash.
    pub fn contains(field: impl Into<String>, term: impl AsRef<str>) -> Self {
        Self::like(field, format!("%{}%", escape_like(term.as_ref())))
    }

    /// `field IN (values...)`
    pub fn is_in<T: Into<FilterValue>>(field: impl Into<String>, values: Vec<T>) -> Self {
        Self::new(field, FilterOperator::In, FilterValue::from(values))
    }

    /// `field NOT IN (values...)`
    pub fn not_in<T: Into<FilterValue>>(field: impl Into<String>, values: Vec<T>) -> Self {
        Self::new(field, FilterOperator::NotIn, FilterValue::from(values))
    }

    /// `field IS NULL`
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNull, FilterValue::Null)
    }

    /// `field IS NOT NULL`
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::new(field, FilterOperator::IsNotNull, FilterValue::Null)
    }
}

/// A boolean expression over rows
///
/// `Raw` carries an engine-specific fragment with `?` placeholders; only
/// SQL-backed engines can evaluate it.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// A single column comparison
    Condition(FilterCondition),
    /// Every child must hold; an empty group is always true
    All(Vec<Predicate>),
    /// At least one child must hold; an empty group is always false
    Any(Vec<Predicate>),
    /// Negation
    Not(Box<Predicate>),
    /// Raw fragment with positional `?` bindings
    Raw {
        /// Fragment text
        sql: String,
        /// Values bound to the `?` placeholders, in order
        bindings: Vec<FilterValue>,
    },
}

impl Predicate {
    /// Conjunction of predicates
    pub fn all<I, P>(predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Self::All(predicates.into_iter().map(Into::into).collect())
    }

    /// Disjunction of predicates
    pub fn any<I, P>(predicates: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Predicate>,
    {
        Self::Any(predicates.into_iter().map(Into::into).collect())
    }

    /// Negation of a predicate
    pub fn not(predicate: impl Into<Predicate>) -> Self {
        Self::Not(Box::new(predicate.into()))
    }

    /// Raw fragment
    pub fn raw(sql: impl Into<String>, bindings: Vec<FilterValue>) -> Self {
        Self::Raw {
            sql: sql.into(),
            bindings,
        }
    }

    /// Number of leaf conditions (raw fragments count as one)
    pub fn condition_count(&self) -> usize {
        match self {
            Self::Condition(_) | Self::Raw { .. } => 1,
            Self::All(children) | Self::Any(children) => {
                children.iter().map(Predicate::condition_count).sum()
            }
            Self::Not(inner) => inner.condition_count(),
        }
    }

    /// Every column referenced by a condition in this tree
    pub fn fields(&self) -> Vec<&str> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Condition(condition) => out.push(condition.field.as_str()),
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_fields(out);
                }
            }
            Self::Not(inner) => inner.collect_fields(out),
            Self::Raw { .. } => {}
        }
    }
}

impl From<FilterCondition> for Predicate {
    fn from(condition: FilterCondition) -> Self {
        Self::Condition(condition)
    }
}

/// Escape `LIKE` wildcards so the text matches itself
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
