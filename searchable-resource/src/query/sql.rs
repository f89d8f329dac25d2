//! SQL compilation
//!
//! Turns a [`Query`] into PostgreSQL text with `$n` placeholders and an ordered
//! list of bindings. Column names are validated against a conservative
//! identifier pattern and double-quoted; values are never interpolated.
//!
//! `LIKE` compiles to `ILIKE` so pattern matching is case-insensitive, as it
//! is in the in-memory engine.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::query::sql::compile;
//! use searchable_resource::query::{Query, SortDirection};
//!
//! let mut query = Query::new();
//! query.where_eq("role", "admin").order_by("id", SortDirection::Desc);
//!
//! let statement = compile(&query, "users").unwrap();
//! assert_eq!(
//!     statement.sql,
//!     r#"SELECT * FROM "users" WHERE "role" = $1 ORDER BY "id" DESC"#
//! );
//! assert_eq!(statement.bindings.len(), 1);
//! ```

use std::sync::LazyLock;

use regex::Regex;

use super::engine::{PageRequest, QueryResult};
use super::error::{QueryError, QueryOperation};
use super::handle::Query;
use super::predicate::{FilterCondition, FilterOperator, FilterValue, Predicate};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern should be a valid regex")
});

/// Compiled SQL text plus its positional bindings
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text using `$1..$n` placeholders
    pub sql: String,
    /// Values for the placeholders, in order
    pub bindings: Vec<FilterValue>,
}

#[derive(Default)]
struct Bindings {
    values: Vec<FilterValue>,
}

impl Bindings {
    fn push(&mut self, value: FilterValue) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }
}

/// Validate and quote a column or table name (`name` or `table.name`)
pub fn quote_identifier(identifier: &str) -> QueryResult<String> {
    if !IDENTIFIER.is_match(identifier) {
        return Err(QueryError::invalid_query(
            QueryOperation::Compile,
            format!("invalid identifier: {identifier:?}"),
        ));
    }
    Ok(identifier
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}

/// Compile a query that fetches every matching row
pub fn compile(query: &Query, table: &str) -> QueryResult<SqlStatement> {
    let mut bindings = Bindings::default();
    let sql = select_sql(query, table, &mut bindings)?;
    Ok(SqlStatement {
        sql,
        bindings: bindings.values,
    })
}

/// Compile a query that fetches one page of rows
pub fn compile_page(query: &Query, table: &str, request: PageRequest) -> QueryResult<SqlStatement> {
    compile_window(query, table, request.offset(), request.limit())
}

/// Compile a query that skips `offset` rows and returns at most `limit`
pub fn compile_window(query: &Query, table: &str, offset: u64, limit: u64) -> QueryResult<SqlStatement> {
    let mut bindings = Bindings::default();
    let mut sql = select_sql(query, table, &mut bindings)?;

    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let limit = bindings.push(FilterValue::Integer(limit));
    let offset = bindings.push(FilterValue::Integer(offset));
    sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));

    Ok(SqlStatement {
        sql,
        bindings: bindings.values,
    })
}

/// Compile a `COUNT(*)` over every matching row, ignoring ordering and projection
pub fn compile_count(query: &Query, table: &str) -> QueryResult<SqlStatement> {
    let mut bindings = Bindings::default();
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table)?);
    if let Some(predicate) = query.predicate() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate_sql(&predicate, &mut bindings)?);
    }
    Ok(SqlStatement {
        sql,
        bindings: bindings.values,
    })
}

fn select_sql(query: &Query, table: &str, bindings: &mut Bindings) -> QueryResult<String> {
    let columns = if query.selects_all() {
        "*".to_string()
    } else {
        query
            .columns()
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<QueryResult<Vec<_>>>()?
            .join(", ")
    };

    let mut sql = format!("SELECT {columns} FROM {}", quote_identifier(table)?);

    if let Some(predicate) = query.predicate() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate_sql(&predicate, bindings)?);
    }

    if !query.orders().is_empty() {
        let orders = query
            .orders()
            .iter()
            .map(|order| {
                Ok(format!(
                    "{} {}",
                    quote_identifier(&order.field)?,
                    order.direction.as_sql()
                ))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&orders.join(", "));
    }

    Ok(sql)
}

fn predicate_sql(predicate: &Predicate, bindings: &mut Bindings) -> QueryResult<String> {
    match predicate {
        Predicate::Condition(condition) => condition_sql(condition, bindings),
        Predicate::All(children) => group_sql(children, " AND ", "TRUE", bindings),
        Predicate::Any(children) => group_sql(children, " OR ", "FALSE", bindings),
        Predicate::Not(inner) => Ok(format!("NOT ({})", predicate_sql(inner, bindings)?)),
        Predicate::Raw { sql, bindings: values } => raw_sql(sql, values, bindings),
    }
}

fn group_sql(
    children: &[Predicate],
    separator: &str,
    empty: &str,
    bindings: &mut Bindings,
) -> QueryResult<String> {
    match children {
        [] => Ok(empty.to_string()),
        [single] => predicate_sql(single, bindings),
        many => {
            let parts = many
                .iter()
                .map(|child| predicate_sql(child, bindings))
                .collect::<QueryResult<Vec<_>>>()?;
            Ok(format!("({})", parts.join(separator)))
        }
    }
}

fn condition_sql(condition: &FilterCondition, bindings: &mut Bindings) -> QueryResult<String> {
    let column = quote_identifier(&condition.field)?;

    let sql = match condition.operator {
        FilterOperator::IsNull | FilterOperator::IsNotNull => {
            format!("{column} {}", condition.operator)
        }
        FilterOperator::In | FilterOperator::NotIn => {
            let items = condition.value.as_list();
            if items.is_empty() {
                return Ok(match condition.operator {
                    FilterOperator::In => "FALSE".to_string(),
                    _ => "TRUE".to_string(),
                });
            }
            let placeholders = items
                .into_iter()
                .map(|item| bindings.push(item.clone()))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{column} {} ({placeholders})", condition.operator)
        }
        FilterOperator::Like => {
            let placeholder = bindings.push(condition.value.clone());
            format!("{column} ILIKE {placeholder} ESCAPE '\\'")
        }
        FilterOperator::NotEqual => {
            let placeholder = bindings.push(condition.value.clone());
            format!("{column} <> {placeholder}")
        }
        _ => {
            if matches!(condition.value, FilterValue::List(_)) {
                return Err(QueryError::invalid_query(
                    QueryOperation::Compile,
                    format!("operator {} does not accept a list", condition.operator),
                ));
            }
            let placeholder = bindings.push(condition.value.clone());
            format!("{column} {} {placeholder}", condition.operator)
        }
    };

    Ok(sql)
}

fn raw_sql(fragment: &str, values: &[FilterValue], bindings: &mut Bindings) -> QueryResult<String> {
    let placeholders = fragment.matches('?').count();
    if placeholders != values.len() {
        return Err(QueryError::invalid_query(
            QueryOperation::Compile,
            format!(
                "raw fragment has {placeholders} placeholders but {} bindings",
                values.len()
            ),
        ));
    }

    let mut values = values.iter();
    let mut sql = String::with_capacity(fragment.len());
    for ch in fragment.chars() {
        match (ch == '?').then(|| values.next()).flatten() {
            Some(value) => sql.push_str(&bindings.push(value.clone())),
            None => sql.push(ch),
        }
    }
    Ok(format!("({sql})"))
}
