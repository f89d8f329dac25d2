//! Mutable query handle passed to filters

use super::predicate::{FilterCondition, FilterValue, Predicate, SortDirection};

/// A single `ORDER BY` term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    /// Column to order by
    pub field: String,
    /// Direction
    pub direction: SortDirection,
}

/// Query under construction
///
/// Filters receive `&mut Query` and add constraints to it. Top-level
/// predicates are combined with AND.
///
/// # Example
///
/// ```rust
/// use searchable_resource::query::{FilterCondition, Predicate, Query, SortDirection};
///
/// let mut query = Query::new();
/// query
///     .where_eq("role", "admin")
///     .filter(Predicate::any([
///         FilterCondition::contains("name", "ali"),
///         FilterCondition::contains("email", "ali"),
///     ]))
///     .order_by("id", SortDirection::Desc);
///
/// assert_eq!(query.predicates().len(), 2);
/// assert_eq!(query.orders()[0].field, "id");
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    predicates: Vec<Predicate>,
    orders: Vec<OrderClause>,
    columns: Vec<String>,
}

impl Query {
    /// Create an unconstrained query selecting every column
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predicate, ANDed with the existing ones
    pub fn filter(&mut self, predicate: impl Into<Predicate>) -> &mut Self {
        self.predicates.push(predicate.into());
        self
    }

    /// `field = value`
    pub fn where_eq(&mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> &mut Self {
        self.filter(FilterCondition::eq(field, value))
    }

    /// `field IN (values...)`
    pub fn where_in<T: Into<FilterValue>>(
        &mut self,
        field: impl Into<String>,
        values: Vec<T>,
    ) -> &mut Self {
        self.filter(FilterCondition::is_in(field, values))
    }

    /// `field LIKE pattern`
    pub fn where_like(&mut self, field: impl Into<String>, pattern: impl Into<String>) -> &mut Self {
        self.filter(FilterCondition::like(field, pattern))
    }

    /// Raw fragment with `?` placeholders
    pub fn where_raw(&mut self, sql: impl Into<String>, bindings: Vec<FilterValue>) -> &mut Self {
        self.filter(Predicate::raw(sql, bindings))
    }

    /// Append an ordering term
    pub fn order_by(&mut self, field: impl Into<String>, direction: SortDirection) -> &mut Self {
        self.orders.push(OrderClause {
            field: field.into(),
            direction,
        });
        self
    }

    /// Restrict the selected columns; `*` or an empty list selects everything
    pub fn select<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Top-level predicates
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Ordering terms, in priority order
    pub fn orders(&self) -> &[OrderClause] {
        &self.orders
    }

    /// Selected columns
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether every column is selected
    pub fn selects_all(&self) -> bool {
        self.columns.is_empty() || self.columns.iter().any(|c| c == "*")
    }

    /// All predicates as a single conjunction, if any exist
    pub fn predicate(&self) -> Option<Predicate> {
        match self.predicates.as_slice() {
            [] => None,
            [single] => Some(single.clone()),
            many => Some(Predicate::All(many.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_query_selects_all() {
        let query = Query::new();
        assert!(query.selects_all());
        assert!(query.predicate().is_none());
    }

    #[test]
    fn test_select_star_selects_all() {
        let mut query = Query::new();
        query.select(["*"]);
        assert!(query.selects_all());
        query.select(["id", "name"]);
        assert!(!query.selects_all());
        assert_eq!(query.columns(), ["id", "name"]);
    }

    #[test]
    fn test_single_predicate_is_not_wrapped() {
        let mut query = Query::new();
        query.where_eq("role", "admin");
        assert!(matches!(query.predicate(), Some(Predicate::Condition(_))));

        query.where_in("id", vec![1, 2]);
        assert!(matches!(query.predicate(), Some(Predicate::All(ref p)) if p.len() == 2));
    }

    #[test]
    fn test_orders_keep_insertion_order() {
        let mut query = Query::new();
        query
            .order_by("name", SortDirection::Asc)
            .order_by("id", SortDirection::Desc);
        let fields: Vec<_> = query.orders().iter().map(|o| o.field.as_str()).collect();
        assert_eq!(fields, ["name", "id"]);
    }
}
