//! Filter units
//!
//! A [`Filter`] declares the request fields it reads and applies constraints
//! to the [`Query`] handle. Optional capabilities have default
//! implementations:
//!
//! - [`applies`](Filter::applies): runs the filter only when one of its fields is filled
//! - [`rules`](Filter::rules): validation rules for the declared fields
//! - [`options`](Filter::options): values advertised in the response's `options`
//!
//! Stock filters cover the common cases; anything else can be expressed with a
//! [`CallbackFilter`] or a dedicated type.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::filter::Filter;
//! use searchable_resource::params::ParameterBag;
//! use searchable_resource::query::{FilterCondition, Query};
//! use searchable_resource::validation::{Rule, RuleSet};
//!
//! struct MinimumAge;
//!
//! impl Filter for MinimumAge {
//!     fn fields(&self) -> Vec<String> {
//!         vec!["min_age".to_string()]
//!     }
//!
//!     fn applies(&self, params: &ParameterBag) -> bool {
//!         params.filled("min_age")
//!     }
//!
//!     fn rules(&self) -> RuleSet {
//!         RuleSet::new().with("min_age", vec![Rule::Integer, Rule::Min(0.0)])
//!     }
//!
//!     fn apply(&self, query: &mut Query, params: &ParameterBag) {
//!         if let Some(age) = params.get_i64("min_age") {
//!             query.filter(FilterCondition::gte("age", age));
//!         }
//!     }
//! }
//! ```

use std::fmt;

use serde_json::Value;

use crate::options::OptionSet;
use crate::params::ParameterBag;
use crate::query::{FilterCondition, FilterValue, Predicate, Query};
use crate::validation::{Rule, RuleSet};

/// A reusable unit that maps request fields to query constraints
pub trait Filter: Send + Sync {
    /// Request fields this filter reads; must not be empty
    fn fields(&self) -> Vec<String>;

    /// Apply constraints to the query
    ///
    /// `params` holds only this filter's declared fields.
    fn apply(&self, query: &mut Query, params: &ParameterBag);

    /// Whether the filter should run for this request
    ///
    /// Evaluated against the unvalidated parameters. By default a filter runs
    /// when at least one of its fields is filled; override to run
    /// unconditionally or on another condition.
    fn applies(&self, params: &ParameterBag) -> bool {
        any_filled(params, &self.fields())
    }

    /// Validation rules for the declared fields
    fn rules(&self) -> RuleSet {
        RuleSet::new()
    }

    /// Option values to advertise, keyed by option name
    fn options(&self) -> OptionSet {
        OptionSet::new()
    }

    /// Name used in logs and configuration errors
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F: Filter + ?Sized> Filter for Box<F> {
    fn fields(&self) -> Vec<String> {
        (**self).fields()
    }

    fn apply(&self, query: &mut Query, params: &ParameterBag) {
        (**self).apply(query, params)
    }

    fn applies(&self, params: &ParameterBag) -> bool {
        (**self).applies(params)
    }

    fn rules(&self) -> RuleSet {
        (**self).rules()
    }

    fn options(&self) -> OptionSet {
        (**self).options()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Whether any of the fields is filled
pub fn any_filled(params: &ParameterBag, fields: &[String]) -> bool {
    fields.iter().any(|field| params.filled(field))
}

/// `attribute = value`, or `attribute IN (...)` for list values
///
/// Runs only when its field is filled.
///
/// ```rust
/// use searchable_resource::filter::{EqualsFilter, Filter};
/// use searchable_resource::params::RequestParams;
/// use searchable_resource::query::Query;
///
/// let filter = EqualsFilter::new("role")
///     .with_rule_str("sometimes|string|in:admin,editor,guest")
///     .unwrap()
///     .with_options(["admin", "editor", "guest"]);
///
/// let params = RequestParams::parse("role=admin").to_bag();
/// assert!(filter.applies(&params));
///
/// let mut query = Query::new();
/// filter.apply(&mut query, &params);
/// assert_eq!(query.predicates().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct EqualsFilter {
    field: String,
    attribute: String,
    rules: Vec<Rule>,
    options: Vec<Value>,
}

impl EqualsFilter {
    /// Filter on a column with the same name as the request field
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            attribute: field.clone(),
            field,
            rules: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Filter on a differently named column
    #[must_use]
    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    /// Validation rules for the field
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = rules;
        self
    }

    /// Validation rules for the field, as a pipe-delimited string
    pub fn with_rule_str(self, rules: &str) -> Result<Self, crate::error::ConfigurationError> {
        Ok(self.with_rules(Rule::parse_list(rules)?))
    }

    /// Values to advertise under the field's name
    #[must_use]
    pub fn with_options<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.options = values.into_iter().map(Into::into).collect();
        self
    }
}

impl Filter for EqualsFilter {
    fn fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn applies(&self, params: &ParameterBag) -> bool {
        params.filled(&self.field)
    }

    fn rules(&self) -> RuleSet {
        if self.rules.is_empty() {
            return RuleSet::new();
        }
        RuleSet::new().with(self.field.clone(), self.rules.clone())
    }

    fn options(&self) -> OptionSet {
        if self.options.is_empty() {
            return OptionSet::new();
        }
        OptionSet::new().with(self.field.clone(), self.options.clone())
    }

    fn apply(&self, query: &mut Query, params: &ParameterBag) {
        match params.get(&self.field) {
            Some(Value::Array(items)) => {
                let values: Vec<FilterValue> = items.iter().map(FilterValue::from_json).collect();
                query.filter(FilterCondition::is_in(self.attribute.clone(), values));
            }
            Some(Value::Null) | None => {}
            Some(value) => {
                query.where_eq(self.attribute.clone(), FilterValue::from_json(value));
            }
        }
    }

    fn name(&self) -> &str {
        "EqualsFilter"
    }
}

/// Case-insensitive substring match of one term across several columns (OR)
///
/// Reads the `search` field unless told otherwise. Runs only when the term is
/// filled.
#[derive(Debug, Clone)]
pub struct SearchFilter {
    field: String,
    columns: Vec<String>,
}

impl SearchFilter {
    /// Search the given columns using the `search` field
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: "search".to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Read the term from a different field
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

impl Filter for SearchFilter {
    fn fields(&self) -> Vec<String> {
        vec![self.field.clone()]
    }

    fn applies(&self, params: &ParameterBag) -> bool {
        params.filled(&self.field)
    }

    fn apply(&self, query: &mut Query, params: &ParameterBag) {
        let Some(term) = params.get_str(&self.field).map(str::trim) else {
            return;
        };
        if term.is_empty() || self.columns.is_empty() {
            return;
        }

        query.filter(Predicate::any(
            self.columns
                .iter()
                .map(|column| FilterCondition::contains(column.clone(), term)),
        ));
    }

    fn name(&self) -> &str {
        "SearchFilter"
    }
}

type ApplyFn = dyn Fn(&mut Query, &ParameterBag) + Send + Sync;
type AppliesFn = dyn Fn(&ParameterBag) -> bool + Send + Sync;

/// Filter built from closures
///
/// Conditional by default: it runs when any of its fields is filled. Use
/// [`always`](Self::always) or [`when`](Self::when) to change that.
///
/// ```rust
/// use searchable_resource::filter::{CallbackFilter, Filter};
/// use searchable_resource::params::ParameterBag;
/// use searchable_resource::query::{FilterCondition, Query};
///
/// let active_only = CallbackFilter::new(["active"], |query, _params| {
///     query.filter(FilterCondition::eq("active", true));
/// })
/// .always();
///
/// assert!(active_only.applies(&ParameterBag::new()));
/// ```
pub struct CallbackFilter {
    name: String,
    fields: Vec<String>,
    apply: Box<ApplyFn>,
    applies: Option<Box<AppliesFn>>,
    conditional: bool,
    rules: RuleSet,
    options: OptionSet,
}

impl CallbackFilter {
    /// Filter over `fields` applying `apply`
    pub fn new<I, S, F>(fields: I, apply: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&mut Query, &ParameterBag) + Send + Sync + 'static,
    {
        Self {
            name: "CallbackFilter".to_string(),
            fields: fields.into_iter().map(Into::into).collect(),
            apply: Box::new(apply),
            applies: None,
            conditional: true,
            rules: RuleSet::new(),
            options: OptionSet::new(),
        }
    }

    /// Run on every request
    #[must_use]
    pub fn always(mut self) -> Self {
        self.conditional = false;
        self.applies = None;
        self
    }

    /// Run only when the predicate holds for the unvalidated parameters
    #[must_use]
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ParameterBag) -> bool + Send + Sync + 'static,
    {
        self.conditional = true;
        self.applies = Some(Box::new(predicate));
        self
    }

    /// Validation rules
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = rules;
        self
    }

    /// Advertised options
    #[must_use]
    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }

    /// Name used in logs
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl fmt::Debug for CallbackFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackFilter")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("conditional", &self.conditional)
            .finish_non_exhaustive()
    }
}

impl Filter for CallbackFilter {
    fn fields(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn applies(&self, params: &ParameterBag) -> bool {
        match (&self.applies, self.conditional) {
            (Some(predicate), _) => predicate(params),
            (None, true) => any_filled(params, &self.fields),
            (None, false) => true,
        }
    }

    fn rules(&self) -> RuleSet {
        self.rules.clone()
    }

    fn options(&self) -> OptionSet {
        self.options.clone()
    }

    fn apply(&self, query: &mut Query, params: &ParameterBag) {
        (self.apply)(query, params)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::RequestParams;
    use crate::query::{FilterOperator, Predicate};
    use serde_json::json;

    fn bag(query: &str) -> ParameterBag {
        RequestParams::parse(query).to_bag()
    }

    #[test]
    fn test_equals_filter_scalar() {
        let filter = EqualsFilter::new("role").attribute("users.role");
        let mut query = Query::new();
        filter.apply(&mut query, &bag("role=admin"));

        assert_eq!(
            query.predicates(),
            &[Predicate::Condition(FilterCondition::eq("users.role", "admin"))]
        );
    }

    #[test]
    fn test_equals_filter_list_uses_in() {
        let filter = EqualsFilter::new("role");
        let mut query = Query::new();
        filter.apply(&mut query, &bag("role[]=admin&role[]=guest"));

        match &query.predicates()[0] {
            Predicate::Condition(condition) => {
                assert_eq!(condition.operator, FilterOperator::In);
                assert_eq!(condition.value.as_list().len(), 2);
            }
            other => panic!("unexpected predicate {other:?}"),
        }
    }

    #[test]
    fn test_equals_filter_applicability() {
        let filter = EqualsFilter::new("role");
        assert!(filter.applies(&bag("role=admin")));
        assert!(!filter.applies(&bag("role=")));
        assert!(!filter.applies(&bag("other=1")));
    }

    #[test]
    fn test_equals_filter_rules_and_options() {
        let filter = EqualsFilter::new("role")
            .with_rule_str("sometimes|string|in:admin,editor,guest")
            .unwrap()
            .with_options(["admin", "editor"]);

        assert_eq!(filter.rules().get("role").map(<[Rule]>::len), Some(3));
        assert_eq!(
            filter.options().get("role"),
            Some(&[json!("admin"), json!("editor")][..])
        );
        assert!(EqualsFilter::new("x").rules().is_empty());
    }

    #[test]
    fn test_search_filter_builds_or_group() {
        let filter = SearchFilter::new(["name", "email"]);
        let mut query = Query::new();
        filter.apply(&mut query, &bag("search=%20ali%20"));

        assert_eq!(
            query.predicates(),
            &[Predicate::any([
                FilterCondition::contains("name", "ali"),
                FilterCondition::contains("email", "ali"),
            ])]
        );
    }

    #[test]
    fn test_search_filter_custom_field() {
        let filter = SearchFilter::new(["title"]).field("q");
        assert_eq!(filter.fields(), vec!["q"]);
        assert!(filter.applies(&bag("q=rust")));
        assert!(!filter.applies(&bag("search=rust")));
    }

    #[test]
    fn test_callback_filter_modes() {
        let filter = CallbackFilter::new(["status"], |query, params| {
            if let Some(status) = params.get_str("status") {
                query.where_eq("status", status);
            }
        });
        assert!(filter.applies(&bag("status=open")));
        assert!(!filter.applies(&bag("")));

        let filter = filter.always();
        assert!(filter.applies(&bag("")));

        let filter = filter.when(|params| params.contains("flag"));
        assert!(filter.applies(&bag("flag=")));
        assert!(!filter.applies(&bag("status=open")));
    }

    #[test]
    fn test_boxed_filter_delegates() {
        let filter: Box<dyn Filter> = Box::new(SearchFilter::new(["name"]));
        assert_eq!(filter.name(), "SearchFilter");
        assert_eq!(filter.fields(), vec!["search"]);
    }

    #[test]
    fn test_default_name_is_type_name() {
        struct Plain;
        impl Filter for Plain {
            fn fields(&self) -> Vec<String> {
                vec!["x".into()]
            }
            fn apply(&self, _query: &mut Query, _params: &ParameterBag) {}
        }

        assert!(Plain.name().ends_with("Plain"));
        assert!(!Plain.applies(&ParameterBag::new()));
        assert!(!Plain.applies(&bag("x=")));
        assert!(Plain.applies(&bag("x=1")));
    }
}
