//! Searchable list builder
//!
//! [`SearchableBuilder`] turns request parameters into a filtered, ordered,
//! optionally paginated query and wraps the result in a
//! [`SearchableResponse`]. A builder lives for one request:
//!
//! 1. **Configuring**: filters, options, rules and pagination are declared
//! 2. **Validating**: rules of the applicable filters, caller rules and the
//!    reserved parameter rules are checked against the request
//! 3. **Applying**: each applicable filter mutates the query, in registration order
//! 4. **Ordering** / **Paginating**: `order_by`, `sort`, `page` and `per_page` are applied
//! 5. **Executed**: the engine ran and the envelope was assembled
//!
//! A validation failure ends the pipeline before the engine is touched.
//! [`execute`](SearchableBuilder::execute) consumes the builder, so a builder
//! cannot run twice. Filters are assumed to commute; registration order only
//! decides the order in which their predicates are added.
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::prelude::*;
//! use serde_json::json;
//!
//! # tokio_test_block(async {
//! let engine = MemoryEngine::from_values(vec![
//!     json!({"id": 1, "name": "Ada", "role": "admin"}),
//!     json!({"id": 2, "name": "Grace", "role": "editor"}),
//! ]);
//!
//! let response = SearchableBuilder::new(&engine)
//!     .query(EqualsFilter::new("role"))
//!     .unwrap()
//!     .paginate(10)
//!     .execute(&RequestParams::parse("role=editor"))
//!     .await
//!     .unwrap();
//!
//! assert_eq!(response.data, vec![json!({"id": 2, "name": "Grace", "role": "editor"})]);
//! assert_eq!(response.query["role"], "editor");
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{ConfigurationError, Error, Result};
use crate::filter::Filter;
use crate::options::{FormatOptions, OptionSet, OptionsFormatter};
use crate::params::{ParameterBag, RequestParams};
use crate::query::{PageRequest, Query, QueryEngine, Row, SortDirection};
use crate::registry::{Registry, Resource};
use crate::response::{render_options, render_row, Appender, PaginationMeta, SearchableResponse};
use crate::responses::ValidationError;
use crate::validation::{Rule, RuleSet, Validate, Validator};

/// Pipeline stage, recorded on log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Filters, options and rules are being declared
    Configuring,
    /// Request parameters are being validated
    Validating,
    /// Filter predicates are being applied
    Applying,
    /// Order clause is being applied
    Ordering,
    /// Page window is being applied
    Paginating,
    /// The engine ran and the response was assembled
    Executed,
    /// Validation or execution failed
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuring => "configuring",
            Stage::Validating => "validating",
            Stage::Applying => "applying",
            Stage::Ordering => "ordering",
            Stage::Paginating => "paginating",
            Stage::Executed => "executed",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How results are materialized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaginationMode {
    /// Every matching row
    #[default]
    None,
    /// One page, with a total count
    LengthAware,
    /// One page, without a total count
    Simple,
}

impl PaginationMode {
    /// Whether results are paginated
    pub fn is_paginated(self) -> bool {
        self != PaginationMode::None
    }
}

/// A query compiled from validated request parameters, ready to run
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Query with filters, ordering and column selection applied
    pub query: Query,
    /// Validated parameters, plus raw values of unruled filter fields
    pub params: ParameterBag,
    /// Fields declared by the filters that applied, in registration order
    pub fields: Vec<String>,
    /// Effective order column
    pub order_by: String,
    /// Effective direction
    pub sort: SortDirection,
    /// Page window, when paginated
    pub page: Option<PageRequest>,
}

impl CompiledQuery {
    /// Parameters echoed back in the envelope's `query` block
    ///
    /// Filter fields first, then `order_by`, `sort`, the page window when
    /// paginated, and `search` when it was filled.
    pub fn echo(&self) -> Map<String, Value> {
        let mut echo: Map<String, Value> = self
            .fields
            .iter()
            .filter_map(|field| {
                self.params
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect();

        echo.insert("order_by".to_string(), Value::String(self.order_by.clone()));
        echo.insert("sort".to_string(), Value::String(self.sort.to_string()));

        if let Some(page) = self.page {
            echo.insert("page".to_string(), Value::from(page.page));
            echo.insert("per_page".to_string(), Value::from(page.per_page));
        }

        if self.params.filled("search") {
            if let Some(search) = self.params.get("search") {
                echo.insert("search".to_string(), search.clone());
            }
        }

        echo
    }
}

/// Request-scoped builder for searchable list endpoints
pub struct SearchableBuilder<E> {
    engine: E,
    base: Query,
    filters: Vec<Box<dyn Filter>>,
    rules: RuleSet,
    options: OptionSet,
    pagination: PaginationMode,
    per_page: u64,
    per_page_options: Vec<u64>,
    orderable: Vec<String>,
    order_by: String,
    sort: SortDirection,
    search_max_length: u32,
    labeled: bool,
    formatter: Arc<dyn FormatOptions>,
    validator: Arc<dyn Validate>,
    select: Vec<String>,
    appendable: Vec<(String, Appender)>,
    resource: Option<Resource>,
    with: Map<String, Value>,
}

impl<E: QueryEngine> SearchableBuilder<E> {
    /// Create a builder with built-in defaults
    pub fn new(engine: E) -> Self {
        Self::from_config(engine, &Config::default())
    }

    /// Create a builder with defaults taken from configuration
    pub fn from_config(engine: E, config: &Config) -> Self {
        tracing::debug!(stage = %Stage::Configuring, "Creating searchable builder");

        Self {
            engine,
            base: Query::new(),
            filters: Vec::new(),
            rules: RuleSet::new(),
            options: OptionSet::new(),
            pagination: PaginationMode::None,
            per_page: config.pagination.default_per_page,
            per_page_options: config.pagination.per_page_options.clone(),
            orderable: Vec::new(),
            order_by: config.ordering.order_by.clone(),
            sort: config.ordering.sort,
            search_max_length: config.search.max_length,
            labeled: config.labeled,
            formatter: Arc::new(OptionsFormatter::new()),
            validator: Arc::new(Validator),
            select: Vec::new(),
            appendable: Vec::new(),
            resource: None,
            with: Map::new(),
        }
    }

    /// Start from an existing query (scopes, joins, tenant constraints)
    #[must_use]
    pub fn base_query(mut self, query: Query) -> Self {
        self.base = query;
        self
    }

    /// Register a filter
    ///
    /// Fails when the filter declares no fields. Its options are merged
    /// immediately, whether or not it applies to a given request.
    pub fn query<F: Filter + 'static>(self, filter: F) -> std::result::Result<Self, ConfigurationError> {
        self.register(Box::new(filter))
    }

    /// Register several boxed filters, in order
    pub fn queries<I>(self, filters: I) -> std::result::Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = Box<dyn Filter>>,
    {
        filters
            .into_iter()
            .try_fold(self, |builder, filter| builder.register(filter))
    }

    /// Register filters by their registry names, in order
    pub fn queries_named<I, S>(self, registry: &Registry, names: I) -> std::result::Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(self, |builder, name| {
            let filter = registry.resolve(name.as_ref())?;
            builder.register(filter)
        })
    }

    fn register(mut self, filter: Box<dyn Filter>) -> std::result::Result<Self, ConfigurationError> {
        if filter.fields().is_empty() {
            return Err(ConfigurationError::NoFields {
                filter: filter.name().to_string(),
            });
        }

        tracing::debug!(
            stage = %Stage::Configuring,
            filter = filter.name(),
            fields = ?filter.fields(),
            "Registered filter"
        );

        self.options.merge(filter.options());
        self.filters.push(filter);
        Ok(self)
    }

    /// Paginate with a total count
    #[must_use]
    pub fn paginate(mut self, per_page: u64) -> Self {
        self.pagination = PaginationMode::LengthAware;
        self.per_page = per_page;
        self
    }

    /// Paginate without a total count
    #[must_use]
    pub fn simple_paginate(mut self, per_page: u64) -> Self {
        self.pagination = PaginationMode::Simple;
        self.per_page = per_page;
        self
    }

    /// Page sizes clients may request
    #[must_use]
    pub fn per_page_options<I: IntoIterator<Item = u64>>(mut self, options: I) -> Self {
        self.per_page_options = options.into_iter().collect();
        self
    }

    /// Columns clients may order by
    ///
    /// Defaults to the default order column alone.
    #[must_use]
    pub fn orderable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orderable = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Default order column
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = column.into();
        self
    }

    /// Default direction
    #[must_use]
    pub fn sort(mut self, direction: SortDirection) -> Self {
        self.sort = direction;
        self
    }

    /// Maximum length of the `search` parameter
    #[must_use]
    pub fn search_max_length(mut self, max_length: u32) -> Self {
        self.search_max_length = max_length;
        self
    }

    /// Render options as `{label, value}` pairs
    #[must_use]
    pub fn labeled(mut self, labeled: bool) -> Self {
        self.labeled = labeled;
        self
    }

    /// Replace the option formatter used in labeled mode
    #[must_use]
    pub fn formatter(mut self, formatter: impl FormatOptions + 'static) -> Self {
        self.formatter = Arc::new(formatter);
        self
    }

    /// Replace the validator
    #[must_use]
    pub fn validator(mut self, validator: impl Validate + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Advertise extra option values under a key
    #[must_use]
    pub fn options<I, V>(mut self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.options.extend(key, values);
        self
    }

    /// Add validation rules; reserved parameters keep their built-in rules
    #[must_use]
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules.merge(rules);
        self
    }

    /// Add a top-level key to the envelope
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with.insert(key.into(), value.into());
        self
    }

    /// Add several top-level keys to the envelope
    #[must_use]
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.with.extend(data);
        self
    }

    /// Restrict fetched columns
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a computed attribute to every row
    #[must_use]
    pub fn appendable<F>(mut self, name: impl Into<String>, append: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.appendable.push((name.into(), Arc::new(append)));
        self
    }

    /// Transform every row with this function
    #[must_use]
    pub fn resource<F>(mut self, resource: F) -> Self
    where
        F: Fn(Row) -> Value + Send + Sync + 'static,
    {
        self.resource = Some(Arc::new(resource));
        self
    }

    /// Transform every row with a registered resource
    pub fn resource_named(mut self, registry: &Registry, name: &str) -> std::result::Result<Self, ConfigurationError> {
        self.resource = Some(registry.resolve_resource(name)?);
        Ok(self)
    }

    /// Apply `f` only when `condition` holds
    #[must_use]
    pub fn when<F>(self, condition: bool, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        if condition {
            f(self)
        } else {
            self
        }
    }

    /// Run `f` against the builder and keep going
    #[must_use]
    pub fn tap<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        f(&mut self);
        self
    }

    /// Columns clients may order by, defaulting to the default order column
    pub fn orderable_columns(&self) -> Vec<String> {
        if self.orderable.is_empty() {
            vec![self.order_by.clone()]
        } else {
            self.orderable.clone()
        }
    }

    /// Current pagination mode
    pub fn pagination_mode(&self) -> PaginationMode {
        self.pagination
    }

    /// Number of registered filters
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Rules for the reserved parameters
    ///
    /// `page` and `per_page` are only ruled when paginating.
    pub fn reserved_rules(&self) -> RuleSet {
        let mut rules = RuleSet::new()
            .with(
                "search",
                vec![
                    Rule::Sometimes,
                    Rule::Nullable,
                    Rule::String,
                    Rule::Max(f64::from(self.search_max_length)),
                ],
            )
            .with(
                "sort",
                vec![
                    Rule::Sometimes,
                    Rule::String,
                    Rule::in_values(SortDirection::ALL.iter().map(|d| d.as_str())),
                ],
            )
            .with(
                "order_by",
                vec![
                    Rule::Sometimes,
                    Rule::String,
                    Rule::in_values(self.orderable_columns()),
                ],
            );

        if self.pagination.is_paginated() {
            rules.insert("page", vec![Rule::Sometimes, Rule::Integer, Rule::Min(1.0)]);
            rules.insert(
                "per_page",
                vec![
                    Rule::Sometimes,
                    Rule::Integer,
                    Rule::in_values(&self.per_page_options),
                ],
            );
        }

        rules
    }

    /// Validate the request and compile the query without running it
    pub fn compile(&self, params: &RequestParams) -> std::result::Result<CompiledQuery, ValidationError> {
        let raw = params.to_bag();

        let active: Vec<&dyn Filter> = self
            .filters
            .iter()
            .map(|filter| filter.as_ref())
            .filter(|filter| {
                let applies = filter.applies(&raw);
                if !applies {
                    tracing::debug!(filter = filter.name(), "Filter does not apply, skipping");
                }
                applies
            })
            .collect();

        tracing::debug!(
            stage = %Stage::Validating,
            registered = self.filters.len(),
            applicable = active.len(),
            "Validating request parameters"
        );

        let mut rules = RuleSet::new();
        for filter in &active {
            rules.merge(filter.rules());
        }
        rules.merge(self.rules.clone());
        rules.merge(self.reserved_rules());

        let mut bag = match self.validator.validate(&rules, params) {
            Ok(bag) => bag,
            Err(errors) => {
                let fields: Vec<&str> = errors.fields().collect();
                tracing::warn!(stage = %Stage::Failed, ?fields, "Request rejected by validation");
                return Err(errors);
            }
        };

        // Declared fields without rules pass through unvalidated
        for filter in &active {
            for field in filter.fields() {
                if !rules.contains(&field) {
                    if let Some(value) = raw.get(&field) {
                        bag.insert(field, value.clone());
                    }
                }
            }
        }

        let mut query = self.base.clone();
        let mut fields: Vec<String> = Vec::new();

        for filter in &active {
            let declared = filter.fields();
            tracing::debug!(stage = %Stage::Applying, filter = filter.name(), "Applying filter");
            filter.apply(&mut query, &bag.only(declared.as_slice()));

            for field in declared {
                if !fields.contains(&field) {
                    fields.push(field);
                }
            }
        }

        let order_by = bag
            .get_str("order_by")
            .map(str::to_string)
            .unwrap_or_else(|| self.order_by.clone());
        let sort = bag
            .get_str("sort")
            .and_then(|s| s.parse().ok())
            .unwrap_or(self.sort);

        tracing::debug!(stage = %Stage::Ordering, %order_by, %sort, "Applying order");
        query.order_by(order_by.clone(), sort);

        if !self.select.is_empty() {
            query.select(self.select.iter().cloned());
        }

        let page = self.pagination.is_paginated().then(|| {
            let page = bag.get_u64("page").unwrap_or(1);
            let per_page = bag.get_u64("per_page").unwrap_or(self.per_page);
            tracing::debug!(stage = %Stage::Paginating, page, per_page, "Applying page window");
            match self.pagination {
                PaginationMode::Simple => PageRequest::simple(page, per_page),
                _ => PageRequest::new(page, per_page),
            }
        });

        Ok(CompiledQuery {
            query,
            params: bag,
            fields,
            order_by,
            sort,
            page,
        })
    }

    /// Validate, compile, run and wrap the results
    ///
    /// Validation errors are returned before the engine is called.
    pub async fn execute(self, params: &RequestParams) -> Result<SearchableResponse> {
        let compiled = self.compile(params)?;

        let (rows, pagination) = match compiled.page {
            Some(request) => {
                let page = self
                    .engine
                    .paginate(&compiled.query, request)
                    .await
                    .map_err(|e| self.execution_failed(e))?;
                let meta = PaginationMeta::from_page(&page);
                (page.items, Some(meta))
            }
            None => {
                let rows = self
                    .engine
                    .fetch(&compiled.query)
                    .await
                    .map_err(|e| self.execution_failed(e))?;
                (rows, None)
            }
        };

        let data = rows
            .into_iter()
            .map(|row| render_row(row, &self.appendable, self.resource.as_ref()))
            .collect::<Vec<_>>();

        let options = render_options(self.option_set(), self.labeled, self.formatter.as_ref());

        tracing::info!(
            stage = %Stage::Executed,
            rows = data.len(),
            paginated = pagination.is_some(),
            "Searchable query executed"
        );

        Ok(SearchableResponse {
            data,
            query: compiled.echo(),
            options,
            pagination,
            with: self.with,
        })
    }

    /// Built-in options followed by filter and caller contributions
    fn option_set(&self) -> OptionSet {
        let mut options = OptionSet::new()
            .with("sort", SortDirection::ALL.iter().map(|d| d.as_str()))
            .with("order_by", self.orderable_columns());

        if self.pagination.is_paginated() {
            options.extend("per_page", self.per_page_options.iter().copied());
        }

        options.merge(self.options.clone());
        options
    }

    fn execution_failed(&self, error: crate::query::QueryError) -> Error {
        tracing::error!(
            stage = %Stage::Failed,
            operation = %error.operation,
            kind = %error.kind,
            "Query engine failed: {}", error.message
        );
        Error::Execution(error)
    }
}

impl<E> fmt::Debug for SearchableBuilder<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<&str> = self.filters.iter().map(|filter| filter.name()).collect();
        f.debug_struct("SearchableBuilder")
            .field("filters", &filters)
            .field("pagination", &self.pagination)
            .field("per_page", &self.per_page)
            .field("order_by", &self.order_by)
            .field("sort", &self.sort)
            .field("labeled", &self.labeled)
            .finish_non_exhaustive()
    }
}
