//! Parameter validation
//!
//! Rules are declared per field, either as [`Rule`] values or as pipe-delimited
//! strings (`"sometimes|integer|min:1"`). The [`Validator`] checks raw
//! [`RequestParams`] against a [`RuleSet`] and produces a typed
//! [`ParameterBag`] or a [`ValidationError`] listing every offending field.
//!
//! Semantics:
//!
//! - `sometimes`: skip the field entirely when it was not sent
//! - `required`: the field must be present and non-blank
//! - fields that are blank and not required pass without running other rules
//! - `numeric`, `integer`, `boolean` and `uuid` coerce the value they accept
//! - `min`/`max` compare numbers in a numeric context, element counts for
//!   lists and character counts otherwise
//!
//! # Example
//!
//! ```rust
//! use searchable_resource::params::RequestParams;
//! use searchable_resource::validation::{RuleSet, Validate, Validator};
//!
//! let rules = RuleSet::new()
//!     .with_str("page", "sometimes|integer|min:1").unwrap()
//!     .with_str("sort", "sometimes|string|in:asc,desc").unwrap();
//!
//! let ok = Validator.validate(&rules, &RequestParams::parse("page=2&sort=asc")).unwrap();
//! assert_eq!(ok.get_u64("page"), Some(2));
//!
//! let err = Validator.validate(&rules, &RequestParams::parse("page=0&sort=up")).unwrap_err();
//! assert_eq!(err.fields().collect::<Vec<_>>(), vec!["page", "sort"]);
//! ```

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde_json::Value;

use crate::error::ConfigurationError;
use crate::params::{is_filled, ParameterBag, RequestParams};
use crate::responses::ValidationError;

/// A single validation rule
#[derive(Debug, Clone)]
pub enum Rule {
    /// Must be present and non-blank
    Required,
    /// Only validate when present
    Sometimes,
    /// Blank values are accepted and passed through as null
    Nullable,
    /// Must be a string
    String,
    /// Must be numeric; coerced to a number
    Numeric,
    /// Must be an integer; coerced to an integer
    Integer,
    /// Must be a boolean (`true`, `false`, `1`, `0`); coerced to a boolean
    Boolean,
    /// Must be a list (`key[]=...`)
    Array,
    /// Must be a date (`YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS` or RFC 3339)
    Date,
    /// Must be a UUID; normalized to lowercase hyphenated form
    Uuid,
    /// Lower bound on value, length or count
    Min(f64),
    /// Upper bound on value, length or count
    Max(f64),
    /// Must be one of the listed values
    In(Vec<String>),
    /// Must match the pattern
    Regex(Regex),
}

impl Rule {
    /// `in:` rule from any displayable values
    ///
    /// ```rust
    /// use searchable_resource::validation::Rule;
    ///
    /// let rule = Rule::in_values([10, 25, 50]);
    /// assert_eq!(rule.to_string(), "in:10,25,50");
    /// ```
    pub fn in_values<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Rule::In(values.into_iter().map(|v| v.to_string()).collect())
    }

    /// `regex:` rule, failing on an invalid pattern
    pub fn regex(pattern: &str) -> Result<Self, ConfigurationError> {
        Regex::new(pattern)
            .map(Rule::Regex)
            .map_err(|e| ConfigurationError::invalid_rule(format!("regex:{pattern}"), e.to_string()))
    }

    /// Parse a pipe-delimited rule string
    ///
    /// Patterns containing `|` must be declared with [`Rule::regex`] instead.
    pub fn parse_list(rules: &str) -> Result<Vec<Rule>, ConfigurationError> {
        rules
            .split('|')
            .map(str::trim)
            .filter(|rule| !rule.is_empty())
            .map(str::parse)
            .collect()
    }

    fn is_numeric_type(&self) -> bool {
        matches!(self, Rule::Numeric | Rule::Integer)
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Rule::Min(a), Rule::Min(b)) | (Rule::Max(a), Rule::Max(b)) => a == b,
            (Rule::In(a), Rule::In(b)) => a == b,
            (Rule::Regex(a), Rule::Regex(b)) => a.as_str() == b.as_str(),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Required => write!(f, "required"),
            Rule::Sometimes => write!(f, "sometimes"),
            Rule::Nullable => write!(f, "nullable"),
            Rule::String => write!(f, "string"),
            Rule::Numeric => write!(f, "numeric"),
            Rule::Integer => write!(f, "integer"),
            Rule::Boolean => write!(f, "boolean"),
            Rule::Array => write!(f, "array"),
            Rule::Date => write!(f, "date"),
            Rule::Uuid => write!(f, "uuid"),
            Rule::Min(n) => write!(f, "min:{}", format_number(*n)),
            Rule::Max(n) => write!(f, "max:{}", format_number(*n)),
            Rule::In(values) => write!(f, "in:{}", values.join(",")),
            Rule::Regex(re) => write!(f, "regex:{}", re.as_str()),
        }
    }
}

impl FromStr for Rule {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, argument) = match s.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument)),
            None => (s.trim(), None),
        };

        let bound = |argument: &str| {
            argument
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigurationError::invalid_rule(s, "expected a numeric bound"))
        };

        match (name, argument) {
            ("required", None) => Ok(Rule::Required),
            ("sometimes", None) => Ok(Rule::Sometimes),
            ("nullable", None) => Ok(Rule::Nullable),
            ("string", None) => Ok(Rule::String),
            ("numeric", None) => Ok(Rule::Numeric),
            ("integer", None) => Ok(Rule::Integer),
            ("boolean", None) => Ok(Rule::Boolean),
            ("array", None) => Ok(Rule::Array),
            ("date", None) => Ok(Rule::Date),
            ("uuid", None) => Ok(Rule::Uuid),
            ("min", Some(argument)) => bound(argument).map(Rule::Min),
            ("max", Some(argument)) => bound(argument).map(Rule::Max),
            ("in", Some(argument)) => Ok(Rule::In(
                argument.split(',').map(|v| v.trim().to_string()).collect(),
            )),
            ("regex", Some(argument)) => Rule::regex(argument),
            _ => Err(ConfigurationError::invalid_rule(
                s,
                "unknown rule or missing argument",
            )),
        }
    }
}

/// Rules keyed by field, in declaration order
///
/// Declaring a field twice replaces its earlier rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    entries: Vec<(String, Vec<Rule>)>,
}

impl RuleSet {
    /// Create an empty rule set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rules for a field, replacing any earlier ones
    pub fn insert(&mut self, field: impl Into<String>, rules: Vec<Rule>) {
        let field = field.into();
        match self.entries.iter_mut().find(|(name, _)| *name == field) {
            Some((_, existing)) => *existing = rules,
            None => self.entries.push((field, rules)),
        }
    }

    /// Builder-style variant of [`insert`](Self::insert)
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, rules: Vec<Rule>) -> Self {
        self.insert(field, rules);
        self
    }

    /// Add rules for a field from a pipe-delimited string
    pub fn with_str(mut self, field: impl Into<String>, rules: &str) -> Result<Self, ConfigurationError> {
        self.insert(field, Rule::parse_list(rules)?);
        Ok(self)
    }

    /// Build from `(field, "rule|rule")` pairs
    pub fn from_pairs<I, K, R>(pairs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
        R: AsRef<str>,
    {
        pairs
            .into_iter()
            .try_fold(Self::new(), |set, (field, rules)| {
                set.with_str(field, rules.as_ref())
            })
    }

    /// Merge another set in; its fields replace ours
    pub fn merge(&mut self, other: RuleSet) {
        for (field, rules) in other.entries {
            self.insert(field, rules);
        }
    }

    /// Rules for one field
    pub fn get(&self, field: &str) -> Option<&[Rule]> {
        self.entries
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, rules)| rules.as_slice())
    }

    /// Whether the field has rules
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Field names, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Iterate `(field, rules)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.entries
            .iter()
            .map(|(name, rules)| (name.as_str(), rules.as_slice()))
    }

    /// Number of fields with rules
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no field has rules
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Checks raw parameters against a rule set
pub trait Validate: Send + Sync {
    /// Validate every ruled field, returning the coerced values of those that passed
    ///
    /// Fields without rules are not copied into the result.
    fn validate(&self, rules: &RuleSet, params: &RequestParams)
        -> Result<ParameterBag, ValidationError>;
}

/// Default rule-based validator
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator;

impl Validate for Validator {
    fn validate(
        &self,
        rules: &RuleSet,
        params: &RequestParams,
    ) -> Result<ParameterBag, ValidationError> {
        let mut errors = ValidationError::default();
        let mut bag = ParameterBag::new();

        for (field, field_rules) in rules.iter() {
            if let Some(value) = validate_field(field, field_rules, params.get(field), &mut errors) {
                bag.insert(field, value);
            }
        }

        if errors.has_errors() {
            let fields: Vec<&str> = errors.fields().collect();
            tracing::debug!(?fields, "Request parameters failed validation");
            Err(errors)
        } else {
            Ok(bag)
        }
    }
}

fn validate_field(
    field: &str,
    rules: &[Rule],
    value: Option<&Value>,
    errors: &mut ValidationError,
) -> Option<Value> {
    let has = |wanted: &Rule| rules.iter().any(|rule| rule == wanted);
    let attribute = field.replace('_', " ");

    let value = match value {
        None if has(&Rule::Sometimes) => return None,
        other => other,
    };

    if !value.is_some_and(is_filled) {
        if has(&Rule::Required) {
            errors.add_field_error(field, format!("The {attribute} field is required."));
            return None;
        }
        return match value {
            Some(_) if has(&Rule::Nullable) => Some(Value::Null),
            _ => None,
        };
    }

    let numeric = rules.iter().any(Rule::is_numeric_type);
    let mut current = value.cloned().unwrap_or(Value::Null);
    let mut failed = false;

    for rule in rules {
        let failure: Option<String> = match rule {
            Rule::Required | Rule::Sometimes | Rule::Nullable => None,
            Rule::String => (!current.is_string())
                .then(|| format!("The {attribute} field must be a string.")),
            Rule::Array => (!current.is_array())
                .then(|| format!("The {attribute} field must be an array.")),
            Rule::Numeric => match to_number(&current) {
                Some(number) => {
                    current = number;
                    None
                }
                None => Some(format!("The {attribute} field must be a number.")),
            },
            Rule::Integer => match to_integer(&current) {
                Some(number) => {
                    current = number;
                    None
                }
                None => Some(format!("The {attribute} field must be an integer.")),
            },
            Rule::Boolean => match to_bool(&current) {
                Some(flag) => {
                    current = Value::Bool(flag);
                    None
                }
                None => Some(format!("The {attribute} field must be true or false.")),
            },
            Rule::Date => (!current.as_str().is_some_and(is_date))
                .then(|| format!("The {attribute} field must be a valid date.")),
            Rule::Uuid => match current.as_str().and_then(|s| uuid::Uuid::parse_str(s).ok()) {
                Some(id) => {
                    current = Value::String(id.hyphenated().to_string());
                    None
                }
                None => Some(format!("The {attribute} field must be a valid UUID.")),
            },
            Rule::Min(bound) => match size_of(&current, numeric) {
                Some((size, _)) if size >= *bound => None,
                Some((_, kind)) => Some(min_message(&attribute, *bound, kind)),
                None => None,
            },
            Rule::Max(bound) => match size_of(&current, numeric) {
                Some((size, _)) if size <= *bound => None,
                Some((_, kind)) => Some(max_message(&attribute, *bound, kind)),
                None => None,
            },
            Rule::In(allowed) => (!in_list(&current, allowed))
                .then(|| format!("The selected {attribute} is invalid.")),
            Rule::Regex(pattern) => (!current.as_str().is_some_and(|s| pattern.is_match(s)))
                .then(|| format!("The {attribute} field format is invalid.")),
        };

        if let Some(message) = failure {
            errors.add_field_error(field, message);
            failed = true;
            if is_coercion(rule) {
                break;
            }
        }
    }

    (!failed).then_some(current)
}

fn is_coercion(rule: &Rule) -> bool {
    matches!(
        rule,
        Rule::String | Rule::Array | Rule::Numeric | Rule::Integer | Rule::Boolean | Rule::Uuid
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SizeKind {
    Numeric,
    Characters,
    Items,
}

fn size_of(value: &Value, numeric: bool) -> Option<(f64, SizeKind)> {
    match value {
        Value::Array(items) => Some((items.len() as f64, SizeKind::Items)),
        _ if numeric => to_number(value)
            .and_then(|n| n.as_f64())
            .map(|n| (n, SizeKind::Numeric)),
        Value::String(s) => Some((s.chars().count() as f64, SizeKind::Characters)),
        Value::Number(n) => n.as_f64().map(|n| (n, SizeKind::Numeric)),
        _ => None,
    }
}

fn min_message(attribute: &str, bound: f64, kind: SizeKind) -> String {
    let bound = format_number(bound);
    match kind {
        SizeKind::Numeric => format!("The {attribute} field must be at least {bound}."),
        SizeKind::Characters => {
            format!("The {attribute} field must be at least {bound} characters.")
        }
        SizeKind::Items => format!("The {attribute} field must have at least {bound} items."),
    }
}

fn max_message(attribute: &str, bound: f64, kind: SizeKind) -> String {
    let bound = format_number(bound);
    match kind {
        SizeKind::Numeric => format!("The {attribute} field must not be greater than {bound}."),
        SizeKind::Characters => {
            format!("The {attribute} field must not be greater than {bound} characters.")
        }
        SizeKind::Items => {
            format!("The {attribute} field must not have more than {bound} items.")
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn to_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(Value::from),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn is_date(s: &str) -> bool {
    let s = s.trim();
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

fn in_list(value: &Value, allowed: &[String]) -> bool {
    match value {
        Value::String(s) => allowed.iter().any(|a| a == s),
        Value::Number(n) => allowed
            .iter()
            .any(|a| a.trim().parse::<f64>().ok() == n.as_f64()),
        Value::Bool(b) => allowed
            .iter()
            .any(|a| to_bool(&Value::String(a.clone())) == Some(*b)),
        Value::Array(items) => items.iter().all(|item| in_list(item, allowed)),
        Value::Null | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(rules: RuleSet, query: &str) -> Result<ParameterBag, ValidationError> {
        Validator.validate(&rules, &RequestParams::parse(query))
    }

    #[test]
    fn test_parse_rule_strings() {
        let rules = Rule::parse_list("sometimes|string|in:admin,editor,guest|max:255").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Sometimes,
                Rule::String,
                Rule::In(vec!["admin".into(), "editor".into(), "guest".into()]),
                Rule::Max(255.0),
            ]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_and_bad_bounds() {
        assert!(matches!(
            "shiny".parse::<Rule>(),
            Err(ConfigurationError::InvalidRule { .. })
        ));
        assert!("min:abc".parse::<Rule>().is_err());
        assert!("min".parse::<Rule>().is_err());
        assert!("regex:(".parse::<Rule>().is_err());
    }

    #[test]
    fn test_rule_display_round_trips() {
        for text in ["required", "min:1", "max:2.5", "in:a,b", "regex:^[a-z]+$"] {
            let rule: Rule = text.parse().unwrap();
            assert_eq!(rule.to_string(), text);
        }
    }

    #[test]
    fn test_rule_set_replaces_field() {
        let mut rules = RuleSet::new().with("role", vec![Rule::Required]);
        rules.merge(RuleSet::new().with("role", vec![Rule::Sometimes]));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.get("role"), Some(&[Rule::Sometimes][..]));
    }

    #[test]
    fn test_sometimes_skips_missing_field() {
        let rules = RuleSet::from_pairs([("role", "sometimes|string|in:admin")]).unwrap();
        let bag = validate(rules, "").unwrap();
        assert!(bag.is_empty());
    }

    #[test]
    fn test_required_reports_missing_and_blank() {
        let rules = RuleSet::from_pairs([("role", "required"), ("name", "required")]).unwrap();
        let error = validate(rules, "name=%20").unwrap_err();
        assert_eq!(error.fields().collect::<Vec<_>>(), vec!["name", "role"]);
        assert_eq!(error.messages("role"), vec!["The role field is required."]);
    }

    #[test]
    fn test_integer_coercion_and_min() {
        let rules = RuleSet::from_pairs([("page", "sometimes|integer|min:1")]).unwrap();
        assert_eq!(validate(rules.clone(), "page=3").unwrap().get("page"), Some(&json!(3)));

        let error = validate(rules.clone(), "page=0").unwrap_err();
        assert_eq!(error.messages("page"), vec!["The page field must be at least 1."]);

        let error = validate(rules, "page=two").unwrap_err();
        assert_eq!(error.messages("page"), vec!["The page field must be an integer."]);
    }

    #[test]
    fn test_in_rule_on_numbers() {
        let rules = RuleSet::new().with(
            "per_page",
            vec![Rule::Sometimes, Rule::Integer, Rule::in_values([10, 25, 50, 100])],
        );
        assert_eq!(
            validate(rules.clone(), "per_page=25").unwrap().get_u64("per_page"),
            Some(25)
        );

        let error = validate(rules, "per_page=110").unwrap_err();
        assert_eq!(error.fields().collect::<Vec<_>>(), vec!["per_page"]);
        assert_eq!(
            error.messages("per_page"),
            vec!["The selected per page is invalid."]
        );
    }

    #[test]
    fn test_string_max_counts_characters() {
        let rules = RuleSet::from_pairs([("search", "sometimes|nullable|string|max:5")]).unwrap();
        assert!(validate(rules.clone(), "search=h%C3%A9llo").is_ok());

        let error = validate(rules, "search=toolong").unwrap_err();
        assert_eq!(
            error.messages("search"),
            vec!["The search field must not be greater than 5 characters."]
        );
    }

    #[test]
    fn test_nullable_blank_becomes_null() {
        let rules = RuleSet::from_pairs([("search", "sometimes|nullable|string")]).unwrap();
        let bag = validate(rules, "search=").unwrap();
        assert_eq!(bag.get("search"), Some(&Value::Null));
        assert!(!bag.filled("search"));
    }

    #[test]
    fn test_array_rules() {
        let rules = RuleSet::from_pairs([("role", "sometimes|array|in:admin,editor|max:2")]).unwrap();
        let bag = validate(rules.clone(), "role[]=admin&role[]=editor").unwrap();
        assert_eq!(bag.get("role"), Some(&json!(["admin", "editor"])));

        let error = validate(rules.clone(), "role[]=admin&role[]=root").unwrap_err();
        assert_eq!(error.messages("role"), vec!["The selected role is invalid."]);

        let error = validate(rules, "role=admin").unwrap_err();
        assert_eq!(error.messages("role"), vec!["The role field must be an array."]);
    }

    #[test]
    fn test_boolean_date_uuid() {
        let rules = RuleSet::from_pairs([
            ("active", "sometimes|boolean"),
            ("since", "sometimes|date"),
            ("owner", "sometimes|uuid"),
        ])
        .unwrap();

        let bag = validate(
            rules.clone(),
            "active=0&since=2024-02-29&owner=550E8400-E29B-41D4-A716-446655440000",
        )
        .unwrap();
        assert_eq!(bag.get("active"), Some(&json!(false)));
        assert_eq!(
            bag.get_str("owner"),
            Some("550e8400-e29b-41d4-a716-446655440000")
        );

        let error = validate(rules, "active=maybe&since=2023-02-29&owner=nope").unwrap_err();
        assert_eq!(error.error_count(), 3);
    }

    #[test]
    fn test_regex_rule() {
        let rules = RuleSet::new().with("code", vec![Rule::regex("^[A-Z]{3}$").unwrap()]);
        assert!(validate(rules.clone(), "code=ABC").is_ok());
        assert!(validate(rules, "code=abcd").is_err());
    }

    #[test]
    fn test_unruled_fields_are_not_copied() {
        let rules = RuleSet::from_pairs([("page", "sometimes|integer")]).unwrap();
        let bag = validate(rules, "page=1&other=x").unwrap();
        assert!(!bag.contains("other"));
    }
}
