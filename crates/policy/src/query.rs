//! Composable query filters.
//!
//! Record-rule domains compile to the [`Filter`] AST, which is then rendered
//! onto an abstract [`QueryBuilder`]: any storage layer that can express
//! `where`/`orWhere`/`whereIn`/`whereNotIn`/`whereNull`/`whereNotNull` and a
//! nested group form can host the engine. [`FilterQuery`] is the built-in
//! builder: it reassembles the rendered calls into a `Filter` and can match
//! materialized records, which is also how compiled filters and the
//! record-check evaluator are cross-validated in tests.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::principal::Record;

/// Comparison operators a filter fragment can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Like,
    ILike,
}

/// Abstract composable query builder.
///
/// Implementations must tolerate `or_*` calls on an empty builder/group
/// (treated as a plain `where`), matching the usual query-builder contract.
/// The engine only ever emits OR terms inside a nested group, so rendered
/// predicates cannot leak un-parenthesized OR into a sibling AND context.
pub trait QueryBuilder: Sized {
    fn where_cmp(self, field: &str, op: CmpOp, value: Value) -> Self;
    fn or_where_cmp(self, field: &str, op: CmpOp, value: Value) -> Self;
    fn where_in(self, field: &str, values: Vec<Value>) -> Self;
    fn where_not_in(self, field: &str, values: Vec<Value>) -> Self;
    fn where_null(self, field: &str) -> Self;
    fn where_not_null(self, field: &str) -> Self;
    /// AND a parenthesized sub-expression onto the builder.
    fn and_group(self, build: impl FnOnce(Self) -> Self) -> Self;
    /// OR a parenthesized sub-expression onto the current group.
    fn or_group(self, build: impl FnOnce(Self) -> Self) -> Self;
}

/// A compiled record-rule predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// No restriction: matches every record.
    True,
    /// Matches no record.
    False,
    Cmp {
        field: String,
        op: CmpOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        field: String,
        negated: bool,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Cmp {
            field: field.into(),
            op: CmpOp::Eq,
            value: value.into(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Filter::True)
    }

    /// AND two filters, flattening and dropping no-ops.
    pub fn and(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::True, f) | (f, Filter::True) => f,
            (Filter::False, _) | (_, Filter::False) => Filter::False,
            (Filter::And(mut items), f) => {
                items.push(f);
                Filter::And(items)
            }
            (a, b) => Filter::And(vec![a, b]),
        }
    }

    /// OR two filters, flattening and dropping no-ops.
    pub fn or(self, other: Filter) -> Filter {
        match (self, other) {
            (Filter::False, f) | (f, Filter::False) => f,
            (Filter::True, _) | (_, Filter::True) => Filter::True,
            (Filter::Or(mut items), f) => {
                items.push(f);
                Filter::Or(items)
            }
            (a, b) => Filter::Or(vec![a, b]),
        }
    }

    /// OR a list of filters together.
    pub fn any(filters: Vec<Filter>) -> Filter {
        filters.into_iter().fold(Filter::False, Filter::or)
    }

    /// Render this filter onto a builder, in AND position.
    pub fn apply<Q: QueryBuilder>(&self, query: Q) -> Q {
        match self {
            Filter::True => query,
            // An empty IN list can never match.
            Filter::False => query.where_in("id", Vec::new()),
            Filter::Cmp { field, op, value } => query.where_cmp(field, *op, value.clone()),
            Filter::In {
                field,
                values,
                negated: false,
            } => query.where_in(field, values.clone()),
            Filter::In {
                field,
                values,
                negated: true,
            } => query.where_not_in(field, values.clone()),
            Filter::Null {
                field,
                negated: false,
            } => query.where_null(field),
            Filter::Null {
                field,
                negated: true,
            } => query.where_not_null(field),
            Filter::And(items) => items.iter().fold(query, |q, item| item.apply(q)),
            Filter::Or(items) => query.and_group(|group| {
                items.iter().fold(group, |g, item| match item {
                    Filter::Cmp { field, op, value } => {
                        g.or_where_cmp(field, *op, value.clone())
                    }
                    other => g.or_group(|gg| other.apply(gg)),
                })
            }),
        }
    }

    /// Evaluate this filter against a materialized record.
    ///
    /// A field missing from the record reads as null.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::True => true,
            Filter::False => false,
            Filter::Cmp { field, op, value } => {
                let lhs = record.get(field).unwrap_or(&Value::Null);
                cmp_matches(lhs, *op, value)
            }
            Filter::In {
                field,
                values,
                negated,
            } => {
                let lhs = record.get(field).unwrap_or(&Value::Null);
                let found = values.iter().any(|v| loose_eq(lhs, v));
                found != *negated
            }
            Filter::Null { field, negated } => {
                let is_null = record.get(field).is_none_or(Value::is_null);
                is_null != *negated
            }
            Filter::And(items) => items.iter().all(|item| item.matches(record)),
            Filter::Or(items) => items.iter().any(|item| item.matches(record)),
        }
    }
}

fn cmp_matches(lhs: &Value, op: CmpOp, rhs: &Value) -> bool {
    match op {
        CmpOp::Eq => loose_eq(lhs, rhs),
        CmpOp::Ne => !loose_eq(lhs, rhs),
        CmpOp::Gt => compare(lhs, rhs) == Some(Ordering::Greater),
        CmpOp::Lt => compare(lhs, rhs) == Some(Ordering::Less),
        CmpOp::Ge => matches!(compare(lhs, rhs), Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::Le => matches!(compare(lhs, rhs), Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Like => like_matches(lhs, rhs, false),
        CmpOp::ILike => like_matches(lhs, rhs, true),
    }
}

/// Equality across integer/float representations of the same number;
/// otherwise plain JSON equality. No string↔number coercion.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

static LIKE_WILDCARD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[%_]").expect("wildcard probe regex"));

/// SQL LIKE semantics: `%` matches any run, `_` matches one character. A
/// pattern without wildcards degrades to substring containment.
fn like_matches(text: &Value, pattern: &Value, case_insensitive: bool) -> bool {
    let (Value::String(text), Value::String(pattern)) = (text, pattern) else {
        return false;
    };
    if !LIKE_WILDCARD.is_match(pattern) {
        return if case_insensitive {
            text.to_lowercase().contains(&pattern.to_lowercase())
        } else {
            text.contains(pattern.as_str())
        };
    }

    let mut translated = String::with_capacity(pattern.len() + 8);
    if case_insensitive {
        translated.push_str("(?i)");
    }
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    match Regex::new(&translated) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory builder
// ─────────────────────────────────────────────────────────────────────────────

/// The built-in [`QueryBuilder`]: accumulates rendered calls back into a
/// [`Filter`].
#[derive(Debug, Clone, Default)]
pub struct FilterQuery {
    root: Option<Filter>,
}

impl FilterQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated predicate; an untouched builder is unrestricted.
    pub fn into_filter(self) -> Filter {
        self.root.unwrap_or(Filter::True)
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.root.as_ref().is_none_or(|f| f.matches(record))
    }

    fn push_and(mut self, filter: Filter) -> Self {
        self.root = Some(match self.root.take() {
            None => filter,
            Some(root) => root.and(filter),
        });
        self
    }

    fn push_or(mut self, filter: Filter) -> Self {
        self.root = Some(match self.root.take() {
            None => filter,
            Some(root) => root.or(filter),
        });
        self
    }
}

impl QueryBuilder for FilterQuery {
    fn where_cmp(self, field: &str, op: CmpOp, value: Value) -> Self {
        self.push_and(Filter::Cmp {
            field: field.to_string(),
            op,
            value,
        })
    }

    fn or_where_cmp(self, field: &str, op: CmpOp, value: Value) -> Self {
        self.push_or(Filter::Cmp {
            field: field.to_string(),
            op,
            value,
        })
    }

    fn where_in(self, field: &str, values: Vec<Value>) -> Self {
        self.push_and(Filter::In {
            field: field.to_string(),
            values,
            negated: false,
        })
    }

    fn where_not_in(self, field: &str, values: Vec<Value>) -> Self {
        self.push_and(Filter::In {
            field: field.to_string(),
            values,
            negated: true,
        })
    }

    fn where_null(self, field: &str) -> Self {
        self.push_and(Filter::Null {
            field: field.to_string(),
            negated: false,
        })
    }

    fn where_not_null(self, field: &str) -> Self {
        self.push_and(Filter::Null {
            field: field.to_string(),
            negated: true,
        })
    }

    fn and_group(self, build: impl FnOnce(Self) -> Self) -> Self {
        match build(FilterQuery::new()).root {
            Some(filter) => self.push_and(filter),
            None => self,
        }
    }

    fn or_group(self, build: impl FnOnce(Self) -> Self) -> Self {
        match build(FilterQuery::new()).root {
            Some(filter) => self.push_or(filter),
            None => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().expect("test record must be an object").clone()
    }

    #[test]
    fn or_terms_stay_grouped_under_an_and() {
        // status = 'posted' AND (owner = 'a' OR owner = 'b')
        let query = FilterQuery::new()
            .where_cmp("status", CmpOp::Eq, json!("posted"))
            .and_group(|g| {
                g.or_where_cmp("owner", CmpOp::Eq, json!("a"))
                    .or_where_cmp("owner", CmpOp::Eq, json!("b"))
            });
        let filter = query.into_filter();

        assert!(filter.matches(&record(json!({"status": "posted", "owner": "b"}))));
        assert!(!filter.matches(&record(json!({"status": "draft", "owner": "a"}))));
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let filter = Filter::False;
        let rendered = filter.apply(FilterQuery::new()).into_filter();
        assert!(!rendered.matches(&record(json!({"id": 1}))));
    }

    #[test]
    fn loose_equality_spans_integer_and_float() {
        let filter = Filter::eq("company_id", json!(5));
        assert!(filter.matches(&record(json!({"company_id": 5.0}))));
        assert!(!filter.matches(&record(json!({"company_id": "5"}))));
    }

    #[test]
    fn missing_field_reads_as_null() {
        let null_check = Filter::Null {
            field: "archived_at".to_string(),
            negated: false,
        };
        assert!(null_check.matches(&record(json!({}))));

        let ne = Filter::Cmp {
            field: "owner".to_string(),
            op: CmpOp::Ne,
            value: json!("alice"),
        };
        assert!(ne.matches(&record(json!({}))));
    }

    #[test]
    fn like_supports_wildcards_and_substring() {
        let contains = Filter::Cmp {
            field: "name".to_string(),
            op: CmpOp::Like,
            value: json!("ACME"),
        };
        assert!(contains.matches(&record(json!({"name": "ACME Industries"}))));
        assert!(!contains.matches(&record(json!({"name": "acme industries"}))));

        let pattern = Filter::Cmp {
            field: "name".to_string(),
            op: CmpOp::ILike,
            value: json!("acme%"),
        };
        assert!(pattern.matches(&record(json!({"name": "ACME Industries"}))));
        assert!(!pattern.matches(&record(json!({"name": "The ACME"}))));
    }

    #[test]
    fn rendering_or_of_compound_terms_round_trips() {
        let filter = Filter::any(vec![
            Filter::And(vec![
                Filter::eq("region", "EU"),
                Filter::eq("status", "active"),
            ]),
            Filter::eq("owner_id", 7),
        ]);
        let rendered = filter.apply(FilterQuery::new()).into_filter();

        for rec in [
            json!({"region": "EU", "status": "active", "owner_id": 1}),
            json!({"region": "US", "status": "active", "owner_id": 7}),
            json!({"region": "US", "status": "active", "owner_id": 1}),
        ] {
            assert_eq!(filter.matches(&record(rec.clone())), rendered.matches(&record(rec)));
        }
    }
}
