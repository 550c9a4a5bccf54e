//! Record-rule domain language.
//!
//! A rule's `domain` string comes in two portable forms, detected in order:
//!
//! 1. **Structured**: a JSON list mixing combinator tokens with
//!    `(field, operator, value)` comparison triples ([`structured`]).
//! 2. **Expression**: a small closed pattern language over `record.<field>`
//!    and `user.<attribute>` ([`expr`]). This replaces the dynamic-eval
//!    approach such rules historically used: only an enumerable set of shapes
//!    is recognized, never executable code.
//!
//! A domain matching neither form is kept as [`Domain::Unrecognized`]: it
//! compiles to *no restriction* on the query path but evaluates to `false` on
//! the single-record path. The asymmetry is deliberate legacy behavior,
//! preserved pending product sign-off; both sides emit a diagnostic so the
//! misconfiguration is observable.

pub mod expr;
pub mod structured;

use serde_json::Value;

use crate::principal::{EvaluationContext, Record};
use crate::query::Filter;

pub use expr::{Expr, ExprOp};
pub use structured::{Combinator, Condition, DomainOp, Term};

/// A parsed record-rule domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Structured(Vec<Term>),
    Expr(Expr),
    /// Matched neither grammar. Fail-open for query building, fail-closed for
    /// record checks.
    Unrecognized(String),
}

impl Domain {
    /// Parse a raw domain string.
    ///
    /// Malformed structured JSON (or a JSON array with an invalid shape)
    /// falls through to the expression grammar; nothing errors at this layer.
    pub fn parse(raw: &str) -> Domain {
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) {
            match structured::parse_terms(&items) {
                Ok(terms) => return Domain::Structured(terms),
                Err(reason) => {
                    tracing::debug!(
                        domain = raw,
                        reason,
                        "structured domain has invalid shape, trying expression form"
                    );
                }
            }
        }
        if let Some(expr) = Expr::parse(raw) {
            return Domain::Expr(expr);
        }
        Domain::Unrecognized(raw.to_string())
    }

    /// Compile to a query predicate, substituting `user.<attribute>` values
    /// from the context.
    pub fn to_filter(&self, ctx: &EvaluationContext) -> Filter {
        match self {
            Domain::Structured(terms) => structured::compile(terms, ctx),
            Domain::Expr(expr) => expr.to_filter(ctx),
            Domain::Unrecognized(raw) => {
                tracing::warn!(
                    domain = %raw,
                    "unrecognized record-rule domain, applying no query restriction"
                );
                Filter::True
            }
        }
    }

    /// Evaluate against a materialized record.
    pub fn matches(&self, ctx: &EvaluationContext, record: &Record) -> bool {
        match self {
            Domain::Unrecognized(raw) => {
                tracing::warn!(
                    domain = %raw,
                    "unrecognized record-rule domain, denying record access"
                );
                false
            }
            recognized => recognized.to_filter(ctx).matches(record),
        }
    }
}

/// Substitute a `user.<attribute>` placeholder from the evaluation context.
///
/// A missing attribute substitutes null; comparisons against null then behave
/// as the operators define.
pub(crate) fn resolve_value(ctx: &EvaluationContext, value: &Value) -> Value {
    if let Value::String(s) = value {
        if let Some(attr) = s.strip_prefix("user.") {
            return match ctx.attr(attr) {
                Some(resolved) => resolved.clone(),
                None => {
                    tracing::debug!(attribute = attr, "context attribute missing, substituting null");
                    Value::Null
                }
            };
        }
    }
    value.clone()
}
