//! Structured (boolean-list) domain form.
//!
//! An ordered JSON list whose elements are either combinator tokens or
//! `(field, operator, value)` triples, e.g.
//!
//! ```json
//! [["company_id", "=", "user.company_id"], "|", ["is_public", "=", true]]
//! ```
//!
//! A combinator token governs how the **next single** comparison combines
//! with the running result, then resets to AND: a flat prefix notation over
//! the clause list, not precedence parsing.

use serde_json::Value;

use crate::principal::EvaluationContext;
use crate::query::{CmpOp, Filter};

use super::resolve_value;

/// Boolean combinator between adjacent clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    fn parse(token: &str) -> Option<Combinator> {
        match token.to_ascii_lowercase().as_str() {
            "and" | "&" => Some(Combinator::And),
            "or" | "|" => Some(Combinator::Or),
            _ => None,
        }
    }
}

/// Comparison operator of a structured triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    In,
    NotIn,
    Like,
    ILike,
    Is,
    IsNot,
}

impl DomainOp {
    fn parse(token: &str) -> Option<DomainOp> {
        match token.to_ascii_lowercase().as_str() {
            "=" => Some(DomainOp::Eq),
            "!=" | "<>" => Some(DomainOp::Ne),
            ">" => Some(DomainOp::Gt),
            "<" => Some(DomainOp::Lt),
            ">=" => Some(DomainOp::Ge),
            "<=" => Some(DomainOp::Le),
            "in" => Some(DomainOp::In),
            "not in" => Some(DomainOp::NotIn),
            "like" => Some(DomainOp::Like),
            "ilike" => Some(DomainOp::ILike),
            "is" => Some(DomainOp::Is),
            "is not" => Some(DomainOp::IsNot),
            _ => None,
        }
    }
}

/// One `(field, operator, value)` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub op: DomainOp,
    pub value: Value,
}

/// One element of the structured list.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Combinator(Combinator),
    Condition(Condition),
}

/// Parse the elements of a JSON array into terms.
///
/// Shape errors return the offending description; the caller falls back to
/// the expression grammar.
pub(crate) fn parse_terms(items: &[Value]) -> Result<Vec<Term>, &'static str> {
    let mut terms = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(token) => {
                let combinator =
                    Combinator::parse(token).ok_or("unknown combinator token")?;
                terms.push(Term::Combinator(combinator));
            }
            Value::Array(triple) => {
                let [field, op, value] = triple.as_slice() else {
                    return Err("comparison must be a (field, operator, value) triple");
                };
                let Value::String(field) = field else {
                    return Err("comparison field must be a string");
                };
                let Value::String(op) = op else {
                    return Err("comparison operator must be a string");
                };
                let op = DomainOp::parse(op).ok_or("unknown comparison operator")?;
                terms.push(Term::Condition(Condition {
                    field: field.clone(),
                    op,
                    value: value.clone(),
                }));
            }
            _ => return Err("element must be a combinator token or a comparison triple"),
        }
    }
    Ok(terms)
}

/// Compile a term list into a filter, substituting context attributes.
pub(crate) fn compile(terms: &[Term], ctx: &EvaluationContext) -> Filter {
    let mut running: Option<Filter> = None;
    let mut pending = Combinator::And;

    for term in terms {
        match term {
            Term::Combinator(combinator) => pending = *combinator,
            Term::Condition(condition) => {
                let clause = condition_filter(condition, ctx);
                running = Some(match (running.take(), pending) {
                    (None, _) => clause,
                    (Some(acc), Combinator::And) => acc.and(clause),
                    (Some(acc), Combinator::Or) => acc.or(clause),
                });
                // Combinators are not sticky.
                pending = Combinator::And;
            }
        }
    }

    running.unwrap_or(Filter::True)
}

fn condition_filter(condition: &Condition, ctx: &EvaluationContext) -> Filter {
    let value = resolve_value(ctx, &condition.value);
    let field = condition.field.clone();
    match condition.op {
        DomainOp::Eq => cmp(field, CmpOp::Eq, value),
        DomainOp::Ne => cmp(field, CmpOp::Ne, value),
        DomainOp::Gt => cmp(field, CmpOp::Gt, value),
        DomainOp::Lt => cmp(field, CmpOp::Lt, value),
        DomainOp::Ge => cmp(field, CmpOp::Ge, value),
        DomainOp::Le => cmp(field, CmpOp::Le, value),
        DomainOp::Like => cmp(field, CmpOp::Like, value),
        DomainOp::ILike => cmp(field, CmpOp::ILike, value),
        DomainOp::In => Filter::In {
            field,
            values: collection(value),
            negated: false,
        },
        DomainOp::NotIn => Filter::In {
            field,
            values: collection(value),
            negated: true,
        },
        // Nullity operators only test nullity: against a non-null literal
        // they place no restriction.
        DomainOp::Is => match value {
            Value::Null => Filter::Null {
                field,
                negated: false,
            },
            _ => Filter::True,
        },
        DomainOp::IsNot => match value {
            Value::Null => Filter::Null {
                field,
                negated: true,
            },
            _ => Filter::True,
        },
    }
}

fn cmp(field: String, op: CmpOp, value: Value) -> Filter {
    Filter::Cmp { field, op, value }
}

/// Membership operands accept a list or wrap a scalar into one.
fn collection(value: Value) -> Vec<Value> {
    match value {
        Value::Array(values) => values,
        scalar => vec![scalar],
    }
}
