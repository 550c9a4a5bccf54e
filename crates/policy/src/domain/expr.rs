//! Expression domain form.
//!
//! A closed pattern grammar for the domains that are not structured lists.
//! Only three shapes are recognized:
//!
//! - unconditional literals: `true`, `false`, `1===1`, `0===1`;
//! - comparisons: `record.<field> <op> user.<attribute>`;
//! - membership: `user.<attribute>.includes(record.<field>)`.
//!
//! JS-style strict operators are normalized (`===` and `==` are the same
//! test, as are `!==` and `!=`); the engine does not distinguish strict from
//! loose typing.

use std::sync::LazyLock;

use regex::Regex;

use serde_json::Value;

use crate::principal::EvaluationContext;
use crate::query::{CmpOp, Filter};

/// Normalized comparison operator of an expression domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl ExprOp {
    fn parse(token: &str) -> Option<ExprOp> {
        match token {
            "===" | "==" => Some(ExprOp::Eq),
            "!==" | "!=" => Some(ExprOp::Ne),
            ">" => Some(ExprOp::Gt),
            "<" => Some(ExprOp::Lt),
            ">=" => Some(ExprOp::Ge),
            "<=" => Some(ExprOp::Le),
            _ => None,
        }
    }

    fn as_cmp(self) -> CmpOp {
        match self {
            ExprOp::Eq => CmpOp::Eq,
            ExprOp::Ne => CmpOp::Ne,
            ExprOp::Gt => CmpOp::Gt,
            ExprOp::Lt => CmpOp::Lt,
            ExprOp::Ge => CmpOp::Ge,
            ExprOp::Le => CmpOp::Le,
        }
    }
}

static COMPARISON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^record\.([A-Za-z_][A-Za-z0-9_]*)\s*(===|!==|==|!=|>=|<=|>|<)\s*user\.([A-Za-z_][A-Za-z0-9_]*)$",
    )
    .expect("comparison pattern")
});

static INCLUDES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^user\.([A-Za-z_][A-Za-z0-9_]*)\.includes\(\s*record\.([A-Za-z_][A-Za-z0-9_]*)\s*\)$",
    )
    .expect("includes pattern")
});

/// A recognized expression domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Unconditional allow/deny.
    Always(bool),
    /// `record.<field> <op> user.<attribute>`.
    Cmp {
        field: String,
        op: ExprOp,
        attr: String,
    },
    /// `user.<attribute>.includes(record.<field>)`: the principal's
    /// multi-valued attribute contains the record's field value.
    Includes { attr: String, field: String },
}

impl Expr {
    /// Recognize an expression; `None` means the string matches no known
    /// shape.
    pub fn parse(raw: &str) -> Option<Expr> {
        let raw = raw.trim();
        match raw {
            "true" | "1===1" => return Some(Expr::Always(true)),
            "false" | "0===1" => return Some(Expr::Always(false)),
            _ => {}
        }
        if let Some(captures) = COMPARISON.captures(raw) {
            let op = ExprOp::parse(&captures[2])?;
            return Some(Expr::Cmp {
                field: captures[1].to_string(),
                op,
                attr: captures[3].to_string(),
            });
        }
        if let Some(captures) = INCLUDES.captures(raw) {
            return Some(Expr::Includes {
                attr: captures[1].to_string(),
                field: captures[2].to_string(),
            });
        }
        None
    }

    /// Compile to a filter, substituting the referenced attribute.
    pub fn to_filter(&self, ctx: &EvaluationContext) -> Filter {
        match self {
            Expr::Always(true) => Filter::True,
            Expr::Always(false) => Filter::False,
            Expr::Cmp { field, op, attr } => Filter::Cmp {
                field: field.clone(),
                op: op.as_cmp(),
                value: attr_value(ctx, attr),
            },
            Expr::Includes { attr, field } => {
                let values = match attr_value(ctx, attr) {
                    Value::Array(values) => values,
                    Value::Null => Vec::new(),
                    scalar => vec![scalar],
                };
                Filter::In {
                    field: field.clone(),
                    values,
                    negated: false,
                }
            }
        }
    }
}

fn attr_value(ctx: &EvaluationContext, attr: &str) -> Value {
    match ctx.attr(attr) {
        Some(value) => value.clone(),
        None => {
            tracing::debug!(attribute = attr, "context attribute missing, substituting null");
            Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{Principal, Record};
    use ledgersuite_core::PrincipalId;
    use serde_json::json;

    fn ctx() -> EvaluationContext {
        EvaluationContext::for_principal(
            &Principal::new(PrincipalId::new())
                .with_attribute("company_id", 5)
                .with_attribute("company_ids", json!([5, 9])),
        )
    }

    fn record(value: serde_json::Value) -> Record {
        value.as_object().expect("test record must be an object").clone()
    }

    fn eval(raw: &str, rec: serde_json::Value) -> bool {
        Expr::parse(raw)
            .unwrap_or_else(|| panic!("expression not recognized: {raw}"))
            .to_filter(&ctx())
            .matches(&record(rec))
    }

    #[test]
    fn literal_truths() {
        assert_eq!(Expr::parse("true"), Some(Expr::Always(true)));
        assert_eq!(Expr::parse("1===1"), Some(Expr::Always(true)));
        assert_eq!(Expr::parse("false"), Some(Expr::Always(false)));
        assert_eq!(Expr::parse("0===1"), Some(Expr::Always(false)));
    }

    #[test]
    fn strict_and_loose_operators_normalize() {
        for raw in [
            "record.company_id === user.company_id",
            "record.company_id == user.company_id",
        ] {
            assert!(eval(raw, json!({"company_id": 5})), "{raw}");
            assert!(!eval(raw, json!({"company_id": 6})), "{raw}");
        }
        assert!(eval("record.company_id !== user.company_id", json!({"company_id": 6})));
    }

    #[test]
    fn ordering_comparisons() {
        assert!(eval("record.amount >= user.company_id", json!({"amount": 5})));
        assert!(!eval("record.amount > user.company_id", json!({"amount": 5})));
        assert!(eval("record.amount < user.company_id", json!({"amount": 2})));
    }

    #[test]
    fn includes_checks_multi_valued_attribute() {
        let raw = "user.company_ids.includes(record.company_id)";
        assert!(eval(raw, json!({"company_id": 9})));
        assert!(!eval(raw, json!({"company_id": 4})));
    }

    #[test]
    fn unknown_shapes_are_not_recognized() {
        for raw in [
            "record.a === record.b",
            "user.id === user.id",
            "record.company_id === user.company_id || true",
            "require('fs')",
            "",
        ] {
            assert_eq!(Expr::parse(raw), None, "{raw}");
        }
    }
}
