use serde_json::Value;
use std::cmp::Ordering;

use super::ast::{BinaryOp, Expr};
use super::filters;
use crate::context::ExecutionContext;
use crate::value::{self, as_number, is_truthy, to_text};

/// Evaluate an expression tree. Never fails: anomalies degrade to `null`
/// or `0`.
pub fn evaluate(expr: &Expr, cx: &ExecutionContext) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Path(p) => cx.lookup(p),
        Expr::Filter { input, name, arg } => {
            filters::apply(name, evaluate(input, cx), arg.as_deref())
        }
        Expr::Negate(inner) => {
            let v = evaluate(inner, cx);
            value::number(-as_number(&v).unwrap_or(0.0))
        }
        Expr::Not(inner) => Value::Bool(!is_truthy(&evaluate(inner, cx))),
        Expr::And(left, right) => {
            Value::Bool(is_truthy(&evaluate(left, cx)) && is_truthy(&evaluate(right, cx)))
        }
        Expr::Or(left, right) => {
            Value::Bool(is_truthy(&evaluate(left, cx)) || is_truthy(&evaluate(right, cx)))
        }
        Expr::Ternary {
            cond,
            then,
            otherwise,
        } => {
            if is_truthy(&evaluate(cond, cx)) {
                evaluate(then, cx)
            } else {
                evaluate(otherwise, cx)
            }
        }
        Expr::Binary { op, left, right } => {
            let l = evaluate(left, cx);
            let r = evaluate(right, cx);
            if op.is_comparison() {
                Value::Bool(compare(*op, &l, &r))
            } else {
                arithmetic(*op, &l, &r)
            }
        }
    }
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Value {
    let (ln, rn) = (as_number(l), as_number(r));
    if op == BinaryOp::Add && ((is_text(l) && ln.is_none()) || (is_text(r) && rn.is_none())) {
        return Value::String(format!("{}{}", to_text(l), to_text(r)));
    }
    let (a, b) = (ln.unwrap_or(0.0), rn.unwrap_or(0.0));
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => 0.0,
        BinaryOp::Div => a / b,
        _ => 0.0,
    };
    value::number(result)
}

fn is_text(v: &Value) -> bool {
    matches!(v, Value::String(_))
}

fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
    let ordering = match (as_number(l), as_number(r)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(to_text(l).cmp(&to_text(r))),
    };
    let Some(ordering) = ordering else {
        return op == BinaryOp::Ne;
    };
    match op {
        BinaryOp::Eq => ordering == Ordering::Equal,
        BinaryOp::Ne => ordering != Ordering::Equal,
        BinaryOp::Gt => ordering == Ordering::Greater,
        BinaryOp::Lt => ordering == Ordering::Less,
        BinaryOp::Ge => ordering != Ordering::Less,
        BinaryOp::Le => ordering != Ordering::Greater,
        _ => false,
    }
}
