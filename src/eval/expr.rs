use std::cmp::Ordering;

use crate::eval::{call, eval};
use crate::parser::ast::Node;
use crate::runtime::env::Environment;
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::value::{self, Value};
use crate::token::TokenKind;

pub(super) fn eval_unary(op: TokenKind, expr: &Node, ev: &Environment) -> EvalResult {
    let v = eval(expr, ev)?;
    match op {
        TokenKind::Add => Ok(Value::Number(value::coerce_number(&v)?)),
        TokenKind::Sub => match v {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(EvalError::Operation),
        },
        TokenKind::Not => Ok(Value::Bool(!v.truthy())),
        TokenKind::Increment => step_variable(expr, &v, 1, ev),
        TokenKind::Decrement => step_variable(expr, &v, -1, ev),
        _ => Err(EvalError::Operation),
    }
}

/// `++x` / `--x`: steps the integer value of a plain variable and writes
/// it back. Any other operand shape is rejected.
fn step_variable(expr: &Node, v: &Value, delta: i64, ev: &Environment) -> EvalResult {
    let Value::Number(n) = v else {
        return Err(EvalError::Operation);
    };
    let stepped = Value::Number((*n as i64 + delta) as f64);
    let Node::Var(ident) = expr else {
        return Err(EvalError::InvalidNode);
    };
    ev.assign(ident, stepped.clone())?;
    Ok(stepped)
}

pub(super) fn eval_binary(op: TokenKind, left: &Node, right: &Node, ev: &Environment) -> EvalResult {
    let left = eval(left, ev)?;
    let right = eval(right, ev)?;
    match op {
        TokenKind::Nullish => Ok(if left.is_nullish() { right } else { left }),
        TokenKind::Add => value::add(&left, &right),
        TokenKind::Sub => value::sub(&left, &right),
        TokenKind::Mul => value::mul(&left, &right),
        TokenKind::Div => value::div(&left, &right),
        TokenKind::Mod => value::rem(&left, &right),
        TokenKind::Pow => value::pow(&left, &right),
        TokenKind::Lshift => value::bitwise(&left, &right, value::shift_left),
        TokenKind::Rshift => value::bitwise(&left, &right, value::shift_right),
        TokenKind::Band => value::bitwise(&left, &right, |a, b| a & b),
        TokenKind::Bor => value::bitwise(&left, &right, |a, b| a | b),
        TokenKind::Bxor => value::bitwise(&left, &right, |a, b| a ^ b),
        TokenKind::Eq => Ok(loose_compare(&left, &right, |o| o == Ordering::Equal, false)),
        TokenKind::Ne => Ok(loose_compare(&left, &right, |o| o != Ordering::Equal, true)),
        TokenKind::Lt => Ok(loose_compare(&left, &right, |o| o == Ordering::Less, false)),
        TokenKind::Le => Ok(loose_compare(&left, &right, |o| o != Ordering::Greater, false)),
        TokenKind::Gt => Ok(loose_compare(&left, &right, |o| o == Ordering::Greater, false)),
        TokenKind::Ge => Ok(loose_compare(&left, &right, |o| o != Ordering::Less, false)),
        TokenKind::Seq => Ok(Value::Bool(value::strict_eq(&left, &right))),
        TokenKind::Sne => Ok(Value::Bool(!value::strict_eq(&left, &right))),
        TokenKind::And => Ok(Value::Bool(left.truthy() && right.truthy())),
        TokenKind::Or => Ok(Value::Bool(left.truthy() || right.truthy())),
        _ => Err(EvalError::Operation),
    }
}

/// Comparison with the incompatible-types rule: mismatched operand types
/// answer `false` (`!=` answers `true`) instead of failing.
fn loose_compare(
    left: &Value,
    right: &Value,
    accept: fn(Ordering) -> bool,
    incompatible: bool,
) -> Value {
    match value::compare(left, right) {
        Ok(ordering) => Value::Bool(accept(ordering)),
        Err(_) => Value::Bool(incompatible),
    }
}

pub(super) fn eval_assign(ident: &Node, expr: &Node, ev: &Environment) -> EvalResult {
    let v = eval(expr, ev)?;
    match ident {
        Node::Var(name) => {
            ev.assign(name, v.clone())?;
            Ok(v)
        }
        Node::Member {
            curr,
            next,
            optional,
        } => {
            let base = eval(curr, ev)?;
            if *optional && base.is_nullish() {
                return Ok(Value::Undefined);
            }
            let Node::Var(prop) = &**next else {
                return Err(EvalError::InvalidNode);
            };
            value::set_property(&base, prop, v.clone())?;
            Ok(v)
        }
        Node::Index { expr: base, index } => {
            let base = eval(base, ev)?;
            let idx = eval(index, ev)?;
            value::set_index(&base, &idx, v.clone())?;
            Ok(v)
        }
        _ => Err(EvalError::InvalidNode),
    }
}

pub(super) fn eval_member(curr: &Node, next: &Node, optional: bool, ev: &Environment) -> EvalResult {
    let base = eval(curr, ev)?;
    if optional && base.is_nullish() {
        return Ok(Value::Undefined);
    }
    match next {
        Node::Var(name) => value::get_property(&base, name),
        // `f?.(args)` parses as an optional member whose right side is the
        // argument sequence
        Node::Seq(_) if optional => {
            let args = call::call_args(next, ev)?;
            call::call_value(&base, &args)
        }
        _ => Err(EvalError::InvalidNode),
    }
}

pub(super) fn eval_template(nodes: &[Node], ev: &Environment) -> EvalResult {
    let mut out = String::new();
    for node in nodes {
        let v = eval(node, ev)?;
        out.push_str(&v.to_string());
    }
    Ok(Value::Str(out))
}

pub(super) fn eval_in(left: &Node, right: &Node, ev: &Environment) -> EvalResult {
    let key = eval(left, ev)?;
    let target = eval(right, ev)?;
    match &target {
        Value::Object(obj) => Ok(Value::Bool(obj.borrow().contains(&key.to_string()))),
        Value::Array(items) => {
            let Value::Number(n) = key else {
                return Err(EvalError::Operation);
            };
            let i = n as i64;
            Ok(Value::Bool(i >= 0 && (i as usize) < items.borrow().len()))
        }
        _ => Err(EvalError::Operation),
    }
}
