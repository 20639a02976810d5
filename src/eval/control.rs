use std::cmp::Ordering;

use crate::eval::{bind_pattern, eval};
use crate::parser::ast::{IterKind, Node};
use crate::runtime::env::Environment;
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::value::{self, Value};

pub(super) fn eval_if(cdt: &Node, csq: &Node, alt: Option<&Node>, ev: &Environment) -> EvalResult {
    let v = eval(cdt, ev)?;
    if v.truthy() {
        return eval(csq, &Environment::enclosed(ev));
    }
    match alt {
        Some(alt) => eval(alt, &Environment::enclosed(ev)),
        None => Ok(Value::Undefined),
    }
}

/// First case whose predicate equals the discriminant runs to completion;
/// no fall-through. A stray `break` inside a case body is absorbed here.
pub(super) fn eval_switch(
    cdt: &Node,
    cases: &[Node],
    default: Option<&Node>,
    ev: &Environment,
) -> EvalResult {
    let discriminant = eval(cdt, ev)?;
    for case in cases {
        let Node::Case { predicate, body } = case else {
            return Err(EvalError::InvalidNode);
        };
        let candidate = eval(predicate, ev)?;
        let matched = matches!(
            value::compare(&discriminant, &candidate),
            Ok(Ordering::Equal)
        );
        if matched {
            return run_case(body, ev);
        }
    }
    match default {
        Some(body) => run_case(body, ev),
        None => Ok(Value::Undefined),
    }
}

fn run_case(body: &Node, ev: &Environment) -> EvalResult {
    match eval(body, &Environment::enclosed(ev)) {
        Err(EvalError::Break(_)) => Ok(Value::Undefined),
        other => other,
    }
}

pub(super) fn eval_while(cdt: &Node, body: &Node, ev: &Environment) -> EvalResult {
    loop {
        let v = eval(cdt, ev)?;
        if !v.truthy() {
            break;
        }
        match eval(body, &Environment::enclosed(ev)) {
            Ok(_) => {}
            Err(EvalError::Continue(_)) => continue,
            Err(EvalError::Break(_)) => break,
            Err(error) => return Err(error),
        }
    }
    Ok(Value::Undefined)
}

pub(super) fn eval_do(cdt: &Node, body: &Node, ev: &Environment) -> EvalResult {
    loop {
        match eval(body, &Environment::enclosed(ev)) {
            Ok(_) => {}
            Err(EvalError::Continue(_)) => {}
            Err(EvalError::Break(_)) => break,
            Err(error) => return Err(error),
        }
        let v = eval(cdt, ev)?;
        if !v.truthy() {
            break;
        }
    }
    Ok(Value::Undefined)
}

/// Classic `for`: the init clause lives in a scope that persists across
/// iterations, so `let` in the header is visible to cond/incr and to
/// every body scope.
pub(super) fn eval_for(
    init: Option<&Node>,
    cdt: Option<&Node>,
    incr: Option<&Node>,
    body: &Node,
    ev: &Environment,
) -> EvalResult {
    let outer = Environment::enclosed(ev);
    if let Some(init) = init {
        eval(init, &outer)?;
    }
    loop {
        if let Some(cdt) = cdt {
            if !eval(cdt, &outer)?.truthy() {
                break;
            }
        }
        match eval(body, &Environment::enclosed(&outer)) {
            Ok(_) => {}
            Err(EvalError::Continue(_)) => {}
            Err(EvalError::Break(_)) => break,
            Err(error) => return Err(error),
        }
        if let Some(incr) = incr {
            eval(incr, &outer)?;
        }
    }
    Ok(Value::Undefined)
}

pub(super) fn eval_foreach(
    kind: IterKind,
    ident: &Node,
    iter: &Node,
    body: &Node,
    ev: &Environment,
) -> EvalResult {
    let iterable = eval(iter, ev)?;
    let items: Vec<Value> = match kind {
        IterKind::Of => match &iterable {
            Value::Array(items) => items.borrow().clone(),
            Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
            _ => return Err(EvalError::Operation),
        },
        IterKind::In => match &iterable {
            Value::Object(obj) => obj.borrow().keys().into_iter().map(Value::Str).collect(),
            Value::Array(items) => (0..items.borrow().len())
                .map(|i| Value::Number(i as f64))
                .collect(),
            _ => return Err(EvalError::Operation),
        },
    };

    for item in items {
        let scope = Environment::enclosed(ev);
        bind_pattern(ident, item, &scope, false)?;
        match eval(body, &scope) {
            Ok(_) => {}
            Err(EvalError::Continue(_)) => {}
            Err(EvalError::Break(_)) => break,
            Err(error) => return Err(error),
        }
    }
    Ok(Value::Undefined)
}

/// `try`/`catch`/`finally`: only the `Throw` sentinel is catchable; the
/// catch clause binds the thrown value in a fresh scope; `finally` always
/// runs and its error replaces any pending outcome.
pub(super) fn eval_try(
    body: &Node,
    catch: Option<&Node>,
    finally: Option<&Node>,
    ev: &Environment,
) -> EvalResult {
    let mut outcome = eval(body, &Environment::enclosed(ev));

    if let Err(EvalError::Throw(thrown)) = &outcome {
        if let Some(Node::Catch { ident, body }) = catch {
            let scope = Environment::enclosed(ev);
            if let Some(ident) = ident {
                bind_pattern(ident, thrown.clone(), &scope, false)?;
            }
            outcome = eval(body, &scope);
        }
    }

    if let Some(finally) = finally {
        if let Err(error) = eval(finally, &Environment::enclosed(ev)) {
            return Err(error);
        }
    }
    outcome
}
