use std::rc::Rc;

use crate::eval::{EvaluableNode, bind_pattern, eval};
use crate::parser::ast::Node;
use crate::runtime::env::Environment;
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::function::{Func, Parameter};
use crate::runtime::value::Value;
use crate::runtime::{array, number, string};

pub(super) fn eval_func(
    ident: Option<&str>,
    args: &Node,
    body: &Node,
    ev: &Environment,
) -> EvalResult {
    let Node::Seq(arg_nodes) = args else {
        return Err(EvalError::InvalidNode);
    };
    let mut params = Vec::with_capacity(arg_nodes.len());
    for node in arg_nodes {
        let param = match node {
            Node::Var(name) => Parameter::named(name.clone()),
            Node::Assign { ident, expr } => match &**ident {
                Node::Var(name) => Parameter {
                    name: Some(name.clone()),
                    value: Some(Rc::new((**expr).clone())),
                },
                _ => Parameter {
                    name: None,
                    value: Some(Rc::new(node.clone())),
                },
            },
            Node::BindingArray(_) | Node::BindingObject(_) => Parameter {
                name: None,
                value: Some(Rc::new(node.clone())),
            },
            _ => return Err(EvalError::InvalidNode),
        };
        params.push(param);
    }
    let func = Func {
        ident: ident.map(str::to_string),
        params,
        body: Rc::new(EvaluableNode(Rc::new(body.clone()))),
        env: ev.clone(),
    };
    let value = Value::Function(Rc::new(func));
    if let Some(name) = ident {
        ev.define(name, value.clone(), false)?;
    }
    Ok(value)
}

/// Arrow parameters are plain variables only: a bare identifier or a
/// parenthesised sequence of identifiers.
pub(super) fn eval_arrow(args: &Node, body: &Node, ev: &Environment) -> EvalResult {
    let mut params = Vec::new();
    match args {
        Node::Var(name) => params.push(Parameter::named(name.clone())),
        Node::Seq(nodes) => {
            for node in nodes {
                let Node::Var(name) = node else {
                    return Err(EvalError::InvalidNode);
                };
                params.push(Parameter::named(name.clone()));
            }
        }
        _ => return Err(EvalError::InvalidNode),
    }
    let func = Func {
        ident: None,
        params,
        body: Rc::new(EvaluableNode(Rc::new(body.clone()))),
        env: ev.clone(),
    };
    Ok(Value::Function(Rc::new(func)))
}

pub(super) fn eval_call(ident: &Node, args: &Node, ev: &Environment) -> EvalResult {
    match ident {
        Node::Member {
            curr,
            next,
            optional,
        } => call_member(curr, next, *optional, args, ev),
        _ => {
            let callee = eval(ident, ev)?;
            let args = call_args(args, ev)?;
            call_value(&callee, &args)
        }
    }
}

/// Evaluates an argument sequence left to right, expanding spread values
/// in place so callees only see positional arguments.
pub(super) fn call_args(args: &Node, ev: &Environment) -> Result<Vec<Value>, EvalError> {
    let Node::Seq(nodes) = args else {
        return Err(EvalError::InvalidNode);
    };
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        match eval(node, ev)? {
            Value::Spread(items) => out.extend(items.iter().cloned()),
            other => out.push(other),
        }
    }
    Ok(out)
}

pub(super) fn call_value(callee: &Value, args: &[Value]) -> EvalResult {
    match callee {
        Value::Function(func) => exec_user_func(func, args),
        Value::Builtin(builtin) => builtin.apply(args),
        _ => Err(EvalError::InvalidNode),
    }
}

/// `base.name(args)`: the receiver's own callable properties win, then the
/// per-type prototype table.
fn call_member(
    curr: &Node,
    next: &Node,
    optional: bool,
    args: &Node,
    ev: &Environment,
) -> EvalResult {
    let base = eval(curr, ev)?;
    if optional && base.is_nullish() {
        return Ok(Value::Undefined);
    }
    let Node::Var(name) = next else {
        return Err(EvalError::InvalidNode);
    };
    let args = call_args(args, ev)?;
    invoke_method(&base, name, &args)
}

pub(super) fn invoke_method(base: &Value, name: &str, args: &[Value]) -> EvalResult {
    let result = match base {
        Value::Object(obj) => {
            let own = obj.borrow().get_own(name);
            match own {
                Some(Value::Function(func)) => exec_user_func(&func, args),
                Some(Value::Builtin(builtin)) => builtin.apply(args),
                Some(_) => Err(EvalError::Operation),
                None => Err(EvalError::UnknownMethod {
                    method: name.to_string(),
                    type_name: "object".to_string(),
                }),
            }
        }
        Value::Global(global) => global.call(name, args),
        Value::Number(n) => number::call(*n, name, args),
        Value::Str(s) => string::call(s, name, args),
        Value::Array(items) => array::call(items, name, args),
        _ => Err(EvalError::Operation),
    };
    result.map_err(|error| match error {
        known @ (EvalError::UnknownMethod { .. } | EvalError::Context { .. }) => known,
        other => other.with_context(name),
    })
}

/// Runs a user function with spread-flattened arguments: binds parameters
/// in a fresh child of the captured environment, evaluates the body, and
/// lets the body wrapper absorb `Return`.
pub(super) fn exec_user_func(func: &Func, args: &[Value]) -> EvalResult {
    let env = bind_params(func, args)?;
    func.body.eval(&env)
}

fn bind_params(func: &Func, args: &[Value]) -> Result<Environment, EvalError> {
    let env = Environment::enclosed(&func.env);
    for (i, param) in func.params.iter().enumerate() {
        let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
        match (&param.name, &param.value) {
            (Some(name), None) => env.define(name, arg, false)?,
            (Some(name), Some(default)) => {
                let arg = if arg.is_nullish() {
                    eval(default, &env)?
                } else {
                    arg
                };
                env.define(name, arg, false)?;
            }
            (None, Some(node)) => match &**node {
                Node::Assign { ident, expr } => {
                    let arg = if arg.is_nullish() {
                        eval(expr, &env)?
                    } else {
                        arg
                    };
                    bind_pattern(ident, arg, &env, false)?;
                }
                pattern => bind_pattern(pattern, arg, &env, false)?,
            },
            (None, None) => return Err(EvalError::InvalidNode),
        }
    }
    Ok(env)
}
