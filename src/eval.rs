use std::rc::Rc;

use anyhow::Result;

use crate::builtins;
use crate::parser::{self, ast::Node};
use crate::runtime::env::Environment;
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::function::Evaluable;
use crate::runtime::object::Object;
use crate::runtime::value::{self, Value};

mod call;
mod control;
mod expr;

/// Parses and evaluates `source` against the standard globals.
pub fn eval_default(source: &str) -> Result<Value> {
    let env = Environment::enclosed(&builtins::default_env());
    eval_str(source, &env)
}

/// Parses and evaluates `source` in the given environment. Control-flow
/// sentinels that escape the program surface as plain errors here.
pub fn eval_str(source: &str, env: &Environment) -> Result<Value> {
    let node = parser::parse_str(source)?;
    eval(&node, env).map_err(|error| anyhow::anyhow!("{error}"))
}

/// AST body of a user function. Absorbs the `Return` sentinel so a call
/// yields the returned value.
pub(crate) struct EvaluableNode(pub Rc<Node>);

impl Evaluable for EvaluableNode {
    fn eval(&self, env: &Environment) -> EvalResult {
        match eval(&self.0, env) {
            Err(EvalError::Return(value)) => Ok(value),
            other => other,
        }
    }
}

pub(crate) fn eval(node: &Node, ev: &Environment) -> EvalResult {
    match node {
        Node::Number(n) => Ok(Value::Number(*n)),
        Node::Str(s) => Ok(Value::Str(s.clone())),
        Node::Bool(b) => Ok(Value::Bool(*b)),
        Node::Null => Ok(Value::Null),
        Node::Undefined | Node::Discard => Ok(Value::Undefined),
        Node::Var(ident) => ev.resolve(ident),
        Node::Label(_) => Ok(Value::Undefined),
        Node::Template(nodes) => expr::eval_template(nodes, ev),
        Node::Array(nodes) => eval_array(nodes, ev),
        Node::Object(pairs) => eval_object(pairs, ev),
        Node::Spread(inner) => {
            let v = eval(inner, ev)?;
            value::spread_value(&v)
        }
        Node::Typeof(inner) => {
            let v = eval(inner, ev)?;
            Ok(Value::string(v.type_name()))
        }
        Node::Seq(nodes) | Node::Block(nodes) => {
            let mut result = Value::Undefined;
            for node in nodes {
                result = eval(node, ev)?;
            }
            Ok(result)
        }
        Node::Index { expr, index } => {
            let base = eval(expr, ev)?;
            let idx = eval(index, ev)?;
            value::index(&base, &idx)
        }
        Node::Member {
            curr,
            next,
            optional,
        } => expr::eval_member(curr, next, *optional, ev),
        Node::Break(label) => Err(EvalError::Break(label.clone())),
        Node::Continue(label) => Err(EvalError::Continue(label.clone())),
        Node::Let { ident, expr } => eval_declaration(ident, expr.as_deref(), ev, false),
        Node::Const { ident, expr } => eval_declaration(ident, Some(expr.as_ref()), ev, true),
        Node::Assign { ident, expr } => expr::eval_assign(ident, expr, ev),
        Node::Unary { op, expr } => expr::eval_unary(*op, expr, ev),
        Node::Binary { op, left, right } => expr::eval_binary(*op, left, right, ev),
        Node::If { cdt, csq, alt } => control::eval_if(cdt, csq, alt.as_deref(), ev),
        Node::Switch {
            cdt,
            cases,
            default,
        } => control::eval_switch(cdt, cases, default.as_deref(), ev),
        Node::While { cdt, body } => control::eval_while(cdt, body, ev),
        Node::Do { cdt, body } => control::eval_do(cdt, body, ev),
        Node::For {
            init,
            cdt,
            incr,
            body,
        } => control::eval_for(init.as_deref(), cdt.as_deref(), incr.as_deref(), body, ev),
        Node::Foreach {
            kind,
            ident,
            iter,
            body,
        } => control::eval_foreach(*kind, ident, iter, body, ev),
        Node::Try {
            body,
            catch,
            finally,
        } => control::eval_try(body, catch.as_deref(), finally.as_deref(), ev),
        Node::Throw(inner) => {
            let v = eval(inner, ev)?;
            Err(EvalError::Throw(v))
        }
        Node::Return(inner) => {
            let v = eval(inner, ev)?;
            Err(EvalError::Return(v))
        }
        Node::Func { ident, args, body } => call::eval_func(ident.as_deref(), args, body, ev),
        Node::Arrow { args, body } => call::eval_arrow(args, body, ev),
        Node::Call { ident, args } => call::eval_call(ident, args, ev),
        Node::In { left, right } => expr::eval_in(left, right, ev),
        Node::InstanceOf { .. } => Err(EvalError::Operation),
        Node::Import { .. } | Node::Export { .. } | Node::Alias { .. } => {
            Err(EvalError::Unimplemented)
        }
        Node::Case { .. } | Node::Catch { .. } => Err(EvalError::InvalidNode),
        Node::BindingArray(_) | Node::BindingObject(_) => Err(EvalError::InvalidNode),
    }
}

fn eval_array(nodes: &[Node], ev: &Environment) -> EvalResult {
    let mut list = Vec::with_capacity(nodes.len());
    for node in nodes {
        let v = eval(node, ev)?;
        match v {
            Value::Spread(items) => list.extend(items.iter().cloned()),
            other => list.push(other),
        }
    }
    Ok(Value::array(list))
}

fn eval_object(pairs: &[(String, Node)], ev: &Environment) -> EvalResult {
    let mut list = Vec::with_capacity(pairs.len());
    for (key, node) in pairs {
        list.push((key.clone(), eval(node, ev)?));
    }
    Ok(Value::object(Object::from_pairs(list)))
}

fn eval_declaration(
    ident: &Node,
    expr: Option<&Node>,
    ev: &Environment,
    readonly: bool,
) -> EvalResult {
    match ident {
        Node::Var(name) => {
            let v = match expr {
                Some(expr) => eval(expr, ev)?,
                None => Value::Undefined,
            };
            ev.define(name, v.clone(), readonly)?;
            Ok(v)
        }
        Node::BindingArray(_) | Node::BindingObject(_) => {
            let Some(expr) = expr else {
                return Err(EvalError::InvalidNode);
            };
            let v = eval(expr, ev)?;
            if v.is_nullish() {
                return Err(EvalError::Incompatible);
            }
            bind_pattern(ident, v.clone(), ev, readonly)?;
            Ok(v)
        }
        _ => Err(EvalError::InvalidNode),
    }
}

/// Binds a destructuring pattern to a value, defining every bound name
/// with the given readonly flag. Shared by let/const, parameter binding,
/// catch clauses and foreach headers.
pub(crate) fn bind_pattern(
    pattern: &Node,
    value: Value,
    ev: &Environment,
    readonly: bool,
) -> Result<(), EvalError> {
    match pattern {
        Node::Var(name) => ev.define(name, value, readonly),
        Node::Discard => Ok(()),
        Node::BindingArray(list) => bind_array(list, &value, ev, readonly),
        Node::BindingObject(list) => bind_object(list, &value, ev, readonly),
        _ => Err(EvalError::InvalidNode),
    }
}

fn bind_object(
    list: &[(String, Node)],
    value: &Value,
    ev: &Environment,
    readonly: bool,
) -> Result<(), EvalError> {
    let Value::Object(obj) = value else {
        return Err(EvalError::Incompatible);
    };
    let mut consumed: Vec<&str> = Vec::new();
    for (key, node) in list {
        if let Node::Spread(inner) = node {
            let Node::Var(rest) = &**inner else {
                return Err(EvalError::InvalidNode);
            };
            let remaining = obj
                .borrow()
                .entries()
                .into_iter()
                .filter(|(k, _)| !consumed.contains(&k.as_str()))
                .collect();
            ev.define(rest, Value::object(Object::from_pairs(remaining)), readonly)?;
            continue;
        }
        consumed.push(key);
        let v = obj.borrow().get_own(key).unwrap_or(Value::Undefined);
        match node {
            Node::Var(name) => ev.define(name, v, readonly)?,
            Node::Assign { ident, expr } => {
                let v = if matches!(v, Value::Undefined) {
                    eval(expr, ev)?
                } else {
                    v
                };
                bind_pattern(ident, v, ev, readonly)?;
            }
            Node::BindingObject(_) | Node::BindingArray(_) => {
                bind_pattern(node, v, ev, readonly)?;
            }
            _ => return Err(EvalError::InvalidNode),
        }
    }
    Ok(())
}

fn bind_array(
    list: &[Node],
    value: &Value,
    ev: &Environment,
    readonly: bool,
) -> Result<(), EvalError> {
    let Value::Array(items) = value else {
        return Err(EvalError::Incompatible);
    };
    let elements = items.borrow().clone();
    let mut nodes = list.to_vec();
    let mut i = 0;
    while i < nodes.len() {
        let element = elements.get(i).cloned().unwrap_or(Value::Undefined);
        match &nodes[i] {
            Node::Discard => {}
            Node::Var(name) => ev.define(name, element, readonly)?,
            Node::Assign { ident, expr } => {
                let element = if element.is_nullish() {
                    eval(expr, ev)?
                } else {
                    element
                };
                bind_pattern(ident, element, ev, readonly)?;
            }
            Node::Spread(inner) => match &**inner {
                Node::Var(rest) => {
                    let remaining = elements.get(i..).unwrap_or(&[]).to_vec();
                    ev.define(rest, Value::array(remaining), readonly)?;
                }
                Node::BindingArray(inner_list) => {
                    // splice the nested patterns into the position list
                    let tail = inner_list.clone();
                    nodes.splice(i..=i, tail);
                    continue;
                }
                _ => return Err(EvalError::InvalidNode),
            },
            Node::BindingObject(_) | Node::BindingArray(_) => {
                let pattern = nodes[i].clone();
                bind_pattern(&pattern, element, ev, readonly)?;
            }
            _ => return Err(EvalError::InvalidNode),
        }
        i += 1;
    }
    Ok(())
}
