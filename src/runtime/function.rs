use std::fmt;
use std::rc::Rc;

use crate::parser::ast::Node;
use crate::runtime::env::Environment;
use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::value::Value;

/// Anything a function body can be. The evaluator supplies the only real
/// implementation (an AST wrapper that absorbs the `Return` sentinel);
/// keeping it behind a trait lets prototype methods run user callbacks
/// without depending on the evaluator module.
pub trait Evaluable {
    fn eval(&self, env: &Environment) -> EvalResult;
}

/// User function: a closure over its defining environment.
pub struct Func {
    pub ident: Option<String>,
    pub params: Vec<Parameter>,
    pub body: Rc<dyn Evaluable>,
    pub env: Environment,
}

impl Func {
    /// Runs the body in a fresh child of the captured environment with the
    /// given positional bindings. Used by prototype methods for callbacks;
    /// regular calls go through the evaluator's parameter binding instead.
    pub fn call_positional(&self, args: &[Value]) -> EvalResult {
        let env = Environment::enclosed(&self.env);
        for (param, arg) in self.params.iter().zip(args) {
            if let Some(name) = &param.name {
                env.define(name, arg.clone(), false)?;
            }
        }
        self.body.eval(&env)
    }
}

impl fmt::Display for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.ident.as_deref().unwrap_or("anonymous");
        let params = self
            .params
            .iter()
            .map(|p| p.name.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "f {name} ({params})")
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func({})", self.ident.as_deref().unwrap_or("anonymous"))
    }
}

/// Formal parameter. `value` holds the default expression for
/// `name = expr` parameters, or the whole binding pattern when the
/// parameter destructures its argument (then `name` is empty).
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: Option<String>,
    pub value: Option<Rc<Node>>,
}

impl Parameter {
    pub fn named(name: impl Into<String>) -> Parameter {
        Parameter {
            name: Some(name.into()),
            value: None,
        }
    }
}

/// Named native function.
#[derive(Clone)]
pub struct Builtin {
    name: Rc<str>,
    call: Rc<dyn Fn(&[Value]) -> EvalResult>,
}

impl Builtin {
    pub fn new(name: &str, call: impl Fn(&[Value]) -> EvalResult + 'static) -> Builtin {
        Builtin {
            name: name.into(),
            call: Rc::new(call),
        }
    }

    /// Like `new` but rejects calls with fewer than `min` arguments.
    pub fn with_arity(
        name: &str,
        min: usize,
        call: impl Fn(&[Value]) -> EvalResult + 'static,
    ) -> Builtin {
        Builtin::new(name, move |args| {
            if args.len() < min {
                return Err(EvalError::Argument);
            }
            call(args)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, args: &[Value]) -> EvalResult {
        (self.call)(args).map_err(|e| e.with_context(&self.name))
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f {}() {{ [native code] }}", self.name)
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_arity_check_rejects_short_calls() {
        let builtin = Builtin::with_arity("first", 1, |args| Ok(args[0].clone()));
        let err = builtin.apply(&[]).expect_err("expected arity failure");
        assert_eq!(err.to_string(), "first: wrong number of arguments given");
        assert_eq!(
            builtin.apply(&[Value::Number(1.0)]).expect("apply"),
            Value::Number(1.0)
        );
    }

    #[test]
    fn builtin_errors_carry_their_name() {
        let builtin = Builtin::new("boom", |_| Err(EvalError::Operation));
        let err = builtin.apply(&[]).expect_err("expected failure");
        assert_eq!(err.to_string(), "boom: unsupported operation");
    }
}
