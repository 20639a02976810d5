use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::runtime::error::EvalError;
use crate::runtime::value::Value;

struct Binding {
    value: Value,
    readonly: bool,
}

enum Frame {
    Scope {
        values: RefCell<HashMap<String, Binding>>,
        parent: Option<Environment>,
    },
    /// Forwards lookups but rejects definition and assignment; wraps the
    /// globals frame so host names can not be rebound.
    Immutable(Environment),
}

/// Shared handle to a lexical scope. Cloning shares the frame, which is how
/// closures keep their defining environment alive after the caller returns.
#[derive(Clone)]
pub struct Environment(Rc<Frame>);

impl Environment {
    pub fn empty() -> Environment {
        Environment::enclosed_in(None)
    }

    pub fn enclosed(parent: &Environment) -> Environment {
        Environment::enclosed_in(Some(parent.clone()))
    }

    fn enclosed_in(parent: Option<Environment>) -> Environment {
        Environment(Rc::new(Frame::Scope {
            values: RefCell::new(HashMap::new()),
            parent,
        }))
    }

    pub fn immutable(inner: Environment) -> Environment {
        Environment(Rc::new(Frame::Immutable(inner)))
    }

    /// Inserts into the current frame. Redefining a name within one frame is
    /// an error; shadowing an outer frame is fine.
    pub fn define(&self, ident: &str, value: Value, readonly: bool) -> Result<(), EvalError> {
        match &*self.0 {
            Frame::Immutable(_) => Err(EvalError::ReadonlyAssign(ident.to_string())),
            Frame::Scope { values, .. } => {
                let mut values = values.borrow_mut();
                if values.contains_key(ident) {
                    return Err(EvalError::AlreadyDefined(ident.to_string()));
                }
                values.insert(ident.to_string(), Binding { value, readonly });
                Ok(())
            }
        }
    }

    /// Rebinds the nearest definition of `ident`. Assignment never defines:
    /// an unknown name is an error, as is a readonly binding.
    pub fn assign(&self, ident: &str, value: Value) -> Result<(), EvalError> {
        match &*self.0 {
            Frame::Immutable(_) => Err(EvalError::ReadonlyAssign(ident.to_string())),
            Frame::Scope { values, parent } => {
                let mut values = values.borrow_mut();
                if let Some(binding) = values.get_mut(ident) {
                    if binding.readonly {
                        return Err(EvalError::ReadonlyAssign(ident.to_string()));
                    }
                    binding.value = value;
                    return Ok(());
                }
                drop(values);
                match parent {
                    Some(parent) => parent.assign(ident, value),
                    None => Err(EvalError::NotDefined(ident.to_string())),
                }
            }
        }
    }

    pub fn resolve(&self, ident: &str) -> Result<Value, EvalError> {
        match &*self.0 {
            Frame::Immutable(inner) => inner.resolve(ident),
            Frame::Scope { values, parent } => {
                if let Some(binding) = values.borrow().get(ident) {
                    return Ok(binding.value.clone());
                }
                match parent {
                    Some(parent) => parent.resolve(ident),
                    None => Err(EvalError::NotDefined(ident.to_string())),
                }
            }
        }
    }
}
