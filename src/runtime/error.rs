use thiserror::Error;

use crate::runtime::value::Value;

/// Errors produced while evaluating, plus the four control-flow sentinels.
/// Sentinels travel through the same channel as genuine errors and are
/// consumed at their boundary: loops absorb `Break`/`Continue`, function
/// calls absorb `Return`, `try` absorbs `Throw`. A sentinel that escapes
/// surfaces with the message below.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("incompatible type")]
    Incompatible,
    #[error("unsupported operation")]
    Operation,
    #[error("division by zero")]
    DivisionByZero,
    #[error("index out of range")]
    IndexOutOfRange,
    #[error("wrong number of arguments given")]
    Argument,
    #[error("not yet implemented")]
    Unimplemented,
    #[error("{0}: variable not defined")]
    NotDefined(String),
    #[error("{0}: variable already defined")]
    AlreadyDefined(String),
    #[error("{0}: variable can not be reassigned")]
    ReadonlyAssign(String),
    #[error("{method} not defined on {type_name}")]
    UnknownMethod { method: String, type_name: String },
    #[error("node can not be evaluated in current context")]
    InvalidNode,
    #[error("invalid json: {0}")]
    Json(String),
    #[error("{name}: {inner}")]
    Context {
        name: String,
        #[source]
        inner: Box<EvalError>,
    },

    #[error("break outside of loop")]
    Break(Option<String>),
    #[error("continue outside of loop")]
    Continue(Option<String>),
    #[error("return outside of function")]
    Return(Value),
    #[error("uncaught exception: {0}")]
    Throw(Value),
}

impl EvalError {
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            EvalError::Break(_)
                | EvalError::Continue(_)
                | EvalError::Return(_)
                | EvalError::Throw(_)
        )
    }

    /// Prefixes non-sentinel errors with the failing method or builtin name.
    pub fn with_context(self, name: &str) -> EvalError {
        if self.is_sentinel() {
            return self;
        }
        EvalError::Context {
            name: name.to_string(),
            inner: Box::new(self),
        }
    }
}

pub type EvalResult = Result<Value, EvalError>;
