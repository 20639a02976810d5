use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::function::Builtin;
use crate::runtime::value::Value;

/// Host-provided named object: a property map plus a native method table.
/// Registration happens once at bootstrap; globals are immutable after.
pub struct Global {
    name: &'static str,
    props: Vec<(&'static str, Value)>,
    methods: Vec<(&'static str, Builtin)>,
}

impl Global {
    pub fn new(name: &'static str) -> Global {
        Global {
            name,
            props: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn register_prop(&mut self, ident: &'static str, value: Value) {
        self.props.push((ident, value));
    }

    pub fn register_fn(
        &mut self,
        ident: &'static str,
        min_arity: usize,
        call: impl Fn(&[Value]) -> EvalResult + 'static,
    ) {
        self.methods
            .push((ident, Builtin::with_arity(ident, min_arity, call)));
    }

    /// Property read: props first, then methods wrapped as callables,
    /// then Undefined.
    pub fn get(&self, prop: &str) -> Value {
        if let Some((_, value)) = self.props.iter().find(|(ident, _)| *ident == prop) {
            return value.clone();
        }
        if let Some((_, builtin)) = self.methods.iter().find(|(ident, _)| *ident == prop) {
            return Value::Builtin(builtin.clone());
        }
        Value::Undefined
    }

    pub fn call(&self, method: &str, args: &[Value]) -> EvalResult {
        match self.methods.iter().find(|(ident, _)| *ident == method) {
            Some((_, builtin)) => builtin.apply(args),
            None => Err(EvalError::UnknownMethod {
                method: method.to_string(),
                type_name: self.name.to_string(),
            }),
        }
    }
}

impl std::fmt::Debug for Global {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Global({})", self.name)
    }
}
