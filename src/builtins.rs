//! Host globals seeded into the immutable top-level environment:
//! `console`, `Math`, `Object`, `JSON`, `parseInt`, `parseFloat`, `print`.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::runtime::env::Environment;
use crate::runtime::error::EvalError;
use crate::runtime::function::Builtin;
use crate::runtime::global::Global;
use crate::runtime::object::Object;
use crate::runtime::value::{self, Value};

/// Shared writer handle injected into `console` and `print`, so embedders
/// and tests can capture output.
pub type OutputHandle = Rc<RefCell<dyn Write>>;

/// Immutable top-level environment wired to process stdout/stderr.
/// User code runs in a child frame of this one.
pub fn default_env() -> Environment {
    default_env_with(
        Rc::new(RefCell::new(io::stdout())),
        Rc::new(RefCell::new(io::stderr())),
    )
}

pub fn default_env_with(out: OutputHandle, err: OutputHandle) -> Environment {
    let top = Environment::empty();
    // the frame is fresh, definitions can not collide
    let _ = top.define("console", console(out.clone(), err), true);
    let _ = top.define("Math", math(), true);
    let _ = top.define("Object", object_global(), true);
    let _ = top.define("JSON", json_global(), true);
    let _ = top.define("parseInt", Value::Builtin(parse_int()), true);
    let _ = top.define("parseFloat", Value::Builtin(parse_float()), true);
    let _ = top.define("print", Value::Builtin(print(out)), true);
    Environment::immutable(top)
}

fn print_values(writer: &OutputHandle, args: &[Value]) {
    let line = args
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(writer.borrow_mut(), "{line}");
}

fn console(out: OutputHandle, err: OutputHandle) -> Value {
    let mut global = Global::new("console");
    global.register_fn("log", 0, move |args| {
        print_values(&out, args);
        Ok(Value::Undefined)
    });
    global.register_fn("error", 0, move |args| {
        print_values(&err, args);
        Ok(Value::Undefined)
    });
    Value::Global(Rc::new(global))
}

fn math() -> Value {
    let mut global = Global::new("Math");
    global.register_prop("PI", Value::Number(std::f64::consts::PI));
    global.register_prop("E", Value::Number(std::f64::consts::E));

    let one = |global: &mut Global, name: &'static str, op: fn(f64) -> f64| {
        global.register_fn(name, 1, move |args| match args[0] {
            Value::Number(n) => Ok(Value::Number(op(n))),
            _ => Err(EvalError::Operation),
        });
    };
    one(&mut global, "sin", f64::sin);
    one(&mut global, "cos", f64::cos);
    one(&mut global, "tan", f64::tan);
    one(&mut global, "abs", f64::abs);
    one(&mut global, "ceil", f64::ceil);
    one(&mut global, "floor", f64::floor);
    one(&mut global, "round", f64::round);
    one(&mut global, "trunc", f64::trunc);

    let multi = |global: &mut Global, name: &'static str, op: fn(f64, f64) -> f64| {
        global.register_fn(name, 0, move |args| {
            if args.is_empty() {
                return Ok(Value::Undefined);
            }
            let mut result = value::coerce_number(&args[0])?;
            for arg in &args[1..] {
                result = op(result, value::coerce_number(arg)?);
            }
            Ok(Value::Number(result))
        });
    };
    multi(&mut global, "min", f64::min);
    multi(&mut global, "max", f64::max);

    Value::Global(Rc::new(global))
}

fn expect_object(v: &Value) -> Result<&value::ObjectRef, EvalError> {
    match v {
        Value::Object(obj) => Ok(obj),
        _ => Err(EvalError::Operation),
    }
}

fn object_global() -> Value {
    let mut global = Global::new("Object");
    global.register_fn("freeze", 1, |args| {
        expect_object(&args[0])?.borrow_mut().freeze();
        Ok(args[0].clone())
    });
    global.register_fn("seal", 1, |args| {
        expect_object(&args[0])?.borrow_mut().seal();
        Ok(args[0].clone())
    });
    global.register_fn("keys", 1, |args| {
        let keys = expect_object(&args[0])?.borrow().keys();
        Ok(Value::array(keys.into_iter().map(Value::Str).collect()))
    });
    global.register_fn("entries", 1, |args| {
        let entries = expect_object(&args[0])?.borrow().entries();
        Ok(Value::array(
            entries
                .into_iter()
                .map(|(k, v)| Value::array(vec![Value::Str(k), v]))
                .collect(),
        ))
    });
    global.register_fn("assign", 1, |args| {
        let target = expect_object(&args[0])?;
        for source in &args[1..] {
            for (key, v) in expect_object(source)?.borrow().entries() {
                target.borrow_mut().set(&key, v)?;
            }
        }
        Ok(args[0].clone())
    });
    // no prototype chains: create copies the own enumerable properties
    global.register_fn("create", 1, |args| match &args[0] {
        Value::Null => Ok(Value::object(Object::new())),
        Value::Object(obj) => Ok(Value::object(Object::from_pairs(obj.borrow().entries()))),
        _ => Err(EvalError::Operation),
    });
    Value::Global(Rc::new(global))
}

fn json_global() -> Value {
    let mut global = Global::new("JSON");
    global.register_fn("parse", 1, |args| {
        let parsed: serde_json::Value = serde_json::from_str(&args[0].to_string())
            .map_err(|e| EvalError::Json(e.to_string()))?;
        Ok(json_to_value(parsed))
    });
    global.register_fn("stringify", 1, |args| {
        let encoded = value_to_json(&args[0])?;
        serde_json::to_string(&encoded)
            .map(Value::Str)
            .map_err(|e| EvalError::Json(e.to_string()))
    });
    Value::Global(Rc::new(global))
}

/// §6 JSON mapping, object key order preserved.
pub fn json_to_value(v: serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::Str(s),
        serde_json::Value::Array(items) => {
            Value::array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => Value::object(Object::from_pairs(
            map.into_iter().map(|(k, v)| (k, json_to_value(v))).collect(),
        )),
    }
}

pub fn value_to_json(v: &Value) -> Result<serde_json::Value, EvalError> {
    match v {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Number(n) => {
            if n.fract() == 0.0 && n.is_finite() && (i64::MIN as f64..=i64::MAX as f64).contains(n)
            {
                Ok(serde_json::Value::Number((*n as i64).into()))
            } else {
                serde_json::Number::from_f64(*n)
                    .map(serde_json::Value::Number)
                    .ok_or(EvalError::Operation)
            }
        }
        Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.borrow().len());
            for item in items.borrow().iter() {
                out.push(value_to_json(item)?);
            }
            Ok(serde_json::Value::Array(out))
        }
        Value::Object(obj) => {
            let mut map = serde_json::Map::new();
            for (key, item) in obj.borrow().entries() {
                map.insert(key, value_to_json(&item)?);
            }
            Ok(serde_json::Value::Object(map))
        }
        _ => Err(EvalError::Operation),
    }
}

fn parse_int() -> Builtin {
    Builtin::new("parseInt", |args| {
        if args.len() != 1 {
            return Err(EvalError::Argument);
        }
        Ok(Value::Number(value::coerce_number(&args[0])?.trunc()))
    })
}

fn parse_float() -> Builtin {
    Builtin::new("parseFloat", |args| {
        if args.len() != 1 {
            return Err(EvalError::Argument);
        }
        Ok(Value::Number(value::coerce_number(&args[0])?))
    })
}

fn print(out: OutputHandle) -> Builtin {
    Builtin::new("print", move |args| {
        if args.len() != 1 {
            return Err(EvalError::Argument);
        }
        let _ = writeln!(out.borrow_mut(), "{}", args[0]);
        Ok(Value::Undefined)
    })
}
