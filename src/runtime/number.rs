use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::value::{self, Value, format_number};

struct Method {
    arity: usize,
    call: fn(f64, &[Value]) -> EvalResult,
}

static PROTOTYPE: Lazy<HashMap<&'static str, Method>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut put = |name: &'static str, arity: usize, call: fn(f64, &[Value]) -> EvalResult| {
        table.insert(name, Method { arity, call });
    };
    put("toExponential", 0, to_exponential);
    put("toFixed", 0, to_fixed);
    put("toPrecision", 0, to_precision);
    put("toString", 0, to_string);
    table
});

pub fn call(target: f64, method: &str, args: &[Value]) -> EvalResult {
    let Some(entry) = PROTOTYPE.get(method) else {
        return Err(EvalError::UnknownMethod {
            method: method.to_string(),
            type_name: "number".to_string(),
        });
    };
    if args.len() < entry.arity {
        return Err(EvalError::Argument);
    }
    (entry.call)(target, args)
}

fn precision_arg(args: &[Value]) -> Result<Option<usize>, EvalError> {
    match args.first() {
        Some(v) => Ok(Some(value::to_int(v)?.max(0) as usize)),
        None => Ok(None),
    }
}

fn to_exponential(n: f64, args: &[Value]) -> EvalResult {
    let text = match precision_arg(args)? {
        Some(precision) => format!("{n:.precision$e}"),
        None => format!("{n:e}"),
    };
    // align exponent spelling with the e+NN convention
    let text = match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => text,
    };
    Ok(Value::Str(text))
}

fn to_fixed(n: f64, args: &[Value]) -> EvalResult {
    let text = match precision_arg(args)? {
        Some(precision) => format!("{n:.precision$}"),
        None => format_number(n),
    };
    Ok(Value::Str(text))
}

fn to_precision(n: f64, args: &[Value]) -> EvalResult {
    let Some(precision) = precision_arg(args)? else {
        return Ok(Value::Str(format_number(n)));
    };
    if precision == 0 || n == 0.0 {
        return Ok(Value::Str(format_number(n)));
    }
    let magnitude = n.abs().log10().floor() as i64;
    let decimals = (precision as i64 - 1 - magnitude).max(0) as usize;
    Ok(Value::Str(format!("{n:.decimals$}")))
}

fn to_string(n: f64, _args: &[Value]) -> EvalResult {
    Ok(Value::Str(format_number(n)))
}
