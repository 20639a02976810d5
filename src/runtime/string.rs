use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::value::{self, Value};

struct Method {
    arity: usize,
    call: fn(&str, &[Value]) -> EvalResult,
}

static PROTOTYPE: Lazy<HashMap<&'static str, Method>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut put = |name: &'static str, arity: usize, call: fn(&str, &[Value]) -> EvalResult| {
        table.insert(name, Method { arity, call });
    };
    put("at", 1, at);
    put("concat", 0, concat);
    put("endsWith", 1, ends_with);
    put("includes", 1, includes);
    put("indexOf", 1, index_of);
    put("padEnd", 1, pad_end);
    put("padStart", 1, pad_start);
    put("repeat", 1, repeat);
    put("replace", 2, replace);
    put("replaceAll", 2, replace_all);
    put("slice", 1, slice);
    put("split", 0, split);
    put("startsWith", 1, starts_with);
    put("substring", 1, substring);
    put("toUpperCase", 0, to_upper);
    put("toLowerCase", 0, to_lower);
    put("trim", 0, trim);
    put("trimEnd", 0, trim_end);
    put("trimStart", 0, trim_start);
    put("trimLeft", 0, trim_start);
    put("trimRight", 0, trim_end);
    table
});

pub fn call(target: &str, method: &str, args: &[Value]) -> EvalResult {
    let Some(entry) = PROTOTYPE.get(method) else {
        return Err(EvalError::UnknownMethod {
            method: method.to_string(),
            type_name: "string".to_string(),
        });
    };
    if args.len() < entry.arity {
        return Err(EvalError::Argument);
    }
    (entry.call)(target, args)
}

fn chars_of(s: &str) -> Vec<char> {
    s.chars().collect()
}

/// Byte offset of the nth char, for slicing by char positions.
fn byte_at(s: &str, n: usize) -> usize {
    s.char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn at(s: &str, args: &[Value]) -> EvalResult {
    let chars = chars_of(s);
    let mut i = value::to_int(&args[0])?;
    if i < 0 {
        i += chars.len() as i64;
    }
    if i < 0 || i as usize >= chars.len() {
        return Err(EvalError::IndexOutOfRange);
    }
    Ok(Value::Str(chars[i as usize].to_string()))
}

fn concat(s: &str, args: &[Value]) -> EvalResult {
    let mut out = s.to_string();
    for arg in args {
        out.push_str(&arg.to_string());
    }
    Ok(Value::Str(out))
}

fn offset_arg(args: &[Value], len: usize) -> Result<usize, EvalError> {
    match args.get(1) {
        None => Ok(0),
        Some(v) => {
            let offset = value::to_int(v)?;
            if offset < 0 || offset as usize > len {
                return Err(EvalError::IndexOutOfRange);
            }
            Ok(offset as usize)
        }
    }
}

fn ends_with(s: &str, args: &[Value]) -> EvalResult {
    let offset = offset_arg(args, s.chars().count())?;
    let tail = &s[byte_at(s, offset)..];
    Ok(Value::Bool(tail.ends_with(&args[0].to_string())))
}

fn starts_with(s: &str, args: &[Value]) -> EvalResult {
    let offset = offset_arg(args, s.chars().count())?;
    let tail = &s[byte_at(s, offset)..];
    Ok(Value::Bool(tail.starts_with(&args[0].to_string())))
}

fn includes(s: &str, args: &[Value]) -> EvalResult {
    let offset = offset_arg(args, s.chars().count())?;
    let tail = &s[byte_at(s, offset)..];
    Ok(Value::Bool(tail.contains(&args[0].to_string())))
}

fn index_of(s: &str, args: &[Value]) -> EvalResult {
    let pattern = args[0].to_string();
    let len = s.chars().count();
    let mut from = match args.get(1) {
        Some(v) => value::to_int(v)?,
        None => 0,
    };
    if from < 0 {
        from += len as i64;
    }
    let from = from.clamp(0, len as i64) as usize;
    let tail = &s[byte_at(s, from)..];
    match tail.find(&pattern) {
        Some(byte_idx) => {
            let found = tail[..byte_idx].chars().count() + from;
            Ok(Value::Number(found as f64))
        }
        None => Ok(Value::Number(-1.0)),
    }
}

fn pad_end(s: &str, args: &[Value]) -> EvalResult {
    let size = value::to_int(&args[0])?.max(0) as usize;
    let len = s.chars().count();
    if len >= size {
        return Ok(Value::string(s));
    }
    let pad = match args.get(1) {
        Some(v) => v.to_string(),
        None => " ".to_string(),
    };
    Ok(Value::Str(format!("{s}{}", pad.repeat(size - len))))
}

fn pad_start(s: &str, args: &[Value]) -> EvalResult {
    let size = value::to_int(&args[0])?.max(0) as usize;
    let len = s.chars().count();
    if len >= size {
        return Ok(Value::string(s));
    }
    let pad = match args.get(1) {
        Some(v) => v.to_string(),
        None => " ".to_string(),
    };
    Ok(Value::Str(format!("{}{s}", pad.repeat(size - len))))
}

fn repeat(s: &str, args: &[Value]) -> EvalResult {
    let count = value::to_int(&args[0])?;
    if count <= 0 {
        return Err(EvalError::Argument);
    }
    Ok(Value::Str(s.repeat(count as usize)))
}

fn replace(s: &str, args: &[Value]) -> EvalResult {
    let pattern = args[0].to_string();
    let replacement = args[1].to_string();
    Ok(Value::Str(s.replacen(&pattern, &replacement, 1)))
}

fn replace_all(s: &str, args: &[Value]) -> EvalResult {
    let (Value::Str(pattern), Value::Str(replacement)) = (&args[0], &args[1]) else {
        return Err(EvalError::Incompatible);
    };
    Ok(Value::Str(s.replace(pattern.as_str(), replacement)))
}

fn slice(s: &str, args: &[Value]) -> EvalResult {
    let chars = chars_of(s);
    let len = chars.len() as i64;
    let mut beg = value::to_int(&args[0])?;
    let mut end = match args.get(1) {
        Some(v) => value::to_int(v)?,
        None => len,
    };
    if beg < 0 {
        beg += len;
    }
    if end < 0 {
        end += len;
    }
    if beg > len || beg >= end {
        return Ok(Value::string(""));
    }
    let beg = beg.max(0) as usize;
    let end = end.min(len) as usize;
    Ok(Value::Str(chars[beg..end].iter().collect()))
}

fn split(s: &str, args: &[Value]) -> EvalResult {
    let Some(separator) = args.first() else {
        return Ok(Value::array(vec![Value::string(s)]));
    };
    let separator = separator.to_string();
    let limit = match args.get(1) {
        Some(v) => {
            let limit = value::to_int(v)?;
            if limit == 0 {
                return Ok(Value::array(vec![]));
            }
            Some(limit.max(0) as usize)
        }
        None => None,
    };
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::Str(c.to_string())).collect()
    } else {
        s.split(separator.as_str())
            .map(Value::string)
            .collect()
    };
    let parts = match limit {
        Some(limit) => parts.into_iter().take(limit).collect(),
        None => parts,
    };
    Ok(Value::array(parts))
}

fn substring(s: &str, args: &[Value]) -> EvalResult {
    let chars = chars_of(s);
    let len = chars.len() as i64;
    let start = value::to_int(&args[0])?.clamp(0, len);
    let end = match args.get(1) {
        Some(v) => value::to_int(v)?.clamp(0, len),
        None => len,
    };
    if start >= end {
        return Err(EvalError::IndexOutOfRange);
    }
    Ok(Value::Str(
        chars[start as usize..end as usize].iter().collect(),
    ))
}

fn to_upper(s: &str, _args: &[Value]) -> EvalResult {
    Ok(Value::Str(s.to_uppercase()))
}

fn to_lower(s: &str, _args: &[Value]) -> EvalResult {
    Ok(Value::Str(s.to_lowercase()))
}

fn trim(s: &str, _args: &[Value]) -> EvalResult {
    Ok(Value::string(s.trim()))
}

fn trim_start(s: &str, _args: &[Value]) -> EvalResult {
    Ok(Value::string(s.trim_start()))
}

fn trim_end(s: &str, _args: &[Value]) -> EvalResult {
    Ok(Value::string(s.trim_end()))
}
