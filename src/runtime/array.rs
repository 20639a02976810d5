use std::cmp::Ordering;
use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::runtime::error::{EvalError, EvalResult};
use crate::runtime::function::Func;
use crate::runtime::value::{self, ArrayRef, Value};

struct Method {
    arity: usize,
    call: fn(&ArrayRef, &[Value]) -> EvalResult,
}

static PROTOTYPE: Lazy<HashMap<&'static str, Method>> = Lazy::new(|| {
    let mut table = HashMap::new();
    let mut put =
        |name: &'static str, arity: usize, call: fn(&ArrayRef, &[Value]) -> EvalResult| {
            table.insert(name, Method { arity, call });
        };
    put("at", 1, at);
    put("concat", 0, concat);
    put("entries", 0, entries);
    put("every", 1, every);
    put("forEach", 1, for_each);
    put("fill", 1, fill);
    put("filter", 1, filter);
    put("find", 1, find);
    put("findIndex", 1, find_index);
    put("findLast", 1, find_last);
    put("findLastIndex", 1, find_last_index);
    put("flat", 0, flat);
    put("flatMap", 1, flat_map);
    put("includes", 1, includes);
    put("indexOf", 1, index_of);
    put("join", 0, join);
    put("keys", 0, keys);
    put("lastIndexOf", 1, last_index_of);
    put("map", 1, map);
    put("pop", 0, pop);
    put("push", 1, push);
    put("reduce", 1, reduce);
    put("reduceRight", 1, reduce_right);
    put("reverse", 0, reverse);
    put("shift", 0, shift);
    put("slice", 0, slice);
    put("some", 1, some);
    put("sort", 0, sort);
    put("splice", 1, splice);
    put("unshift", 0, unshift);
    put("values", 0, values);
    put("with", 2, with);
    table
});

pub fn call(target: &ArrayRef, method: &str, args: &[Value]) -> EvalResult {
    let Some(entry) = PROTOTYPE.get(method) else {
        return Err(EvalError::UnknownMethod {
            method: method.to_string(),
            type_name: "array".to_string(),
        });
    };
    if args.len() < entry.arity {
        return Err(EvalError::Argument);
    }
    (entry.call)(target, args)
}

/// Spec'd index normalization: negatives add length, then clamp to
/// `[0, length]`.
fn normalize_index(i: i64, len: usize) -> usize {
    let len = len as i64;
    let i = if i < 0 { i + len } else { i };
    i.clamp(0, len) as usize
}

fn callback(args: &[Value]) -> Result<&Func, EvalError> {
    match args.first() {
        Some(Value::Function(func)) => Ok(func),
        _ => Err(EvalError::Operation),
    }
}

/// Invokes a user callback for one element, binding element, index and
/// array to up to three declared parameters in a fresh child of the
/// callback's captured environment.
fn apply(func: &Func, target: &ArrayRef, element: Value, index: usize) -> EvalResult {
    func.call_positional(&[
        element,
        Value::Number(index as f64),
        Value::Array(target.clone()),
    ])
}

fn snapshot(target: &ArrayRef) -> Vec<Value> {
    target.borrow().clone()
}

fn at(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let items = target.borrow();
    let mut i = value::to_int(&args[0])?;
    if i < 0 {
        i += items.len() as i64;
    }
    if i < 0 || i as usize >= items.len() {
        return Err(EvalError::IndexOutOfRange);
    }
    Ok(items[i as usize].clone())
}

fn concat(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let mut out = snapshot(target);
    for arg in args {
        match arg {
            Value::Array(other) => out.extend(other.borrow().iter().cloned()),
            other => out.push(other.clone()),
        }
    }
    Ok(Value::array(out))
}

fn entries(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    let pairs = snapshot(target)
        .into_iter()
        .enumerate()
        .map(|(i, v)| Value::array(vec![Value::Number(i as f64), v]))
        .collect();
    Ok(Value::array(pairs))
}

fn keys(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    let len = target.borrow().len();
    Ok(Value::array(
        (0..len).map(|i| Value::Number(i as f64)).collect(),
    ))
}

fn values(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    Ok(Value::array(snapshot(target)))
}

fn every(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if !apply(func, target, element, i)?.truthy() {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn some(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if apply(func, target, element, i)?.truthy() {
            return Ok(Value::Bool(true));
        }
    }
    Ok(Value::Bool(false))
}

fn for_each(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        apply(func, target, element, i)?;
    }
    Ok(Value::Null)
}

fn fill(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let len = target.borrow().len();
    let beg = match args.get(1) {
        Some(v) => normalize_index(value::to_int(v)?, len),
        None => 0,
    };
    let end = match args.get(2) {
        Some(v) => normalize_index(value::to_int(v)?, len),
        None => len,
    };
    if beg < end {
        let mut items = target.borrow_mut();
        for slot in &mut items[beg..end] {
            *slot = args[0].clone();
        }
    }
    Ok(Value::Array(target.clone()))
}

fn filter(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    let mut out = Vec::new();
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if apply(func, target, element.clone(), i)?.truthy() {
            out.push(element);
        }
    }
    Ok(Value::array(out))
}

fn find(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if apply(func, target, element.clone(), i)?.truthy() {
            return Ok(element);
        }
    }
    Ok(Value::Undefined)
}

fn find_index(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if apply(func, target, element, i)?.truthy() {
            return Ok(Value::Number(i as f64));
        }
    }
    Ok(Value::Number(-1.0))
}

fn find_last(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    let mut found = Value::Undefined;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if apply(func, target, element.clone(), i)?.truthy() {
            found = element;
        }
    }
    Ok(found)
}

fn find_last_index(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    let mut found = -1.0;
    for (i, element) in snapshot(target).into_iter().enumerate() {
        if apply(func, target, element, i)?.truthy() {
            found = i as f64;
        }
    }
    Ok(Value::Number(found))
}

fn flatten_into(out: &mut Vec<Value>, v: Value, depth: i64) {
    match v {
        Value::Array(inner) if depth != 0 => {
            for item in inner.borrow().iter() {
                flatten_into(out, item.clone(), depth - 1);
            }
        }
        other => out.push(other),
    }
}

fn flat(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let depth = match args.first() {
        Some(v) => value::to_int(v)?,
        None => -1,
    };
    let mut out = Vec::new();
    for item in snapshot(target) {
        flatten_into(&mut out, item, depth);
    }
    Ok(Value::array(out))
}

fn flat_map(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    let mut out = Vec::new();
    for (i, element) in snapshot(target).into_iter().enumerate() {
        let mapped = apply(func, target, element, i)?;
        flatten_into(&mut out, mapped, 1);
    }
    Ok(Value::array(out))
}

fn equals(a: &Value, b: &Value) -> bool {
    matches!(value::compare(a, b), Ok(Ordering::Equal))
}

fn includes(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let len = target.borrow().len();
    let from = match args.get(1) {
        Some(v) => normalize_index(value::to_int(v)?, len),
        None => 0,
    };
    let items = target.borrow();
    Ok(Value::Bool(
        items[from.min(len)..].iter().any(|v| equals(v, &args[0])),
    ))
}

fn index_of(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let len = target.borrow().len();
    let from = match args.get(1) {
        Some(v) => normalize_index(value::to_int(v)?, len),
        None => 0,
    };
    let items = target.borrow();
    for (i, item) in items.iter().enumerate().skip(from) {
        if equals(item, &args[0]) {
            return Ok(Value::Number(i as f64));
        }
    }
    Ok(Value::Number(-1.0))
}

fn last_index_of(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let items = target.borrow();
    let mut from = items.len().saturating_sub(1);
    if let Some(v) = args.get(1) {
        from = normalize_index(value::to_int(v)?, items.len()).min(from);
    }
    for i in (0..=from).rev() {
        if items.get(i).is_some_and(|item| equals(item, &args[0])) {
            return Ok(Value::Number(i as f64));
        }
    }
    Ok(Value::Number(-1.0))
}

fn join(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let separator = match args.first() {
        Some(v) => v.to_string(),
        None => ",".to_string(),
    };
    let rendered = target
        .borrow()
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::Str(rendered))
}

fn map(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    let mut out = Vec::new();
    for (i, element) in snapshot(target).into_iter().enumerate() {
        out.push(apply(func, target, element, i)?);
    }
    Ok(Value::array(out))
}

fn pop(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    Ok(target.borrow_mut().pop().unwrap_or(Value::Undefined))
}

fn push(target: &ArrayRef, args: &[Value]) -> EvalResult {
    target.borrow_mut().extend(args.iter().cloned());
    Ok(Value::Array(target.clone()))
}

fn reduce_over(target: &ArrayRef, elements: Vec<Value>, args: &[Value]) -> EvalResult {
    let func = callback(args)?;
    let mut accum = args.get(1).cloned().unwrap_or(Value::Undefined);
    for (i, element) in elements.into_iter().enumerate() {
        accum = func.call_positional(&[
            accum,
            element,
            Value::Number(i as f64),
            Value::Array(target.clone()),
        ])?;
    }
    Ok(accum)
}

fn reduce(target: &ArrayRef, args: &[Value]) -> EvalResult {
    reduce_over(target, snapshot(target), args)
}

fn reduce_right(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let mut elements = snapshot(target);
    elements.reverse();
    reduce_over(target, elements, args)
}

fn reverse(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    target.borrow_mut().reverse();
    Ok(Value::Array(target.clone()))
}

fn shift(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    let mut items = target.borrow_mut();
    if items.is_empty() {
        return Ok(Value::Undefined);
    }
    Ok(items.remove(0))
}

fn slice(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let items = target.borrow();
    let len = items.len();
    let beg = match args.first() {
        Some(v) => normalize_index(value::to_int(v)?, len),
        None => 0,
    };
    let end = match args.get(1) {
        Some(v) => normalize_index(value::to_int(v)?, len),
        None => len,
    };
    if beg >= end {
        return Ok(Value::array(vec![]));
    }
    Ok(Value::array(items[beg..end].to_vec()))
}

/// Comparator-less sort over the built-in compare; incomparable pairs
/// keep their relative order.
fn sort(target: &ArrayRef, _args: &[Value]) -> EvalResult {
    target
        .borrow_mut()
        .sort_by(|a, b| value::compare(a, b).unwrap_or(Ordering::Equal));
    Ok(Value::Array(target.clone()))
}

fn splice(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let mut items = target.borrow_mut();
    let len = items.len();
    let start = normalize_index(value::to_int(&args[0])?, len);
    let count = match args.get(1) {
        Some(v) => {
            let count = value::to_int(v)?;
            if count < 0 {
                return Err(EvalError::Argument);
            }
            (count as usize).min(len - start)
        }
        None => len - start,
    };
    let removed: Vec<Value> = items.splice(start..start + count, args.iter().skip(2).cloned()).collect();
    Ok(Value::array(removed))
}

fn unshift(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let mut items = target.borrow_mut();
    items.splice(0..0, args.iter().cloned());
    drop(items);
    Ok(Value::Array(target.clone()))
}

fn with(target: &ArrayRef, args: &[Value]) -> EvalResult {
    let mut out = snapshot(target);
    let i = normalize_index(value::to_int(&args[0])?, out.len());
    if i >= out.len() {
        return Err(EvalError::IndexOutOfRange);
    }
    out[i] = args[1].clone();
    Ok(Value::array(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn nums(values: &[f64]) -> ArrayRef {
        Rc::new(RefCell::new(
            values.iter().map(|n| Value::Number(*n)).collect(),
        ))
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn push_and_pop_mutate_in_place() {
        let arr = nums(&[1.0]);
        call(&arr, "push", &[num(2.0), num(3.0)]).expect("push");
        assert_eq!(arr.borrow().len(), 3);
        assert_eq!(call(&arr, "pop", &[]).expect("pop"), num(3.0));
        assert_eq!(arr.borrow().len(), 2);
    }

    #[test]
    fn shift_and_unshift() {
        let arr = nums(&[2.0, 3.0]);
        call(&arr, "unshift", &[num(1.0)]).expect("unshift");
        assert_eq!(*arr.borrow(), vec![num(1.0), num(2.0), num(3.0)]);
        assert_eq!(call(&arr, "shift", &[]).expect("shift"), num(1.0));
        assert_eq!(*arr.borrow(), vec![num(2.0), num(3.0)]);
    }

    #[test]
    fn splice_removes_and_inserts() {
        let arr = nums(&[1.0, 2.0, 3.0, 4.0]);
        let removed = call(&arr, "splice", &[num(1.0), num(2.0), num(9.0)]).expect("splice");
        assert_eq!(removed, Value::array(vec![num(2.0), num(3.0)]));
        assert_eq!(*arr.borrow(), vec![num(1.0), num(9.0), num(4.0)]);
    }

    #[test]
    fn splice_rejects_negative_count() {
        let arr = nums(&[1.0]);
        assert!(matches!(
            call(&arr, "splice", &[num(0.0), num(-1.0)]),
            Err(EvalError::Argument)
        ));
    }

    #[test]
    fn slice_and_with_do_not_mutate() {
        let arr = nums(&[1.0, 2.0, 3.0]);
        let sliced = call(&arr, "slice", &[num(-2.0)]).expect("slice");
        assert_eq!(sliced, Value::array(vec![num(2.0), num(3.0)]));
        let replaced = call(&arr, "with", &[num(0.0), num(9.0)]).expect("with");
        assert_eq!(replaced, Value::array(vec![num(9.0), num(2.0), num(3.0)]));
        assert_eq!(*arr.borrow(), vec![num(1.0), num(2.0), num(3.0)]);
    }

    #[test]
    fn fill_respects_normalized_range() {
        let arr = nums(&[1.0, 2.0, 3.0, 4.0]);
        call(&arr, "fill", &[num(0.0), num(-3.0), num(3.0)]).expect("fill");
        assert_eq!(*arr.borrow(), vec![num(1.0), num(0.0), num(0.0), num(4.0)]);
    }

    #[test]
    fn sort_uses_builtin_compare() {
        let arr = nums(&[3.0, 1.0, 2.0]);
        call(&arr, "sort", &[]).expect("sort");
        assert_eq!(*arr.borrow(), vec![num(1.0), num(2.0), num(3.0)]);
    }

    #[test]
    fn search_methods_compare_within_type() {
        let arr = nums(&[1.0, 2.0, 2.0]);
        assert_eq!(
            call(&arr, "indexOf", &[num(2.0)]).expect("indexOf"),
            num(1.0)
        );
        assert_eq!(
            call(&arr, "lastIndexOf", &[num(2.0)]).expect("lastIndexOf"),
            num(2.0)
        );
        assert_eq!(
            call(&arr, "includes", &[num(3.0)]).expect("includes"),
            Value::Bool(false)
        );
        assert_eq!(
            call(&arr, "indexOf", &[Value::string("2")]).expect("indexOf"),
            num(-1.0)
        );
    }

    #[test]
    fn flat_flattens_nested_arrays() {
        let nested = Value::array(vec![num(2.0), Value::array(vec![num(3.0)])]);
        let arr = Rc::new(RefCell::new(vec![num(1.0), nested]));
        let flat_all = call(&arr, "flat", &[]).expect("flat");
        assert_eq!(flat_all, Value::array(vec![num(1.0), num(2.0), num(3.0)]));
        let flat_one = call(&arr, "flat", &[num(1.0)]).expect("flat");
        assert_eq!(
            flat_one,
            Value::array(vec![num(1.0), num(2.0), Value::array(vec![num(3.0)])])
        );
    }

    #[test]
    fn join_renders_elements() {
        let arr = nums(&[1.0, 2.0, 3.0]);
        assert_eq!(
            call(&arr, "join", &[Value::string("-")]).expect("join"),
            Value::string("1-2-3")
        );
        assert_eq!(
            call(&arr, "join", &[]).expect("join"),
            Value::string("1,2,3")
        );
    }

    #[test]
    fn entries_keys_values_materialize() {
        let arr = nums(&[5.0, 6.0]);
        assert_eq!(
            call(&arr, "keys", &[]).expect("keys"),
            Value::array(vec![num(0.0), num(1.0)])
        );
        assert_eq!(
            call(&arr, "values", &[]).expect("values"),
            Value::array(vec![num(5.0), num(6.0)])
        );
        assert_eq!(
            call(&arr, "entries", &[]).expect("entries"),
            Value::array(vec![
                Value::array(vec![num(0.0), num(5.0)]),
                Value::array(vec![num(1.0), num(6.0)]),
            ])
        );
    }

    #[test]
    fn callbacks_require_a_function() {
        let arr = nums(&[1.0]);
        assert!(matches!(
            call(&arr, "map", &[num(1.0)]),
            Err(EvalError::Operation)
        ));
    }

    #[test]
    fn unknown_method_is_reported() {
        let arr = nums(&[]);
        let err = call(&arr, "zip", &[]).expect_err("expected unknown method");
        assert_eq!(err.to_string(), "zip not defined on array");
    }
}
