// ABOUTME: Native List methods and index/slice access-and-modify semantics

use std::cell::RefCell;
use std::rc::Rc;

use crate::callable::{Callable, NativeFn};
use crate::errors::RuntimeError;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

type ListRef = Rc<RefCell<Vec<Value>>>;

fn method(name: &str, min: usize, max: usize, items: ListRef, f: impl Fn(&mut Interpreter, &ListRef, &Token, Vec<Value>) -> Result<Value, RuntimeError> + 'static) -> Value {
    Value::Callable(Rc::new(NativeFn {
        name: name.to_string(),
        min_arity: min,
        max_arity: max,
        func: Box::new(move |i, t, args| f(i, &items, t, args)),
    }))
}

fn as_index(token: &Token, v: &Value, len: usize) -> Result<usize, RuntimeError> {
    match v {
        Value::Number(n) if n.fract() == 0.0 => {
            let i = *n as i64;
            let resolved = if i < 0 { i + len as i64 } else { i };
            if resolved < 0 || resolved as usize >= len {
                Err(RuntimeError::IndexOutOfRange { token: token.clone() })
            } else {
                Ok(resolved as usize)
            }
        }
        _ => Err(RuntimeError::IndexNotInteger { token: token.clone() }),
    }
}

fn call_fn(interp: &mut Interpreter, token: &Token, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
    match callee {
        Value::Callable(c) => c.call(interp, token, args),
        _ => Err(RuntimeError::NotCallable { token: token.clone() }),
    }
}

fn expect_bool(token: &Token, v: Value) -> Result<bool, RuntimeError> {
    match v {
        Value::Boolean(b) => Ok(b),
        _ => Err(RuntimeError::TypeError { token: token.clone(), expected: "a Boolean-returning predicate".into(), binary: false }),
    }
}

fn expect_number(token: &Token, v: &Value) -> Result<f64, RuntimeError> {
    match v {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::TypeError { token: token.clone(), expected: "a Number".into(), binary: false }),
    }
}

fn expect_list(token: &Token, v: &Value) -> Result<ListRef, RuntimeError> {
    match v {
        Value::List(l) => Ok(l.clone()),
        _ => Err(RuntimeError::TypeError { token: token.clone(), expected: "a List".into(), binary: false }),
    }
}

pub fn dispatch_property(items: &ListRef, name: &Token) -> Result<Value, RuntimeError> {
    let items = items.clone();
    let v = match name.lexeme.as_str() {
        "add" => method("add", 1, 1, items, |_i, l, _t, mut a| {
            l.borrow_mut().push(a.remove(0).unwrap_reference().deep_copy());
            Ok(Value::Nil)
        }),
        "insert" => method("insert", 2, 2, items, |_i, l, t, mut a| {
            let value = a.remove(1).unwrap_reference().deep_copy();
            let idx_raw = a.remove(0);
            let len = l.borrow().len();
            let idx = as_index(t, &idx_raw, len + 1)?;
            l.borrow_mut().insert(idx, value);
            Ok(Value::Nil)
        }),
        "pop" => method("pop", 0, 0, items, |_i, l, _t, _a| Ok(l.borrow_mut().pop().unwrap_or(Value::Nil))),
        "remove" => method("remove", 1, 1, items, |_i, l, t, a| {
            let len = l.borrow().len();
            let idx = as_index(t, &a[0], len)?;
            Ok(l.borrow_mut().remove(idx))
        }),
        "delete" => method("delete", 1, 2, items, |_i, l, t, a| {
            let all = a.get(1).map(|v| expect_bool(t, v.clone())).transpose()?.unwrap_or(false);
            let target = &a[0];
            let mut removed_one = false;
            l.borrow_mut().retain(|e| {
                let matches = e.loosely_equals(target);
                if matches && (all || !removed_one) {
                    removed_one = true;
                    false
                } else {
                    true
                }
            });
            Ok(Value::Nil)
        }),

        "join" => method("join", 0, 0, items, |_i, l, t, _a| {
            let mut out = String::new();
            for e in l.borrow().iter() {
                match e {
                    Value::Str(s) => out.push_str(&s.borrow()),
                    _ => return Err(RuntimeError::TypeError { token: t.clone(), expected: "a List of Strings".into(), binary: false }),
                }
            }
            Ok(Value::string(out))
        }),
        "unique" => method("unique", 0, 0, items, |_i, l, _t, _a| {
            let mut out: Vec<Value> = Vec::new();
            for e in l.borrow().iter() {
                if !out.iter().any(|o| o.loosely_equals(e)) {
                    out.push(e.clone());
                }
            }
            Ok(Value::list(out))
        }),
        "forEach" => method("forEach", 1, 1, items, |i, l, t, a| {
            let snapshot = l.borrow().clone();
            for e in snapshot {
                call_fn(i, t, &a[0], vec![e])?;
            }
            Ok(Value::Nil)
        }),
        "transform" => method("transform", 1, 1, items, |i, l, t, a| {
            let snapshot = l.borrow().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            for e in snapshot {
                out.push(call_fn(i, t, &a[0], vec![e])?);
            }
            Ok(Value::list(out))
        }),
        "filter" => method("filter", 1, 1, items, |i, l, t, a| {
            let snapshot = l.borrow().clone();
            let mut out = Vec::new();
            for e in snapshot {
                let keep = expect_bool(t, call_fn(i, t, &a[0], vec![e.clone()])?)?;
                if keep {
                    out.push(e);
                }
            }
            Ok(Value::list(out))
        }),
        "flat" => method("flat", 0, 0, items, |_i, l, _t, _a| Ok(Value::list(flatten(&l.borrow())))),

        "contains" => method("contains", 1, 1, items, |_i, l, _t, a| Ok(Value::Boolean(l.borrow().iter().any(|v| v.loosely_equals(&a[0]))))),
        "duplicate" => method("duplicate", 0, 0, items, |_i, l, _t, _a| {
            let borrowed = l.borrow();
            let has_dup = borrowed.iter().enumerate().any(|(i, e)| borrowed[..i].iter().any(|o| o.loosely_equals(e)));
            Ok(Value::Boolean(has_dup))
        }),
        "index" => method("index", 1, 1, items, |_i, l, _t, a| {
            let pos = l.borrow().iter().position(|v| v.loosely_equals(&a[0]));
            Ok(pos.map(|p| Value::Number(p as f64)).unwrap_or(Value::Number(-1.0)))
        }),
        "indexLast" => method("indexLast", 1, 1, items, |_i, l, _t, a| {
            let pos = l.borrow().iter().rposition(|v| v.loosely_equals(&a[0]));
            Ok(pos.map(|p| Value::Number(p as f64)).unwrap_or(Value::Number(-1.0)))
        }),
        "any" => method("any", 1, 1, items, |i, l, t, a| {
            let snapshot = l.borrow().clone();
            for e in snapshot {
                if expect_bool(t, call_fn(i, t, &a[0], vec![e])?)? {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }),
        "all" => method("all", 1, 1, items, |i, l, t, a| {
            let snapshot = l.borrow().clone();
            for e in snapshot {
                if !expect_bool(t, call_fn(i, t, &a[0], vec![e])?)? {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }),

        "reverse" => method("reverse", 0, 0, items, |_i, l, _t, _a| {
            let mut copied = l.borrow().clone();
            copied.reverse();
            Ok(Value::list(copied))
        }),
        "sort" => method("sort", 0, 1, items, |_i, l, t, a| {
            let ascending = a.first().map(|v| expect_bool(t, v.clone())).transpose()?.unwrap_or(true);
            let mut copied = l.borrow().clone();
            sort_values(t, &mut copied, ascending)?;
            Ok(Value::list(copied))
        }),
        "sorted" => method("sorted", 0, 1, items, |_i, l, t, a| {
            let ascending = a.first().map(|v| expect_bool(t, v.clone())).transpose()?.unwrap_or(true);
            Ok(Value::Boolean(is_sorted(t, &l.borrow(), ascending)?))
        }),
        "pair" => method("pair", 1, 1, items, |_i, l, t, a| {
            let other = expect_list(t, &a[0])?;
            let left = l.borrow();
            let right = other.borrow();
            let n = left.len().min(right.len());
            let paired = (0..n).map(|i| Value::list(vec![left[i].clone(), right[i].clone()])).collect();
            Ok(Value::list(paired))
        }),
        "separate" => method("separate", 0, 0, items, |_i, l, t, _a| {
            let mut firsts = Vec::new();
            let mut seconds = Vec::new();
            for e in l.borrow().iter() {
                let pair = expect_list(t, e)?;
                let pair = pair.borrow();
                if pair.len() != 2 {
                    return Err(RuntimeError::Custom { token: t.clone(), message: "Elements must be lists containing exactly two elements.".into() });
                }
                firsts.push(pair[0].clone());
                seconds.push(pair[1].clone());
            }
            Ok(Value::list(vec![Value::list(firsts), Value::list(seconds)]))
        }),

        "sum" => method("sum", 0, 0, items, |_i, l, t, _a| {
            let mut total = 0.0;
            for e in l.borrow().iter() {
                total += expect_number(t, e)?;
            }
            Ok(Value::Number(total))
        }),
        "min" => method("min", 0, 0, items, |_i, l, t, _a| fold_numeric(t, &l.borrow(), f64::min)),
        "max" => method("max", 0, 0, items, |_i, l, t, _a| fold_numeric(t, &l.borrow(), f64::max)),
        "average" => method("average", 0, 0, items, |_i, l, t, _a| {
            let borrowed = l.borrow();
            if borrowed.is_empty() {
                return Err(RuntimeError::Custom { token: t.clone(), message: "List must not be empty.".into() });
            }
            let mut total = 0.0;
            for e in borrowed.iter() {
                total += expect_number(t, e)?;
            }
            Ok(Value::Number(total / borrowed.len() as f64))
        }),

        other => {
            return Err(RuntimeError::UndefinedProperty { token: name.clone(), name: other.to_string() });
        }
    };
    Ok(v)
}

fn flatten(items: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for e in items {
        match e {
            Value::List(inner) => out.extend(flatten(&inner.borrow())),
            other => out.push(other.clone()),
        }
    }
    out
}

fn sort_values(token: &Token, items: &mut [Value], ascending: bool) -> Result<(), RuntimeError> {
    let mut err = None;
    items.sort_by(|a, b| {
        let ord = match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
            (Value::Str(x), Value::Str(y)) => x.borrow().cmp(&y.borrow()),
            _ => {
                err = Some(RuntimeError::TypeError { token: token.clone(), expected: "uniformly Number or String elements".into(), binary: true });
                std::cmp::Ordering::Equal
            }
        };
        if ascending { ord } else { ord.reverse() }
    });
    match err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn is_sorted(token: &Token, items: &[Value], ascending: bool) -> Result<bool, RuntimeError> {
    for pair in items.windows(2) {
        let ord = match (&pair[0], &pair[1]) {
            (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
            (Value::Str(x), Value::Str(y)) => x.borrow().cmp(&y.borrow()),
            _ => return Err(RuntimeError::TypeError { token: token.clone(), expected: "uniformly Number or String elements".into(), binary: true }),
        };
        let out_of_order = if ascending { ord == std::cmp::Ordering::Greater } else { ord == std::cmp::Ordering::Less };
        if out_of_order {
            return Ok(false);
        }
    }
    Ok(true)
}

fn fold_numeric(token: &Token, items: &[Value], f: impl Fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
    if items.is_empty() {
        return Err(RuntimeError::Custom { token: token.clone(), message: "List must not be empty.".into() });
    }
    let mut acc = expect_number(token, &items[0])?;
    for e in &items[1..] {
        acc = f(acc, expect_number(token, e)?);
    }
    Ok(Value::Number(acc))
}

pub fn access(receiver: &Value, start: &Value, end: Option<&Value>, token: &Token) -> Result<Value, RuntimeError> {
    match receiver {
        Value::List(items) => {
            let len = items.borrow().len();
            if let Some(end) = end {
                let (s, e) = slice_bounds(token, start, end, len)?;
                return Ok(Value::list(items.borrow()[s..e].to_vec()));
            }
            let idx = as_index(token, start, len)?;
            Ok(items.borrow()[idx].clone())
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.borrow().chars().collect();
            let len = chars.len();
            if let Some(end) = end {
                let (s_idx, e_idx) = slice_bounds(token, start, end, len)?;
                return Ok(Value::string(chars[s_idx..e_idx].iter().collect::<String>()));
            }
            let idx = as_index(token, start, len)?;
            Ok(Value::string(chars[idx].to_string()))
        }
        _ => Err(RuntimeError::TypeError { token: token.clone(), expected: "a List or String".into(), binary: false }),
    }
}

pub fn modify(receiver: &Value, start: &Value, end: Option<&Value>, value: Value, token: &Token) -> Result<Value, RuntimeError> {
    match receiver {
        Value::List(items) => {
            let len = items.borrow().len();
            if let Some(end) = end {
                let (s, e) = slice_bounds(token, start, end, len)?;
                let replacement = match &value {
                    Value::List(other) => other.borrow().clone(),
                    _ => return Err(RuntimeError::TypeError { token: token.clone(), expected: "a List".into(), binary: false }),
                };
                items.borrow_mut().splice(s..e, replacement);
                return Ok(value);
            }
            let idx = as_index(token, start, len)?;
            items.borrow_mut()[idx] = value.clone();
            Ok(value)
        }
        Value::Str(s) => {
            let replacement = match &value {
                Value::Str(r) => r.borrow().clone(),
                _ => return Err(RuntimeError::TypeError { token: token.clone(), expected: "a String".into(), binary: false }),
            };
            let mut chars: Vec<char> = s.borrow().chars().collect();
            let len = chars.len();
            if let Some(end) = end {
                let (s_idx, e_idx) = slice_bounds(token, start, end, len)?;
                chars.splice(s_idx..e_idx, replacement.chars());
            } else {
                let idx = as_index(token, start, len)?;
                let mut repl_chars = replacement.chars();
                let ch = repl_chars.next().ok_or_else(|| RuntimeError::TypeError { token: token.clone(), expected: "a single-character String".into(), binary: false })?;
                if repl_chars.next().is_some() {
                    return Err(RuntimeError::TypeError { token: token.clone(), expected: "a single-character String".into(), binary: false });
                }
                chars[idx] = ch;
            }
            *s.borrow_mut() = chars.into_iter().collect();
            Ok(value)
        }
        _ => Err(RuntimeError::TypeError { token: token.clone(), expected: "a List or String".into(), binary: false }),
    }
}

fn slice_bounds(token: &Token, start: &Value, end: &Value, len: usize) -> Result<(usize, usize), RuntimeError> {
    let s = match start {
        Value::Number(n) => (*n as i64).max(0) as usize,
        _ => return Err(RuntimeError::IndexNotInteger { token: token.clone() }),
    };
    let e = match end {
        Value::Number(n) => (*n as i64).max(0) as usize,
        _ => return Err(RuntimeError::IndexNotInteger { token: token.clone() }),
    };
    let s = s.min(len);
    let e = e.min(len);
    if s > e {
        return Err(RuntimeError::InvalidSlice { token: token.clone() });
    }
    Ok((s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Literal, SourceLoc, TokenKind};

    fn tok() -> Token {
        Token::new(TokenKind::LeftBracket, "[", Literal::None, SourceLoc::repl(1, 1))
    }

    #[test]
    fn index_access_returns_element() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        let result = access(&list, &Value::Number(1.0), None, &tok()).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn negative_index_wraps_from_end() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        let result = access(&list, &Value::Number(-1.0), None, &tok()).unwrap();
        assert!(matches!(result, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn slice_returns_sublist() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0), Value::Number(4.0)]);
        let result = access(&list, &Value::Number(1.0), Some(&Value::Number(3.0)), &tok()).unwrap();
        match result {
            Value::List(items) => assert_eq!(items.borrow().len(), 2),
            _ => panic!("expected a list"),
        }
    }

    #[test]
    fn out_of_range_index_errors() {
        let list = Value::list(vec![Value::Number(1.0)]);
        assert!(matches!(access(&list, &Value::Number(5.0), None, &tok()), Err(RuntimeError::IndexOutOfRange { .. })));
    }

    #[test]
    fn slice_start_after_end_errors() {
        let list = Value::list(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(
            access(&list, &Value::Number(2.0), Some(&Value::Number(0.0)), &tok()),
            Err(RuntimeError::InvalidSlice { .. })
        ));
    }

    #[test]
    fn sort_then_reverse_does_not_mutate_original() {
        let mut items = vec![Value::Number(3.0), Value::Number(1.0), Value::Number(2.0)];
        sort_values(&tok(), &mut items, true).unwrap();
        assert_eq!(items.iter().map(|v| if let Value::Number(n) = v { *n } else { 0.0 }).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn string_slice_modify_splices_in_place() {
        let s = Value::string("hello");
        modify(&s, &Value::Number(1.0), Some(&Value::Number(3.0)), Value::string("ELL"), &tok()).unwrap();
        match &s {
            Value::Str(buf) => assert_eq!(&*buf.borrow(), "hELLo"),
            _ => panic!("expected a string"),
        }
    }

    #[test]
    fn flat_recursively_flattens_nested_lists() {
        let nested = vec![Value::Number(1.0), Value::list(vec![Value::Number(2.0), Value::list(vec![Value::Number(3.0)])])];
        let flat = flatten(&nested);
        assert_eq!(flat.len(), 3);
    }
}
