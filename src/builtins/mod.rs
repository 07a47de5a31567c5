//! Native globals and the `List` member-method table.
//!
//! One sub-module per category, registered from a single `install` entry
//! point: a small set of free functions bound into the global environment,
//! plus the `List` member-method dispatch reached through `.method()`
//! syntax. Strings expose no member methods of their own, only
//! indexing/slicing.

pub mod list_methods;

use std::rc::Rc;

use crate::ast::VarAccess;
use crate::callable::NativeFn;
use crate::errors::RuntimeError;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

pub fn install(interp: &mut Interpreter) {
    define(interp, "clock", 0, 0, |_i, _t, _args| {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Ok(Value::DateTime(secs))
    });

    define(interp, "len", 1, 1, |_i, t, args| match &args[0] {
        Value::Str(s) => Ok(Value::Number(s.borrow().chars().count() as f64)),
        Value::List(items) => Ok(Value::Number(items.borrow().len() as f64)),
        _ => Err(RuntimeError::TypeError { token: t.clone(), expected: "a String or List".into(), binary: false }),
    });

    define(interp, "str", 1, 1, |i, _t, args| Ok(Value::string(i.stringify(&args[0]))));

    define(interp, "num", 1, 1, |_i, t, args| match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Str(s) => s
            .borrow()
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| RuntimeError::Custom { token: t.clone(), message: format!("cannot convert '{}' to a number", s.borrow()) }),
        _ => Err(RuntimeError::TypeError { token: t.clone(), expected: "a String or Number".into(), binary: false }),
    });

    define(interp, "type", 1, 1, |_i, _t, args| Ok(Value::string(args[0].type_name())));

    define(interp, "reference", 1, 1, |_i, _t, mut args| Ok(Value::Reference(Box::new(args.remove(0)))));

    define(interp, "stop", 0, 0, |_i, t, _args| Err(RuntimeError::Halted { token: t.clone() }));

    define(interp, "breakpoint", 0, 0, |i, t, _args| {
        crate::debugger::run(i, t.loc.line)?;
        Ok(Value::Nil)
    });
}

fn define(
    interp: &mut Interpreter,
    name: &str,
    min: usize,
    max: usize,
    f: impl Fn(&mut Interpreter, &Token, Vec<Value>) -> Result<Value, RuntimeError> + 'static,
) {
    let native = Value::Callable(Rc::new(NativeFn { name: name.to_string(), min_arity: min, max_arity: max, func: Box::new(f) }));
    interp.globals.define(name, VarAccess::Fix, Some(native));
}
