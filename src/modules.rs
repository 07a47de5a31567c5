// ABOUTME: GetMod native module registry

use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::VarAccess;
use crate::callable::NativeFn;
use crate::environment::Environment;
use crate::errors::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// Built-in modules reachable via `GetMod <name>;`. Each module is exposed
/// to scripts as a `Value::Group`: member access (`Math.sqrt(9)`) proxies
/// into the module's environment exactly like a user `group` declaration.
pub struct ModuleRegistry {
    modules: HashMap<String, Environment>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        let mut modules = HashMap::new();
        modules.insert("Math".to_string(), math_module());
        ModuleRegistry { modules }
    }
}

impl ModuleRegistry {
    pub fn load(&self, name: &str, token: &Token) -> Result<Value, RuntimeError> {
        self.modules
            .get(name)
            .map(|env| Value::Group(Rc::new(env.clone())))
            .ok_or_else(|| RuntimeError::UndefinedName { token: token.clone(), name: name.to_string() })
    }
}

fn native(name: &str, min: usize, max: usize, f: impl Fn(&mut crate::interpreter::Interpreter, &Token, Vec<Value>) -> Result<Value, RuntimeError> + 'static) -> Value {
    Value::Callable(Rc::new(NativeFn { name: name.to_string(), min_arity: min, max_arity: max, func: Box::new(f) }))
}

fn expect_number(token: &Token, v: &Value) -> Result<f64, RuntimeError> {
    match v {
        Value::Number(n) => Ok(*n),
        _ => Err(RuntimeError::TypeError { token: token.clone(), expected: "a number".into(), binary: false }),
    }
}

fn math_module() -> Environment {
    let env = Environment::new_global();
    env.define("pi", VarAccess::Fix, Some(Value::Number(std::f64::consts::PI)));
    env.define("e", VarAccess::Fix, Some(Value::Number(std::f64::consts::E)));
    env.define(
        "sqrt",
        VarAccess::Fix,
        Some(native("sqrt", 1, 1, |_i, t, args| Ok(Value::Number(expect_number(t, &args[0])?.sqrt())))),
    );
    env.define(
        "abs",
        VarAccess::Fix,
        Some(native("abs", 1, 1, |_i, t, args| Ok(Value::Number(expect_number(t, &args[0])?.abs())))),
    );
    env.define(
        "floor",
        VarAccess::Fix,
        Some(native("floor", 1, 1, |_i, t, args| Ok(Value::Number(expect_number(t, &args[0])?.floor())))),
    );
    env.define(
        "ceil",
        VarAccess::Fix,
        Some(native("ceil", 1, 1, |_i, t, args| Ok(Value::Number(expect_number(t, &args[0])?.ceil())))),
    );
    env.define(
        "pow",
        VarAccess::Fix,
        Some(native("pow", 2, 2, |_i, t, args| {
            Ok(Value::Number(expect_number(t, &args[0])?.powf(expect_number(t, &args[1])?)))
        })),
    );
    env.define(
        "max",
        VarAccess::Fix,
        Some(native("max", 2, 2, |_i, t, args| {
            Ok(Value::Number(expect_number(t, &args[0])?.max(expect_number(t, &args[1])?)))
        })),
    );
    env.define(
        "min",
        VarAccess::Fix,
        Some(native("min", 2, 2, |_i, t, args| {
            Ok(Value::Number(expect_number(t, &args[0])?.min(expect_number(t, &args[1])?)))
        })),
    );
    env
}
