// ABOUTME: User-defined functions, lambdas, and bound methods as Callables

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::ast::{FunctionDecl, Param, Params};
use crate::callable::Callable;
use crate::classes::{Instance, LoxClass};
use crate::environment::Environment;
use crate::errors::RuntimeError;
use crate::interpreter::Interpreter;
use crate::outcome::Outcome;
use crate::token::Token;
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Plain,
    Initializer,
    Method,
    Getter,
    StaticMethod,
}

/// A user-defined function, lambda, method, or getter: the declaration plus
/// the environment it closed over at definition time.
pub struct LoxFunction {
    pub decl: Rc<FunctionDecl>,
    pub closure: Environment,
    pub kind: FunctionKind,
    /// Set for methods bound to a particular instance (via `Get` on an
    /// instance, or implicitly inside a method body for `this`/`super`
    /// calls). `None` for free functions and lambdas.
    pub bound_this: Option<Rc<RefCell<Instance>>>,
    /// The lexically enclosing class of a method, used for private-member
    /// access checks: a private field/method is reachable only while
    /// executing inside a method whose `owner` is the instance's class or
    /// an ancestor of it. Held weakly: the class's method map strongly owns
    /// this `LoxFunction`, so a strong back-reference would cycle.
    pub owner: Option<Weak<LoxClass>>,
}

impl LoxFunction {
    pub fn new(
        decl: Rc<FunctionDecl>,
        closure: Environment,
        kind: FunctionKind,
        owner: Option<Weak<LoxClass>>,
    ) -> Self {
        LoxFunction { decl, closure, kind, bound_this: None, owner }
    }

    /// Re-closes this function over an environment holding `this` bound to
    /// `instance`, producing the bound method returned by instance member
    /// access.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> LoxFunction {
        let env = Environment::nested(&self.closure);
        env.define("this", crate::ast::VarAccess::Fix, Some(Value::Instance(instance.clone())));
        LoxFunction {
            decl: self.decl.clone(),
            closure: env,
            kind: self.kind,
            bound_this: Some(instance),
            owner: self.owner.clone(),
        }
    }
}

fn bind_params(env: &Environment, params: &Params, mut args: Vec<Value>, interp: &mut Interpreter, token: &Token) -> Result<(), RuntimeError> {
    let variadic = params.is_variadic();
    let fixed_count = if variadic { params.params.len() - 1 } else { params.params.len() };

    for (i, param) in params.params.iter().take(fixed_count).enumerate() {
        let value = if i < args.len() {
            Some(args[i].clone().unwrap_reference())
        } else {
            match param {
                Param::Default(_, expr) => Some(interp.evaluate(expr)?),
                _ => None,
            }
        };
        let name = match param {
            Param::Plain(t) | Param::Default(t, _) | Param::Variadic(t) => t,
        };
        env.define(&name.lexeme, crate::ast::VarAccess::Var, value);
    }

    if variadic {
        let rest: Vec<Value> = if args.len() > fixed_count {
            args.drain(fixed_count..).map(Value::unwrap_reference).collect()
        } else {
            Vec::new()
        };
        if let Some(Param::Variadic(t)) = params.params.last() {
            env.define(&t.lexeme, crate::ast::VarAccess::Var, Some(Value::list(rest)));
        }
    }
    let _ = token;
    Ok(())
}

impl Callable for LoxFunction {
    fn arity(&self) -> (usize, usize) {
        let (min, max) = self.decl.params.arity();
        match self.kind {
            FunctionKind::Getter => (0, 0),
            _ => (min, max),
        }
    }

    fn name(&self) -> &str {
        &self.decl.name.lexeme
    }

    fn owner(&self) -> Option<Rc<LoxClass>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    fn call(&self, interp: &mut Interpreter, token: &Token, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.check_arity(token, args.len())?;
        let env = Environment::nested(&self.closure);
        bind_params(&env, &self.decl.params, args, interp, token)?;

        let outcome = interp.execute_block(&self.decl.body, env)?;
        match outcome {
            Outcome::Returned(v) => {
                if self.kind == FunctionKind::Initializer {
                    Ok(self.bound_this.clone().map(Value::Instance).unwrap_or(Value::Nil))
                } else {
                    Ok(v)
                }
            }
            Outcome::Normal => {
                if self.kind == FunctionKind::Initializer {
                    Ok(self.bound_this.clone().map(Value::Instance).unwrap_or(Value::Nil))
                } else {
                    Ok(Value::Nil)
                }
            }
            Outcome::Broke | Outcome::Continued => unreachable!("resolver guarantees break/continue stay inside loops"),
        }
    }
}
