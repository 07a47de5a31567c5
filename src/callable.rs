// ABOUTME: Unifying trait for everything invocable: functions, natives, classes

use std::rc::Rc;

use crate::classes::LoxClass;
use crate::errors::RuntimeError;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

/// Anything that can appear on the left of a call expression implements
/// `Callable`: user-defined functions and lambdas, bound instance methods,
/// native builtins, list methods, and classes themselves (calling a class
/// constructs an instance). One dynamic-dispatch seam instead of a match on
/// "kind of thing being called" scattered through the evaluator.
pub trait Callable {
    /// `(min, max)` accepted argument count. `max` is 256 for variadics.
    fn arity(&self) -> (usize, usize);

    fn name(&self) -> &str;

    fn call(&self, interp: &mut Interpreter, token: &Token, args: Vec<Value>) -> Result<Value, RuntimeError>;

    /// The lexically enclosing class of this callable, if any. Used by the
    /// evaluator to track which class's private members are reachable while
    /// this call is on the stack. Only methods (see `LoxFunction`) override
    /// this; natives and bare functions have no owning class.
    fn owner(&self) -> Option<Rc<LoxClass>> {
        None
    }

    fn check_arity(&self, token: &Token, got: usize) -> Result<(), RuntimeError> {
        let (min, max) = self.arity();
        if got < min {
            return Err(RuntimeError::TooFewArguments { token: token.clone(), min, got });
        }
        if got > max {
            return Err(RuntimeError::TooManyArguments { token: token.clone(), max, got });
        }
        Ok(())
    }
}

/// A native function implemented in Rust, wrapping a closure so builtins can
/// be registered as plain `fn`/closures instead of one-off structs each.
pub struct NativeFn {
    pub name: String,
    pub min_arity: usize,
    pub max_arity: usize,
    pub func: Box<dyn Fn(&mut Interpreter, &Token, Vec<Value>) -> Result<Value, RuntimeError>>,
}

impl Callable for NativeFn {
    fn arity(&self) -> (usize, usize) {
        (self.min_arity, self.max_arity)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, interp: &mut Interpreter, token: &Token, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.check_arity(token, args.len())?;
        (self.func)(interp, token, args)
    }
}
