// ABOUTME: Lexical environment chain: variable frames with VAR/FIX access tags

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::VarAccess;
use crate::errors::RuntimeError;
use crate::token::Token;
use crate::value::Value;

struct Binding {
    access: VarAccess,
    value: Option<Value>,
}

struct Frame {
    values: HashMap<String, Binding>,
    enclosing: Option<Environment>,
}

/// A reference-counted, mutable scope frame. Cloning an `Environment` clones
/// the handle, not the frame, exactly like the closures it backs share their
/// captured scope.
#[derive(Clone)]
pub struct Environment(Rc<RefCell<Frame>>);

impl Environment {
    pub fn new_global() -> Self {
        Environment(Rc::new(RefCell::new(Frame { values: HashMap::new(), enclosing: None })))
    }

    pub fn nested(enclosing: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            values: HashMap::new(),
            enclosing: Some(enclosing.clone()),
        })))
    }

    pub fn enclosing(&self) -> Option<Environment> {
        self.0.borrow().enclosing.clone()
    }

    /// Declares a new binding in this frame, shadowing any outer binding of
    /// the same name. `value` is `None` for a `var` with no initializer,
    /// which reads as uninitialized until first assigned.
    pub fn define(&self, name: &str, access: VarAccess, value: Option<Value>) {
        self.0.borrow_mut().values.insert(name.to_string(), Binding { access, value });
    }

    fn ancestor(&self, distance: usize) -> Environment {
        let mut env = self.clone();
        for _ in 0..distance {
            let next = env.0.borrow().enclosing.clone().expect("resolver distance out of range");
            env = next;
        }
        env
    }

    /// Lookup resolved statically: walk exactly `distance` frames, no name search.
    pub fn get_at(&self, distance: usize, token: &Token) -> Result<Value, RuntimeError> {
        let env = self.ancestor(distance);
        let frame = env.0.borrow();
        match frame.values.get(&token.lexeme) {
            Some(Binding { value: Some(v), .. }) => Ok(v.clone()),
            Some(Binding { value: None, .. }) => Err(RuntimeError::Uninitialized {
                token: token.clone(),
                name: token.lexeme.clone(),
            }),
            None => Err(RuntimeError::UndefinedName {
                token: token.clone(),
                name: token.lexeme.clone(),
            }),
        }
    }

    pub fn assign_at(&self, distance: usize, token: &Token, value: Value) -> Result<(), RuntimeError> {
        let env = self.ancestor(distance);
        let mut frame = env.0.borrow_mut();
        match frame.values.get_mut(&token.lexeme) {
            Some(binding) => {
                if binding.access == VarAccess::Fix && binding.value.is_some() {
                    return Err(RuntimeError::FixReassign {
                        token: token.clone(),
                        name: token.lexeme.clone(),
                    });
                }
                binding.value = Some(value);
                Ok(())
            }
            None => Err(RuntimeError::UndefinedName { token: token.clone(), name: token.lexeme.clone() }),
        }
    }

    /// Dynamic (unresolved) lookup: walks the whole chain by name. Used for
    /// globals and for the debugger's ad hoc expression evaluation, where no
    /// static distance is available.
    pub fn get_global(&self, token: &Token) -> Result<Value, RuntimeError> {
        let mut env = self.clone();
        loop {
            let next = {
                let frame = env.0.borrow();
                match frame.values.get(&token.lexeme) {
                    Some(Binding { value: Some(v), .. }) => return Ok(v.clone()),
                    Some(Binding { value: None, .. }) => {
                        return Err(RuntimeError::Uninitialized {
                            token: token.clone(),
                            name: token.lexeme.clone(),
                        })
                    }
                    None => frame.enclosing.clone(),
                }
            };
            match next {
                Some(parent) => env = parent,
                None => {
                    return Err(RuntimeError::UndefinedName {
                        token: token.clone(),
                        name: token.lexeme.clone(),
                    })
                }
            }
        }
    }

    pub fn assign_global(&self, token: &Token, value: Value) -> Result<(), RuntimeError> {
        let mut env = self.clone();
        loop {
            let has_it = env.0.borrow().values.contains_key(&token.lexeme);
            if has_it {
                let mut frame = env.0.borrow_mut();
                let binding = frame.values.get_mut(&token.lexeme).unwrap();
                if binding.access == VarAccess::Fix && binding.value.is_some() {
                    return Err(RuntimeError::FixReassign {
                        token: token.clone(),
                        name: token.lexeme.clone(),
                    });
                }
                binding.value = Some(value);
                return Ok(());
            }
            let next = env.0.borrow().enclosing.clone();
            match next {
                Some(parent) => env = parent,
                None => {
                    return Err(RuntimeError::UndefinedName {
                        token: token.clone(),
                        name: token.lexeme.clone(),
                    })
                }
            }
        }
    }

    /// Snapshot of this frame's own bindings, for the debugger's `locals`
    /// command. Does not walk enclosing frames.
    pub fn locals(&self) -> Vec<(String, Option<Value>)> {
        self.0
            .borrow()
            .values
            .iter()
            .map(|(k, b)| (k.clone(), b.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{SourceLoc, TokenKind};

    fn tok(name: &str) -> Token {
        Token::new(TokenKind::Identifier, name, crate::token::Literal::None, SourceLoc::repl(1, 1))
    }

    #[test]
    fn define_and_get_at_zero_distance() {
        let env = Environment::new_global();
        env.define("x", VarAccess::Var, Some(Value::Number(3.0)));
        let v = env.get_at(0, &tok("x")).unwrap();
        assert!(matches!(v, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn nested_scope_shadows() {
        let global = Environment::new_global();
        global.define("x", VarAccess::Var, Some(Value::Number(1.0)));
        let inner = Environment::nested(&global);
        inner.define("x", VarAccess::Var, Some(Value::Number(2.0)));
        assert!(matches!(inner.get_at(0, &tok("x")).unwrap(), Value::Number(n) if n == 2.0));
        assert!(matches!(inner.get_at(1, &tok("x")).unwrap(), Value::Number(n) if n == 1.0));
    }

    #[test]
    fn fix_reassignment_errors() {
        let env = Environment::new_global();
        env.define("pi", VarAccess::Fix, Some(Value::Number(3.14)));
        let err = env.assign_at(0, &tok("pi"), Value::Number(3.0));
        assert!(matches!(err, Err(RuntimeError::FixReassign { .. })));
    }

    #[test]
    fn uninitialized_var_errors_until_assigned() {
        let env = Environment::new_global();
        env.define("y", VarAccess::Var, None);
        assert!(matches!(env.get_at(0, &tok("y")), Err(RuntimeError::Uninitialized { .. })));
        env.assign_at(0, &tok("y"), Value::Nil).unwrap();
        assert!(matches!(env.get_at(0, &tok("y")), Ok(Value::Nil)));
    }
}
