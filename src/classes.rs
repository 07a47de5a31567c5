// ABOUTME: Class/instance object model: method resolution, privacy, reflection

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::callable::Callable;
use crate::errors::RuntimeError;
use crate::function::LoxFunction;
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

/// Names considered descendants of the built-in `Error`/`Warning` root
/// classes for `report`/`attempt` purposes, checked by walking `superclass`.
pub const ERROR_ROOT: &str = "Error";
pub const WARNING_ROOT: &str = "Warning";

pub struct LoxClass {
    pub name: String,
    pub superclass: Option<Rc<LoxClass>>,
    pub public_methods: HashMap<String, Rc<LoxFunction>>,
    pub private_methods: HashMap<String, Rc<LoxFunction>>,
    /// Static/class methods, invoked on the class itself rather than an instance.
    pub static_methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    /// Walks `self` then ancestors for a public or private instance method.
    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        if let Some(m) = self.public_methods.get(name).or_else(|| self.private_methods.get(name)) {
            return Some(m.clone());
        }
        self.superclass.as_ref().and_then(|s| s.find_method(name))
    }

    pub fn is_method_private(&self, name: &str) -> bool {
        if self.private_methods.contains_key(name) {
            return true;
        }
        if self.public_methods.contains_key(name) {
            return false;
        }
        self.superclass.as_ref().map(|s| s.is_method_private(name)).unwrap_or(false)
    }

    pub fn find_static(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.static_methods
            .get(name)
            .cloned()
            .or_else(|| self.superclass.as_ref().and_then(|s| s.find_static(name)))
    }

    /// `true` if `self` is `other` or a descendant of it, by name (classes
    /// are not generic, so name comparison along the chain is sufficient).
    pub fn is_or_descends_from(&self, other: &str) -> bool {
        self.name == other || self.superclass.as_ref().map(|s| s.is_or_descends_from(other)).unwrap_or(false)
    }

    pub fn descends_from_root(&self, root: &str) -> bool {
        self.superclass.as_ref().map(|s| s.is_or_descends_from(root)).unwrap_or(false) || self.name == root
    }

    /// Whether `accessor` (the class lexically enclosing the currently
    /// executing method, or `None` at top level) may reach a private member
    /// declared on `self`: the accessor must be `self` or one of its
    /// descendants walking back up through the chain that declares it.
    pub fn accessible_from(&self, accessor: Option<&Rc<LoxClass>>) -> bool {
        match accessor {
            Some(a) => a.is_or_descends_from(&self.name) || self.is_or_descends_from(&a.name),
            None => false,
        }
    }
}

pub struct Instance {
    pub class: Rc<LoxClass>,
    pub public_fields: HashMap<String, Value>,
    pub private_fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Instance { class, public_fields: HashMap::new(), private_fields: HashMap::new() }
    }

    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.public_fields.get(name).or_else(|| self.private_fields.get(name))
    }

    pub fn is_field_private(&self, name: &str) -> bool {
        self.private_fields.contains_key(name) && !self.public_fields.contains_key(name)
    }
}

/// A reflection helper bound per-instance (`_fieldList`, `_methodList`,
/// `_fields`, `_methods`), following `original_source/Lox/LoxInstance.py`'s
/// `InstanceFunction`.
pub struct ReflectionMethod {
    pub name: &'static str,
    pub instance: Rc<RefCell<Instance>>,
}

impl Callable for ReflectionMethod {
    fn arity(&self) -> (usize, usize) {
        (0, 0)
    }

    fn name(&self) -> &str {
        self.name
    }

    fn call(&self, interp: &mut Interpreter, token: &Token, _args: Vec<Value>) -> Result<Value, RuntimeError> {
        let inst = self.instance.borrow();
        match self.name {
            "_fieldList" => {
                let mut names: Vec<Value> =
                    inst.public_fields.keys().map(|k| Value::string(k.clone())).collect();
                names.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
                Ok(Value::list(names))
            }
            "_methodList" => {
                let mut names: Vec<Value> =
                    inst.class.public_methods.keys().map(|k| Value::string(k.clone())).collect();
                Ok(Value::list(names))
            }
            "_fields" => {
                for (k, v) in inst.public_fields.iter() {
                    println!("{k} = {}", interp.stringify(v));
                }
                Ok(Value::Nil)
            }
            "_methods" => {
                for k in inst.class.public_methods.keys() {
                    println!("{k}");
                }
                Ok(Value::Nil)
            }
            other => Err(RuntimeError::Custom {
                token: token.clone(),
                message: format!("unknown reflection method '{other}'"),
            }),
        }
    }
}

pub fn reflection_method(name: &str, instance: Rc<RefCell<Instance>>) -> Option<Value> {
    const NAMES: [&str; 4] = ["_fieldList", "_methodList", "_fields", "_methods"];
    NAMES.iter().find(|&&n| n == name).map(|&n| {
        Value::Callable(Rc::new(ReflectionMethod { name: n, instance }))
    })
}

/// The class object itself is `Callable`: calling it constructs an
/// `Instance`, runs `init` if defined, and returns the new instance.
pub struct ClassConstructor(pub Rc<LoxClass>);

impl Callable for ClassConstructor {
    fn arity(&self) -> (usize, usize) {
        self.0
            .find_method("init")
            .map(|f| f.arity())
            .unwrap_or((0, 0))
    }

    fn name(&self) -> &str {
        &self.0.name
    }

    fn call(&self, interp: &mut Interpreter, token: &Token, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let instance = Rc::new(RefCell::new(Instance::new(self.0.clone())));
        if let Some(init) = self.0.find_method("init") {
            let bound = init.bind(instance.clone());
            bound.call(interp, token, args)?;
        }
        Ok(Value::Instance(instance))
    }
}
