// ABOUTME: Tree-walking evaluator: executes statements, evaluates expressions

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::ast::*;
use crate::callable::Callable;
use crate::classes::{self, ClassConstructor, Instance, LoxClass};
use crate::config::SourceConfig;
use crate::environment::Environment;
use crate::errors::RuntimeError;
use crate::function::{FunctionKind, LoxFunction};
use crate::modules::ModuleRegistry;
use crate::outcome::Outcome;
use crate::resolver::Resolution;
use crate::token::{Token, TokenKind};
use crate::value::Value;

/// One entry of the call stack, surfaced by the debugger's `stack` command.
pub struct CallFrame {
    pub callee_name: String,
    pub call_site_line: usize,
}

pub struct Interpreter {
    pub globals: Environment,
    pub environment: Environment,
    distances: HashMap<u32, usize>,
    pub call_stack: Vec<CallFrame>,
    pub trace_log: Vec<String>,
    pub debug_mode: bool,
    pub breakpoints: std::collections::HashSet<usize>,
    /// The lexically enclosing class of the method currently executing,
    /// used to check private member access (`classes::LoxClass::accessible_from`).
    owner_stack: Vec<Option<Rc<LoxClass>>>,
    pub config: SourceConfig,
    pub modules: ModuleRegistry,
    recursion_depth: usize,
    /// Text of the currently running source unit, kept around only so the
    /// debugger's `list` command can print lines surrounding a breakpoint.
    pub source_text: Option<Rc<str>>,
}

const MAX_RECURSION: usize = 800;

impl Interpreter {
    pub fn new(config: SourceConfig) -> Self {
        let globals = Environment::new_global();
        let modules = ModuleRegistry::default();
        let mut interp = Interpreter {
            globals: globals.clone(),
            environment: globals,
            distances: HashMap::new(),
            call_stack: Vec::new(),
            trace_log: Vec::new(),
            debug_mode: false,
            breakpoints: std::collections::HashSet::new(),
            owner_stack: vec![None],
            config,
            modules,
            recursion_depth: 0,
            source_text: None,
        };
        crate::builtins::install(&mut interp);
        interp
    }

    pub fn load_resolution(&mut self, resolution: Resolution) {
        self.distances.extend(resolution.distances);
    }

    pub fn current_owner(&self) -> Option<&Rc<LoxClass>> {
        self.owner_stack.last().and_then(|o| o.as_ref())
    }

    // -- statement execution -------------------------------------------------

    pub fn run(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in stmts {
            self.execute(stmt)?;
        }
        Ok(())
    }

    pub fn execute_block(&mut self, stmts: &[Stmt], env: Environment) -> Result<Outcome, RuntimeError> {
        let previous = self.environment.clone();
        self.environment = env;
        let result = (|| {
            for stmt in stmts {
                let outcome = self.execute(stmt)?;
                if outcome.interrupts() {
                    return Ok(outcome);
                }
            }
            Ok(Outcome::Normal)
        })();
        self.environment = previous;
        result
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Outcome, RuntimeError> {
        if self.debug_mode {
            self.trace_log.push(stmt_summary(stmt).to_string());
            if let Some(line) = stmt_line(stmt) {
                if self.breakpoints.contains(&line) {
                    crate::debugger::run(self, line)?;
                }
            }
        }
        match stmt {
            Stmt::Expression(e) => {
                self.evaluate(e)?;
                Ok(Outcome::Normal)
            }
            Stmt::Print(e, _) => {
                let v = self.evaluate(e)?;
                println!("{}", self.stringify(&v));
                Ok(Outcome::Normal)
            }
            Stmt::Report(e, token) => {
                let v = self.evaluate(e)?;
                let is_reportable = match &v {
                    Value::Instance(inst) => {
                        let class = inst.borrow().class.clone();
                        class.descends_from_root(classes::ERROR_ROOT) || class.descends_from_root(classes::WARNING_ROOT)
                    }
                    _ => false,
                };
                if !is_reportable {
                    return Err(RuntimeError::InvalidReport { token: token.clone() });
                }
                Err(RuntimeError::Reported { token: token.clone(), instance: v })
            }
            Stmt::Var { name, initializer, access } => {
                let value = match initializer {
                    Some(e) => Some(self.evaluate(e)?.unwrap_reference().deep_copy()),
                    None => None,
                };
                self.environment.define(&name.lexeme, *access, value);
                Ok(Outcome::Normal)
            }
            Stmt::ListDecl { name, initializer } => {
                let value = match initializer {
                    Some(e) => self.evaluate(e)?.unwrap_reference().deep_copy(),
                    None => Value::list(Vec::new()),
                };
                self.environment.define(&name.lexeme, VarAccess::Var, Some(value));
                Ok(Outcome::Normal)
            }
            Stmt::Block(stmts) => {
                let env = Environment::nested(&self.environment);
                self.execute_block(stmts, env)
            }
            Stmt::If { condition, then_branch, else_branch } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(e) = else_branch {
                    self.execute(e)
                } else {
                    Ok(Outcome::Normal)
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Outcome::Broke => break,
                        Outcome::Continued | Outcome::Normal => {}
                        returned @ Outcome::Returned(_) => return Ok(returned),
                    }
                }
                Ok(Outcome::Normal)
            }
            Stmt::Break(..) => Ok(Outcome::Broke),
            Stmt::Continue(..) => Ok(Outcome::Continued),
            Stmt::Return(_, value) => {
                let v = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                Ok(Outcome::Returned(v))
            }
            Stmt::Function(decl) => {
                let func = LoxFunction::new(Rc::new(decl.clone()), self.environment.clone(), FunctionKind::Plain, None);
                self.environment.define(&decl.name.lexeme, VarAccess::Var, Some(Value::Callable(Rc::new(func))));
                Ok(Outcome::Normal)
            }
            Stmt::Class(decl) => self.execute_class(decl),
            Stmt::Match { value, cases, default, .. } => self.execute_match(value, cases, default),
            Stmt::Group { name, body } => {
                let env = Environment::nested(&self.environment);
                self.execute_block(body, env.clone())?;
                self.environment.define(&name.lexeme, VarAccess::Fix, Some(Value::Group(Rc::new(env))));
                Ok(Outcome::Normal)
            }
            Stmt::Fetch { name, .. } => {
                let module = self.modules.load(&name.lexeme, name)?;
                self.environment.define(&name.lexeme, VarAccess::Fix, Some(module));
                Ok(Outcome::Normal)
            }
            Stmt::Error { body, filter, handler } => self.execute_attempt(body, filter.as_deref(), handler),
        }
    }

    fn execute_match(&mut self, value: &Expr, cases: &[MatchCase], default: &Option<Vec<Stmt>>) -> Result<Outcome, RuntimeError> {
        let subject = self.evaluate(value)?;
        let mut i = 0;
        while i < cases.len() {
            let case = &cases[i];
            let candidate = self.evaluate(&case.value)?;
            if values_equal(&subject, &candidate) {
                loop {
                    let env = Environment::nested(&self.environment);
                    let outcome = self.execute_block(&cases[i].body, env)?;
                    if outcome.interrupts() {
                        return Ok(outcome);
                    }
                    if cases[i].fall_through && i + 1 < cases.len() {
                        i += 1;
                        continue;
                    }
                    return Ok(Outcome::Normal);
                }
            }
            i += 1;
        }
        if let Some(body) = default {
            let env = Environment::nested(&self.environment);
            return self.execute_block(body, env);
        }
        Ok(Outcome::Normal)
    }

    fn execute_attempt(&mut self, body: &Stmt, filter: Option<&[Token]>, handler: &Stmt) -> Result<Outcome, RuntimeError> {
        match self.execute(body) {
            Err(RuntimeError::Reported { instance, .. }) => {
                let accepted = match (&instance, filter) {
                    (_, None) => true,
                    (Value::Instance(inst), Some(names)) => {
                        let class = inst.borrow().class.clone();
                        names.iter().any(|n| class.is_or_descends_from(&n.lexeme))
                    }
                    _ => false,
                };
                if accepted {
                    let env = Environment::nested(&self.environment);
                    env.define("error", VarAccess::Fix, Some(instance));
                    self.execute_block(std::slice::from_ref(handler), env)
                } else {
                    Err(RuntimeError::Reported { instance, token: Token::synthetic(TokenKind::Attempt, "attempt") })
                }
            }
            other => other,
        }
    }

    fn execute_class(&mut self, decl: &ClassDecl) -> Result<Outcome, RuntimeError> {
        let superclass = match &decl.superclass {
            Some(name) => {
                let value = self.environment.get_global(name)?;
                match value {
                    Value::Class(c) => Some(c),
                    _ => {
                        return Err(RuntimeError::TypeError {
                            token: name.clone(),
                            expected: "a class".into(),
                            binary: false,
                        })
                    }
                }
            }
            None => None,
        };

        self.environment.define(&decl.name.lexeme, VarAccess::Fix, None);

        let class_env = if superclass.is_some() {
            let env = Environment::nested(&self.environment);
            env.define("super", VarAccess::Fix, superclass.clone().map(Value::Class));
            env
        } else {
            self.environment.clone()
        };

        let class_rc = Rc::new_cyclic(|weak| {
            let mut public_methods = HashMap::new();
            let mut private_methods = HashMap::new();
            let mut static_methods = HashMap::new();

            let make = |f: &FunctionDecl, kind: FunctionKind| {
                LoxFunction::new(Rc::new(f.clone()), class_env.clone(), kind, Some(weak.clone()))
            };

            for m in &decl.public_methods {
                let kind = if m.name.lexeme == "init" {
                    FunctionKind::Initializer
                } else if m.is_getter {
                    FunctionKind::Getter
                } else {
                    FunctionKind::Method
                };
                public_methods.insert(m.name.lexeme.clone(), Rc::new(make(m, kind)));
            }
            for m in &decl.private_methods {
                let kind = if m.is_getter { FunctionKind::Getter } else { FunctionKind::Method };
                private_methods.insert(m.name.lexeme.clone(), Rc::new(make(m, kind)));
            }
            for m in &decl.static_methods {
                static_methods.insert(m.name.lexeme.clone(), Rc::new(make(m, FunctionKind::StaticMethod)));
            }

            LoxClass {
                name: decl.name.lexeme.clone(),
                superclass: superclass.clone(),
                public_methods,
                private_methods,
                static_methods,
            }
        });

        self.environment.assign_global(&decl.name, Value::Class(class_rc))?;
        Ok(Outcome::Normal)
    }

    // -- expression evaluation ------------------------------------------------

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Variable(name) => self.lookup_variable(expr.id, name),
            ExprKind::Grouping(e) => self.evaluate(e),
            ExprKind::Unary(op, e) => self.eval_unary(op, e),
            ExprKind::Binary(l, op, r) => self.eval_binary(l, op, r),
            ExprKind::Logical(l, op, r) => self.eval_logical(l, op, r),
            ExprKind::Ternary(c, t, e) => {
                if self.evaluate(c)?.is_truthy() {
                    self.evaluate(t)
                } else {
                    self.evaluate(e)
                }
            }
            ExprKind::Comma(items) => {
                let mut last = Value::Nil;
                for i in items {
                    last = self.evaluate(i)?;
                }
                Ok(last)
            }
            ExprKind::Assign(name, value) => {
                let v = self.evaluate(value)?.unwrap_reference().deep_copy();
                self.assign_variable(expr.id, name, v.clone())?;
                Ok(v)
            }
            ExprKind::Get(obj, name) => self.eval_get(obj, name),
            ExprKind::Set(obj, name, value, visibility) => self.eval_set(obj, name, value, *visibility),
            ExprKind::Call(callee, args, token) => self.eval_call(callee, args, token),
            ExprKind::Lambda(params, body) => {
                let decl =
                    FunctionDecl { name: Token::synthetic(TokenKind::Identifier, "<lambda>"), params: params.clone(), body: body.clone(), is_getter: false };
                let func = LoxFunction::new(Rc::new(decl), self.environment.clone(), FunctionKind::Plain, None);
                Ok(Value::Callable(Rc::new(func)))
            }
            ExprKind::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for i in items {
                    values.push(self.evaluate(i)?.unwrap_reference().deep_copy());
                }
                Ok(Value::list(values))
            }
            ExprKind::Access(obj, start, end, token) => self.eval_access(obj, start, end.as_deref(), token),
            ExprKind::Modify(obj, start, end, value, token) => self.eval_modify(obj, start, end.as_deref(), value, token),
            ExprKind::This(token) => self.lookup_variable_at(expr.id, "this", token),
            ExprKind::Super(token, method) => self.eval_super(expr.id, token, method),
        }
    }

    fn lookup_variable(&mut self, expr_id: u32, name: &Token) -> Result<Value, RuntimeError> {
        match self.distances.get(&expr_id).copied() {
            Some(d) => self.environment.get_at(d, name),
            None => self.environment.get_global(name),
        }
    }

    fn lookup_variable_at(&mut self, expr_id: u32, _name: &str, token: &Token) -> Result<Value, RuntimeError> {
        self.lookup_variable(expr_id, token)
    }

    fn assign_variable(&mut self, expr_id: u32, name: &Token, value: Value) -> Result<(), RuntimeError> {
        match self.distances.get(&expr_id).copied() {
            Some(d) => self.environment.assign_at(d, name, value),
            None => self.environment.assign_global(name, value),
        }
    }

    fn eval_unary(&mut self, op: &Token, e: &Expr) -> Result<Value, RuntimeError> {
        let v = self.evaluate(e)?;
        match op.kind {
            TokenKind::Minus => match v {
                Value::Number(n) => Ok(Value::Number(-n)),
                _ => Err(RuntimeError::TypeError { token: op.clone(), expected: "a number".into(), binary: false }),
            },
            TokenKind::Bang => Ok(Value::Boolean(!v.is_truthy())),
            _ => unreachable!("parser only emits '-' and '!' as unary operators"),
        }
    }

    fn eval_logical(&mut self, l: &Expr, op: &Token, r: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(l)?;
        match op.kind {
            TokenKind::Or if left.is_truthy() => Ok(left),
            TokenKind::And if !left.is_truthy() => Ok(left),
            _ => self.evaluate(r),
        }
    }

    fn eval_binary(&mut self, l: &Expr, op: &Token, r: &Expr) -> Result<Value, RuntimeError> {
        let left = self.evaluate(l)?;
        let right = self.evaluate(r)?;
        use TokenKind::*;
        match op.kind {
            Plus => self.eval_plus(op, left, right),
            Minus => self.numeric_op(op, left, right, |a, b| a - b),
            Star => self.numeric_op(op, left, right, |a, b| a * b),
            StarStar => self.numeric_op(op, left, right, |a, b| a.powf(b)),
            Percent => self.numeric_op(op, left, right, |a, b| a % b),
            Slash => {
                if let (Value::Number(a), Value::Number(b)) = (&left, &right) {
                    if *b == 0.0 {
                        return Err(RuntimeError::DivisionByZero { token: op.clone() });
                    }
                    return Ok(Value::Number(a / b));
                }
                Err(RuntimeError::TypeError { token: op.clone(), expected: "numbers".into(), binary: true })
            }
            Greater | GreaterEqual | Less | LessEqual => self.compare(op, left, right),
            EqualEqual => self.values_equal_with_user_method(op, "_eq", left, right),
            BangEqual => self.values_equal_with_user_method(op, "_ne", left, right),
            _ => unreachable!("parser only emits binary-class tokens here"),
        }
    }

    fn eval_plus(&self, op: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                let a = self.display_basic(&left);
                let b = self.display_basic(&right);
                Ok(Value::string(format!("{a}{b}")))
            }
            (Value::List(a), Value::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Ok(Value::list(items))
            }
            _ => Err(RuntimeError::TypeError { token: op.clone(), expected: "numbers, strings, or lists".into(), binary: true }),
        }
    }

    fn numeric_op(&self, op: &Token, left: Value, right: Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, RuntimeError> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(f(a, b))),
            _ => Err(RuntimeError::TypeError { token: op.clone(), expected: "numbers".into(), binary: true }),
        }
    }

    fn compare(&mut self, op: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
        if let (Value::Number(a), Value::Number(b)) = (&left, &right) {
            let result = match op.kind {
                TokenKind::Greater => a > b,
                TokenKind::GreaterEqual => a >= b,
                TokenKind::Less => a < b,
                TokenKind::LessEqual => a <= b,
                _ => unreachable!(),
            };
            return Ok(Value::Boolean(result));
        }
        if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
            let result = match op.kind {
                TokenKind::Greater => *a.borrow() > *b.borrow(),
                TokenKind::GreaterEqual => *a.borrow() >= *b.borrow(),
                TokenKind::Less => *a.borrow() < *b.borrow(),
                TokenKind::LessEqual => *a.borrow() <= *b.borrow(),
                _ => unreachable!(),
            };
            return Ok(Value::Boolean(result));
        }
        if let Value::Instance(inst) = &left {
            let method_name = match op.kind {
                TokenKind::Greater => "_gt",
                TokenKind::GreaterEqual => "_ge",
                TokenKind::Less => "_lt",
                TokenKind::LessEqual => "_le",
                _ => unreachable!(),
            };
            let class = inst.borrow().class.clone();
            if let Some(m) = class.find_method(method_name) {
                let bound = m.bind(inst.clone());
                let result = bound.call(self, op, vec![right])?;
                return match result {
                    Value::Boolean(_) => Ok(result),
                    _ => Err(RuntimeError::TypeError {
                        token: op.clone(),
                        expected: format!("'{method_name}' to return a Boolean"),
                        binary: false,
                    }),
                };
            }
        }
        Err(RuntimeError::TypeError { token: op.clone(), expected: "comparable operands".into(), binary: true })
    }

    /// `==`/`!=` dispatch to a user `_eq`/`_ne` method when both operands are
    /// instances of the same class; the method must return Boolean. Falls
    /// back to structural/reference equality (`!=` negating `==`) otherwise,
    /// so values of different runtime types always compare unequal.
    fn values_equal_with_user_method(&mut self, op: &Token, method_name: &str, left: Value, right: Value) -> Result<Value, RuntimeError> {
        if let (Value::Instance(a), Value::Instance(b)) = (&left, &right) {
            let class = a.borrow().class.clone();
            if Rc::ptr_eq(&class, &b.borrow().class) {
                if let Some(m) = class.find_method(method_name) {
                    let bound = m.bind(a.clone());
                    let result = bound.call(self, op, vec![right.clone()])?;
                    return match result {
                        Value::Boolean(_) => Ok(result),
                        _ => Err(RuntimeError::TypeError {
                            token: op.clone(),
                            expected: format!("'{method_name}' to return a Boolean"),
                            binary: false,
                        }),
                    };
                }
            }
        }
        let equal = values_equal(&left, &right);
        Ok(Value::Boolean(if method_name == "_ne" { !equal } else { equal }))
    }

    fn eval_get(&mut self, obj: &Expr, name: &Token) -> Result<Value, RuntimeError> {
        let receiver = self.evaluate(obj)?;
        self.get_member(&receiver, name)
    }

    fn get_member(&mut self, receiver: &Value, name: &Token) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Instance(inst) => {
                if let Some(v) = classes::reflection_method(&name.lexeme, inst.clone()) {
                    return Ok(v);
                }
                let is_private_field = inst.borrow().is_field_private(&name.lexeme);
                if let Some(field) = inst.borrow().get_field(&name.lexeme) {
                    if is_private_field && !inst.borrow().class.accessible_from(self.current_owner()) {
                        return Err(RuntimeError::PrivateFieldInaccessible { token: name.clone(), name: name.lexeme.clone() });
                    }
                    return Ok(field.clone());
                }
                let class = inst.borrow().class.clone();
                if let Some(method) = class.find_method(&name.lexeme) {
                    if class.is_method_private(&name.lexeme) && !class.accessible_from(self.current_owner()) {
                        return Err(RuntimeError::PrivateMethodInaccessible { token: name.clone(), name: name.lexeme.clone() });
                    }
                    let bound = method.bind(inst.clone());
                    if bound.kind == FunctionKind::Getter {
                        return bound.call(self, name, Vec::new());
                    }
                    return Ok(Value::Callable(Rc::new(bound)));
                }
                Err(RuntimeError::UndefinedProperty { token: name.clone(), name: name.lexeme.clone() })
            }
            Value::Class(class) => {
                if let Some(method) = class.find_static(&name.lexeme) {
                    return Ok(Value::Callable(method));
                }
                Err(RuntimeError::UndefinedProperty { token: name.clone(), name: name.lexeme.clone() })
            }
            Value::Group(env) => {
                let dummy = Token::synthetic(TokenKind::Identifier, name.lexeme.clone());
                env.get_global(&dummy).map_err(|_| RuntimeError::UndefinedProperty { token: name.clone(), name: name.lexeme.clone() })
            }
            Value::List(items) => crate::builtins::list_methods::dispatch_property(items, name),
            _ => Err(RuntimeError::UndefinedProperty { token: name.clone(), name: name.lexeme.clone() }),
        }
    }

    fn eval_set(&mut self, obj: &Expr, name: &Token, value: &Expr, visibility: Visibility) -> Result<Value, RuntimeError> {
        let receiver = self.evaluate(obj)?;
        let v = self.evaluate(value)?.unwrap_reference().deep_copy();
        match &receiver {
            Value::Instance(inst) => {
                {
                    let borrowed = inst.borrow();
                    if borrowed.class.find_method(&name.lexeme).is_some() {
                        return Err(RuntimeError::MethodNotReassignable { token: name.clone() });
                    }
                }
                let currently_private = inst.borrow().is_field_private(&name.lexeme);
                if currently_private && !inst.borrow().class.accessible_from(self.current_owner()) {
                    return Err(RuntimeError::PrivateFieldInaccessible { token: name.clone(), name: name.lexeme.clone() });
                }
                let mut borrowed = inst.borrow_mut();
                if visibility == Visibility::Private || currently_private {
                    borrowed.public_fields.remove(&name.lexeme);
                    borrowed.private_fields.insert(name.lexeme.clone(), v.clone());
                } else {
                    borrowed.public_fields.insert(name.lexeme.clone(), v.clone());
                }
                Ok(v)
            }
            Value::Group(_) => Err(RuntimeError::Custom { token: name.clone(), message: "Cannot assign into a group from outside it.".into() }),
            _ => Err(RuntimeError::UndefinedProperty { token: name.clone(), name: name.lexeme.clone() }),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr], token: &Token) -> Result<Value, RuntimeError> {
        let callee_value = self.evaluate(callee)?;
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(self.evaluate(a)?);
        }

        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION {
            self.recursion_depth -= 1;
            return Err(RuntimeError::RecursionLimit { token: token.clone() });
        }

        let result = match &callee_value {
            Value::Callable(c) => {
                self.call_stack.push(CallFrame { callee_name: c.name().to_string(), call_site_line: token.loc.line });
                self.owner_stack.push(c.owner());
                let result = c.call(self, token, values);
                self.owner_stack.pop();
                self.call_stack.pop();
                result
            }
            Value::Class(class) => {
                let ctor = ClassConstructor(class.clone());
                ctor.call(self, token, values)
            }
            _ => Err(RuntimeError::NotCallable { token: token.clone() }),
        };

        self.recursion_depth -= 1;
        let _ = &mut values;
        result
    }

    fn eval_super(&mut self, expr_id: u32, token: &Token, method: &Token) -> Result<Value, RuntimeError> {
        let distance = self.distances.get(&expr_id).copied().expect("resolver always resolves 'super'");
        let superclass = match self.environment.get_at(distance, &Token::synthetic(TokenKind::Super, "super")) {
            Ok(Value::Class(c)) => c,
            _ => return Err(RuntimeError::UndefinedName { token: token.clone(), name: "super".into() }),
        };
        let this_token = Token::synthetic(TokenKind::This, "this");
        let this_value = self.environment.get_at(distance - 1, &this_token)?;
        let instance = match this_value {
            Value::Instance(i) => i,
            _ => return Err(RuntimeError::UndefinedName { token: token.clone(), name: "this".into() }),
        };
        match superclass.find_method(&method.lexeme) {
            Some(m) => Ok(Value::Callable(Rc::new(m.bind(instance)))),
            None => Err(RuntimeError::UndefinedProperty { token: method.clone(), name: method.lexeme.clone() }),
        }
    }

    fn eval_access(&mut self, obj: &Expr, start: &Expr, end: Option<&Expr>, token: &Token) -> Result<Value, RuntimeError> {
        let receiver = self.evaluate(obj)?;
        let start_v = self.evaluate(start)?;
        let end_v = match end {
            Some(e) => Some(self.evaluate(e)?),
            None => None,
        };
        crate::builtins::list_methods::access(&receiver, &start_v, end_v.as_ref(), token)
    }

    fn eval_modify(&mut self, obj: &Expr, start: &Expr, end: Option<&Expr>, value: &Expr, token: &Token) -> Result<Value, RuntimeError> {
        let receiver = self.evaluate(obj)?;
        let start_v = self.evaluate(start)?;
        let end_v = match end {
            Some(e) => Some(self.evaluate(e)?),
            None => None,
        };
        let v = self.evaluate(value)?.unwrap_reference().deep_copy();
        crate::builtins::list_methods::modify(&receiver, &start_v, end_v.as_ref(), v, token)
    }

    // -- stringification ------------------------------------------------------

    /// Basic `Debug`-style rendering with no user `_str` dispatch, used
    /// internally (e.g. string concatenation) where re-entering the
    /// evaluator would be wasteful or wrong.
    fn display_basic(&self, value: &Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.borrow().clone(),
            Value::List(items) => {
                let parts: Vec<String> = items.borrow().iter().map(|v| self.display_basic(v)).collect();
                format!("[{}]", parts.join(", "))
            }
            other => format!("{other:?}"),
        }
    }

    /// Full user-facing stringification: dispatches to a class's `_str`
    /// method when present, otherwise falls back to `display_basic`.
    pub fn stringify(&mut self, value: &Value) -> String {
        if let Value::Instance(inst) = value {
            let class = inst.borrow().class.clone();
            if let Some(m) = class.find_method("_str") {
                let bound = m.bind(inst.clone());
                let token = Token::synthetic(TokenKind::Identifier, "_str");
                if let Ok(result) = bound.call(self, &token, Vec::new()) {
                    return self.display_basic(&result);
                }
            }
            return format!("<instance of {}>", class.name);
        }
        self.display_basic(value)
    }

    pub fn stringify_quick(&self, value: &Value) -> String {
        self.display_basic(value)
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Bool(b) => Value::Boolean(*b),
        Literal::Nil => Value::Nil,
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    a.loosely_equals(b)
}

pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Best-effort source line for a statement, used to fire deferred
/// breakpoints. Not every statement kind carries a token (e.g. a bare
/// expression statement), so breakpoints land reliably on `print`,
/// `report`, `return`, `break`, and `continue` and approximately elsewhere.
fn stmt_line(stmt: &Stmt) -> Option<usize> {
    match stmt {
        Stmt::Print(_, t) | Stmt::Report(_, t) => Some(t.loc.line),
        Stmt::Return(t, _) => Some(t.loc.line),
        Stmt::Break(t, _) | Stmt::Continue(t, _) => Some(t.loc.line),
        Stmt::Var { name, .. } | Stmt::ListDecl { name, .. } => Some(name.loc.line),
        _ => None,
    }
}

fn stmt_summary(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::Expression(_) => "expression",
        Stmt::Print(..) => "print",
        Stmt::Report(..) => "report",
        Stmt::Var { .. } => "var",
        Stmt::ListDecl { .. } => "list",
        Stmt::Block(_) => "block",
        Stmt::If { .. } => "if",
        Stmt::While { .. } => "while",
        Stmt::Break(..) => "break",
        Stmt::Continue(..) => "continue",
        Stmt::Return(..) => "return",
        Stmt::Function(_) => "fun",
        Stmt::Class(_) => "class",
        Stmt::Match { .. } => "match",
        Stmt::Group { .. } => "group",
        Stmt::Fetch { .. } => "GetMod",
        Stmt::Error { .. } => "attempt",
    }
}
