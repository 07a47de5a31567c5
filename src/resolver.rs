// ABOUTME: Static resolver: computes variable binding distances, checks control flow placement

use std::collections::HashMap;

use crate::ast::*;
use crate::errors::{StaticError, StaticWarning};

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Lambda,
    Initializer,
    Method,
    Getter,
    StaticMethod,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LoopCtx {
    None,
    Loop,
}

struct Scope {
    declared: HashMap<String, bool>,
    used: HashMap<String, bool>,
}

impl Scope {
    fn new() -> Self {
        Scope { declared: HashMap::new(), used: HashMap::new() }
    }
}

pub struct Resolution {
    pub distances: HashMap<u32, usize>,
}

pub struct Resolver {
    scopes: Vec<Scope>,
    distances: HashMap<u32, usize>,
    errors: Vec<StaticError>,
    warnings: Vec<StaticWarning>,
    current_function: FunctionType,
    current_class: ClassType,
    current_loop: LoopCtx,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            distances: HashMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            current_loop: LoopCtx::None,
        }
    }

    pub fn resolve_program(mut self, stmts: &[Stmt]) -> (Resolution, Vec<StaticError>, Vec<StaticWarning>) {
        self.resolve_stmts(stmts);
        (Resolution { distances: self.distances }, self.errors, self.warnings)
    }

    fn begin_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    fn end_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (name, declared) in scope.declared.iter() {
                if *declared && !scope.used.get(name).copied().unwrap_or(false) && !name.starts_with('_') {
                    self.warnings.push(StaticWarning {
                        token: crate::token::Token::synthetic(crate::token::TokenKind::Identifier, name.clone()),
                        message: format!("Local variable '{name}' is never used."),
                    });
                }
            }
        }
    }

    fn declare(&mut self, name: &crate::token::Token) {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.declared.contains_key(&name.lexeme) {
                self.errors.push(StaticError {
                    token: name.clone(),
                    message: format!("Variable '{}' is already declared in this scope.", name.lexeme),
                });
            }
            scope.declared.insert(name.lexeme.clone(), false);
        }
    }

    fn define(&mut self, name: &crate::token::Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.declared.insert(name.lexeme.clone(), true);
        }
    }

    fn resolve_local(&mut self, expr_id: u32, token: &crate::token::Token) {
        let name = &token.lexeme;
        let mut found = None;
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if let Some(&defined) = scope.declared.get(name) {
                found = Some((i, defined));
                break;
            }
        }
        let Some((i, defined)) = found else {
            // Not found in any local scope: treated as global, resolved dynamically at runtime.
            return;
        };
        if !defined {
            self.errors.push(StaticError {
                token: token.clone(),
                message: format!("Cannot read local variable '{name}' in its own initializer."),
            });
            return;
        }
        self.scopes[i].used.insert(name.clone(), true);
        self.distances.insert(expr_id, self.scopes.len() - 1 - i);
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt]) {
        for s in stmts {
            self.resolve_stmt(s);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(e) => self.resolve_expr(e),
            Stmt::Print(e, _) => self.resolve_expr(e),
            Stmt::Report(e, _) => self.resolve_expr(e),
            Stmt::Var { name, initializer, .. } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::ListDecl { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_scope();
            }
            Stmt::If { condition, then_branch, else_branch } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(e) = else_branch {
                    self.resolve_stmt(e);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                let enclosing = self.current_loop;
                self.current_loop = LoopCtx::Loop;
                self.resolve_stmt(body);
                self.current_loop = enclosing;
            }
            Stmt::Break(token, _) => {
                if self.current_loop == LoopCtx::None {
                    self.errors.push(StaticError { token: token.clone(), message: "'break' outside a loop.".into() });
                }
            }
            Stmt::Continue(token, _) => {
                if self.current_loop == LoopCtx::None {
                    self.errors.push(StaticError { token: token.clone(), message: "'continue' outside a loop.".into() });
                }
            }
            Stmt::Return(token, value) => {
                if self.current_function == FunctionType::None {
                    self.errors.push(StaticError { token: token.clone(), message: "'return' outside a function.".into() });
                }
                if let Some(v) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(StaticError {
                            token: token.clone(),
                            message: "Cannot return a value from an initializer.".into(),
                        });
                    }
                    self.resolve_expr(v);
                }
            }
            Stmt::Function(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Class(decl) => self.resolve_class(decl),
            Stmt::Match { value, cases, default, .. } => {
                self.resolve_expr(value);
                for case in cases {
                    self.resolve_expr(&case.value);
                    self.begin_scope();
                    self.resolve_stmts(&case.body);
                    self.end_scope();
                }
                if let Some(body) = default {
                    self.begin_scope();
                    self.resolve_stmts(body);
                    self.end_scope();
                }
            }
            Stmt::Group { name, body } => {
                self.declare(name);
                self.define(name);
                self.begin_scope();
                self.resolve_stmts(body);
                self.end_scope();
            }
            Stmt::Fetch { name, .. } => {
                self.declare(name);
                self.define(name);
            }
            Stmt::Error { body, handler, .. } => {
                self.resolve_stmt(body);
                self.resolve_stmt(handler);
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) {
        let enclosing = self.current_function;
        self.current_function = kind;
        self.begin_scope();
        for param in &decl.params.params {
            let name = match param {
                Param::Plain(t) | Param::Default(t, _) | Param::Variadic(t) => t,
            };
            self.declare(name);
            self.define(name);
            if let Param::Default(_, expr) = param {
                self.resolve_expr(expr);
            }
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();
        self.current_function = enclosing;
    }

    fn resolve_class(&mut self, decl: &ClassDecl) {
        self.declare(&decl.name);
        self.define(&decl.name);

        let enclosing_class = self.current_class;
        self.current_class = ClassType::Class;

        if let Some(super_name) = &decl.superclass {
            if super_name.lexeme == decl.name.lexeme {
                self.errors.push(StaticError {
                    token: super_name.clone(),
                    message: "A class cannot inherit from itself.".into(),
                });
            }
            self.current_class = ClassType::Subclass;
            self.begin_scope();
            self.scopes.last_mut().unwrap().declared.insert("super".to_string(), true);
            self.scopes.last_mut().unwrap().used.insert("super".to_string(), true);
        }

        self.begin_scope();
        self.scopes.last_mut().unwrap().declared.insert("this".to_string(), true);
        self.scopes.last_mut().unwrap().used.insert("this".to_string(), true);

        for method in decl.public_methods.iter().chain(decl.private_methods.iter()) {
            let kind = if method.name.lexeme == "init" {
                FunctionType::Initializer
            } else if method.is_getter {
                FunctionType::Getter
            } else {
                FunctionType::Method
            };
            self.resolve_function(method, kind);
        }
        for method in &decl.static_methods {
            self.resolve_function(method, FunctionType::StaticMethod);
        }

        self.end_scope();
        if decl.superclass.is_some() {
            self.end_scope();
        }
        self.current_class = enclosing_class;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Variable(name) => self.resolve_local(expr.id, name),
            ExprKind::Grouping(e) => self.resolve_expr(e),
            ExprKind::Unary(_, e) => self.resolve_expr(e),
            ExprKind::Binary(l, _, r) | ExprKind::Logical(l, _, r) => {
                self.resolve_expr(l);
                self.resolve_expr(r);
            }
            ExprKind::Ternary(c, t, e) => {
                self.resolve_expr(c);
                self.resolve_expr(t);
                self.resolve_expr(e);
            }
            ExprKind::Comma(items) | ExprKind::List(items) => {
                for i in items {
                    self.resolve_expr(i);
                }
            }
            ExprKind::Assign(name, value) => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::Get(obj, _) => self.resolve_expr(obj),
            ExprKind::Set(obj, _, value, _) => {
                self.resolve_expr(value);
                self.resolve_expr(obj);
            }
            ExprKind::Call(callee, args, _) => {
                self.resolve_expr(callee);
                for a in args {
                    self.resolve_expr(a);
                }
            }
            ExprKind::Lambda(params, body) => {
                let decl = FunctionDecl {
                    name: crate::token::Token::synthetic(crate::token::TokenKind::Identifier, "<lambda>"),
                    params: params.clone(),
                    body: body.clone(),
                    is_getter: false,
                };
                self.resolve_function(&decl, FunctionType::Lambda);
            }
            ExprKind::Access(obj, start, end, _) => {
                self.resolve_expr(obj);
                self.resolve_expr(start);
                if let Some(e) = end {
                    self.resolve_expr(e);
                }
            }
            ExprKind::Modify(obj, start, end, value, _) => {
                self.resolve_expr(obj);
                self.resolve_expr(start);
                if let Some(e) = end {
                    self.resolve_expr(e);
                }
                self.resolve_expr(value);
            }
            ExprKind::This(token) => {
                if self.current_class == ClassType::None {
                    self.errors.push(StaticError {
                        token: token.clone(),
                        message: "Cannot use 'this' outside a class method.".into(),
                    });
                }
                self.resolve_local(expr.id, token);
            }
            ExprKind::Super(token, _) => {
                if self.current_class != ClassType::Subclass {
                    self.errors.push(StaticError {
                        token: token.clone(),
                        message: "Cannot use 'super' outside a subclass method.".into(),
                    });
                }
                self.resolve_local(expr.id, token);
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

pub fn resolve(stmts: &[Stmt]) -> (Resolution, Vec<StaticError>, Vec<StaticWarning>) {
    Resolver::new().resolve_program(stmts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::scanner::scan;

    fn resolve_src(src: &str) -> Vec<StaticError> {
        let (tokens, scan_errs) = scan(src, None);
        assert!(scan_errs.is_empty());
        let (stmts, parse_errs) = parse(tokens);
        assert!(parse_errs.is_empty(), "{parse_errs:?}");
        let (_, errs, _) = resolve(&stmts);
        errs
    }

    #[test]
    fn redeclaration_in_same_scope_is_a_static_error() {
        let errs = resolve_src("{ var x = 1; var x = 2; }");
        assert!(!errs.is_empty());
    }

    #[test]
    fn shadowing_in_nested_scope_is_fine() {
        let errs = resolve_src("{ var x = 1; { var x = 2; } }");
        assert!(errs.is_empty(), "{errs:?}");
    }

    #[test]
    fn self_reference_in_initializer_is_a_static_error() {
        let errs = resolve_src("{ var x = x; }");
        assert!(!errs.is_empty());
    }

    #[test]
    fn referencing_enclosing_variable_by_same_name_is_fine() {
        let errs = resolve_src("{ var x = 1; { var y = x; } }");
        assert!(errs.is_empty(), "{errs:?}");
    }
}
