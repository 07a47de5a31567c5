// ABOUTME: Abstract syntax tree: expression and statement node definitions

use crate::token::Token;
use std::cell::Cell;

thread_local! {
    static NEXT_EXPR_ID: Cell<u32> = const { Cell::new(0) };
}

/// Every expression node gets a unique id at construction time. The resolver
/// uses this id as the key into its expression -> binding-distance side
/// table (see `crate::resolver`), which keeps semantic analysis completely
/// decoupled from the tree shape itself.
pub fn next_expr_id() -> u32 {
    NEXT_EXPR_ID.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    })
}

/// Field/member visibility, attached to `Set` expressions and to class
/// member declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarAccess {
    Var,
    Fix,
}

/// A function/lambda/method parameter.
#[derive(Debug, Clone)]
pub enum Param {
    Plain(Token),
    Default(Token, Expr),
    Variadic(Token),
}

#[derive(Debug, Clone)]
pub struct Params {
    pub params: Vec<Param>,
}

impl Params {
    /// Number of parameters that carry a default value.
    pub fn default_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| matches!(p, Param::Default(..)))
            .count()
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.params.last(), Some(Param::Variadic(_)))
    }

    /// [min, max] arity contributed by this parameter list, not counting
    /// any implicit `this`.
    pub fn arity(&self) -> (usize, usize) {
        if self.is_variadic() {
            let required = self.params.len() - 1 - self.default_count();
            (required, 256)
        } else {
            let required = self.params.len() - self.default_count();
            (required, self.params.len())
        }
    }
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: u32,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr { id: next_expr_id(), kind }
    }
}

#[derive(Debug, Clone)]
pub enum Literal {
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Literal),
    Variable(Token),
    Grouping(Box<Expr>),
    Unary(Token, Box<Expr>),
    Binary(Box<Expr>, Token, Box<Expr>),
    Logical(Box<Expr>, Token, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    Comma(Vec<Expr>),
    Assign(Token, Box<Expr>),
    Get(Box<Expr>, Token),
    Set(Box<Expr>, Token, Box<Expr>, Visibility),
    /// Callee, arguments, and the closing `)` token (used to locate arity
    /// errors at the call site).
    Call(Box<Expr>, Vec<Expr>, Token),
    Lambda(Params, Vec<Stmt>),
    List(Vec<Expr>),
    /// `object[start]` (end = None) or `object[start..end]` (slice).
    Access(Box<Expr>, Box<Expr>, Option<Box<Expr>>, Token),
    /// An `Access` target paired with a value to store there.
    Modify(Box<Expr>, Box<Expr>, Option<Box<Expr>>, Box<Expr>, Token),
    This(Token),
    Super(Token, Token),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    While,
    For,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub value: Expr,
    pub body: Vec<Stmt>,
    /// `true` when tagged `fallthrough`; body execution continues into the
    /// next case (or default) rather than stopping after this one.
    pub fall_through: bool,
}

#[derive(Debug, Clone)]
pub struct ClassDecl {
    pub name: Token,
    pub superclass: Option<Token>,
    pub private_methods: Vec<FunctionDecl>,
    pub public_methods: Vec<FunctionDecl>,
    pub static_methods: Vec<FunctionDecl>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Token,
    pub params: Params,
    pub body: Vec<Stmt>,
    /// Getter methods are declared without a parameter list and are
    /// auto-invoked on `.name` access rather than requiring call syntax.
    pub is_getter: bool,
}

#[derive(Debug, Clone)]
pub enum FetchKind {
    Mod,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Expression(Expr),
    Print(Expr, Token),
    Var {
        name: Token,
        initializer: Option<Expr>,
        access: VarAccess,
    },
    ListDecl {
        name: Token,
        initializer: Option<Expr>,
    },
    Block(Vec<Stmt>),
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Break(Token, LoopKind),
    Continue(Token, LoopKind),
    Return(Token, Option<Expr>),
    Function(FunctionDecl),
    Class(ClassDecl),
    Match {
        value: Expr,
        cases: Vec<MatchCase>,
        default: Option<Vec<Stmt>>,
        token: Token,
    },
    Group {
        name: Token,
        body: Vec<Stmt>,
    },
    Fetch {
        kind: FetchKind,
        name: Token,
    },
    Error {
        body: Box<Stmt>,
        filter: Option<Vec<Token>>,
        handler: Box<Stmt>,
    },
    Report(Expr, Token),
}
