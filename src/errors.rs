// ABOUTME: Error types for every stage of the pipeline (scan/parse/resolve/run)

use crate::token::{SourceLoc, Token};
use crate::value::Value;
use thiserror::Error;

/// Lexical error: bad character, unterminated string, unterminated comment.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ScanError {
    pub loc: SourceLoc,
    pub message: String,
}

/// Syntax error raised during parsing. Carries the offending token (or `None`
/// when the error is "at end of input") so the driver can render the
/// `at '<lexeme>' | at end` clause.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ParseError {
    pub token: Option<Token>,
    pub message: String,
}

impl ParseError {
    pub fn new(token: Token, message: impl Into<String>) -> Self {
        ParseError { token: Some(token), message: message.into() }
    }

    pub fn at_end(loc: SourceLoc, message: impl Into<String>) -> Self {
        ParseError { token: None, message: message.into() }
            .with_loc_hint(loc)
    }

    fn with_loc_hint(self, _loc: SourceLoc) -> Self {
        self
    }
}

/// Errors (and warnings, carried separately) raised by the static resolver pass.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct StaticError {
    pub token: Token,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct StaticWarning {
    pub token: Token,
    pub message: String,
}

/// Runtime (evaluator) errors. One contextual variant per failure kind so
/// the driver can format a precise, testable message.
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Operand{} must be {expected}.", if *.binary { "s" } else { "" })]
    TypeError { token: Token, expected: String, binary: bool },

    #[error("Undefined variable or function '{name}'.")]
    UndefinedName { token: Token, name: String },

    #[error("Uninitialized variable or function '{name}'.")]
    Uninitialized { token: Token, name: String },

    #[error("Fixed variable '{name}' cannot be re-assigned.")]
    FixReassign { token: Token, name: String },

    #[error("Private field '{name}' is inaccessible.")]
    PrivateFieldInaccessible { token: Token, name: String },

    #[error("Private method '{name}' is inaccessible.")]
    PrivateMethodInaccessible { token: Token, name: String },

    #[error("Undefined property or method '{name}'.")]
    UndefinedProperty { token: Token, name: String },

    #[error("Method in class definition cannot be re-assigned.")]
    MethodNotReassignable { token: Token },

    #[error("Can only call functions, methods, and classes.")]
    NotCallable { token: Token },

    #[error("Expected minimum {min} arguments but got {got}.")]
    TooFewArguments { token: Token, min: usize, got: usize },

    #[error("Expected maximum {max} arguments but got {got}.")]
    TooManyArguments { token: Token, max: usize, got: usize },

    #[error("Division by zero.")]
    DivisionByZero { token: Token },

    #[error("Index out of range.")]
    IndexOutOfRange { token: Token },

    #[error("Index must be an integer.")]
    IndexNotInteger { token: Token },

    #[error("Slice start must not exceed end.")]
    InvalidSlice { token: Token },

    #[error("{message}")]
    Custom { token: Token, message: String },

    /// A `report`ed instance that is not an `Error`/`Warning` descendant.
    #[error("Only Error- or Warning-derived instances may be reported.")]
    InvalidReport { token: Token },

    /// Host recursion depth exceeded; reported as a non-fatal runtime error at top level.
    #[error("Recursion depth exceeded.")]
    RecursionLimit { token: Token },

    /// An explicit `report <expr>;` in flight, looking for an enclosing
    /// `attempt`/`handle` whose filter accepts `instance`'s class. Rides the
    /// same `Result::Err`/`?` channel as every other runtime error so it
    /// unwinds through nested calls and blocks the same way; `attempt`
    /// catches it explicitly and everything else just propagates it.
    #[error("unhandled report")]
    Reported { token: Token, instance: Value },

    /// Raised by the `stop()` builtin. Unwinds everything, including
    /// `attempt`/`handle`, until the top-level driver catches it and exits
    /// cleanly rather than printing a diagnostic.
    #[error("stop")]
    Halted { token: Token },
}

impl RuntimeError {
    pub fn token(&self) -> &Token {
        match self {
            RuntimeError::TypeError { token, .. }
            | RuntimeError::UndefinedName { token, .. }
            | RuntimeError::Uninitialized { token, .. }
            | RuntimeError::FixReassign { token, .. }
            | RuntimeError::PrivateFieldInaccessible { token, .. }
            | RuntimeError::PrivateMethodInaccessible { token, .. }
            | RuntimeError::UndefinedProperty { token, .. }
            | RuntimeError::MethodNotReassignable { token }
            | RuntimeError::NotCallable { token }
            | RuntimeError::TooFewArguments { token, .. }
            | RuntimeError::TooManyArguments { token, .. }
            | RuntimeError::DivisionByZero { token }
            | RuntimeError::IndexOutOfRange { token }
            | RuntimeError::IndexNotInteger { token }
            | RuntimeError::InvalidSlice { token }
            | RuntimeError::Custom { token, .. }
            | RuntimeError::InvalidReport { token }
            | RuntimeError::RecursionLimit { token }
            | RuntimeError::Reported { token, .. }
            | RuntimeError::Halted { token } => token,
        }
    }
}

/// A diagnostic kind tag, used purely for the `<Kind> error: ...` prefix in
/// the driver's formatted output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    Scan,
    Parse,
    Static,
    Warning,
    Runtime,
    User,
    Recursion,
}

impl DiagnosticKind {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticKind::Scan => "Scan",
            DiagnosticKind::Parse => "Parse",
            DiagnosticKind::Static => "Static",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Runtime => "Runtime",
            DiagnosticKind::User => "User",
            DiagnosticKind::Recursion => "Recursion",
        }
    }
}
