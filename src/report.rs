// ABOUTME: Diagnostic formatting for scan/parse/static/runtime errors and warnings

use crate::errors::DiagnosticKind;
use crate::token::{SourceLoc, Token};

/// How much position detail the driver is configured to print, controlled by
/// the `-linepos`/`-error` CLI flags and by debug-mode (which always elides
/// source positions regardless of the flags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Bare `<Kind> error: <message>`, no locus at all.
    Bare,
    /// `-linepos`: locus (file/line/column) but no source line.
    WithLocus,
    /// `-error`: locus plus the offending source line and a caret.
    WithSource,
}

/// Formats one diagnostic line (plus an optional source-line-and-caret block)
/// for errors carrying a bare `SourceLoc` rather than a
/// `Token` (scan errors have no associated lexeme). `source` is the full
/// text of the unit being diagnosed, needed only at `Verbosity::WithSource`
/// to print the offending line.
pub fn format(kind: DiagnosticKind, loc: &SourceLoc, message: &str, verbosity: Verbosity, source: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(kind.label());
    out.push_str(" error");

    if verbosity != Verbosity::Bare {
        let file = loc.file.as_deref().unwrap_or("repl");
        out.push_str(&format!(" [\"{file}\", line {}, {}]", loc.line, loc.column));
    }

    out.push_str(": ");
    out.push_str(message);

    if verbosity == Verbosity::WithSource {
        if let Some(source) = source {
            if let Some(line_text) = source.lines().nth(loc.line.saturating_sub(1)) {
                out.push('\n');
                out.push_str(&format!("{} |\t{line_text}\n", loc.line));
                let pad = " ".repeat(loc.line.to_string().len());
                let caret_pad = " ".repeat(loc.column.saturating_sub(1));
                out.push_str(&format!("{pad} |\t{caret_pad}^"));
            }
        }
    }

    out
}

/// Convenience wrapper for diagnostics carrying a `Token` (the common case):
/// renders ` at '<lexeme>'` for a real token or ` at end` for an EOF token.
pub fn format_token(kind: DiagnosticKind, token: Option<&Token>, message: &str, verbosity: Verbosity, source: Option<&str>) -> String {
    match token {
        Some(t) if t.kind != crate::token::TokenKind::Eof => {
            let mut out = String::new();
            out.push_str(kind.label());
            out.push_str(&format!(" error at '{}'", t.lexeme));
            if verbosity != Verbosity::Bare {
                let file = t.loc.file.as_deref().unwrap_or("repl");
                out.push_str(&format!(" [\"{file}\", line {}, {}]", t.loc.line, t.loc.column));
            }
            out.push_str(": ");
            out.push_str(message);
            if verbosity == Verbosity::WithSource {
                if let Some(source) = source {
                    if let Some(line_text) = source.lines().nth(t.loc.line.saturating_sub(1)) {
                        out.push('\n');
                        out.push_str(&format!("{} |\t{line_text}\n", t.loc.line));
                        let pad = " ".repeat(t.loc.line.to_string().len());
                        let caret_pad = " ".repeat(t.loc.column.saturating_sub(1));
                        out.push_str(&format!("{pad} |\t{caret_pad}^"));
                    }
                }
            }
            out
        }
        Some(t) => {
            let mut out = format!("{} error at end", kind.label());
            if verbosity != Verbosity::Bare {
                let file = t.loc.file.as_deref().unwrap_or("repl");
                out.push_str(&format!(" [\"{file}\", line {}, {}]", t.loc.line, t.loc.column));
            }
            out.push_str(": ");
            out.push_str(message);
            out
        }
        None => format!("{} error: {message}", kind.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Literal, TokenKind};

    #[test]
    fn bare_verbosity_has_no_locus() {
        let t = Token::new(TokenKind::Identifier, "x", Literal::None, SourceLoc::new(Some("a.lox".into()), 3, 5));
        let s = format_token(DiagnosticKind::Runtime, Some(&t), "boom", Verbosity::Bare, None);
        assert_eq!(s, "Runtime error at 'x': boom");
    }

    #[test]
    fn with_locus_includes_file_and_line() {
        let t = Token::new(TokenKind::Identifier, "x", Literal::None, SourceLoc::new(Some("a.lox".into()), 3, 5));
        let s = format_token(DiagnosticKind::Runtime, Some(&t), "boom", Verbosity::WithLocus, None);
        assert_eq!(s, "Runtime error at 'x' [\"a.lox\", line 3, 5]: boom");
    }

    #[test]
    fn eof_token_formats_at_end() {
        let t = Token::new(TokenKind::Eof, "", Literal::None, SourceLoc::new(None, 9, 1));
        let s = format_token(DiagnosticKind::Parse, Some(&t), "expected ';'", Verbosity::Bare, None);
        assert_eq!(s, "Parse error at end: expected ';'");
    }

    #[test]
    fn with_source_appends_caret_line() {
        let t = Token::new(TokenKind::Identifier, "y", Literal::None, SourceLoc::new(Some("a.lox".into()), 1, 5));
        let source = "var y = ;";
        let s = format_token(DiagnosticKind::Runtime, Some(&t), "boom", Verbosity::WithSource, Some(source));
        assert!(s.contains("var y = ;"));
        assert!(s.contains('^'));
    }
}
