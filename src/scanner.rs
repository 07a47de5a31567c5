// ABOUTME: Lexer: turns raw source text into a token stream

use std::rc::Rc;

use crate::errors::ScanError;
use crate::token::{keyword_kind, Literal, SourceLoc, Token, TokenKind};

pub struct Scanner<'a> {
    source: &'a [u8],
    chars: Vec<char>,
    file: Option<Rc<str>>,
    start: usize,
    current: usize,
    line: usize,
    column: usize,
    line_start_column: usize,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
}

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str, file: Option<Rc<str>>) -> Self {
        Scanner {
            source: source.as_bytes(),
            chars: source.chars().collect(),
            file,
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            line_start_column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn scan(mut self) -> (Vec<Token>, Vec<ScanError>) {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }
        let loc = self.loc_at(self.start_column_for_eof());
        self.tokens.push(Token::new(TokenKind::Eof, "", Literal::None, loc));
        (self.tokens, self.errors)
    }

    fn start_column_for_eof(&self) -> usize {
        self.column
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn advance(&mut self) -> char {
        let c = self.chars[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.line_start_column = self.column + 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> char {
        self.chars.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.chars.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn matches(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.chars[self.current] != expected {
            return false;
        }
        self.advance();
        true
    }

    fn lexeme(&self) -> String {
        self.chars[self.start..self.current].iter().collect()
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc::new(self.file.clone(), self.line, self.token_start_column())
    }

    fn loc_at(&self, column: usize) -> SourceLoc {
        SourceLoc::new(self.file.clone(), self.line, column)
    }

    /// The column where the token currently under construction (`self.start`)
    /// began, accounting for newlines crossed while scanning it.
    fn token_start_column(&self) -> usize {
        self.column.saturating_sub(self.current - self.start)
    }

    fn add(&mut self, kind: TokenKind) {
        let lexeme = self.lexeme();
        let loc = self.loc();
        self.tokens.push(Token::new(kind, lexeme, Literal::None, loc));
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ScanError { loc: self.loc(), message: message.into() });
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        use TokenKind::*;
        match c {
            '(' => self.add(LeftParen),
            ')' => self.add(RightParen),
            '{' => self.add(LeftBrace),
            '}' => self.add(RightBrace),
            '[' => self.add(LeftBracket),
            ']' => self.add(RightBracket),
            ',' => self.add(Comma),
            '.' => {
                if self.matches('.') {
                    if self.matches('.') {
                        self.add(Ellipsis);
                    } else {
                        self.add(DotDot);
                    }
                } else {
                    self.add(Dot);
                }
            }
            '-' => {
                if self.matches('=') {
                    self.add(MinusEqual)
                } else if self.matches('-') {
                    self.add(MinusMinus)
                } else {
                    self.add(Minus)
                }
            }
            '+' => {
                if self.matches('=') {
                    self.add(PlusEqual)
                } else if self.matches('+') {
                    self.add(PlusPlus)
                } else {
                    self.add(Plus)
                }
            }
            ';' => self.add(Semicolon),
            '*' => {
                if self.matches('=') {
                    self.add(StarEqual)
                } else if self.matches('*') {
                    self.add(StarStar)
                } else {
                    self.add(Star)
                }
            }
            '%' => self.add(Percent),
            '?' => self.add(Question),
            ':' => self.add(Colon),
            '!' => {
                let k = if self.matches('=') { BangEqual } else { Bang };
                self.add(k)
            }
            '=' => {
                let k = if self.matches('=') { EqualEqual } else { Equal };
                self.add(k)
            }
            '<' => {
                let k = if self.matches('=') { LessEqual } else { Less };
                self.add(k)
            }
            '>' => {
                let k = if self.matches('=') { GreaterEqual } else { Greater };
                self.add(k)
            }
            '/' => {
                if self.matches('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.matches('*') {
                    self.block_comment();
                } else if self.matches('=') {
                    self.add(SlashEqual)
                } else {
                    self.add(Slash)
                }
            }
            ' ' | '\r' | '\t' | '\n' => {}
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            other => self.error(format!("Unexpected character '{other}'.")),
        }
    }

    fn block_comment(&mut self) {
        let mut depth = 1;
        while depth > 0 {
            if self.is_at_end() {
                self.error("Unterminated block comment.");
                return;
            }
            if self.peek() == '/' && self.peek_next() == '*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }
    }

    fn string(&mut self) {
        let mut value = String::new();
        while self.peek() != '"' && !self.is_at_end() {
            let c = self.advance();
            if c == '\\' && !self.is_at_end() {
                let escaped = self.advance();
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '\\' => '\\',
                    '"' => '"',
                    other => other,
                });
            } else {
                value.push(c);
            }
        }
        if self.is_at_end() {
            self.error("Unterminated string.");
            return;
        }
        self.advance(); // closing quote
        let lexeme = self.lexeme();
        let loc = self.loc();
        self.tokens.push(Token::new(TokenKind::String, lexeme, Literal::String(value), loc));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let lexeme = self.lexeme();
        let value: f64 = lexeme.parse().unwrap_or(f64::NAN);
        let loc = self.loc();
        self.tokens.push(Token::new(TokenKind::Number, lexeme, Literal::Number(value), loc));
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }
        let text = self.lexeme();
        let kind = keyword_kind(&text).unwrap_or(TokenKind::Identifier);
        self.add(kind);
    }
}

pub fn scan(source: &str, file: Option<Rc<str>>) -> (Vec<Token>, Vec<ScanError>) {
    Scanner::new(source, file).scan()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = scan(src, None);
        assert!(errors.is_empty(), "unexpected scan errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_basic_arithmetic() {
        use TokenKind::*;
        assert_eq!(kinds("1 + 2 * 3"), vec![Number, Plus, Number, Star, Number, Eof]);
    }

    #[test]
    fn scans_string_with_escape() {
        let (tokens, errors) = scan(r#""a\nb""#, None);
        assert!(errors.is_empty());
        assert!(matches!(&tokens[0].literal, Literal::String(s) if s == "a\nb"));
    }

    #[test]
    fn distinguishes_dot_dotdot_and_ellipsis() {
        use TokenKind::*;
        assert_eq!(kinds(". .. ..."), vec![Dot, DotDot, Ellipsis, Eof]);
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, errors) = scan("\"abc", None);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn keywords_resolve_to_their_kind() {
        use TokenKind::*;
        assert_eq!(kinds("var fix class attempt handle report"), vec![Var, Fix, Class, Attempt, Handle, Report, Eof]);
    }

    #[test]
    fn nested_block_comments_balance() {
        use TokenKind::*;
        assert_eq!(kinds("1 /* a /* b */ c */ 2"), vec![Number, Number, Eof]);
    }
}
