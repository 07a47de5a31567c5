// ABOUTME: Recursive-descent parser: token stream to AST

use crate::ast::*;
use crate::errors::ParseError;
use crate::source::SourceLoader;
use crate::token::{Literal as TokLiteral, Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
    loader: Option<Box<dyn SourceLoader>>,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, current: 0, errors: Vec::new(), loader: None }
    }

    /// Like `new`, but wires a `SourceLoader` so `GetLib`/`GetFile`
    /// declarations can actually resolve and splice their referenced source.
    pub fn with_loader(tokens: Vec<Token>, loader: Box<dyn SourceLoader>) -> Self {
        Parser { tokens, current: 0, errors: Vec::new(), loader: Some(loader) }
    }

    /// Parses a single standalone expression, used by the debugger's
    /// `value l|g <expr>` commands to re-feed ad hoc text through the same
    /// front end the rest of the program went through.
    pub fn parse_single_expression(mut self) -> PResult<Expr> {
        let expr = self.expression()?;
        Ok(expr)
    }

    pub fn parse_program(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(s) => stmts.push(s),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize();
                }
            }
        }
        (stmts, self.errors)
    }

    // -- token stream helpers -------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.peek().kind == kind
    }

    fn matches(&mut self, kinds: &[TokenKind]) -> bool {
        for &k in kinds {
            if self.check(k) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(message))
        }
    }

    fn error_here(&self, message: &str) -> ParseError {
        if self.is_at_end() {
            ParseError::at_end(self.peek().loc.clone(), message.to_string())
        } else {
            ParseError::new(self.peek().clone(), message.to_string())
        }
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            use TokenKind::*;
            if matches!(
                self.peek().kind,
                Class | Fun | Var | Fix | For | If | While | Print | Return | Group | Attempt | Report | Match
            ) {
                return;
            }
            self.advance();
        }
    }

    // -- declarations ----------------------------------------------------------

    fn declaration(&mut self) -> PResult<Stmt> {
        if self.matches(&[TokenKind::Class]) {
            return self.class_declaration();
        }
        if self.matches(&[TokenKind::Fun]) {
            return self.function_declaration("function");
        }
        if self.matches(&[TokenKind::Var]) {
            return self.var_declaration(VarAccess::Var);
        }
        if self.matches(&[TokenKind::Fix]) {
            return self.var_declaration(VarAccess::Fix);
        }
        if self.matches(&[TokenKind::List]) {
            return self.list_declaration();
        }
        if self.matches(&[TokenKind::Group]) {
            return self.group_declaration();
        }
        if self.matches(&[TokenKind::GetMod]) {
            return self.fetch_statement();
        }
        if self.matches(&[TokenKind::GetLib, TokenKind::GetFile]) {
            let keyword = self.previous().clone();
            return self.splice_source(keyword);
        }
        self.statement()
    }

    /// `GetLib "name";` / `GetFile "path";` are resolved at parse time: the
    /// named source is loaded through the configured `SourceLoader`,
    /// scanned, and its tokens (EOF stripped) are spliced into the current
    /// stream in place, then parsing continues as if that text had been
    /// written here directly.
    fn splice_source(&mut self, keyword: Token) -> PResult<Stmt> {
        let name_tok = self.consume(TokenKind::String, "Expected a string literal after 'GetLib'/'GetFile'.")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after source inclusion.")?;
        let name = match &name_tok.literal {
            TokLiteral::String(s) => s.clone(),
            _ => name_tok.lexeme.clone(),
        };

        let loader = self
            .loader
            .as_deref()
            .ok_or_else(|| ParseError::new(keyword.clone(), "GetLib/GetFile require a configured source loader.".to_string()))?;
        let text = loader.load(&name).map_err(|e| ParseError::new(keyword.clone(), e.to_string()))?;

        let (mut spliced, scan_errors) = crate::scanner::scan(&text, keyword.loc.file.clone());
        if let Some(e) = scan_errors.into_iter().next() {
            return Err(ParseError::new(keyword.clone(), e.message));
        }
        if matches!(spliced.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            spliced.pop();
        }

        let at = self.current;
        self.tokens.splice(at..at, spliced);
        self.declaration()
    }

    fn class_declaration(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected class name.")?;
        let superclass = if self.matches(&[TokenKind::Less]) {
            Some(self.consume(TokenKind::Identifier, "Expected superclass name.")?)
        } else {
            None
        };
        self.consume(TokenKind::LeftBrace, "Expected '{' before class body.")?;

        let mut public_methods = Vec::new();
        let mut private_methods = Vec::new();
        let mut static_methods = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            let is_static = self.matches(&[TokenKind::Class]);
            let is_private = self.matches(&[TokenKind::Minus]);
            let method = self.method_decl()?;
            if is_static {
                static_methods.push(method);
            } else if is_private {
                private_methods.push(method);
            } else {
                public_methods.push(method);
            }
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after class body.")?;
        Ok(Stmt::Class(ClassDecl { name, superclass, private_methods, public_methods, static_methods }))
    }

    fn method_decl(&mut self) -> PResult<FunctionDecl> {
        let name = self.consume(TokenKind::Identifier, "Expected method name.")?;
        if self.check(TokenKind::LeftBrace) {
            // getter: no parameter list
            let body = self.block()?;
            return Ok(FunctionDecl { name, params: Params { params: Vec::new() }, body, is_getter: true });
        }
        self.consume(TokenKind::LeftParen, "Expected '(' after method name.")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::LeftBrace, "Expected '{' before method body.")?;
        let body = self.block()?;
        Ok(FunctionDecl { name, params, body, is_getter: false })
    }

    fn function_declaration(&mut self, kind: &str) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, &format!("Expected {kind} name."))?;
        self.consume(TokenKind::LeftParen, &format!("Expected '(' after {kind} name."))?;
        let params = self.parse_params()?;
        self.consume(TokenKind::LeftBrace, &format!("Expected '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok(Stmt::Function(FunctionDecl { name, params, body, is_getter: false }))
    }

    fn parse_params(&mut self) -> PResult<Params> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= 256 {
                    return Err(self.error_here("Cannot have more than 256 parameters."));
                }
                if self.matches(&[TokenKind::Ellipsis]) {
                    let name = self.consume(TokenKind::Identifier, "Expected parameter name after '...'.")?;
                    params.push(Param::Variadic(name));
                    break;
                }
                let name = self.consume(TokenKind::Identifier, "Expected parameter name.")?;
                if self.matches(&[TokenKind::Equal]) {
                    let default = self.expression()?;
                    params.push(Param::Default(name, default));
                } else {
                    params.push(Param::Plain(name));
                }
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after parameters.")?;
        Ok(Params { params })
    }

    fn var_declaration(&mut self, access: VarAccess) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected variable name.")?;
        let initializer = if self.matches(&[TokenKind::Equal]) { Some(self.expression()?) } else { None };
        if access == VarAccess::Fix && initializer.is_none() {
            return Err(ParseError::new(name, "Must provide initializer to fixed variable.".to_string()));
        }
        self.consume(TokenKind::Semicolon, "Expected ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer, access })
    }

    fn list_declaration(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected list name.")?;
        let initializer = if self.matches(&[TokenKind::Equal]) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expected ';' after list declaration.")?;
        Ok(Stmt::ListDecl { name, initializer })
    }

    fn group_declaration(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected group name.")?;
        self.consume(TokenKind::LeftBrace, "Expected '{' before group body.")?;
        let body = self.block()?;
        Ok(Stmt::Group { name, body })
    }

    fn fetch_statement(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expected module name after GetMod.")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after module fetch.")?;
        Ok(Stmt::Fetch { kind: FetchKind::Mod, name })
    }

    // -- statements --------------------------------------------------------

    fn statement(&mut self) -> PResult<Stmt> {
        if self.matches(&[TokenKind::Print]) {
            return self.print_statement();
        }
        if self.matches(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.matches(&[TokenKind::If]) {
            return self.if_statement();
        }
        if self.matches(&[TokenKind::While]) {
            return self.while_statement();
        }
        if self.matches(&[TokenKind::For]) {
            return self.for_statement();
        }
        if self.matches(&[TokenKind::Break]) {
            let t = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expected ';' after 'break'.")?;
            return Ok(Stmt::Break(t, LoopKind::While));
        }
        if self.matches(&[TokenKind::Continue]) {
            let t = self.previous().clone();
            self.consume(TokenKind::Semicolon, "Expected ';' after 'continue'.")?;
            return Ok(Stmt::Continue(t, LoopKind::While));
        }
        if self.matches(&[TokenKind::Return]) {
            return self.return_statement();
        }
        if self.matches(&[TokenKind::Match]) {
            return self.match_statement();
        }
        if self.matches(&[TokenKind::Attempt]) {
            return self.attempt_statement();
        }
        if self.matches(&[TokenKind::Report]) {
            return self.report_statement();
        }
        self.expression_statement()
    }

    fn print_statement(&mut self) -> PResult<Stmt> {
        let t = self.previous().clone();
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after value.")?;
        Ok(Stmt::Print(value, t))
    }

    fn report_statement(&mut self) -> PResult<Stmt> {
        let t = self.previous().clone();
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after reported value.")?;
        Ok(Stmt::Report(value, t))
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            stmts.push(self.declaration()?);
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after block.")?;
        Ok(stmts)
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&[TokenKind::Else]) { Some(Box::new(self.statement()?)) } else { None };
        Ok(Stmt::If { condition, then_branch, else_branch })
    }

    fn while_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after while condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// Desugars C-style `for (init; cond; incr) body` into a `while` wrapped
    /// in a block, the way a recursive-descent Lox parser conventionally
    /// does (no dedicated `For` node in the evaluator).
    fn for_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'for'.")?;

        let initializer = if self.matches(&[TokenKind::Semicolon]) {
            None
        } else if self.matches(&[TokenKind::Var]) {
            Some(self.var_declaration(VarAccess::Var)?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            self.expression()?
        } else {
            Expr::new(ExprKind::Literal(Literal::Bool(true)))
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::RightParen, "Expected ')' after for clauses.")?;

        let mut body = self.statement()?;
        if let Some(incr) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(incr)]);
        }
        body = Stmt::While { condition, body: Box::new(body) };
        if let Some(init) = initializer {
            body = Stmt::Block(vec![init, body]);
        }
        Ok(body)
    }

    fn return_statement(&mut self) -> PResult<Stmt> {
        let t = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) { Some(self.expression()?) } else { None };
        self.consume(TokenKind::Semicolon, "Expected ';' after return value.")?;
        Ok(Stmt::Return(t, value))
    }

    fn match_statement(&mut self) -> PResult<Stmt> {
        let t = self.previous().clone();
        self.consume(TokenKind::LeftParen, "Expected '(' after 'match'.")?;
        let value = self.expression()?;
        self.consume(TokenKind::RightParen, "Expected ')' after match value.")?;
        self.consume(TokenKind::LeftBrace, "Expected '{' before match body.")?;

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            if self.matches(&[TokenKind::Else]) {
                self.consume(TokenKind::Colon, "Expected ':' after 'else'.")?;
                default = Some(self.case_body()?);
                continue;
            }
            self.consume(TokenKind::Is, "Expected 'is' to start a match case.")?;
            let case_value = self.expression()?;
            self.consume(TokenKind::Colon, "Expected ':' after match case value.")?;
            let body = self.case_body()?;
            let fall_through = self.matches(&[TokenKind::Fallthrough]);
            if fall_through {
                self.consume(TokenKind::Semicolon, "Expected ';' after 'fallthrough'.")?;
            }
            cases.push(MatchCase { value: case_value, body, fall_through });
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after match body.")?;
        Ok(Stmt::Match { value, cases, default, token: t })
    }

    /// Statements belonging to one `is`/`else` case, up to the next `is`,
    /// `else`, `fallthrough`, or the closing `}`.
    fn case_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::Is)
            && !self.check(TokenKind::Else)
            && !self.check(TokenKind::Fallthrough)
            && !self.check(TokenKind::RightBrace)
            && !self.is_at_end()
        {
            stmts.push(self.declaration()?);
        }
        if self.check(TokenKind::End) {
            self.advance();
            self.consume(TokenKind::Semicolon, "Expected ';' after 'end'.")?;
        }
        Ok(stmts)
    }

    fn attempt_statement(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftBrace, "Expected '{' after 'attempt'.")?;
        let body = Box::new(Stmt::Block(self.block()?));
        self.consume(TokenKind::Handle, "Expected 'handle' after attempt block.")?;

        let filter = if self.matches(&[TokenKind::LeftParen]) {
            let mut names = Vec::new();
            loop {
                names.push(self.consume(TokenKind::Identifier, "Expected class name in handle filter.")?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
            self.consume(TokenKind::RightParen, "Expected ')' after handle filter.")?;
            Some(names)
        } else {
            None
        };

        self.consume(TokenKind::LeftBrace, "Expected '{' after 'handle'.")?;
        let handler = Box::new(Stmt::Block(self.block()?));
        Ok(Stmt::Error { body, filter, handler })
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // -- expressions, lowest to highest precedence --------------------------

    fn expression(&mut self) -> PResult<Expr> {
        self.comma()
    }

    fn comma(&mut self) -> PResult<Expr> {
        let first = self.assignment()?;
        if self.check(TokenKind::Comma) {
            let mut items = vec![first];
            while self.matches(&[TokenKind::Comma]) {
                items.push(self.assignment()?);
            }
            return Ok(Expr::new(ExprKind::Comma(items)));
        }
        Ok(first)
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.ternary()?;

        if self.matches(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            return self.finish_assignment(expr, value, equals);
        }

        if let Some(op) = self.compound_assign_op() {
            let equals = self.advance();
            let rhs = self.assignment()?;
            let binary_op = Token::new(op, equals.lexeme.trim_end_matches('=').to_string(), TokLiteral::None, equals.loc.clone());
            let desugared = Expr::new(ExprKind::Binary(Box::new(expr.clone()), binary_op, Box::new(rhs)));
            return self.finish_assignment(expr, desugared, equals);
        }

        Ok(expr)
    }

    fn compound_assign_op(&self) -> Option<TokenKind> {
        match self.peek().kind {
            TokenKind::PlusEqual => Some(TokenKind::Plus),
            TokenKind::MinusEqual => Some(TokenKind::Minus),
            TokenKind::StarEqual => Some(TokenKind::Star),
            TokenKind::SlashEqual => Some(TokenKind::Slash),
            _ => None,
        }
    }

    fn finish_assignment(&mut self, target: Expr, value: Expr, equals: Token) -> PResult<Expr> {
        match target.kind {
            ExprKind::Variable(name) => Ok(Expr::new(ExprKind::Assign(name, Box::new(value)))),
            ExprKind::Get(obj, name) => {
                let visibility = if name.lexeme.starts_with('_') { Visibility::Private } else { Visibility::Public };
                Ok(Expr::new(ExprKind::Set(obj, name, Box::new(value), visibility)))
            }
            ExprKind::Access(obj, start, end, tok) => {
                Ok(Expr::new(ExprKind::Modify(obj, start, end, Box::new(value), tok)))
            }
            _ => Err(ParseError::new(equals, "Invalid assignment target.".to_string())),
        }
    }

    fn ternary(&mut self) -> PResult<Expr> {
        let cond = self.or()?;
        if self.matches(&[TokenKind::Question]) {
            let then_branch = self.assignment()?;
            self.consume(TokenKind::Colon, "Expected ':' in ternary expression.")?;
            let else_branch = self.assignment()?;
            return Ok(Expr::new(ExprKind::Ternary(Box::new(cond), Box::new(then_branch), Box::new(else_branch))));
        }
        Ok(cond)
    }

    fn or(&mut self) -> PResult<Expr> {
        let mut expr = self.and()?;
        while self.matches(&[TokenKind::Or]) {
            let op = self.previous().clone();
            let rhs = self.and()?;
            expr = Expr::new(ExprKind::Logical(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn and(&mut self) -> PResult<Expr> {
        let mut expr = self.equality()?;
        while self.matches(&[TokenKind::And]) {
            let op = self.previous().clone();
            let rhs = self.equality()?;
            expr = Expr::new(ExprKind::Logical(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> PResult<Expr> {
        let mut expr = self.comparison()?;
        while self.matches(&[TokenKind::BangEqual, TokenKind::EqualEqual]) {
            let op = self.previous().clone();
            let rhs = self.comparison()?;
            expr = Expr::new(ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut expr = self.term()?;
        while self.matches(&[TokenKind::Greater, TokenKind::GreaterEqual, TokenKind::Less, TokenKind::LessEqual]) {
            let op = self.previous().clone();
            let rhs = self.term()?;
            expr = Expr::new(ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut expr = self.factor()?;
        while self.matches(&[TokenKind::Plus, TokenKind::Minus]) {
            let op = self.previous().clone();
            let rhs = self.factor()?;
            expr = Expr::new(ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn factor(&mut self) -> PResult<Expr> {
        let mut expr = self.power()?;
        while self.matches(&[TokenKind::Star, TokenKind::Slash, TokenKind::Percent]) {
            let op = self.previous().clone();
            let rhs = self.power()?;
            expr = Expr::new(ExprKind::Binary(Box::new(expr), op, Box::new(rhs)));
        }
        Ok(expr)
    }

    fn power(&mut self) -> PResult<Expr> {
        let base = self.unary()?;
        if self.matches(&[TokenKind::StarStar]) {
            let op = self.previous().clone();
            let exponent = self.power()?; // right-associative
            return Ok(Expr::new(ExprKind::Binary(Box::new(base), op, Box::new(exponent))));
        }
        Ok(base)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.matches(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let rhs = self.unary()?;
            return Ok(Expr::new(ExprKind::Unary(op, Box::new(rhs))));
        }
        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expected property name after '.'.")?;
                expr = Expr::new(ExprKind::Get(Box::new(expr), name));
            } else if self.matches(&[TokenKind::LeftBracket]) {
                expr = self.finish_access(expr)?;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= 256 {
                    return Err(self.error_here("Cannot have more than 256 arguments."));
                }
                args.push(self.assignment()?);
                if !self.matches(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren_close = self.consume(TokenKind::RightParen, "Expected ')' after arguments.")?;
        Ok(Expr::new(ExprKind::Call(Box::new(callee), args, paren_close)))
    }

    fn finish_access(&mut self, target: Expr) -> PResult<Expr> {
        let bracket = self.previous().clone();
        let start = self.expression()?;
        let end = if self.matches(&[TokenKind::Colon]) { Some(Box::new(self.expression()?)) } else { None };
        self.consume(TokenKind::RightBracket, "Expected ']' after index/slice.")?;
        Ok(Expr::new(ExprKind::Access(Box::new(target), Box::new(start), end, bracket)))
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.matches(&[TokenKind::False]) {
            return Ok(Expr::new(ExprKind::Literal(Literal::Bool(false))));
        }
        if self.matches(&[TokenKind::True]) {
            return Ok(Expr::new(ExprKind::Literal(Literal::Bool(true))));
        }
        if self.matches(&[TokenKind::Nil]) {
            return Ok(Expr::new(ExprKind::Literal(Literal::Nil)));
        }
        if self.matches(&[TokenKind::Number]) {
            let t = self.previous();
            let n = match &t.literal {
                TokLiteral::Number(n) => *n,
                _ => unreachable!("scanner always attaches Number literal"),
            };
            return Ok(Expr::new(ExprKind::Literal(Literal::Number(n))));
        }
        if self.matches(&[TokenKind::String]) {
            let t = self.previous();
            let s = match &t.literal {
                TokLiteral::String(s) => s.clone(),
                _ => unreachable!("scanner always attaches String literal"),
            };
            return Ok(Expr::new(ExprKind::Literal(Literal::String(s))));
        }
        if self.matches(&[TokenKind::This]) {
            return Ok(Expr::new(ExprKind::This(self.previous().clone())));
        }
        if self.matches(&[TokenKind::Super]) {
            let keyword = self.previous().clone();
            self.consume(TokenKind::Dot, "Expected '.' after 'super'.")?;
            let method = self.consume(TokenKind::Identifier, "Expected superclass method name.")?;
            return Ok(Expr::new(ExprKind::Super(keyword, method)));
        }
        if self.matches(&[TokenKind::Identifier]) {
            return Ok(Expr::new(ExprKind::Variable(self.previous().clone())));
        }
        if self.matches(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expected ')' after expression.")?;
            return Ok(Expr::new(ExprKind::Grouping(Box::new(expr))));
        }
        if self.matches(&[TokenKind::LeftBracket]) {
            let mut items = Vec::new();
            if !self.check(TokenKind::RightBracket) {
                loop {
                    items.push(self.assignment()?);
                    if !self.matches(&[TokenKind::Comma]) {
                        break;
                    }
                }
            }
            self.consume(TokenKind::RightBracket, "Expected ']' after list literal.")?;
            return Ok(Expr::new(ExprKind::List(items)));
        }
        if self.matches(&[TokenKind::Fun]) {
            return self.lambda();
        }
        Err(self.error_here("Expected expression."))
    }

    fn lambda(&mut self) -> PResult<Expr> {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'fun'.")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::LeftBrace, "Expected '{' before lambda body.")?;
        let body = self.block()?;
        Ok(Expr::new(ExprKind::Lambda(params, body)))
    }
}

pub fn parse(tokens: Vec<Token>) -> (Vec<Stmt>, Vec<ParseError>) {
    Parser::new(tokens).parse_program()
}

/// Like `parse`, but wires a `SourceLoader` so `GetLib`/`GetFile` declarations
/// can resolve and splice their referenced source at parse time.
pub fn parse_with_loader(tokens: Vec<Token>, loader: Box<dyn SourceLoader>) -> (Vec<Stmt>, Vec<ParseError>) {
    Parser::with_loader(tokens, loader).parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;

    fn parse_src(src: &str) -> (Vec<Stmt>, Vec<ParseError>) {
        let (tokens, errs) = scan(src, None);
        assert!(errs.is_empty());
        parse(tokens)
    }

    #[test]
    fn parses_var_declaration() {
        let (stmts, errs) = parse_src("var x = 1 + 2;");
        assert!(errs.is_empty());
        assert_eq!(stmts.len(), 1);
        assert!(matches!(stmts[0], Stmt::Var { .. }));
    }

    #[test]
    fn parses_function_and_call() {
        let (stmts, errs) = parse_src("fun add(a, b) { return a + b; } print add(1, 2);");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn ternary_binds_looser_than_or() {
        let (stmts, errs) = parse_src("var x = true or false ? 1 : 2;");
        assert!(errs.is_empty());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn for_loop_desugars_to_block_and_while() {
        let (stmts, errs) = parse_src("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(errs.is_empty());
        assert!(matches!(stmts[0], Stmt::Block(_)));
    }

    #[test]
    fn class_with_private_and_static_methods() {
        let src = "class Foo { init() {} -secret() {} class make() {} }";
        let (stmts, errs) = parse_src(src);
        assert!(errs.is_empty(), "{errs:?}");
        match &stmts[0] {
            Stmt::Class(c) => {
                assert_eq!(c.public_methods.len(), 1);
                assert_eq!(c.private_methods.len(), 1);
                assert_eq!(c.static_methods.len(), 1);
            }
            _ => panic!("expected class decl"),
        }
    }

    #[test]
    fn invalid_assignment_target_is_a_parse_error() {
        let (_, errs) = parse_src("1 = 2;");
        assert!(!errs.is_empty());
    }

    #[test]
    fn slice_access_parses() {
        let (stmts, errs) = parse_src("print xs[1:3];");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn fix_without_initializer_is_a_parse_error() {
        let (_, errs) = parse_src("fix x;");
        assert!(!errs.is_empty());
    }

    #[test]
    fn fix_with_initializer_parses() {
        let (stmts, errs) = parse_src("fix x = 1;");
        assert!(errs.is_empty(), "{errs:?}");
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn get_lib_without_loader_is_a_parse_error() {
        let (_, errs) = parse_src("GetLib \"whatever\";");
        assert!(!errs.is_empty());
    }
}
