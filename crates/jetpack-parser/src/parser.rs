//! JavaScript and JSX parser.
//!
//! Recursive descent for statements, precedence climbing for binary
//! expressions. Identifier occurrences are allocated in the program's
//! [`IdentTable`] as they are parsed.

use crate::ast::*;
use crate::lexer::Lexer;
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// Parser configuration options.
#[derive(Debug, Clone, Default)]
pub struct ParserOptions {
    /// Parse JSX elements and lower them to `React.createElement` calls.
    pub jsx: bool,
}

/// Parse error.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

/// The parser.
pub struct Parser<'a> {
    pub(crate) lexer: Lexer<'a>,
    pub(crate) current: Token,
    /// End offset of the last consumed token.
    pub(crate) prev_end: u32,
    pub(crate) options: ParserOptions,
    source: &'a str,
    pub(crate) idents: IdentTable,
    /// When false, `in` is not parsed as a binary operator (for-in init).
    allow_in: bool,
    in_function: bool,
    in_async: bool,
    in_generator: bool,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str, options: ParserOptions) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            prev_end: 0,
            options,
            source,
            idents: IdentTable::new(),
            allow_in: true,
            in_function: false,
            in_async: false,
            in_generator: false,
        }
    }

    /// Parse the entire source as an ES module.
    pub fn parse(mut self) -> Result<Program, ParseError> {
        let body = self.parse_program()?;
        let span = Span::new(0, self.source.len() as u32);
        Ok(Program::new(body, self.idents, span))
    }

    // =========================================================================
    // Token Handling
    // =========================================================================

    pub(crate) fn peek(&self) -> &TokenKind {
        &self.current.kind
    }

    /// Advance to the next token and return the previous.
    pub(crate) fn advance(&mut self) -> Token {
        self.prev_end = self.current.span.end;
        std::mem::replace(&mut self.current, self.lexer.next_token())
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    pub(crate) fn is_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{kind:?}")))
        }
    }

    pub(crate) fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// True if the current token is the identifier `name`.
    pub(crate) fn is_ident(&self, name: &str) -> bool {
        matches!(self.peek(), TokenKind::Identifier(n) if n == name)
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.is_ident(name) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_contextual(&mut self, name: &str) -> Result<(), ParseError> {
        if self.eat_ident(name) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{name}'")))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        let found = match self.peek() {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Invalid => "invalid or unterminated token".to_string(),
            _ => format!("'{}'", self.token_text(&self.current)),
        };
        ParseError::new(format!("Expected {expected}, found {found}"), self.current.span)
    }

    fn token_text(&self, token: &Token) -> &'a str {
        self.source
            .get(token.span.start as usize..token.span.end as usize)
            .unwrap_or("")
    }

    /// Consume a semicolon (with ASI support).
    pub(crate) fn expect_semicolon(&mut self) -> Result<(), ParseError> {
        if self.eat(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_eof()
            || self.current.had_newline_before
        {
            return Ok(());
        }
        Err(self.unexpected("';'"))
    }

    pub(crate) fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.max(start))
    }

    pub(crate) fn alloc_ident(&mut self, name: impl Into<String>, span: Span) -> Ident {
        Ident::new(self.idents.alloc(name), span)
    }

    fn expect_binding_ident(&mut self) -> Result<Ident, ParseError> {
        match self.peek().clone() {
            TokenKind::Identifier(name) => {
                let span = self.advance().span;
                Ok(self.alloc_ident(name, span))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// An identifier or reserved word, as allowed after `.` and in keys.
    pub(crate) fn expect_identifier_name(&mut self) -> Result<String, ParseError> {
        let name = match self.peek() {
            TokenKind::Identifier(name) => name.clone(),
            kind => match kind.keyword_str() {
                Some(word) => word.to_string(),
                None => return Err(self.unexpected("identifier")),
            },
        };
        self.advance();
        Ok(name)
    }

    fn expect_string(&mut self) -> Result<StrLit, ParseError> {
        match self.peek().clone() {
            TokenKind::String { value, raw } => {
                self.advance();
                Ok(StrLit {
                    value,
                    raw: Some(raw),
                })
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    pub(crate) fn with_allow_in<T>(
        &mut self,
        allow: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.allow_in, allow);
        let result = f(self);
        self.allow_in = saved;
        result
    }

    fn with_function_context<T>(
        &mut self,
        is_async: bool,
        is_generator: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = (self.in_function, self.in_async, self.in_generator, self.allow_in);
        self.in_function = true;
        self.in_async = is_async;
        self.in_generator = is_generator;
        self.allow_in = true;
        let result = f(self);
        (self.in_function, self.in_async, self.in_generator, self.allow_in) = saved;
        result
    }

    // =========================================================================
    // Program and Statements
    // =========================================================================

    fn parse_program(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_eof() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    pub(crate) fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;

        match self.peek().clone() {
            TokenKind::Var => self.parse_var_stmt(VarKind::Var),
            TokenKind::Const => self.parse_var_stmt(VarKind::Const),
            TokenKind::Identifier(name) if name == "let" && self.let_starts_declaration() => {
                self.parse_var_stmt(VarKind::Let)
            }
            TokenKind::Identifier(name) if name == "async" && self.async_starts_function() => {
                self.advance();
                let func = self.parse_function(true, start)?;
                Ok(Stmt::new(StmtKind::Function(Box::new(func)), self.span_from(start)))
            }
            TokenKind::Function => {
                let func = self.parse_function(false, start)?;
                Ok(Stmt::new(StmtKind::Function(Box::new(func)), self.span_from(start)))
            }
            TokenKind::Class => {
                let class = self.parse_class(start)?;
                Ok(Stmt::new(StmtKind::Class(Box::new(class)), self.span_from(start)))
            }

            TokenKind::If => self.parse_if_stmt(),
            TokenKind::Switch => self.parse_switch_stmt(),
            TokenKind::For => self.parse_for_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Do => self.parse_do_while_stmt(),
            TokenKind::Break | TokenKind::Continue => self.parse_jump_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Throw => self.parse_throw_stmt(),
            TokenKind::Try => self.parse_try_stmt(),
            TokenKind::With => self.parse_with_stmt(),
            TokenKind::Debugger => {
                self.advance();
                self.expect_semicolon()?;
                Ok(Stmt::new(StmtKind::Debugger, self.span_from(start)))
            }

            TokenKind::LBrace => {
                let body = self.parse_block_body()?;
                Ok(Stmt::new(StmtKind::Block(body), self.span_from(start)))
            }
            TokenKind::Semicolon => {
                self.advance();
                Ok(Stmt::new(StmtKind::Empty, self.span_from(start)))
            }

            // `import(...)` and `import.meta` start expression statements
            TokenKind::Import
                if !matches!(self.lexer.peek().kind, TokenKind::LParen | TokenKind::Dot) =>
            {
                self.parse_import_decl()
            }
            TokenKind::Export => self.parse_export_decl(),

            TokenKind::Identifier(label) if matches!(self.lexer.peek().kind, TokenKind::Colon) => {
                self.advance(); // label
                self.advance(); // :
                let body = self.parse_stmt()?;
                Ok(Stmt::new(
                    StmtKind::Labeled {
                        label,
                        body: Box::new(body),
                    },
                    self.span_from(start),
                ))
            }

            _ => self.parse_expr_stmt(),
        }
    }

    /// `let` followed by a binding starts a declaration; otherwise it is an
    /// identifier.
    fn let_starts_declaration(&self) -> bool {
        matches!(
            self.lexer.peek().kind,
            TokenKind::Identifier(_) | TokenKind::LBracket | TokenKind::LBrace
        )
    }

    fn async_starts_function(&self) -> bool {
        let next = self.lexer.peek();
        matches!(next.kind, TokenKind::Function) && !next.had_newline_before
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        let expr = self.parse_expr()?;
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Expr(Box::new(expr)), self.span_from(start)))
    }

    fn parse_var_stmt(&mut self, kind: VarKind) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // var / let / const
        let decl = self.parse_var_decl_list(kind)?;
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Var(decl), self.span_from(start)))
    }

    fn parse_var_decl_list(&mut self, kind: VarKind) -> Result<VarDecl, ParseError> {
        let mut decls = Vec::new();
        loop {
            decls.push(self.parse_var_declarator()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(VarDecl { kind, decls })
    }

    fn parse_var_declarator(&mut self) -> Result<VarDeclarator, ParseError> {
        let binding = self.parse_binding()?;
        let init = if self.eat(&TokenKind::Eq) {
            Some(self.parse_assign_expr()?)
        } else {
            None
        };
        Ok(VarDeclarator { binding, init })
    }

    fn parse_if_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // if
        let test = self.parse_paren_test()?;
        let consequent = Box::new(self.parse_stmt()?);
        let alternate = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_stmt()?))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                test,
                consequent,
                alternate,
            },
            self.span_from(start),
        ))
    }

    fn parse_paren_test(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let test = self.with_allow_in(true, |p| p.parse_expr())?;
        self.expect(&TokenKind::RParen)?;
        Ok(test)
    }

    fn parse_switch_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // switch
        let discriminant = self.parse_paren_test()?;
        self.expect(&TokenKind::LBrace)?;

        let mut cases = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            let test = if self.eat(&TokenKind::Default) {
                None
            } else {
                self.expect(&TokenKind::Case)?;
                Some(self.parse_expr()?)
            };
            self.expect(&TokenKind::Colon)?;

            let mut body = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                body.push(self.parse_stmt()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect(&TokenKind::RBrace)?;

        Ok(Stmt::new(
            StmtKind::Switch {
                discriminant,
                cases,
            },
            self.span_from(start),
        ))
    }

    fn parse_for_stmt(&mut self) -> Result<Stmt, ParseError> {
        enum ForPart {
            Init(ForInit),
            Head(ForHead),
        }

        let start = self.current.span.start;
        self.advance(); // for
        let is_await = self.eat_ident("await");
        self.expect(&TokenKind::LParen)?;

        let part = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            let var_kind = match self.peek() {
                TokenKind::Var => Some(VarKind::Var),
                TokenKind::Const => Some(VarKind::Const),
                TokenKind::Identifier(name) if name == "let" && self.let_starts_declaration() => {
                    Some(VarKind::Let)
                }
                _ => None,
            };

            let part = self.with_allow_in(false, |p| {
                if let Some(kind) = var_kind {
                    p.advance();
                    let binding = p.parse_binding()?;
                    if p.check(&TokenKind::In) || p.is_ident("of") {
                        return Ok(ForPart::Head(ForHead::Var { kind, binding }));
                    }
                    let init = if p.eat(&TokenKind::Eq) {
                        Some(p.parse_assign_expr()?)
                    } else {
                        None
                    };
                    let mut decls = vec![VarDeclarator { binding, init }];
                    while p.eat(&TokenKind::Comma) {
                        decls.push(p.parse_var_declarator()?);
                    }
                    Ok(ForPart::Init(ForInit::Var(VarDecl { kind, decls })))
                } else {
                    let expr = p.parse_expr()?;
                    if p.check(&TokenKind::In) || p.is_ident("of") {
                        Ok(ForPart::Head(ForHead::Target(expr)))
                    } else {
                        Ok(ForPart::Init(ForInit::Expr(expr)))
                    }
                }
            })?;
            Some(part)
        };

        let init = match part {
            Some(ForPart::Head(left)) => return self.finish_for_in_of(start, left, is_await),
            Some(ForPart::Init(init)) => Some(init),
            None => None,
        };
        self.expect(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);

        Ok(Stmt::new(
            StmtKind::For {
                init,
                test,
                update,
                body,
            },
            self.span_from(start),
        ))
    }

    fn finish_for_in_of(
        &mut self,
        start: u32,
        left: ForHead,
        is_await: bool,
    ) -> Result<Stmt, ParseError> {
        let is_of = self.is_ident("of");
        self.advance(); // in / of
        let right = if is_of {
            self.with_allow_in(true, |p| p.parse_assign_expr())?
        } else {
            self.with_allow_in(true, |p| p.parse_expr())?
        };
        self.expect(&TokenKind::RParen)?;
        let body = Box::new(self.parse_stmt()?);
        let kind = if is_of {
            StmtKind::ForOf {
                left,
                right,
                body,
                is_await,
            }
        } else {
            StmtKind::ForIn { left, right, body }
        };
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    fn parse_while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // while
        let test = self.parse_paren_test()?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::new(StmtKind::While { test, body }, self.span_from(start)))
    }

    fn parse_do_while_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // do
        let body = Box::new(self.parse_stmt()?);
        self.expect(&TokenKind::While)?;
        let test = self.parse_paren_test()?;
        // A semicolon is always optional after do-while
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt::new(StmtKind::DoWhile { body, test }, self.span_from(start)))
    }

    fn parse_jump_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        let is_break = matches!(self.advance().kind, TokenKind::Break);
        let label = match self.peek() {
            TokenKind::Identifier(name) if !self.current.had_newline_before => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };
        self.expect_semicolon()?;
        let kind = if is_break {
            StmtKind::Break(label)
        } else {
            StmtKind::Continue(label)
        };
        Ok(Stmt::new(kind, self.span_from(start)))
    }

    fn parse_return_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // return
        let arg = if matches!(
            self.peek(),
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        ) || self.current.had_newline_before
        {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Return(arg), self.span_from(start)))
    }

    fn parse_throw_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // throw
        if self.current.had_newline_before {
            return Err(ParseError::new(
                "Illegal newline after throw",
                self.current.span,
            ));
        }
        let arg = self.parse_expr()?;
        self.expect_semicolon()?;
        Ok(Stmt::new(StmtKind::Throw(arg), self.span_from(start)))
    }

    fn parse_try_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // try
        let block = self.parse_block_body()?;

        let handler = if self.eat(&TokenKind::Catch) {
            let param = if self.eat(&TokenKind::LParen) {
                let binding = self.parse_binding()?;
                self.expect(&TokenKind::RParen)?;
                Some(binding)
            } else {
                None
            };
            let body = self.parse_block_body()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block_body()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(self.unexpected("'catch' or 'finally'"));
        }

        Ok(Stmt::new(
            StmtKind::Try {
                block,
                handler,
                finalizer,
            },
            self.span_from(start),
        ))
    }

    fn parse_with_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // with
        let object = self.parse_paren_test()?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt::new(StmtKind::With { object, body }, self.span_from(start)))
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    pub(crate) fn parse_binding(&mut self) -> Result<Binding, ParseError> {
        let start = self.current.span.start;
        match self.peek() {
            TokenKind::Identifier(_) => {
                let ident = self.expect_binding_ident()?;
                Ok(Binding::new(BindingKind::Ident(ident), ident.span))
            }
            TokenKind::LBracket => self.parse_array_binding(start),
            TokenKind::LBrace => self.parse_object_binding(start),
            _ => Err(self.unexpected("binding pattern")),
        }
    }

    fn parse_binding_default(&mut self) -> Result<Option<Expr>, ParseError> {
        if self.eat(&TokenKind::Eq) {
            Ok(Some(self.with_allow_in(true, |p| p.parse_assign_expr())?))
        } else {
            Ok(None)
        }
    }

    fn parse_array_binding(&mut self, start: u32) -> Result<Binding, ParseError> {
        self.advance(); // [
        let mut elements = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            if self.eat(&TokenKind::Comma) {
                elements.push(None);
                continue;
            }
            let rest = self.eat(&TokenKind::Spread);
            let binding = self.parse_binding()?;
            let default = if rest {
                None
            } else {
                self.parse_binding_default()?
            };
            elements.push(Some(ArrayPatternElement {
                binding,
                default,
                rest,
            }));
            if !self.check(&TokenKind::RBracket) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBracket)?;
        Ok(Binding::new(BindingKind::Array(elements), self.span_from(start)))
    }

    fn parse_object_binding(&mut self, start: u32) -> Result<Binding, ParseError> {
        self.advance(); // {
        let mut props = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.eat(&TokenKind::Spread) {
                props.push(ObjectPatternProp::Rest(self.parse_binding()?));
            } else {
                let key_token = self.current.clone();
                let key = self.parse_property_key()?;
                let (value, shorthand) = if self.eat(&TokenKind::Colon) {
                    (self.parse_binding()?, false)
                } else {
                    match (&key, &key_token.kind) {
                        (PropertyKey::Ident(name), TokenKind::Identifier(_)) => {
                            let ident = self.alloc_ident(name.clone(), key_token.span);
                            (Binding::new(BindingKind::Ident(ident), key_token.span), true)
                        }
                        _ => return Err(self.unexpected("':'")),
                    }
                };
                let default = self.parse_binding_default()?;
                props.push(ObjectPatternProp::KeyValue {
                    key,
                    value,
                    default,
                    shorthand,
                });
            }
            if !self.check(&TokenKind::RBrace) {
                self.expect(&TokenKind::Comma)?;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(Binding::new(BindingKind::Object(props), self.span_from(start)))
    }

    pub(crate) fn parse_property_key(&mut self) -> Result<PropertyKey, ParseError> {
        let key = match self.peek().clone() {
            TokenKind::Identifier(name) => PropertyKey::Ident(name),
            TokenKind::String { value, raw } => PropertyKey::String(StrLit {
                value,
                raw: Some(raw),
            }),
            TokenKind::Number { value, raw } => PropertyKey::Number {
                value,
                raw: Some(raw),
            },
            TokenKind::PrivateName(name) => PropertyKey::Private(name),
            TokenKind::LBracket => {
                self.advance();
                let expr = self.with_allow_in(true, |p| p.parse_assign_expr())?;
                self.expect(&TokenKind::RBracket)?;
                return Ok(PropertyKey::Computed(Box::new(expr)));
            }
            kind => match kind.keyword_str() {
                Some(word) => PropertyKey::Ident(word.to_string()),
                None => return Err(self.unexpected("property name")),
            },
        };
        self.advance();
        Ok(key)
    }

    // =========================================================================
    // Functions and Classes
    // =========================================================================

    /// Parse `function* name(params) { body }`. The current token is
    /// `function`; any `async` prefix was already consumed.
    fn parse_function(&mut self, is_async: bool, start: u32) -> Result<Function, ParseError> {
        self.expect(&TokenKind::Function)?;
        let is_generator = self.eat(&TokenKind::Star);
        let id = if matches!(self.peek(), TokenKind::Identifier(_)) {
            Some(self.expect_binding_ident()?)
        } else {
            None
        };
        let (params, body) = self.with_function_context(is_async, is_generator, |p| {
            let params = p.parse_params()?;
            let body = p.parse_block_body()?;
            Ok((params, body))
        })?;
        Ok(Function {
            id,
            params,
            body,
            is_async,
            is_generator,
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let rest = self.eat(&TokenKind::Spread);
            let binding = self.parse_binding()?;
            let default = if rest {
                None
            } else {
                self.parse_binding_default()?
            };
            params.push(Param {
                binding,
                default,
                rest,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(params)
    }

    /// Parameters and body of an object or class method.
    fn parse_method_function(
        &mut self,
        is_async: bool,
        is_generator: bool,
    ) -> Result<Function, ParseError> {
        let start = self.current.span.start;
        let (params, body) = self.with_function_context(is_async, is_generator, |p| {
            let params = p.parse_params()?;
            let body = p.parse_block_body()?;
            Ok((params, body))
        })?;
        Ok(Function {
            id: None,
            params,
            body,
            is_async,
            is_generator,
            span: self.span_from(start),
        })
    }

    /// True when the contextual word at the current position (`static`,
    /// `async`, `get`, `set`) modifies the member that follows rather than
    /// naming it.
    fn modifier_applies(&self) -> bool {
        !matches!(
            self.lexer.peek().kind,
            TokenKind::LParen
                | TokenKind::Eq
                | TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::Comma
                | TokenKind::Colon
                | TokenKind::Eof
        )
    }

    fn parse_method_modifiers(&mut self) -> (bool, bool, Option<PropertyKind>) {
        let mut is_async = false;
        if self.is_ident("async")
            && self.modifier_applies()
            && !self.lexer.peek().had_newline_before
        {
            self.advance();
            is_async = true;
        }
        let is_generator = self.eat(&TokenKind::Star);

        let mut accessor = None;
        if !is_async && !is_generator && self.modifier_applies() {
            if self.is_ident("get") {
                self.advance();
                accessor = Some(PropertyKind::Get);
            } else if self.is_ident("set") {
                self.advance();
                accessor = Some(PropertyKind::Set);
            }
        }
        (is_async, is_generator, accessor)
    }

    fn parse_class(&mut self, start: u32) -> Result<Class, ParseError> {
        self.expect(&TokenKind::Class)?;
        let id = if matches!(self.peek(), TokenKind::Identifier(_)) {
            Some(self.expect_binding_ident()?)
        } else {
            None
        };
        let super_class = if self.eat(&TokenKind::Extends) {
            Some(Box::new(self.parse_lhs_expr()?))
        } else {
            None
        };

        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_eof() {
            if self.eat(&TokenKind::Semicolon) {
                continue;
            }
            body.push(self.parse_class_member()?);
        }
        self.expect(&TokenKind::RBrace)?;

        Ok(Class {
            id,
            super_class,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, ParseError> {
        let mut is_static = false;
        if self.is_ident("static") && self.modifier_applies() {
            self.advance();
            if self.check(&TokenKind::LBrace) {
                let body = self.with_function_context(false, false, |p| p.parse_block_body())?;
                return Ok(ClassMember::StaticBlock(body));
            }
            is_static = true;
        }

        let (is_async, is_generator, accessor) = self.parse_method_modifiers();
        let key = self.parse_property_key()?;

        if self.check(&TokenKind::LParen) || is_async || is_generator || accessor.is_some() {
            let kind = match accessor {
                Some(PropertyKind::Get) => MethodKind::Get,
                Some(PropertyKind::Set) => MethodKind::Set,
                _ if !is_static && is_constructor_key(&key) => MethodKind::Constructor,
                _ => MethodKind::Method,
            };
            let value = self.parse_method_function(is_async, is_generator)?;
            return Ok(ClassMember::Method {
                key,
                value,
                kind,
                is_static,
            });
        }

        let value = if self.eat(&TokenKind::Eq) {
            Some(self.with_function_context(false, false, |p| p.parse_assign_expr())?)
        } else {
            None
        };
        self.expect_semicolon()?;
        Ok(ClassMember::Property {
            key,
            value,
            is_static,
        })
    }

    // =========================================================================
    // Modules
    // =========================================================================

    fn parse_import_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // import

        let mut specifiers = Vec::new();
        if !matches!(self.peek(), TokenKind::String { .. }) {
            let mut needs_more = true;
            if matches!(self.peek(), TokenKind::Identifier(_)) {
                specifiers.push(ImportSpecifier::Default(self.expect_binding_ident()?));
                needs_more = self.eat(&TokenKind::Comma);
            }
            if needs_more {
                if self.eat(&TokenKind::Star) {
                    self.expect_contextual("as")?;
                    specifiers.push(ImportSpecifier::Namespace(self.expect_binding_ident()?));
                } else {
                    self.expect(&TokenKind::LBrace)?;
                    while !self.check(&TokenKind::RBrace) {
                        let imported_span = self.current.span;
                        let imported = self.parse_module_export_name()?;
                        let local = if self.eat_ident("as") {
                            self.expect_binding_ident()?
                        } else {
                            self.alloc_ident(imported.clone(), imported_span)
                        };
                        specifiers.push(ImportSpecifier::Named { imported, local });
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(&TokenKind::RBrace)?;
                }
            }
            self.expect_contextual("from")?;
        }

        let source = self.expect_string()?;
        self.skip_import_attributes()?;
        self.expect_semicolon()?;

        Ok(Stmt::new(
            StmtKind::Import(Box::new(ImportDecl { specifiers, source })),
            self.span_from(start),
        ))
    }

    /// `with { type: 'json' }` / `assert { ... }` carry no bundling meaning.
    fn skip_import_attributes(&mut self) -> Result<(), ParseError> {
        let is_attributes = (self.check(&TokenKind::With) || self.is_ident("assert"))
            && !self.current.had_newline_before;
        if is_attributes {
            self.advance();
            self.parse_object_literal()?;
        }
        Ok(())
    }

    fn parse_module_export_name(&mut self) -> Result<String, ParseError> {
        if let TokenKind::String { value, .. } = self.peek().clone() {
            self.advance();
            return Ok(value);
        }
        self.expect_identifier_name()
    }

    fn parse_export_decl(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current.span.start;
        self.advance(); // export

        let decl = match self.peek().clone() {
            TokenKind::Default => {
                self.advance();
                let decl_start = self.current.span.start;
                let default = if self.check(&TokenKind::Function) {
                    ExportDefault::Function(self.parse_function(false, decl_start)?)
                } else if self.is_ident("async") && self.async_starts_function() {
                    self.advance();
                    ExportDefault::Function(self.parse_function(true, decl_start)?)
                } else if self.check(&TokenKind::Class) {
                    ExportDefault::Class(self.parse_class(decl_start)?)
                } else {
                    let expr = self.parse_assign_expr()?;
                    self.expect_semicolon()?;
                    ExportDefault::Expr(expr)
                };
                ExportDecl::Default(default)
            }
            TokenKind::Star => {
                self.advance();
                let exported = if self.eat_ident("as") {
                    Some(self.parse_module_export_name()?)
                } else {
                    None
                };
                self.expect_contextual("from")?;
                let source = self.expect_string()?;
                self.skip_import_attributes()?;
                self.expect_semicolon()?;
                ExportDecl::All { exported, source }
            }
            TokenKind::LBrace => {
                self.advance();
                let mut specifiers = Vec::new();
                while !self.check(&TokenKind::RBrace) {
                    let local_span = self.current.span;
                    let local_name = self.parse_module_export_name()?;
                    let exported = if self.eat_ident("as") {
                        self.parse_module_export_name()?
                    } else {
                        local_name.clone()
                    };
                    let local = self.alloc_ident(local_name, local_span);
                    specifiers.push(ExportSpecifier { local, exported });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBrace)?;
                let source = if self.eat_ident("from") {
                    let source = self.expect_string()?;
                    self.skip_import_attributes()?;
                    Some(source)
                } else {
                    None
                };
                self.expect_semicolon()?;
                ExportDecl::Named { specifiers, source }
            }
            _ => {
                let stmt = self.parse_stmt()?;
                if !matches!(
                    stmt.kind,
                    StmtKind::Var(_) | StmtKind::Function(_) | StmtKind::Class(_)
                ) {
                    return Err(ParseError::new("Expected declaration after export", stmt.span));
                }
                ExportDecl::Decl(stmt)
            }
        };

        Ok(Stmt::new(
            StmtKind::Export(Box::new(decl)),
            self.span_from(start),
        ))
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let first = self.parse_assign_expr()?;
        if !self.check(&TokenKind::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assign_expr()?);
        }
        Ok(Expr::new(ExprKind::Sequence(exprs), self.span_from(start)))
    }

    pub(crate) fn parse_assign_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;

        if let TokenKind::Identifier(name) = self.peek().clone() {
            if name == "yield" && self.in_generator {
                return self.parse_yield_expr();
            }

            let next = self.lexer.peek();
            if matches!(next.kind, TokenKind::Arrow) && !next.had_newline_before {
                // `x => body`
                let ident = self.expect_binding_ident()?;
                self.advance(); // =>
                return self.parse_arrow_body(vec![simple_param(ident)], false, start);
            }

            if name == "async" && !next.had_newline_before {
                if let TokenKind::Identifier(_) = next.kind {
                    // `async x => body`
                    let mut lookahead = self.lexer.clone();
                    lookahead.next_token();
                    if matches!(lookahead.next_token().kind, TokenKind::Arrow) {
                        self.advance(); // async
                        let ident = self.expect_binding_ident()?;
                        self.advance(); // =>
                        return self.parse_arrow_body(vec![simple_param(ident)], true, start);
                    }
                }
            }
        }

        let left = self.parse_conditional_expr()?;

        if let Some(op) = assign_op(self.peek()) {
            self.advance();
            let right = self.parse_assign_expr()?;
            return Ok(Expr::new(
                ExprKind::Assign {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(start),
            ));
        }

        Ok(left)
    }

    fn parse_yield_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        self.advance(); // yield
        let has_arg = !self.current.had_newline_before
            && !matches!(
                self.peek(),
                TokenKind::RParen
                    | TokenKind::RBracket
                    | TokenKind::RBrace
                    | TokenKind::Comma
                    | TokenKind::Semicolon
                    | TokenKind::Colon
                    | TokenKind::Eof
            );
        let (arg, delegate) = if has_arg {
            let delegate = self.eat(&TokenKind::Star);
            (Some(Box::new(self.parse_assign_expr()?)), delegate)
        } else {
            (None, false)
        };
        Ok(Expr::new(ExprKind::Yield { arg, delegate }, self.span_from(start)))
    }

    fn parse_conditional_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let test = self.parse_binary_expr(1)?;

        if !self.eat(&TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.with_allow_in(true, |p| p.parse_assign_expr())?;
        self.expect(&TokenKind::Colon)?;
        let alternate = self.parse_assign_expr()?;

        Ok(Expr::new(
            ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
            self.span_from(start),
        ))
    }

    /// Precedence climbing over [`TokenKind::binary_precedence`].
    fn parse_binary_expr(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let mut left = self.parse_unary_expr()?;

        loop {
            let Some(prec) = self.peek().binary_precedence() else {
                break;
            };
            if prec < min_prec || (self.check(&TokenKind::In) && !self.allow_in) {
                break;
            }
            let Some(op) = binary_op(self.peek()) else {
                break;
            };
            let next_min = if self.peek().is_right_associative() {
                prec
            } else {
                prec + 1
            };
            self.advance();
            let right = self.parse_binary_expr(next_min)?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                self.span_from(start),
            );
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;

        let op = match self.peek() {
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let arg = self.parse_unary_expr()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    arg: Box::new(arg),
                },
                self.span_from(start),
            ));
        }

        let update = match self.peek() {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        };
        if let Some(op) = update {
            self.advance();
            let arg = self.parse_unary_expr()?;
            return Ok(Expr::new(
                ExprKind::Update {
                    op,
                    prefix: true,
                    arg: Box::new(arg),
                },
                self.span_from(start),
            ));
        }

        // Top-level await is allowed in modules
        if self.is_ident("await") && (self.in_async || !self.in_function) {
            self.advance();
            let arg = self.parse_unary_expr()?;
            return Ok(Expr::new(ExprKind::Await(Box::new(arg)), self.span_from(start)));
        }

        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let expr = self.parse_lhs_expr()?;

        if self.current.had_newline_before {
            return Ok(expr);
        }
        let op = match self.peek() {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(expr),
        };
        self.advance();
        Ok(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                arg: Box::new(expr),
            },
            self.span_from(start),
        ))
    }

    /// Member access, calls, and tagged templates.
    pub(crate) fn parse_lhs_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let mut expr = if self.check(&TokenKind::New) {
            self.parse_new_expr()?
        } else {
            self.parse_primary_expr()?
        };
        if matches!(expr.kind, ExprKind::Arrow(_)) {
            return Ok(expr);
        }

        loop {
            expr = match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let property = self.parse_member_name()?;
                    ExprKind::Member {
                        object: Box::new(expr),
                        property,
                        optional: false,
                    }
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    match self.peek() {
                        TokenKind::LParen => ExprKind::Call {
                            callee: Box::new(expr),
                            args: self.parse_arguments()?,
                            optional: true,
                        },
                        TokenKind::LBracket => ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(self.parse_index()?),
                            optional: true,
                        },
                        _ => ExprKind::Member {
                            object: Box::new(expr),
                            property: self.parse_member_name()?,
                            optional: true,
                        },
                    }
                }
                TokenKind::LBracket => ExprKind::Index {
                    object: Box::new(expr),
                    index: Box::new(self.parse_index()?),
                    optional: false,
                },
                TokenKind::LParen => ExprKind::Call {
                    callee: Box::new(expr),
                    args: self.parse_arguments()?,
                    optional: false,
                },
                TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                    ExprKind::TaggedTemplate {
                        tag: Box::new(expr),
                        quasi: self.parse_template()?,
                    }
                }
                _ => break,
            }
            .into_expr(self.span_from(start));
        }

        Ok(expr)
    }

    fn parse_new_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        self.advance(); // new

        if self.eat(&TokenKind::Dot) {
            let property = self.parse_member_name()?;
            return Ok(Expr::new(
                ExprKind::MetaProperty {
                    meta: "new".to_string(),
                    property,
                },
                self.span_from(start),
            ));
        }

        let callee_start = self.current.span.start;
        let mut callee = if self.check(&TokenKind::New) {
            self.parse_new_expr()?
        } else {
            self.parse_primary_expr()?
        };
        loop {
            callee = match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    ExprKind::Member {
                        object: Box::new(callee),
                        property: self.parse_member_name()?,
                        optional: false,
                    }
                }
                TokenKind::LBracket => ExprKind::Index {
                    object: Box::new(callee),
                    index: Box::new(self.parse_index()?),
                    optional: false,
                },
                TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                    ExprKind::TaggedTemplate {
                        tag: Box::new(callee),
                        quasi: self.parse_template()?,
                    }
                }
                _ => break,
            }
            .into_expr(self.span_from(callee_start));
        }

        let args = if self.check(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Ok(Expr::new(
            ExprKind::New {
                callee: Box::new(callee),
                args,
            },
            self.span_from(start),
        ))
    }

    fn parse_member_name(&mut self) -> Result<String, ParseError> {
        if let TokenKind::PrivateName(name) = self.peek().clone() {
            self.advance();
            return Ok(name);
        }
        self.expect_identifier_name()
    }

    fn parse_index(&mut self) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LBracket)?;
        let index = self.with_allow_in(true, |p| p.parse_expr())?;
        self.expect(&TokenKind::RBracket)?;
        Ok(index)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        self.with_allow_in(true, |p| {
            while !p.check(&TokenKind::RParen) {
                args.push(p.parse_spread_or_assign()?);
                if !p.eat(&TokenKind::Comma) {
                    break;
                }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_spread_or_assign(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        if self.eat(&TokenKind::Spread) {
            let arg = self.parse_assign_expr()?;
            return Ok(Expr::new(ExprKind::Spread(Box::new(arg)), self.span_from(start)));
        }
        self.parse_assign_expr()
    }

    fn parse_primary_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let span = self.current.span;

        let kind = match self.peek().clone() {
            TokenKind::Identifier(name) => {
                if name == "async" {
                    let next = self.lexer.peek();
                    if !next.had_newline_before {
                        match next.kind {
                            TokenKind::Function => {
                                self.advance();
                                let func = self.parse_function(true, start)?;
                                return Ok(Expr::new(
                                    ExprKind::Function(Box::new(func)),
                                    self.span_from(start),
                                ));
                            }
                            TokenKind::LParen => return self.parse_async_call_or_arrow(),
                            _ => {}
                        }
                    }
                }
                self.advance();
                ExprKind::Ident(self.alloc_ident(name, span))
            }
            TokenKind::PrivateName(name) => {
                self.advance();
                ExprKind::PrivateName(name)
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Super => {
                self.advance();
                ExprKind::Super
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::True | TokenKind::False => {
                let value = matches!(self.advance().kind, TokenKind::True);
                ExprKind::Bool(value)
            }
            TokenKind::Number { value, raw } => {
                self.advance();
                ExprKind::Number {
                    value,
                    raw: Some(raw),
                }
            }
            TokenKind::String { value, raw } => {
                self.advance();
                ExprKind::String(StrLit {
                    value,
                    raw: Some(raw),
                })
            }
            TokenKind::BigInt(raw) => {
                self.advance();
                ExprKind::BigInt(raw)
            }
            TokenKind::Slash | TokenKind::SlashEq => {
                self.current = self.lexer.rescan_regex(span.start);
                match self.advance().kind {
                    TokenKind::Regex { pattern, flags } => ExprKind::Regex { pattern, flags },
                    _ => {
                        return Err(ParseError::new(
                            "Invalid regular expression: missing /",
                            self.span_from(start),
                        ))
                    }
                }
            }
            TokenKind::TemplateNoSub(_) | TokenKind::TemplateHead(_) => {
                ExprKind::Template(self.parse_template()?)
            }
            TokenKind::LParen => return self.parse_paren_or_arrow(),
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => {
                let func = self.parse_function(false, start)?;
                ExprKind::Function(Box::new(func))
            }
            TokenKind::Class => {
                let class = self.parse_class(start)?;
                ExprKind::Class(Box::new(class))
            }
            TokenKind::Import => {
                self.advance();
                if self.eat(&TokenKind::Dot) {
                    let property = self.parse_member_name()?;
                    ExprKind::MetaProperty {
                        meta: "import".to_string(),
                        property,
                    }
                } else {
                    let mut args = self.parse_arguments()?;
                    if args.is_empty() {
                        return Err(ParseError::new(
                            "import() requires a specifier",
                            self.span_from(start),
                        ));
                    }
                    ExprKind::Import(Box::new(args.swap_remove(0)))
                }
            }
            TokenKind::Lt if self.options.jsx => return self.parse_jsx_element(),
            _ => return Err(self.unexpected("expression")),
        };

        Ok(Expr::new(kind, self.span_from(start)))
    }

    /// `async(...)` is either a call to a function named `async` or the
    /// parameter list of an async arrow.
    fn parse_async_call_or_arrow(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        let async_span = self.advance().span;
        let args = self.parse_arguments()?;

        if self.check(&TokenKind::Arrow) && !self.current.had_newline_before {
            let params = exprs_to_params(args)?;
            self.advance(); // =>
            return self.parse_arrow_body(params, true, start);
        }

        let callee = Expr::new(ExprKind::Ident(self.alloc_ident("async", async_span)), async_span);
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                optional: false,
            },
            self.span_from(start),
        ))
    }

    fn parse_paren_or_arrow(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LParen)?;

        let mut items = Vec::new();
        let mut trailing_comma = false;
        self.with_allow_in(true, |p| {
            while !p.check(&TokenKind::RParen) {
                items.push(p.parse_spread_or_assign()?);
                if !p.eat(&TokenKind::Comma) {
                    break;
                }
                trailing_comma = p.check(&TokenKind::RParen);
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RParen)?;

        if self.check(&TokenKind::Arrow) && !self.current.had_newline_before {
            let params = exprs_to_params(items)?;
            self.advance(); // =>
            return self.parse_arrow_body(params, false, start);
        }

        let is_arrow_only = items.is_empty()
            || trailing_comma
            || items.iter().any(|e| matches!(e.kind, ExprKind::Spread(_)));
        if is_arrow_only {
            return Err(self.unexpected("'=>'"));
        }

        if items.len() == 1 {
            if let Some(expr) = items.pop() {
                return Ok(expr);
            }
        }
        Ok(Expr::new(ExprKind::Sequence(items), self.span_from(start)))
    }

    pub(crate) fn parse_arrow_body(
        &mut self,
        params: Vec<Param>,
        is_async: bool,
        start: u32,
    ) -> Result<Expr, ParseError> {
        let body = self.with_function_context(is_async, false, |p| {
            if p.check(&TokenKind::LBrace) {
                Ok(ArrowBody::Block(p.parse_block_body()?))
            } else {
                Ok(ArrowBody::Expr(Box::new(p.parse_assign_expr()?)))
            }
        })?;
        Ok(Expr::new(
            ExprKind::Arrow(Box::new(ArrowFunction {
                params,
                body,
                is_async,
            })),
            self.span_from(start),
        ))
    }

    fn parse_array_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        self.advance(); // [

        let mut elements = Vec::new();
        self.with_allow_in(true, |p| {
            while !p.check(&TokenKind::RBracket) {
                if p.eat(&TokenKind::Comma) {
                    elements.push(None);
                    continue;
                }
                elements.push(Some(p.parse_spread_or_assign()?));
                if !p.check(&TokenKind::RBracket) {
                    p.expect(&TokenKind::Comma)?;
                }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RBracket)?;

        Ok(Expr::new(ExprKind::Array(elements), self.span_from(start)))
    }

    pub(crate) fn parse_object_literal(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        self.expect(&TokenKind::LBrace)?;

        let mut members = Vec::new();
        self.with_allow_in(true, |p| {
            while !p.check(&TokenKind::RBrace) {
                members.push(p.parse_object_member()?);
                if !p.check(&TokenKind::RBrace) {
                    p.expect(&TokenKind::Comma)?;
                }
            }
            Ok(())
        })?;
        self.expect(&TokenKind::RBrace)?;

        Ok(Expr::new(ExprKind::Object(members), self.span_from(start)))
    }

    fn parse_object_member(&mut self) -> Result<ObjectMember, ParseError> {
        if self.eat(&TokenKind::Spread) {
            return Ok(ObjectMember::Spread(self.parse_assign_expr()?));
        }

        let (is_async, is_generator, accessor) = self.parse_method_modifiers();
        let key_token = self.current.clone();
        let key = self.parse_property_key()?;

        if self.check(&TokenKind::LParen) || is_async || is_generator || accessor.is_some() {
            let func = self.parse_method_function(is_async, is_generator)?;
            let span = func.span;
            return Ok(ObjectMember::Property(Property {
                key,
                value: Expr::new(ExprKind::Function(Box::new(func)), span),
                kind: accessor.unwrap_or(PropertyKind::Method),
                shorthand: false,
            }));
        }

        if self.eat(&TokenKind::Colon) {
            return Ok(ObjectMember::Property(Property {
                key,
                value: self.parse_assign_expr()?,
                kind: PropertyKind::Init,
                shorthand: false,
            }));
        }

        // Shorthand `{ a }`, or `{ a = 1 }` inside a destructuring target
        let TokenKind::Identifier(name) = key_token.kind else {
            return Err(self.unexpected("':'"));
        };
        let ident = self.alloc_ident(name, key_token.span);
        let mut value = Expr::new(ExprKind::Ident(ident), key_token.span);
        if self.eat(&TokenKind::Eq) {
            let default = self.parse_assign_expr()?;
            value = Expr::new(
                ExprKind::Assign {
                    op: AssignOp::Assign,
                    left: Box::new(value),
                    right: Box::new(default),
                },
                self.span_from(key_token.span.start),
            );
        }
        Ok(ObjectMember::Property(Property {
            key,
            value,
            kind: PropertyKind::Init,
            shorthand: true,
        }))
    }

    fn parse_template(&mut self) -> Result<Template, ParseError> {
        let mut quasis = Vec::new();
        let mut exprs = Vec::new();

        match self.peek().clone() {
            TokenKind::TemplateNoSub(raw) => {
                self.advance();
                quasis.push(raw);
                return Ok(Template { quasis, exprs });
            }
            TokenKind::TemplateHead(raw) => {
                self.advance();
                quasis.push(raw);
            }
            _ => return Err(self.unexpected("template literal")),
        }

        loop {
            exprs.push(self.with_allow_in(true, |p| p.parse_expr())?);

            if !self.check(&TokenKind::RBrace) {
                return Err(self.unexpected("'}' in template literal"));
            }
            self.current = self.lexer.rescan_template_continuation(self.current.span.start);

            match self.peek().clone() {
                TokenKind::TemplateMiddle(raw) => {
                    self.advance();
                    quasis.push(raw);
                }
                TokenKind::TemplateTail(raw) => {
                    self.advance();
                    quasis.push(raw);
                    break;
                }
                _ => {
                    return Err(ParseError::new(
                        "Unterminated template literal",
                        self.current.span,
                    ))
                }
            }
        }

        Ok(Template { quasis, exprs })
    }
}

impl ExprKind {
    fn into_expr(self, span: Span) -> Expr {
        Expr::new(self, span)
    }
}

fn simple_param(ident: Ident) -> Param {
    Param {
        binding: Binding::new(BindingKind::Ident(ident), ident.span),
        default: None,
        rest: false,
    }
}

fn is_constructor_key(key: &PropertyKey) -> bool {
    match key {
        PropertyKey::Ident(name) => name == "constructor",
        PropertyKey::String(s) => s.value == "constructor",
        _ => false,
    }
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    let op = match kind {
        TokenKind::Eq => AssignOp::Assign,
        TokenKind::PlusEq => AssignOp::Add,
        TokenKind::MinusEq => AssignOp::Sub,
        TokenKind::StarEq => AssignOp::Mul,
        TokenKind::SlashEq => AssignOp::Div,
        TokenKind::PercentEq => AssignOp::Mod,
        TokenKind::StarStarEq => AssignOp::Exp,
        TokenKind::LtLtEq => AssignOp::Shl,
        TokenKind::GtGtEq => AssignOp::Shr,
        TokenKind::GtGtGtEq => AssignOp::UShr,
        TokenKind::AmpEq => AssignOp::BitAnd,
        TokenKind::PipeEq => AssignOp::BitOr,
        TokenKind::CaretEq => AssignOp::BitXor,
        TokenKind::AmpAmpEq => AssignOp::And,
        TokenKind::PipePipeEq => AssignOp::Or,
        TokenKind::QuestionQuestionEq => AssignOp::Nullish,
        _ => return None,
    };
    Some(op)
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    let op = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::StarStar => BinaryOp::Exp,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::BangEq => BinaryOp::NotEq,
        TokenKind::EqEqEq => BinaryOp::StrictEq,
        TokenKind::BangEqEq => BinaryOp::StrictNotEq,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::LtEq => BinaryOp::LtEq,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::GtEq => BinaryOp::GtEq,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Caret => BinaryOp::BitXor,
        TokenKind::LtLt => BinaryOp::Shl,
        TokenKind::GtGt => BinaryOp::Shr,
        TokenKind::GtGtGt => BinaryOp::UShr,
        TokenKind::AmpAmp => BinaryOp::And,
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::QuestionQuestion => BinaryOp::Nullish,
        TokenKind::In => BinaryOp::In,
        TokenKind::Instanceof => BinaryOp::Instanceof,
        _ => return None,
    };
    Some(op)
}

// =============================================================================
// Cover grammar: expressions reinterpreted as arrow parameters
// =============================================================================

fn exprs_to_params(exprs: Vec<Expr>) -> Result<Vec<Param>, ParseError> {
    exprs.into_iter().map(expr_to_param).collect()
}

fn expr_to_param(expr: Expr) -> Result<Param, ParseError> {
    match expr.kind {
        ExprKind::Spread(arg) => Ok(Param {
            binding: expr_to_binding(*arg)?,
            default: None,
            rest: true,
        }),
        ExprKind::Assign {
            op: AssignOp::Assign,
            left,
            right,
        } => Ok(Param {
            binding: expr_to_binding(*left)?,
            default: Some(*right),
            rest: false,
        }),
        _ => Ok(Param {
            binding: expr_to_binding(expr)?,
            default: None,
            rest: false,
        }),
    }
}

fn expr_to_binding(expr: Expr) -> Result<Binding, ParseError> {
    let span = expr.span;
    let kind = match expr.kind {
        ExprKind::Ident(ident) => BindingKind::Ident(ident),
        ExprKind::Array(elements) => {
            let elements = elements
                .into_iter()
                .map(|element| element.map(expr_to_array_element).transpose())
                .collect::<Result<Vec<_>, _>>()?;
            BindingKind::Array(elements)
        }
        ExprKind::Object(members) => {
            let props = members
                .into_iter()
                .map(member_to_pattern_prop)
                .collect::<Result<Vec<_>, _>>()?;
            BindingKind::Object(props)
        }
        _ => return Err(ParseError::new("Invalid destructuring target", span)),
    };
    Ok(Binding::new(kind, span))
}

fn expr_to_array_element(expr: Expr) -> Result<ArrayPatternElement, ParseError> {
    let param = expr_to_param(expr)?;
    Ok(ArrayPatternElement {
        binding: param.binding,
        default: param.default,
        rest: param.rest,
    })
}

fn member_to_pattern_prop(member: ObjectMember) -> Result<ObjectPatternProp, ParseError> {
    match member {
        ObjectMember::Spread(expr) => Ok(ObjectPatternProp::Rest(expr_to_binding(expr)?)),
        ObjectMember::Property(Property {
            key,
            value,
            kind: PropertyKind::Init,
            shorthand,
        }) => {
            let (value, default) = match value.kind {
                ExprKind::Assign {
                    op: AssignOp::Assign,
                    left,
                    right,
                } => (expr_to_binding(*left)?, Some(*right)),
                _ => (expr_to_binding(value)?, None),
            };
            Ok(ObjectPatternProp::KeyValue {
                key,
                value,
                default,
                shorthand,
            })
        }
        ObjectMember::Property(prop) => Err(ParseError::new(
            "Invalid destructuring target",
            prop.value.span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<Program, ParseError> {
        Parser::new(source, ParserOptions::default()).parse()
    }

    fn first_expr(program: &Program) -> &Expr {
        match &program.body[0].kind {
            StmtKind::Expr(expr) => expr,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn test_variable_declaration() {
        let program = parse("let x = 1, y;").unwrap();
        let StmtKind::Var(decl) = &program.body[0].kind else {
            panic!("expected var");
        };
        assert_eq!(decl.kind, VarKind::Let);
        assert_eq!(decl.decls.len(), 2);
    }

    #[test]
    fn test_let_as_identifier() {
        let program = parse("let = 5;").unwrap();
        assert!(matches!(
            first_expr(&program).kind,
            ExprKind::Assign { .. }
        ));
    }

    #[test]
    fn test_precedence() {
        let program = parse("1 + 2 * 3;").unwrap();
        let ExprKind::Binary { op, right, .. } = &first_expr(&program).kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert!(matches!(right.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_exponent_is_right_associative() {
        let program = parse("a ** b ** c;").unwrap();
        let ExprKind::Binary { left, .. } = &first_expr(&program).kind else {
            panic!("expected binary");
        };
        assert!(matches!(left.kind, ExprKind::Ident(_)));
    }

    #[test]
    fn test_arrow_functions() {
        let program = parse("const f = (a, { b, c: [d] }, ...rest) => a; const g = async x => x;").unwrap();
        assert_eq!(program.body.len(), 2);
        let StmtKind::Var(decl) = &program.body[0].kind else {
            panic!("expected var");
        };
        let Some(Expr {
            kind: ExprKind::Arrow(arrow),
            ..
        }) = &decl.decls[0].init
        else {
            panic!("expected arrow");
        };
        assert_eq!(arrow.params.len(), 3);
        assert!(arrow.params[2].rest);
    }

    #[test]
    fn test_regex_after_operator() {
        let program = parse("x = a / b; y = /re/g.test(s);").unwrap();
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_asi() {
        let program = parse("a = 1\nb = 2\nreturn_value()").unwrap();
        assert_eq!(program.body.len(), 3);
    }

    #[test]
    fn test_return_newline_terminates() {
        let program = parse("function f() { return\n1 }").unwrap();
        let StmtKind::Function(func) = &program.body[0].kind else {
            panic!("expected function");
        };
        assert!(matches!(func.body[0].kind, StmtKind::Return(None)));
    }

    #[test]
    fn test_class_members() {
        let program = parse(
            "class A extends B { static x = 1; #y; constructor() { super(); } get z() { return 1 } static { init() } async *gen() {} }",
        )
        .unwrap();
        let StmtKind::Class(class) = &program.body[0].kind else {
            panic!("expected class");
        };
        assert_eq!(class.body.len(), 6);
        assert!(matches!(
            class.body[2],
            ClassMember::Method {
                kind: MethodKind::Constructor,
                ..
            }
        ));
    }

    #[test]
    fn test_imports() {
        let program = parse(
            "import a, { b, c as d, default as e } from './x';\nimport * as ns from 'y';\nimport 'z';",
        )
        .unwrap();
        let StmtKind::Import(import) = &program.body[0].kind else {
            panic!("expected import");
        };
        assert_eq!(import.specifiers.len(), 4);
        assert_eq!(import.source.value, "./x");
        let local = import.specifiers[2].local();
        assert_eq!(program.name(&local), "d");
    }

    #[test]
    fn test_exports() {
        let program = parse(
            "export const a = 1;\nexport { a as b };\nexport * from './c';\nexport { x } from './d';\nexport default function () {}",
        )
        .unwrap();
        assert_eq!(program.body.len(), 5);
        assert!(program
            .body
            .iter()
            .all(|stmt| matches!(stmt.kind, StmtKind::Export(_))));
    }

    #[test]
    fn test_for_variants() {
        let program = parse(
            "for (let i = 0; i < n; i++) {}\nfor (const k in o) {}\nfor (x of xs) {}\nfor (;;) break;",
        )
        .unwrap();
        assert!(matches!(program.body[0].kind, StmtKind::For { .. }));
        assert!(matches!(program.body[1].kind, StmtKind::ForIn { .. }));
        assert!(matches!(program.body[2].kind, StmtKind::ForOf { .. }));
        assert!(matches!(program.body[3].kind, StmtKind::For { .. }));
    }

    #[test]
    fn test_template_with_nested_braces() {
        let program = parse("`a${ {b: 1}.b }c${d}`;").unwrap();
        let ExprKind::Template(template) = &first_expr(&program).kind else {
            panic!("expected template");
        };
        assert_eq!(template.quasis, vec!["a", "c", ""]);
        assert_eq!(template.exprs.len(), 2);
    }

    #[test]
    fn test_every_occurrence_gets_a_slot() {
        let program = parse("var a = a + a;").unwrap();
        assert_eq!(program.idents.len(), 3);
    }

    #[test]
    fn test_error_has_span() {
        let err = parse("var = 1;").unwrap_err();
        assert!(err.message.contains("Expected"));
        assert_eq!(err.span.start, 4);
    }
}
