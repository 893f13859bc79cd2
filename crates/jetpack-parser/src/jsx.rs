//! JSX parsing and lowering.
//!
//! JSX never reaches the AST: elements are lowered while parsing into
//! `React.createElement(tag, props, ...children)` calls, so scope analysis,
//! renaming and code generation only ever see plain JavaScript.
//!
//! Text between tags is read with [`Lexer::rescan_jsx_child`] so that quotes
//! and other punctuation inside text are not tokenized as JavaScript.
//!
//! [`Lexer::rescan_jsx_child`]: crate::lexer::Lexer::rescan_jsx_child

use crate::ast::*;
use crate::parser::{ParseError, Parser};
use crate::span::Span;
use crate::token::{Token, TokenKind};

/// The function JSX elements are lowered to.
const PRAGMA_OBJECT: &str = "React";
const PRAGMA_CREATE: &str = "createElement";
const PRAGMA_FRAGMENT: &str = "Fragment";

/// Check if a tag name is an intrinsic element (lowercase) or component (uppercase).
pub fn is_intrinsic_element(name: &str) -> bool {
    name.chars()
        .next()
        .map(|c| c.is_ascii_lowercase())
        .unwrap_or(false)
        || name.contains('-')
        || name.contains(':')
}

impl<'a> Parser<'a> {
    /// Parse a JSX element or fragment starting at `<` and return the lowered
    /// call expression. On return the parser is positioned after the final `>`.
    pub(crate) fn parse_jsx_element(&mut self) -> Result<Expr, ParseError> {
        let start = self.current.span.start;
        self.expect(&TokenKind::Lt)?;

        // Fragment: `<>children</>`
        if self.at_jsx_gt() {
            let children = self.parse_jsx_children(self.current.span.end)?;
            self.expect_jsx_closing(None)?;
            let span = self.span_from(start);
            let tag = self.pragma_member(PRAGMA_FRAGMENT, span);
            return Ok(self.create_element(tag, None, children, span));
        }

        let (name, name_span) = self.parse_jsx_name()?;
        let tag = self.jsx_tag_expr(&name, name_span);
        let props = self.parse_jsx_attributes()?;

        // Self-closing: `<Tag ... />`
        if self.eat(&TokenKind::Slash) {
            if !self.at_jsx_gt() {
                return Err(self.unexpected("'>' after '/' in JSX element"));
            }
            self.advance();
            let span = self.span_from(start);
            return Ok(self.create_element(tag, props, Vec::new(), span));
        }

        if !self.at_jsx_gt() {
            return Err(self.unexpected("'>' or '/>' in JSX element"));
        }
        let children = self.parse_jsx_children(self.current.span.end)?;
        self.expect_jsx_closing(Some(&name))?;

        let span = self.span_from(start);
        Ok(self.create_element(tag, props, children, span))
    }

    /// True if the current token starts with `>`. Tokens like `>>` or `>=`
    /// are split so that the current token is a lone `>`.
    fn at_jsx_gt(&mut self) -> bool {
        match self.peek() {
            TokenKind::Gt => true,
            TokenKind::GtEq
            | TokenKind::GtGt
            | TokenKind::GtGtGt
            | TokenKind::GtGtEq
            | TokenKind::GtGtGtEq => {
                self.current = self.lexer.rescan_gt(self.current.span.start);
                true
            }
            _ => false,
        }
    }

    /// Parse children starting at byte `pos` up to (not including) the `</`
    /// of the closing tag. Leaves the parser on the closing tag's `/`.
    fn parse_jsx_children(&mut self, mut pos: u32) -> Result<Vec<Expr>, ParseError> {
        let mut children = Vec::new();

        loop {
            let Token { kind, span, .. } = self.lexer.rescan_jsx_child(pos);
            match kind {
                TokenKind::Eof => {
                    return Err(ParseError::new("Unterminated JSX contents", span));
                }
                TokenKind::JsxText(raw) => {
                    let text = clean_jsx_text(&raw);
                    if !text.is_empty() {
                        children.push(Expr::new(ExprKind::String(StrLit::new(text)), span));
                    }
                    pos = span.end;
                }
                TokenKind::LBrace => {
                    self.current = Token::new(kind, span, false);
                    self.advance();
                    if !self.check(&TokenKind::RBrace) {
                        let expr = if self.eat(&TokenKind::Spread) {
                            let start = self.prev_end;
                            let arg = self.parse_assign_expr()?;
                            Expr::new(ExprKind::Spread(Box::new(arg)), self.span_from(start))
                        } else {
                            self.with_allow_in(true, |p| p.parse_expr())?
                        };
                        children.push(expr);
                    }
                    if !self.check(&TokenKind::RBrace) {
                        return Err(self.unexpected("'}' in JSX expression"));
                    }
                    pos = self.current.span.end;
                }
                TokenKind::Lt => {
                    self.current = Token::new(kind, span, false);
                    if matches!(self.lexer.peek().kind, TokenKind::Slash) {
                        self.advance();
                        return Ok(children);
                    }
                    children.push(self.parse_jsx_element()?);
                    pos = self.prev_end;
                }
                _ => return Err(ParseError::new("Unexpected token in JSX", span)),
            }
        }
    }

    /// Consume `/name>` (or `/>` for fragments). The parser is left after
    /// the final `>`.
    fn expect_jsx_closing(&mut self, name: Option<&str>) -> Result<(), ParseError> {
        self.expect(&TokenKind::Slash)?;
        let close_start = self.current.span.start;
        match name {
            None => {
                if !self.at_jsx_gt() {
                    return Err(self.unexpected("'>' to close JSX fragment"));
                }
            }
            Some(expected) => {
                let (found, _) = self.parse_jsx_name()?;
                if found != expected {
                    return Err(ParseError::new(
                        format!("Expected closing tag '</{expected}>', found '</{found}>'"),
                        self.span_from(close_start),
                    ));
                }
                if !self.at_jsx_gt() {
                    return Err(self.unexpected("'>' in JSX closing tag"));
                }
            }
        }
        self.advance();
        Ok(())
    }

    /// Parse a tag name as written: `div`, `my-element`, `svg:rect`, `Foo.Bar`.
    fn parse_jsx_name(&mut self) -> Result<(String, Span), ParseError> {
        let start = self.current.span.start;
        let mut name = self.parse_jsx_identifier()?;

        if self.eat(&TokenKind::Colon) {
            name.push(':');
            name.push_str(&self.parse_jsx_identifier()?);
        } else {
            while self.eat(&TokenKind::Dot) {
                name.push('.');
                name.push_str(&self.parse_jsx_identifier()?);
            }
        }
        Ok((name, self.span_from(start)))
    }

    /// An identifier that may contain `-` and may be a reserved word.
    fn parse_jsx_identifier(&mut self) -> Result<String, ParseError> {
        let mut name = match self.peek() {
            TokenKind::Identifier(name) => name.clone(),
            kind => match kind.keyword_str() {
                Some(word) => word.to_string(),
                None => return Err(self.unexpected("JSX identifier")),
            },
        };
        self.advance();

        // `data-id`: the lexer splits this into `data`, `-`, `id`
        while self.check(&TokenKind::Minus) && self.current.span.start == self.prev_end {
            self.advance();
            name.push('-');
            let adjacent = self.current.span.start == self.prev_end;
            match self.peek() {
                TokenKind::Identifier(part) if adjacent => name.push_str(part),
                kind if adjacent && kind.keyword_str().is_some() => {
                    name.push_str(kind.keyword_str().unwrap_or_default());
                }
                _ => continue,
            }
            self.advance();
        }
        Ok(name)
    }

    /// Build the first argument of `createElement` for a tag name.
    fn jsx_tag_expr(&mut self, name: &str, span: Span) -> Expr {
        if is_intrinsic_element(name) && !name.contains('.') {
            return Expr::new(ExprKind::String(StrLit::new(name)), span);
        }

        let mut parts = name.split('.');
        let root = parts.next().unwrap_or_default();
        let mut expr = if root == "this" {
            Expr::new(ExprKind::This, span)
        } else {
            let ident = self.alloc_ident(root, span);
            Expr::new(ExprKind::Ident(ident), span)
        };
        for part in parts {
            expr = Expr::new(
                ExprKind::Member {
                    object: Box::new(expr),
                    property: part.to_string(),
                    optional: false,
                },
                span,
            );
        }
        expr
    }

    /// Parse attributes up to `>` or `/>`. Returns `None` when there are none.
    fn parse_jsx_attributes(&mut self) -> Result<Option<Expr>, ParseError> {
        let start = self.current.span.start;
        let mut members = Vec::new();

        loop {
            if self.check(&TokenKind::Slash) || self.at_jsx_gt() || self.is_eof() {
                break;
            }

            // Spread attribute: `{...props}`
            if self.eat(&TokenKind::LBrace) {
                self.expect(&TokenKind::Spread)?;
                let arg = self.parse_assign_expr()?;
                self.expect(&TokenKind::RBrace)?;
                members.push(ObjectMember::Spread(arg));
                continue;
            }

            let attr_start = self.current.span.start;
            let mut name = self.parse_jsx_identifier()?;
            if self.eat(&TokenKind::Colon) {
                name.push(':');
                name.push_str(&self.parse_jsx_identifier()?);
            }

            let value = if self.eat(&TokenKind::Eq) {
                self.parse_jsx_attribute_value()?
            } else {
                Expr::new(ExprKind::Bool(true), self.span_from(attr_start))
            };

            let key = if name.contains('-') || name.contains(':') {
                PropertyKey::String(StrLit::new(name))
            } else {
                PropertyKey::Ident(name)
            };
            members.push(ObjectMember::Property(Property {
                key,
                value,
                kind: PropertyKind::Init,
                shorthand: false,
            }));
        }

        if members.is_empty() {
            return Ok(None);
        }
        Ok(Some(Expr::new(ExprKind::Object(members), self.span_from(start))))
    }

    fn parse_jsx_attribute_value(&mut self) -> Result<Expr, ParseError> {
        let span = self.current.span;
        match self.peek().clone() {
            TokenKind::String { value, raw } => {
                self.advance();
                Ok(Expr::new(
                    ExprKind::String(StrLit {
                        value,
                        raw: Some(raw),
                    }),
                    span,
                ))
            }
            TokenKind::LBrace => {
                self.advance();
                let expr = self.parse_assign_expr()?;
                self.expect(&TokenKind::RBrace)?;
                Ok(expr)
            }
            TokenKind::Lt => self.parse_jsx_element(),
            _ => Err(self.unexpected("JSX attribute value")),
        }
    }

    /// `React.<property>`
    fn pragma_member(&mut self, property: &str, span: Span) -> Expr {
        let object = self.alloc_ident(PRAGMA_OBJECT, span);
        Expr::new(
            ExprKind::Member {
                object: Box::new(Expr::new(ExprKind::Ident(object), span)),
                property: property.to_string(),
                optional: false,
            },
            span,
        )
    }

    fn create_element(
        &mut self,
        tag: Expr,
        props: Option<Expr>,
        children: Vec<Expr>,
        span: Span,
    ) -> Expr {
        let callee = self.pragma_member(PRAGMA_CREATE, span);
        let mut args = Vec::with_capacity(children.len() + 2);
        args.push(tag);
        args.push(props.unwrap_or_else(|| Expr::new(ExprKind::Null, span)));
        args.extend(children);

        Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                args,
                optional: false,
            },
            span,
        )
    }
}

/// Collapse JSX text the way React does: lines are trimmed, lines that are
/// only whitespace are dropped and the remaining lines are joined with a
/// single space. Entities are decoded afterwards.
fn clean_jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| !matches!(c, ' ' | '\t' | '\r')));

    let Some(last_non_empty) = last_non_empty else {
        return String::new();
    };

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let line = line.replace('\t', " ");
        let mut trimmed = line.as_str();
        if i != 0 {
            trimmed = trimmed.trim_start_matches([' ', '\r']);
        }
        if i != lines.len() - 1 {
            trimmed = trimmed.trim_end_matches([' ', '\r']);
        }
        if trimmed.is_empty() {
            continue;
        }
        out.push_str(trimmed);
        if i != last_non_empty {
            out.push(' ');
        }
    }
    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            decode_entity(entity).map(|c| (c, end + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = entity.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    let c = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '\u{a9}',
        "hellip" => '\u{2026}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserOptions;

    fn parse_jsx(source: &str) -> Program {
        Parser::new(source, ParserOptions { jsx: true }).parse().unwrap()
    }

    fn call_args(program: &Program) -> &[Expr] {
        let StmtKind::Expr(expr) = &program.body[0].kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call { args, .. } = &expr.kind else {
            panic!("expected call, got {:?}", expr.kind);
        };
        args
    }

    #[test]
    fn test_intrinsic_element() {
        let program = parse_jsx("<div>hello</div>;");
        let args = call_args(&program);

        assert_eq!(args.len(), 3);
        assert!(matches!(&args[0].kind, ExprKind::String(s) if s.value == "div"));
        assert!(matches!(args[1].kind, ExprKind::Null));
        assert!(matches!(&args[2].kind, ExprKind::String(s) if s.value == "hello"));
    }

    #[test]
    fn test_component_tag_is_a_reference() {
        let program = parse_jsx("<Foo.Bar />;");
        let args = call_args(&program);

        let ExprKind::Member { object, property, .. } = &args[0].kind else {
            panic!("expected member tag");
        };
        assert_eq!(property, "Bar");
        let ExprKind::Ident(ident) = &object.kind else {
            panic!("expected identifier");
        };
        assert_eq!(program.name(ident), "Foo");
    }

    #[test]
    fn test_attributes() {
        let program = parse_jsx(r#"<input type="text" disabled data-id={id} {...rest} />;"#);
        let args = call_args(&program);

        let ExprKind::Object(members) = &args[1].kind else {
            panic!("expected props object");
        };
        assert_eq!(members.len(), 4);
        let ObjectMember::Property(p) = &members[1] else {
            panic!("expected property");
        };
        assert!(matches!(p.value.kind, ExprKind::Bool(true)));
        let ObjectMember::Property(p) = &members[2] else {
            panic!("expected property");
        };
        assert!(matches!(&p.key, PropertyKey::String(s) if s.value == "data-id"));
        assert!(matches!(members[3], ObjectMember::Spread(_)));
    }

    #[test]
    fn test_nested_children_and_expressions() {
        let program = parse_jsx("<ul>\n  <li>{item}</li>\n  {/* comment */}\n  <li>it's</li>\n</ul>;");
        let args = call_args(&program);

        // tag, props, two <li> elements; whitespace-only text and the empty
        // expression container produce nothing
        assert_eq!(args.len(), 4);
        assert!(matches!(args[2].kind, ExprKind::Call { .. }));
        assert!(matches!(args[3].kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_fragment() {
        let program = parse_jsx("<><a /><b /></>;");
        let args = call_args(&program);

        assert!(matches!(&args[0].kind, ExprKind::Member { property, .. } if property == "Fragment"));
        assert_eq!(args.len(), 4);
    }

    #[test]
    fn test_element_in_expression_position() {
        let program = parse_jsx("const el = cond ? <a>x</a> : null;\nlet n = a > b;");
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn test_mismatched_closing_tag() {
        let err = Parser::new("<a></b>;", ParserOptions { jsx: true })
            .parse()
            .unwrap_err();
        assert!(err.message.contains("</a>"));
    }

    #[test]
    fn test_clean_jsx_text() {
        assert_eq!(clean_jsx_text("  hello  "), "  hello  ");
        assert_eq!(clean_jsx_text("\n  hello\n  world\n"), "hello world");
        assert_eq!(clean_jsx_text("\n   \n"), "");
        assert_eq!(clean_jsx_text("a &amp; b &#65;&#x42; &bogus;"), "a & b AB &bogus;");
    }
}
