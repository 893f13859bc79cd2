//! Lexer (tokenizer) for JavaScript and JSX.
//!
//! The lexer is pulled on demand by the parser. A few tokens depend on
//! syntactic context the lexer cannot see (`/` vs. a regex literal, the
//! continuation of a template after `}`, text between JSX tags), so the
//! parser asks for those explicitly through the `rescan_*` methods.

use crate::span::Span;
use crate::token::{keyword_from_str, Token, TokenKind};

/// The lexer state.
#[derive(Clone)]
pub struct Lexer<'a> {
    source: &'a str,
    /// Source code as bytes (for fast indexing).
    bytes: &'a [u8],
    /// Current byte position.
    pos: usize,
    /// Start position of the current token.
    token_start: usize,
    /// A line terminator was skipped before the current token.
    newline_before: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            token_start: 0,
            newline_before: false,
        };
        // Hashbang
        if lexer.bytes.starts_with(b"#!") {
            lexer.skip_line_comment();
        }
        lexer
    }

    /// Current byte position.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token {
        self.newline_before = false;
        self.skip_whitespace_and_comments();
        self.token_start = self.pos;

        if self.is_eof() {
            return self.make_token(TokenKind::Eof);
        }

        let ch = self.current();
        let kind = match ch {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' | b'\\' => self.scan_identifier(),
            b'0'..=b'9' => self.scan_number(),
            b'"' | b'\'' => self.scan_string(ch),
            b'`' => {
                self.advance();
                self.scan_template_part(true)
            }
            b'#' => self.scan_private_name(),

            b'(' => self.single(TokenKind::LParen),
            b')' => self.single(TokenKind::RParen),
            b'{' => self.single(TokenKind::LBrace),
            b'}' => self.single(TokenKind::RBrace),
            b'[' => self.single(TokenKind::LBracket),
            b']' => self.single(TokenKind::RBracket),
            b';' => self.single(TokenKind::Semicolon),
            b',' => self.single(TokenKind::Comma),
            b':' => self.single(TokenKind::Colon),
            b'~' => self.single(TokenKind::Tilde),

            b'.' => self.scan_dot(),
            b'?' => self.scan_question(),
            b'+' => self.scan_plus(),
            b'-' => self.scan_minus(),
            b'*' => self.scan_star(),
            b'/' => self.scan_slash(),
            b'%' => self.with_eq(TokenKind::Percent, TokenKind::PercentEq),
            b'^' => self.with_eq(TokenKind::Caret, TokenKind::CaretEq),
            b'=' => self.scan_equals(),
            b'!' => self.scan_bang(),
            b'<' => self.scan_less_than(),
            b'>' => self.scan_greater_than(),
            b'&' => self.scan_doubled(b'&', TokenKind::Amp, TokenKind::AmpEq, TokenKind::AmpAmp, TokenKind::AmpAmpEq),
            b'|' => self.scan_doubled(b'|', TokenKind::Pipe, TokenKind::PipeEq, TokenKind::PipePipe, TokenKind::PipePipeEq),

            _ if ch >= 0x80 && self.current_char().is_some_and(is_id_start) => self.scan_identifier(),
            _ => {
                self.advance_char();
                TokenKind::Invalid
            }
        };

        self.make_token(kind)
    }

    /// Peek at the next token without consuming it.
    pub fn peek(&self) -> Token {
        self.clone().next_token()
    }

    /// Re-read a `/` or `/=` token starting at `start` as a regex literal.
    pub fn rescan_regex(&mut self, start: u32) -> Token {
        self.pos = start as usize;
        self.token_start = self.pos;
        let kind = self.scan_regex();
        self.make_token(kind)
    }

    /// Re-read from the `}` at `start` as a template middle or tail.
    pub fn rescan_template_continuation(&mut self, start: u32) -> Token {
        self.pos = start as usize;
        self.token_start = self.pos;
        self.advance(); // Skip }
        let kind = self.scan_template_part(false);
        self.make_token(kind)
    }

    /// Scan a JSX child starting at `start`: `<`, `{`, or a run of text.
    pub fn rescan_jsx_child(&mut self, start: u32) -> Token {
        self.pos = start as usize;
        self.token_start = self.pos;
        self.newline_before = false;

        if self.is_eof() {
            return self.make_token(TokenKind::Eof);
        }
        let kind = match self.current() {
            b'<' => self.single(TokenKind::Lt),
            b'{' => self.single(TokenKind::LBrace),
            _ => {
                while !self.is_eof() && !matches!(self.current(), b'<' | b'{') {
                    self.advance();
                }
                TokenKind::JsxText(self.token_slice().to_string())
            }
        };
        self.make_token(kind)
    }

    /// Re-read the `>`-prefixed token at `start` as a lone `>`. JSX closes
    /// tags with `>` even where the lexer saw `>>` or `>=`.
    pub fn rescan_gt(&mut self, start: u32) -> Token {
        self.pos = start as usize;
        self.token_start = self.pos;
        let kind = self.single(TokenKind::Gt);
        self.make_token(kind)
    }

    // === Helper methods ===

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes.get(self.pos).copied().unwrap_or(0)
    }

    fn peek_byte(&self) -> u8 {
        self.bytes.get(self.pos + 1).copied().unwrap_or(0)
    }

    fn current_char(&self) -> Option<char> {
        self.source.get(self.pos..).and_then(|rest| rest.chars().next())
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn advance_n(&mut self, n: usize) {
        self.pos += n;
    }

    fn advance_char(&mut self) {
        let len = self.current_char().map_or(1, char::len_utf8);
        self.pos += len;
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        Token::new(
            kind,
            Span::new(self.token_start as u32, self.pos as u32),
            self.newline_before,
        )
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.source.get(start..end).unwrap_or("")
    }

    fn token_slice(&self) -> &'a str {
        self.slice(self.token_start, self.pos)
    }

    // === Whitespace and comments ===

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                b' ' | b'\t' | b'\r' | 0x0b | 0x0c => self.advance(),
                b'\n' => {
                    self.newline_before = true;
                    self.advance();
                }
                b'/' if self.peek_byte() == b'/' => self.skip_line_comment(),
                b'/' if self.peek_byte() == b'*' => self.skip_block_comment(),
                ch if ch >= 0x80 => match self.current_char() {
                    Some(c @ ('\u{2028}' | '\u{2029}')) => {
                        self.newline_before = true;
                        self.pos += c.len_utf8();
                    }
                    Some(c) if c.is_whitespace() || c == '\u{feff}' => self.pos += c.len_utf8(),
                    _ => break,
                },
                _ => break,
            }
        }
    }

    fn skip_line_comment(&mut self) {
        self.advance_n(2);
        while !self.is_eof() && self.current() != b'\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance_n(2);
        while !self.is_eof() {
            if self.current() == b'*' && self.peek_byte() == b'/' {
                self.advance_n(2);
                return;
            }
            if self.current() == b'\n' {
                self.newline_before = true;
            }
            self.advance();
        }
    }

    // === Token scanning ===

    fn scan_identifier(&mut self) -> TokenKind {
        let mut escaped = false;
        while !self.is_eof() {
            match self.current() {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$' => self.advance(),
                b'\\' => {
                    // \uXXXX or \u{X...}
                    escaped = true;
                    self.advance();
                    if self.current() == b'u' {
                        self.advance();
                        let _ = self.scan_unicode_escape();
                    }
                }
                ch if ch >= 0x80 => match self.current_char() {
                    Some(c) if is_id_continue(c) => self.pos += c.len_utf8(),
                    _ => break,
                },
                _ => break,
            }
        }

        let ident = self.token_slice();
        if escaped {
            return TokenKind::Identifier(ident.to_string());
        }
        keyword_from_str(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }

    fn scan_private_name(&mut self) -> TokenKind {
        self.advance(); // Skip #
        let start = self.pos;
        while !self.is_eof() {
            match self.current() {
                b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'$' => self.advance(),
                ch if ch >= 0x80 => match self.current_char() {
                    Some(c) if is_id_continue(c) => self.pos += c.len_utf8(),
                    _ => break,
                },
                _ => break,
            }
        }
        if self.pos == start {
            return TokenKind::Invalid;
        }
        TokenKind::PrivateName(self.token_slice().to_string())
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;

        if self.current() == b'0' {
            let radix = match self.peek_byte() {
                b'x' | b'X' => Some(16),
                b'b' | b'B' => Some(2),
                b'o' | b'O' => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                return self.scan_radix_number(start, radix);
            }
        }

        self.skip_digits();
        if self.current() == b'.' {
            self.advance();
            self.skip_digits();
        }
        if matches!(self.current(), b'e' | b'E') {
            self.advance();
            if matches!(self.current(), b'+' | b'-') {
                self.advance();
            }
            self.skip_digits();
        }

        if self.current() == b'n' {
            self.advance();
            return TokenKind::BigInt(self.token_slice().to_string());
        }

        let raw = self.slice(start, self.pos);
        let digits: String = raw.chars().filter(|&c| c != '_').collect();
        TokenKind::Number {
            value: digits.parse().unwrap_or(f64::NAN),
            raw: raw.to_string(),
        }
    }

    fn skip_digits(&mut self) {
        while self.current().is_ascii_digit() || self.current() == b'_' {
            self.advance();
        }
    }

    fn scan_radix_number(&mut self, start: usize, radix: u32) -> TokenKind {
        self.advance_n(2); // Skip 0x / 0b / 0o
        while (self.current() as char).is_digit(radix) || self.current() == b'_' {
            self.advance();
        }

        if self.current() == b'n' {
            self.advance();
            return TokenKind::BigInt(self.token_slice().to_string());
        }

        let raw = self.slice(start, self.pos);
        let value = raw[2..]
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0f64, |acc, d| acc * radix as f64 + d as f64);
        TokenKind::Number {
            value,
            raw: raw.to_string(),
        }
    }

    fn scan_string(&mut self, quote: u8) -> TokenKind {
        let start = self.pos;
        self.advance(); // Skip opening quote

        let mut value = String::new();
        loop {
            if self.is_eof() || self.current() == b'\n' {
                return TokenKind::Invalid;
            }
            match self.current() {
                c if c == quote => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    self.advance();
                    if let Some(c) = self.scan_escape_sequence() {
                        value.push(c);
                    }
                }
                _ => {
                    if let Some(c) = self.current_char() {
                        value.push(c);
                    }
                    self.advance_char();
                }
            }
        }

        TokenKind::String {
            value,
            raw: self.slice(start, self.pos).to_string(),
        }
    }

    /// Decode the escape after a backslash. Line continuations yield `None`.
    fn scan_escape_sequence(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.advance_char();

        let decoded = match ch {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' if !self.current().is_ascii_digit() => '\0',
            'x' => self.scan_hex_digits(2),
            'u' => self.scan_unicode_escape(),
            '\r' => {
                if self.current() == b'\n' {
                    self.advance();
                }
                return None;
            }
            '\n' | '\u{2028}' | '\u{2029}' => return None,
            other => other,
        };
        Some(decoded)
    }

    fn scan_unicode_escape(&mut self) -> char {
        if self.current() != b'{' {
            return self.scan_hex_digits(4);
        }
        self.advance(); // Skip {
        let mut value = 0u32;
        while let Some(digit) = (self.current() as char).to_digit(16) {
            value = value.saturating_mul(16).saturating_add(digit);
            self.advance();
        }
        if self.current() == b'}' {
            self.advance();
        }
        char::from_u32(value).unwrap_or('\u{FFFD}')
    }

    fn scan_hex_digits(&mut self, len: usize) -> char {
        let mut value = 0u32;
        for _ in 0..len {
            match (self.current() as char).to_digit(16) {
                Some(digit) => {
                    value = value * 16 + digit;
                    self.advance();
                }
                None => break,
            }
        }
        char::from_u32(value).unwrap_or('\u{FFFD}')
    }

    /// Scan template text up to the closing backtick or the next `${`.
    /// The token carries the raw text, which codegen reproduces verbatim.
    fn scan_template_part(&mut self, head: bool) -> TokenKind {
        let start = self.pos;
        while !self.is_eof() {
            match self.current() {
                b'`' => {
                    let raw = self.slice(start, self.pos).to_string();
                    self.advance();
                    return if head {
                        TokenKind::TemplateNoSub(raw)
                    } else {
                        TokenKind::TemplateTail(raw)
                    };
                }
                b'$' if self.peek_byte() == b'{' => {
                    let raw = self.slice(start, self.pos).to_string();
                    self.advance_n(2);
                    return if head {
                        TokenKind::TemplateHead(raw)
                    } else {
                        TokenKind::TemplateMiddle(raw)
                    };
                }
                b'\\' => {
                    self.advance();
                    self.advance_char();
                }
                _ => self.advance(),
            }
        }

        // Unterminated template
        TokenKind::Invalid
    }

    fn scan_regex(&mut self) -> TokenKind {
        self.advance(); // Skip opening /
        let pattern_start = self.pos;

        let mut in_class = false;
        loop {
            if self.is_eof() || matches!(self.current(), b'\n' | b'\r') {
                return TokenKind::Invalid;
            }
            match self.current() {
                b'/' if !in_class => break,
                b'[' => {
                    in_class = true;
                    self.advance();
                }
                b']' => {
                    in_class = false;
                    self.advance();
                }
                b'\\' => {
                    self.advance();
                    self.advance_char();
                }
                _ => self.advance_char(),
            }
        }

        let pattern = self.slice(pattern_start, self.pos).to_string();
        self.advance(); // Skip closing /

        let flags_start = self.pos;
        while self.current().is_ascii_alphabetic() {
            self.advance();
        }
        let flags = self.slice(flags_start, self.pos).to_string();

        TokenKind::Regex { pattern, flags }
    }

    // === Multi-character operators ===

    fn with_eq(&mut self, plain: TokenKind, assign: TokenKind) -> TokenKind {
        self.advance();
        if self.current() == b'=' {
            self.advance();
            assign
        } else {
            plain
        }
    }

    /// `&`, `&=`, `&&`, `&&=` and the `|` family.
    fn scan_doubled(
        &mut self,
        ch: u8,
        single: TokenKind,
        single_eq: TokenKind,
        double: TokenKind,
        double_eq: TokenKind,
    ) -> TokenKind {
        self.advance();
        if self.current() == ch {
            self.with_eq(double, double_eq)
        } else if self.current() == b'=' {
            self.advance();
            single_eq
        } else {
            single
        }
    }

    fn scan_dot(&mut self) -> TokenKind {
        if self.peek_byte().is_ascii_digit() {
            return self.scan_number();
        }
        self.advance();
        if self.current() == b'.' && self.peek_byte() == b'.' {
            self.advance_n(2);
            TokenKind::Spread
        } else {
            TokenKind::Dot
        }
    }

    fn scan_question(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'?' => self.with_eq(TokenKind::QuestionQuestion, TokenKind::QuestionQuestionEq),
            // `a?.5:b` is a conditional, not optional chaining
            b'.' if !self.peek_byte().is_ascii_digit() => self.single(TokenKind::QuestionDot),
            _ => TokenKind::Question,
        }
    }

    fn scan_plus(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'+' => self.single(TokenKind::PlusPlus),
            b'=' => self.single(TokenKind::PlusEq),
            _ => TokenKind::Plus,
        }
    }

    fn scan_minus(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'-' => self.single(TokenKind::MinusMinus),
            b'=' => self.single(TokenKind::MinusEq),
            _ => TokenKind::Minus,
        }
    }

    fn scan_star(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'*' => self.with_eq(TokenKind::StarStar, TokenKind::StarStarEq),
            b'=' => self.single(TokenKind::StarEq),
            _ => TokenKind::Star,
        }
    }

    fn scan_slash(&mut self) -> TokenKind {
        self.with_eq(TokenKind::Slash, TokenKind::SlashEq)
    }

    fn scan_equals(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'=' => self.with_eq(TokenKind::EqEq, TokenKind::EqEqEq),
            b'>' => self.single(TokenKind::Arrow),
            _ => TokenKind::Eq,
        }
    }

    fn scan_bang(&mut self) -> TokenKind {
        self.advance();
        if self.current() == b'=' {
            self.with_eq(TokenKind::BangEq, TokenKind::BangEqEq)
        } else {
            TokenKind::Bang
        }
    }

    fn scan_less_than(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'<' => self.with_eq(TokenKind::LtLt, TokenKind::LtLtEq),
            b'=' => self.single(TokenKind::LtEq),
            _ => TokenKind::Lt,
        }
    }

    fn scan_greater_than(&mut self) -> TokenKind {
        self.advance();
        match self.current() {
            b'>' => {
                self.advance();
                match self.current() {
                    b'>' => self.with_eq(TokenKind::GtGtGt, TokenKind::GtGtGtEq),
                    b'=' => self.single(TokenKind::GtGtEq),
                    _ => TokenKind::GtGt,
                }
            }
            b'=' => self.single(TokenKind::GtEq),
            _ => TokenKind::Gt,
        }
    }
}

fn is_id_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_id_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\u{200c}' || c == '\u{200d}'
}
