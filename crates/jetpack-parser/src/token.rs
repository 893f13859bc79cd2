//! Token types.
//!
//! Contextual keywords (`let`, `async`, `await`, `yield`, `of`, `from`,
//! `as`, `get`, `set`, `static`) are lexed as identifiers; the parser
//! decides their meaning from context.

use crate::span::Span;

/// A token with its kind and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// A line terminator appeared between the previous token and this one.
    pub had_newline_before: bool,
}

impl Token {
    #[inline]
    pub const fn new(kind: TokenKind, span: Span, had_newline_before: bool) -> Self {
        Self {
            kind,
            span,
            had_newline_before,
        }
    }
}

/// The kind of token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // === Literals ===
    /// Identifier or contextual keyword: `foo`, `let`, `async`
    Identifier(String),
    /// Private class member name including the `#`: `#count`
    PrivateName(String),
    /// String literal. `raw` keeps the quotes exactly as written.
    String { value: String, raw: String },
    /// Number literal. `raw` keeps the source spelling (`0xff`, `1e3`).
    Number { value: f64, raw: String },
    /// BigInt literal, raw text including the `n` suffix.
    BigInt(String),
    /// Regular expression: `/pattern/flags`
    Regex { pattern: String, flags: String },
    /// `` `text` `` (raw text between the backticks)
    TemplateNoSub(String),
    /// `` `text${ ``
    TemplateHead(String),
    /// `` }text${ ``
    TemplateMiddle(String),
    /// `` }text` ``
    TemplateTail(String),
    /// Raw text between JSX tags.
    JsxText(String),

    // === Keywords ===
    Var,
    Const,
    Function,
    Class,
    If,
    Else,
    Switch,
    Case,
    Default,
    For,
    While,
    Do,
    Break,
    Continue,
    Return,
    Try,
    Catch,
    Finally,
    Throw,
    New,
    Delete,
    Typeof,
    Void,
    In,
    Instanceof,
    This,
    Super,
    Null,
    True,
    False,
    Import,
    Export,
    Extends,
    With,
    Debugger,

    // === Punctuation ===
    LParen,     // (
    RParen,     // )
    LBrace,     // {
    RBrace,     // }
    LBracket,   // [
    RBracket,   // ]
    Semicolon,  // ;
    Comma,      // ,
    Colon,      // :
    Dot,        // .
    Question,   // ?
    QuestionDot, // ?.
    Arrow,      // =>
    Spread,     // ...

    // === Operators ===
    Eq,         // =
    PlusEq,     // +=
    MinusEq,    // -=
    StarEq,     // *=
    SlashEq,    // /=
    PercentEq,  // %=
    StarStarEq, // **=
    AmpEq,      // &=
    PipeEq,     // |=
    CaretEq,    // ^=
    LtLtEq,     // <<=
    GtGtEq,     // >>=
    GtGtGtEq,   // >>>=
    AmpAmpEq,   // &&=
    PipePipeEq, // ||=
    QuestionQuestionEq, // ??=

    EqEq,       // ==
    EqEqEq,     // ===
    BangEq,     // !=
    BangEqEq,   // !==
    Lt,         // <
    LtEq,       // <=
    Gt,         // >
    GtEq,       // >=

    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Percent,    // %
    StarStar,   // **
    PlusPlus,   // ++
    MinusMinus, // --

    Amp,        // &
    Pipe,       // |
    Caret,      // ^
    Tilde,      // ~
    LtLt,       // <<
    GtGt,       // >>
    GtGtGt,     // >>>

    AmpAmp,     // &&
    PipePipe,   // ||
    Bang,       // !
    QuestionQuestion, // ??

    // === Special ===
    Eof,
    /// Unrecognized input or unterminated literal.
    Invalid,
}

impl TokenKind {
    /// True for tokens after which a `/` is a division operator rather than
    /// the start of a regular expression.
    pub fn ends_expression(&self) -> bool {
        matches!(
            self,
            TokenKind::Identifier(_)
                | TokenKind::PrivateName(_)
                | TokenKind::String { .. }
                | TokenKind::Number { .. }
                | TokenKind::BigInt(_)
                | TokenKind::Regex { .. }
                | TokenKind::TemplateNoSub(_)
                | TokenKind::TemplateTail(_)
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
                | TokenKind::This
                | TokenKind::Super
                | TokenKind::Null
                | TokenKind::True
                | TokenKind::False
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus
        )
    }

    /// Spelling of a reserved word, used where any identifier name is
    /// allowed (`a.default`, `{ new: 1 }`, `export { x as default }`).
    pub fn keyword_str(&self) -> Option<&'static str> {
        let s = match self {
            TokenKind::Var => "var",
            TokenKind::Const => "const",
            TokenKind::Function => "function",
            TokenKind::Class => "class",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::For => "for",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Try => "try",
            TokenKind::Catch => "catch",
            TokenKind::Finally => "finally",
            TokenKind::Throw => "throw",
            TokenKind::New => "new",
            TokenKind::Delete => "delete",
            TokenKind::Typeof => "typeof",
            TokenKind::Void => "void",
            TokenKind::In => "in",
            TokenKind::Instanceof => "instanceof",
            TokenKind::This => "this",
            TokenKind::Super => "super",
            TokenKind::Null => "null",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Import => "import",
            TokenKind::Export => "export",
            TokenKind::Extends => "extends",
            TokenKind::With => "with",
            TokenKind::Debugger => "debugger",
            _ => return None,
        };
        Some(s)
    }

    pub fn is_assignment(&self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::PlusEq
                | TokenKind::MinusEq
                | TokenKind::StarEq
                | TokenKind::SlashEq
                | TokenKind::PercentEq
                | TokenKind::StarStarEq
                | TokenKind::AmpEq
                | TokenKind::PipeEq
                | TokenKind::CaretEq
                | TokenKind::LtLtEq
                | TokenKind::GtGtEq
                | TokenKind::GtGtGtEq
                | TokenKind::AmpAmpEq
                | TokenKind::PipePipeEq
                | TokenKind::QuestionQuestionEq
        )
    }

    /// Binding power of a binary operator (higher binds tighter).
    pub fn binary_precedence(&self) -> Option<u8> {
        match self {
            TokenKind::QuestionQuestion => Some(1),
            TokenKind::PipePipe => Some(2),
            TokenKind::AmpAmp => Some(3),
            TokenKind::Pipe => Some(4),
            TokenKind::Caret => Some(5),
            TokenKind::Amp => Some(6),
            TokenKind::EqEq | TokenKind::EqEqEq | TokenKind::BangEq | TokenKind::BangEqEq => Some(7),
            TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq
            | TokenKind::In
            | TokenKind::Instanceof => Some(8),
            TokenKind::LtLt | TokenKind::GtGt | TokenKind::GtGtGt => Some(9),
            TokenKind::Plus | TokenKind::Minus => Some(10),
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Some(11),
            TokenKind::StarStar => Some(12),
            _ => None,
        }
    }

    pub fn is_right_associative(&self) -> bool {
        matches!(self, TokenKind::StarStar)
    }
}

/// Look up a reserved word.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    let kind = match s {
        "var" => TokenKind::Var,
        "const" => TokenKind::Const,
        "function" => TokenKind::Function,
        "class" => TokenKind::Class,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "for" => TokenKind::For,
        "while" => TokenKind::While,
        "do" => TokenKind::Do,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "new" => TokenKind::New,
        "delete" => TokenKind::Delete,
        "typeof" => TokenKind::Typeof,
        "void" => TokenKind::Void,
        "in" => TokenKind::In,
        "instanceof" => TokenKind::Instanceof,
        "this" => TokenKind::This,
        "super" => TokenKind::Super,
        "null" => TokenKind::Null,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "extends" => TokenKind::Extends,
        "with" => TokenKind::With,
        "debugger" => TokenKind::Debugger,
        _ => return None,
    };
    Some(kind)
}

/// Words that can never be used as a binding name. Minifiers must not emit
/// these.
pub fn is_reserved_word(s: &str) -> bool {
    keyword_from_str(s).is_some()
        || matches!(
            s,
            "let"
                | "static"
                | "yield"
                | "await"
                | "enum"
                | "implements"
                | "interface"
                | "package"
                | "private"
                | "protected"
                | "public"
                | "arguments"
                | "eval"
                | "undefined"
                | "NaN"
                | "Infinity"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contextual_keywords_are_not_reserved_tokens() {
        assert_eq!(keyword_from_str("let"), None);
        assert_eq!(keyword_from_str("async"), None);
        assert_eq!(keyword_from_str("of"), None);
        assert_eq!(keyword_from_str("typeof"), Some(TokenKind::Typeof));
    }

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved_word("do"));
        assert!(is_reserved_word("in"));
        assert!(is_reserved_word("let"));
        assert!(!is_reserved_word("a"));
        assert!(!is_reserved_word("of"));
    }

    #[test]
    fn test_keyword_str_round_trips() {
        for word in ["default", "new", "class", "import"] {
            let kind = keyword_from_str(word).unwrap();
            assert_eq!(kind.keyword_str(), Some(word));
        }
    }
}
