//! jetpack-parser: JavaScript/JSX parser and code generator for the jetpack
//! bundler.
//!
//! # Design Principles
//!
//! 1. **Lexing on demand**
//!    - The lexer is pulled by the parser, not run upfront
//!    - Context-sensitive tokens (regex vs. division, template
//!      continuations, JSX text) are rescanned when the parser asks
//!
//! 2. **One slot per identifier occurrence**
//!    - Every identifier that can name a binding owns an entry in the
//!      program's [`IdentTable`]
//!    - Renaming a symbol rewrites its slots; the code generator reads names
//!      through the table, so no AST rewrite is needed
//!
//! 3. **JSX is lowered while parsing**
//!    - Elements become `React.createElement(...)` calls, so later passes
//!      only see plain JavaScript
//!
//! # Example
//!
//! ```
//! use jetpack_parser::{Codegen, CodegenOptions, Parser, ParserOptions};
//!
//! let program = Parser::new("const x = 1 + 2;", ParserOptions::default()).parse().unwrap();
//! let output = Codegen::new(&program, CodegenOptions::default()).generate();
//! assert_eq!(output, "const x = 1 + 2;\n");
//! ```

mod ast;
mod codegen;
mod jsx;
mod lexer;
mod parser;
mod span;
mod token;

// Re-exports
pub use ast::*;
pub use codegen::{Codegen, CodegenOptions, SourceMapping};
pub use jsx::is_intrinsic_element;
pub use lexer::Lexer;
pub use parser::{ParseError, Parser, ParserOptions};
pub use span::{LineIndex, Span};
pub use token::{is_reserved_word, keyword_from_str, Token, TokenKind};

/// Parse JavaScript source code into a [`Program`].
pub fn parse(source: &str, options: ParserOptions) -> Result<Program, ParseError> {
    Parser::new(source, options).parse()
}

/// Parse and generate JavaScript output.
pub fn transform(
    source: &str,
    parser_opts: ParserOptions,
    codegen_opts: CodegenOptions,
) -> Result<String, ParseError> {
    let program = parse(source, parser_opts)?;
    Ok(Codegen::new(&program, codegen_opts).generate())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_minify() {
        let output = transform(
            "const answer = 40 + 2;\nconsole.log(answer);",
            ParserOptions::default(),
            CodegenOptions {
                minify: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(output, "const answer=40+2;console.log(answer);");
    }

    #[test]
    fn test_transform_jsx() {
        let output = transform(
            "const el = <div className=\"a\">hi</div>;",
            ParserOptions { jsx: true },
            CodegenOptions::default(),
        )
        .unwrap();
        assert_eq!(
            output,
            "const el = React.createElement(\"div\", { className: \"a\" }, \"hi\");\n"
        );
    }

    #[test]
    fn test_parse_error_is_reported() {
        let err = parse("let = ;", ParserOptions::default()).unwrap_err();
        assert!(err.to_string().contains(" at "));
    }
}
