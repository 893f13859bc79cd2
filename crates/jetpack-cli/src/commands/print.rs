//! `jetpack print` command: parse one file and print it back.

use jetpack_core::fold::fold_program;
use jetpack_parser::{Codegen, CodegenOptions, LineIndex, ParserOptions};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use std::path::Path;

pub fn run(file: &Path, jsx: bool, constant_folding: bool, minify: bool) -> Result<()> {
    let source = std::fs::read_to_string(file)
        .into_diagnostic()
        .wrap_err(format!("Failed to read {}", file.display()))?;

    let mut program = jetpack_parser::parse(&source, ParserOptions { jsx }).map_err(|err| {
        let (line, col) = LineIndex::new(&source).line_col(err.span.start);
        miette!("{}:{}:{}: {}", file.display(), line + 1, col + 1, err.message)
    })?;
    if constant_folding {
        fold_program(&mut program);
    }

    let options = CodegenOptions {
        minify,
        source_map: false,
        indent: None,
    };
    let code = Codegen::new(&program, options).generate();
    print!("{code}");
    if minify && !code.is_empty() {
        println!();
    }
    Ok(())
}
