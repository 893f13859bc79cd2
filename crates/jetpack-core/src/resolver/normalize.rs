//! `export default` normalization.
//!
//! Rewrites every `export default` into an ordinary binding before scopes
//! are built, so renaming only ever deals with plain variables:
//!
//! - `export default <expr>;` becomes `var _default = <expr>;`
//! - `export default function () {}` becomes `function _default() {}`
//! - `export default function name() {}` becomes `function name() {}`
//!   followed by `var _default = name;`
//!
//! Classes follow the function rules.

use crate::name_generator::DEFAULT_EXPORT_NAME;
use jetpack_parser::*;

/// Normalize `export default` in `program`. Returns the name of the local
/// binding that now holds the default export, if there is one.
pub fn normalize_export_default(program: &mut Program) -> Option<String> {
    let body = std::mem::take(&mut program.body);
    let mut out = Vec::with_capacity(body.len() + 1);
    let mut default_local = None;

    for stmt in body {
        let span = stmt.span;
        let decl = match stmt.kind {
            StmtKind::Export(decl) => *decl,
            kind => {
                out.push(Stmt::new(kind, span));
                continue;
            }
        };
        let default = match decl {
            ExportDecl::Default(default) => default,
            other => {
                out.push(Stmt::new(StmtKind::Export(Box::new(other)), span));
                continue;
            }
        };

        match default {
            ExportDefault::Expr(expr) => {
                out.push(default_var(&mut program.idents, expr, span));
                default_local = Some(DEFAULT_EXPORT_NAME.to_string());
            }
            ExportDefault::Function(mut func) => match func.id {
                Some(id) => {
                    let name = program.idents.name(id.id).to_string();
                    out.push(Stmt::new(StmtKind::Function(Box::new(func)), span));
                    out.push(alias_var(&mut program.idents, &name, span));
                    default_local = Some(name);
                }
                None => {
                    func.id = Some(Ident::new(program.idents.alloc(DEFAULT_EXPORT_NAME), span));
                    out.push(Stmt::new(StmtKind::Function(Box::new(func)), span));
                    default_local = Some(DEFAULT_EXPORT_NAME.to_string());
                }
            },
            ExportDefault::Class(mut class) => match class.id {
                Some(id) => {
                    let name = program.idents.name(id.id).to_string();
                    out.push(Stmt::new(StmtKind::Class(Box::new(class)), span));
                    out.push(alias_var(&mut program.idents, &name, span));
                    default_local = Some(name);
                }
                None => {
                    class.id = Some(Ident::new(program.idents.alloc(DEFAULT_EXPORT_NAME), span));
                    out.push(Stmt::new(StmtKind::Class(Box::new(class)), span));
                    default_local = Some(DEFAULT_EXPORT_NAME.to_string());
                }
            },
        }
    }

    program.body = out;
    default_local
}

/// `var _default = <init>;`
fn default_var(idents: &mut IdentTable, init: Expr, span: Span) -> Stmt {
    let ident = Ident::new(idents.alloc(DEFAULT_EXPORT_NAME), span);
    Stmt::new(
        StmtKind::Var(VarDecl {
            kind: VarKind::Var,
            decls: vec![VarDeclarator {
                binding: Binding::new(BindingKind::Ident(ident), span),
                init: Some(init),
            }],
        }),
        span,
    )
}

/// `var _default = <name>;`
fn alias_var(idents: &mut IdentTable, name: &str, span: Span) -> Stmt {
    let reference = Ident::new(idents.alloc(name), span);
    default_var(idents, Expr::new(ExprKind::Ident(reference), span), span)
}
