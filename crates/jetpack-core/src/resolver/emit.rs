//! Bundle emission.
//!
//! Modules are printed dependencies first. Imports of bundled modules and
//! all `export` syntax are stripped (bindings are already shared through
//! renaming), namespace objects are materialized as `var mod_<id> = {...}`
//! and, in library mode, the entry's exports are re-declared at the end.

use super::link::{binding_name, export_names, resolve_export, resolve_local, ResolvedBinding};
use crate::config::{BundleConfig, BundleFlags};
use crate::error::{Error, Result};
use crate::module_file::{ModuleFile, ModuleId, ModuleState};
use crate::sourcemap::{Segment, SourceMapBuilder};
use jetpack_parser::*;
use rayon::prelude::*;
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::collections::BTreeSet;

/// Bundle output.
#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    /// The bundled code.
    pub code: String,
    /// Source map JSON (if enabled).
    pub map: Option<String>,
    /// Paths of the emitted modules, in output order.
    pub modules: Vec<String>,
    /// Warnings during emission.
    pub warnings: Vec<String>,
}

/// Emit every module reachable from `entry`. `map_file` names the bundle
/// inside the source map.
pub(crate) fn emit_bundle(
    modules: &mut [ModuleFile],
    entry: ModuleId,
    config: &BundleConfig,
    map_file: &str,
) -> Result<BundleOutput> {
    let order = emit_order(modules, entry);
    let mut warnings = Vec::new();

    let mut namespaces = BTreeSet::new();
    for &id in &order {
        for binding in modules[id.index()].imports() {
            if let Some(ResolvedBinding::Namespace(target)) = resolve_local(modules, id, &binding.local) {
                namespaces.insert(target);
            }
        }
    }

    let library_exports: Vec<(String, ResolvedBinding)> = if config.library() {
        export_names(modules, entry)
            .into_iter()
            .filter_map(|name| resolve_export(modules, entry, &name).map(|binding| (name, binding)))
            .collect()
    } else {
        Vec::new()
    };
    for (_, binding) in &library_exports {
        if let ResolvedBinding::Namespace(target) = binding {
            namespaces.insert(*target);
        }
    }

    let namespace_objects: HashMap<ModuleId, Program> = namespaces
        .iter()
        .map(|&target| (target, namespace_object(modules, target)))
        .collect();
    let export_statement = library_export_statement(modules, &library_exports);

    for &id in &order {
        let bundled: HashSet<String> = modules[id.index()]
            .dependencies()
            .iter()
            .filter(|dep| {
                dep.target
                    .and_then(|target| modules.get(target.index()))
                    .is_some_and(|target| !target.is_failed())
            })
            .map(|dep| dep.specifier.clone())
            .collect();
        let keep_external = config.library() && id == entry;
        let module = &mut modules[id.index()];
        let path = module.path().to_string();
        if let Some(program) = module.ast.as_mut() {
            strip_module_syntax(program, &bundled, keep_external, &path, &mut warnings);
        }
    }

    let options = config.codegen_options();
    let shared: &[ModuleFile] = modules;
    let chunks: Vec<(String, Vec<SourceMapping>)> = order
        .par_iter()
        .map(|id| match shared[id.index()].ast() {
            Some(program) => Codegen::new(program, options.clone()).generate_with_mappings(),
            None => (String::new(), Vec::new()),
        })
        .collect();

    let mut writer = BundleWriter::new(config.flags.contains(BundleFlags::SOURCEMAP));
    for (&id, (code, mappings)) in order.iter().zip(chunks) {
        let module = &shared[id.index()];
        writer.push_module(module, &code, &mappings);
        if let Some(object) = namespace_objects.get(&id) {
            writer.push(&Codegen::new(object, options.clone()).generate());
        }
    }
    if let Some(statement) = &export_statement {
        writer.push(&Codegen::new(statement, options.clone()).generate());
    }

    let map = match &writer.map {
        Some(builder) => Some(
            builder
                .generate(map_file)
                .map_err(|err| Error::other(format!("Failed to render source map: {err}")))?,
        ),
        None => None,
    };
    let paths = order
        .iter()
        .map(|id| shared[id.index()].path().to_string())
        .collect();

    for &id in &order {
        modules[id.index()].set_state(ModuleState::Emitted);
    }
    tracing::debug!(
        modules = order.len(),
        namespaces = namespace_objects.len(),
        bytes = writer.code.len(),
        "emitted bundle"
    );

    Ok(BundleOutput {
        code: writer.code,
        map,
        modules: paths,
        warnings,
    })
}

/// Post-order over bundled modules from `entry`, dependencies in source
/// order. Back edges of cycles are ignored.
fn emit_order(modules: &[ModuleFile], entry: ModuleId) -> Vec<ModuleId> {
    fn visit(modules: &[ModuleFile], id: ModuleId, seen: &mut HashSet<ModuleId>, out: &mut Vec<ModuleId>) {
        let Some(module) = modules.get(id.index()) else {
            return;
        };
        if module.is_failed() || !seen.insert(id) {
            return;
        }
        for dep in module.dependencies() {
            if let Some(target) = dep.target {
                visit(modules, target, seen, out);
            }
        }
        out.push(id);
    }

    let mut out = Vec::with_capacity(modules.len());
    visit(modules, entry, &mut HashSet::default(), &mut out);
    out
}

fn export_source(decl: &ExportDecl) -> Option<&str> {
    match decl {
        ExportDecl::Named {
            source: Some(source),
            ..
        }
        | ExportDecl::All { source, .. } => Some(&source.value),
        _ => None,
    }
}

/// Drop module syntax that the bundle makes redundant. `bundled` holds the
/// specifiers whose targets are part of the bundle.
fn strip_module_syntax(
    program: &mut Program,
    bundled: &HashSet<String>,
    keep_external: bool,
    path: &str,
    warnings: &mut Vec<String>,
) {
    let body = std::mem::take(&mut program.body);
    for stmt in body {
        let span = stmt.span;
        match stmt.kind {
            StmtKind::Import(decl) if bundled.contains(&decl.source.value) => {}
            StmtKind::Export(decl) => match *decl {
                ExportDecl::Decl(inner) => program.body.push(inner),
                ExportDecl::Named { source: None, .. } => {}
                decl => {
                    let source = export_source(&decl).unwrap_or("default").to_string();
                    if bundled.contains(&source) {
                        continue;
                    }
                    if keep_external {
                        program
                            .body
                            .push(Stmt::new(StmtKind::Export(Box::new(decl)), span));
                    } else {
                        tracing::warn!(module = %path, source = %source, "dropping external re-export");
                        warnings.push(format!(
                            "Re-export of '{source}' in {path} is not bundled and was dropped"
                        ));
                    }
                }
            },
            kind => program.body.push(Stmt::new(kind, span)),
        }
    }
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// `var mod_<id> = { export: local, ... };`
fn namespace_object(modules: &[ModuleFile], target: ModuleId) -> Program {
    let span = Span::default();
    let mut idents = IdentTable::new();
    let mut members = Vec::new();
    for name in export_names(modules, target) {
        let Some(local) = resolve_export(modules, target, &name).and_then(|b| binding_name(modules, &b)) else {
            continue;
        };
        let key = if is_identifier_name(&name) {
            PropertyKey::Ident(name)
        } else {
            PropertyKey::String(StrLit::new(name))
        };
        let shorthand = matches!(key, PropertyKey::Ident(_));
        let value = Expr::new(ExprKind::Ident(Ident::new(idents.alloc(local), span)), span);
        members.push(ObjectMember::Property(Property {
            key,
            value,
            kind: PropertyKind::Init,
            shorthand,
        }));
    }

    let var = Ident::new(idents.alloc(modules[target.index()].module_var_name()), span);
    let decl = Stmt::new(
        StmtKind::Var(VarDecl {
            kind: VarKind::Var,
            decls: vec![VarDeclarator {
                binding: Binding::new(BindingKind::Ident(var), span),
                init: Some(Expr::new(ExprKind::Object(members), span)),
            }],
        }),
        span,
    );
    Program::new(vec![decl], idents, span)
}

/// `export { local as exported, ... };` for library bundles.
fn library_export_statement(modules: &[ModuleFile], exports: &[(String, ResolvedBinding)]) -> Option<Program> {
    let span = Span::default();
    let mut idents = IdentTable::new();
    let specifiers: Vec<ExportSpecifier> = exports
        .iter()
        .filter_map(|(exported, binding)| {
            let local = binding_name(modules, binding)?;
            Some(ExportSpecifier {
                local: Ident::new(idents.alloc(local), span),
                exported: exported.clone(),
            })
        })
        .collect();
    if specifiers.is_empty() {
        return None;
    }
    let decl = ExportDecl::Named {
        specifiers,
        source: None,
    };
    Some(Program::new(
        vec![Stmt::new(StmtKind::Export(Box::new(decl)), span)],
        idents,
        span,
    ))
}

/// Concatenates generated chunks and shifts their mappings.
struct BundleWriter {
    code: String,
    line: u32,
    col: u32,
    map: Option<SourceMapBuilder>,
}

impl BundleWriter {
    fn new(source_map: bool) -> Self {
        Self {
            code: String::new(),
            line: 0,
            col: 0,
            map: source_map.then(SourceMapBuilder::new),
        }
    }

    fn push_module(&mut self, module: &ModuleFile, code: &str, mappings: &[SourceMapping]) {
        if let Some(builder) = self.map.as_mut() {
            let source = module.source().unwrap_or_default();
            let idx = builder.add_source(module.path(), source);
            let index = LineIndex::new(source);
            for mapping in mappings {
                let (src_line, src_col) = index.line_col(mapping.orig_offset);
                builder.add_segment(Segment {
                    gen_line: self.line + mapping.gen_line,
                    gen_col: if mapping.gen_line == 0 {
                        self.col + mapping.gen_col
                    } else {
                        mapping.gen_col
                    },
                    source: idx,
                    src_line,
                    src_col,
                });
            }
        }
        self.push(code);
    }

    fn push(&mut self, code: &str) {
        match code.rfind('\n') {
            Some(last) => {
                self.line += code.bytes().filter(|&b| b == b'\n').count() as u32;
                self.col = (code.len() - last - 1) as u32;
            }
            None => self.col += code.len() as u32,
        }
        self.code.push_str(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(source: &str, bundled: &[&str], keep_external: bool) -> (String, Vec<String>) {
        let mut program = Parser::new(source, ParserOptions::default()).parse().unwrap();
        let bundled: HashSet<String> = bundled.iter().map(|s| (*s).to_string()).collect();
        let mut warnings = Vec::new();
        strip_module_syntax(&mut program, &bundled, keep_external, "a.js", &mut warnings);
        (Codegen::new(&program, CodegenOptions::default()).generate(), warnings)
    }

    #[test]
    fn test_strip_bundled_imports_only() {
        let (code, warnings) = strip(
            "import { a } from './a';\nimport React from 'react';\na(React);",
            &["./a"],
            false,
        );
        assert_eq!(code, "import React from 'react';\na(React);\n");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_strip_exports() {
        let (code, _) = strip(
            "export const a = 1;\nexport function f() {}\nexport { a as b };\nexport * from './c';",
            &["./c"],
            false,
        );
        assert_eq!(code, "const a = 1;\nfunction f() {}\n");
    }

    #[test]
    fn test_external_reexport_warns_unless_library_entry() {
        let (code, warnings) = strip("export * from 'lodash';", &[], false);
        assert_eq!(code, "");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'lodash'"));

        let (code, warnings) = strip("export * from 'lodash';", &[], true);
        assert_eq!(code, "export * from 'lodash';\n");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_writer_shifts_columns_on_first_line() {
        let mut writer = BundleWriter::new(false);
        writer.push("ab;");
        assert_eq!((writer.line, writer.col), (0, 3));
        writer.push("c;\nde;");
        assert_eq!((writer.line, writer.col), (1, 3));
        writer.push("\n");
        assert_eq!((writer.line, writer.col), (2, 0));
    }

    #[test]
    fn test_identifier_names() {
        assert!(is_identifier_name("value"));
        assert!(is_identifier_name("$el"));
        assert!(!is_identifier_name("kebab-case"));
        assert!(!is_identifier_name("1st"));
    }
}
