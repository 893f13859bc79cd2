//! JavaScript code generator.
//!
//! Converts an AST back to JavaScript source code. Identifier names are
//! read through the program's [`IdentTable`], so renames applied to the
//! table show up in the output. Where a rename would change the meaning of
//! a shorthand (`{ a }`, `import { a }`, `export { a }`) the long form is
//! printed instead.
//!
//! Supports minification and statement-level source mappings.

use crate::ast::*;

/// Code generation options.
#[derive(Debug, Clone, Default)]
pub struct CodegenOptions {
    /// Minify output (drop whitespace and optional semicolons).
    pub minify: bool,
    /// Record a source mapping for every top-level statement.
    pub source_map: bool,
    /// Indent string (default: "  ").
    pub indent: Option<String>,
}

/// A source map mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceMapping {
    /// Generated line (0-indexed).
    pub gen_line: u32,
    /// Generated column (0-indexed).
    pub gen_col: u32,
    /// Original byte offset.
    pub orig_offset: u32,
}

// Expression precedence levels, loosest first. Binary operators occupy
// `PREC_CONDITIONAL + BinaryOp::precedence()`.
const PREC_SEQUENCE: u8 = 1;
const PREC_ASSIGN: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_UNARY: u8 = 16;
const PREC_POSTFIX: u8 = 17;
const PREC_CALL: u8 = 18;
const PREC_PRIMARY: u8 = 19;
/// Forces parentheses around any child.
const PREC_ALWAYS_WRAP: u8 = PREC_PRIMARY + 1;

/// The code generator.
pub struct Codegen<'a> {
    /// The program to generate code from.
    program: &'a Program,
    options: CodegenOptions,
    output: String,
    indent_level: usize,
    indent_str: String,
    /// A `;` is pending. It is dropped if the next token is `}`.
    needs_semicolon: bool,
    /// Parenthesize `in` expressions (inside a `for (...;` head).
    forbid_in: bool,
    /// Output offset where the current expression statement begins. A
    /// `function` or `class` written there needs parentheses.
    stmt_start: Option<usize>,
    /// Generated line of the end of `output`.
    line: u32,
    /// Byte offset in `output` where the current line starts.
    line_start: usize,
    mappings: Vec<SourceMapping>,
}

impl<'a> Codegen<'a> {
    /// Create a new code generator.
    pub fn new(program: &'a Program, options: CodegenOptions) -> Self {
        let indent_str = options.indent.clone().unwrap_or_else(|| "  ".to_string());
        Self {
            program,
            options,
            output: String::new(),
            indent_level: 0,
            indent_str,
            needs_semicolon: false,
            forbid_in: false,
            stmt_start: None,
            line: 0,
            line_start: 0,
            mappings: Vec::new(),
        }
    }

    /// Generate JavaScript source code.
    pub fn generate(self) -> String {
        self.generate_with_mappings().0
    }

    /// Generate JavaScript source code and the statement mappings. The
    /// mappings are empty unless `source_map` is enabled.
    pub fn generate_with_mappings(mut self) -> (String, Vec<SourceMapping>) {
        let program = self.program;
        for stmt in &program.body {
            if self.options.source_map {
                self.add_mapping(stmt.span.start);
            }
            self.emit_stmt(stmt);
            if !self.options.minify {
                self.write("\n");
            }
        }
        // Keep the output safe to concatenate.
        if self.needs_semicolon {
            self.output.push(';');
            self.needs_semicolon = false;
        }
        (self.output, self.mappings)
    }

    // =========================================================================
    // Output Helpers
    // =========================================================================

    fn write(&mut self, s: &str) {
        if let Some(last_newline) = s.rfind('\n') {
            self.line += s.bytes().filter(|&b| b == b'\n').count() as u32;
            self.line_start = self.output.len() + last_newline + 1;
        }
        self.output.push_str(s);
    }

    fn emit(&mut self, s: &str) {
        if self.needs_semicolon {
            self.needs_semicolon = false;
            if !s.starts_with('}') {
                self.write(";");
            }
        }
        if let (Some(prev), Some(next)) = (self.output.chars().next_back(), s.chars().next()) {
            if needs_separator(prev, next) {
                self.write(" ");
            }
        }
        self.write(s);
    }

    fn emit_space(&mut self) {
        if !self.options.minify {
            self.write(" ");
        }
    }

    fn emit_newline(&mut self) {
        if !self.options.minify {
            self.write("\n");
            for _ in 0..self.indent_level {
                self.output.push_str(&self.indent_str);
            }
        }
    }

    fn mark_stmt_start(&mut self) {
        if self.needs_semicolon {
            self.needs_semicolon = false;
            self.write(";");
        }
        self.stmt_start = Some(self.output.len());
    }

    fn at_stmt_start(&self) -> bool {
        self.stmt_start == Some(self.output.len())
    }

    fn emit_semicolon(&mut self) {
        if self.options.minify {
            self.needs_semicolon = true;
        } else {
            self.emit(";");
        }
    }

    /// A keyword or contextual word surrounded by optional spaces.
    fn emit_word(&mut self, word: &str) {
        self.emit_space();
        self.emit(word);
        self.emit_space();
    }

    fn emit_comma(&mut self) {
        self.emit(",");
        self.emit_space();
    }

    fn add_mapping(&mut self, orig_offset: u32) {
        self.mappings.push(SourceMapping {
            gen_line: self.line,
            gen_col: (self.output.len() - self.line_start) as u32,
            orig_offset,
        });
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn name(&self, ident: &Ident) -> &'a str {
        self.program.name(ident)
    }

    fn emit_ident(&mut self, ident: &Ident) {
        let name = self.name(ident);
        self.emit(name);
    }

    // =========================================================================
    // Statement Emission
    // =========================================================================

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => {
                self.emit_var_decl(decl);
                self.emit_semicolon();
            }
            StmtKind::Function(func) => self.emit_function(func),
            StmtKind::Class(class) => self.emit_class(class),
            StmtKind::Expr(expr) => {
                if matches!(leftmost(expr).kind, ExprKind::Object(_)) {
                    self.emit("(");
                    self.emit_expr(expr);
                    self.emit(")");
                } else {
                    self.mark_stmt_start();
                    self.emit_expr(expr);
                }
                self.emit_semicolon();
            }
            StmtKind::Block(stmts) => self.emit_block(stmts),
            StmtKind::Empty => self.emit(";"),
            StmtKind::Debugger => {
                self.emit("debugger");
                self.emit_semicolon();
            }
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.emit("if");
                self.emit_space();
                self.emit("(");
                self.emit_expr(test);
                self.emit(")");
                self.emit_body(consequent);
                if let Some(alt) = alternate {
                    self.emit_space();
                    self.emit("else");
                    self.emit_body(alt);
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.emit("switch");
                self.emit_space();
                self.emit("(");
                self.emit_expr(discriminant);
                self.emit(")");
                self.emit_space();
                if cases.is_empty() {
                    self.emit("{}");
                    return;
                }
                self.emit("{");
                self.indent();
                for case in cases {
                    self.emit_newline();
                    match &case.test {
                        Some(test) => {
                            self.emit("case");
                            self.emit_space();
                            self.emit_expr(test);
                        }
                        None => self.emit("default"),
                    }
                    self.emit(":");
                    self.indent();
                    for stmt in &case.body {
                        self.emit_newline();
                        self.emit_stmt(stmt);
                    }
                    self.dedent();
                }
                self.dedent();
                self.emit_newline();
                self.emit("}");
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => {
                self.emit("for");
                self.emit_space();
                self.emit("(");
                if let Some(init) = init {
                    let saved = std::mem::replace(&mut self.forbid_in, true);
                    match init {
                        ForInit::Var(decl) => self.emit_var_decl(decl),
                        ForInit::Expr(expr) => self.emit_expr(expr),
                    }
                    self.forbid_in = saved;
                }
                self.emit(";");
                if let Some(test) = test {
                    self.emit_space();
                    self.emit_expr(test);
                }
                self.emit(";");
                if let Some(update) = update {
                    self.emit_space();
                    self.emit_expr(update);
                }
                self.emit(")");
                self.emit_body(body);
            }
            StmtKind::ForIn { left, right, body } => {
                self.emit("for");
                self.emit_space();
                self.emit("(");
                self.emit_for_head(left);
                self.emit_word("in");
                self.emit_expr(right);
                self.emit(")");
                self.emit_body(body);
            }
            StmtKind::ForOf {
                left,
                right,
                body,
                is_await,
            } => {
                self.emit("for");
                if *is_await {
                    self.emit(" await");
                }
                self.emit_space();
                self.emit("(");
                self.emit_for_head(left);
                self.emit_word("of");
                self.emit_expr_with_prec(right, PREC_ASSIGN);
                self.emit(")");
                self.emit_body(body);
            }
            StmtKind::While { test, body } => {
                self.emit("while");
                self.emit_space();
                self.emit("(");
                self.emit_expr(test);
                self.emit(")");
                self.emit_body(body);
            }
            StmtKind::DoWhile { body, test } => {
                self.emit("do");
                self.emit_body(body);
                self.emit_space();
                self.emit("while");
                self.emit_space();
                self.emit("(");
                self.emit_expr(test);
                self.emit(")");
                self.emit_semicolon();
            }
            StmtKind::Break(label) => {
                self.emit("break");
                if let Some(label) = label {
                    self.emit(" ");
                    self.emit(label);
                }
                self.emit_semicolon();
            }
            StmtKind::Continue(label) => {
                self.emit("continue");
                if let Some(label) = label {
                    self.emit(" ");
                    self.emit(label);
                }
                self.emit_semicolon();
            }
            StmtKind::Return(arg) => {
                self.emit("return");
                if let Some(arg) = arg {
                    self.emit_space();
                    self.emit_expr(arg);
                }
                self.emit_semicolon();
            }
            StmtKind::Throw(arg) => {
                self.emit("throw");
                self.emit_space();
                self.emit_expr(arg);
                self.emit_semicolon();
            }
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.emit("try");
                self.emit_space();
                self.emit_block(block);
                if let Some(handler) = handler {
                    self.emit_space();
                    self.emit("catch");
                    if let Some(param) = &handler.param {
                        self.emit_space();
                        self.emit("(");
                        self.emit_binding(param);
                        self.emit(")");
                    }
                    self.emit_space();
                    self.emit_block(&handler.body);
                }
                if let Some(finalizer) = finalizer {
                    self.emit_space();
                    self.emit("finally");
                    self.emit_space();
                    self.emit_block(finalizer);
                }
            }
            StmtKind::Labeled { label, body } => {
                self.emit(label);
                self.emit(":");
                self.emit_space();
                self.emit_stmt(body);
            }
            StmtKind::With { object, body } => {
                self.emit("with");
                self.emit_space();
                self.emit("(");
                self.emit_expr(object);
                self.emit(")");
                self.emit_body(body);
            }
            StmtKind::Import(decl) => self.emit_import(decl),
            StmtKind::Export(decl) => self.emit_export(decl),
        }
    }

    /// Body of `if`/`for`/`while`: blocks stay on the same line.
    fn emit_body(&mut self, body: &Stmt) {
        self.emit_space();
        match &body.kind {
            StmtKind::Block(stmts) => self.emit_block(stmts),
            _ => self.emit_stmt(body),
        }
    }

    fn emit_block(&mut self, stmts: &[Stmt]) {
        if stmts.is_empty() {
            self.emit("{}");
            return;
        }
        self.emit("{");
        self.indent();
        for stmt in stmts {
            self.emit_newline();
            self.emit_stmt(stmt);
        }
        self.dedent();
        self.emit_newline();
        self.emit("}");
    }

    fn emit_var_decl(&mut self, decl: &VarDecl) {
        self.emit(decl.kind.as_str());
        self.emit_space();
        for (i, declarator) in decl.decls.iter().enumerate() {
            if i > 0 {
                self.emit_comma();
            }
            self.emit_binding(&declarator.binding);
            if let Some(init) = &declarator.init {
                self.emit_assign_eq();
                self.emit_expr_with_prec(init, PREC_ASSIGN);
            }
        }
    }

    fn emit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Var { kind, binding } => {
                self.emit(kind.as_str());
                self.emit_space();
                self.emit_binding(binding);
            }
            ForHead::Target(expr) => self.emit_expr_with_prec(expr, PREC_POSTFIX),
        }
    }

    fn emit_assign_eq(&mut self) {
        self.emit_space();
        self.emit("=");
        self.emit_space();
    }

    // =========================================================================
    // Patterns
    // =========================================================================

    fn emit_binding(&mut self, binding: &Binding) {
        match &binding.kind {
            BindingKind::Ident(ident) => self.emit_ident(ident),
            BindingKind::Array(elements) => {
                self.emit("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.emit_comma();
                    }
                    if let Some(element) = element {
                        if element.rest {
                            self.emit("...");
                        }
                        self.emit_binding(&element.binding);
                        if let Some(default) = &element.default {
                            self.emit_assign_eq();
                            self.emit_expr_with_prec(default, PREC_ASSIGN);
                        }
                    }
                }
                if matches!(elements.last(), Some(None)) {
                    self.emit(",");
                }
                self.emit("]");
            }
            BindingKind::Object(props) => {
                if props.is_empty() {
                    self.emit("{}");
                    return;
                }
                self.emit("{");
                self.emit_space();
                for (i, prop) in props.iter().enumerate() {
                    if i > 0 {
                        self.emit_comma();
                    }
                    match prop {
                        ObjectPatternProp::KeyValue {
                            key,
                            value,
                            default,
                            shorthand,
                        } => {
                            let keeps_shorthand = *shorthand
                                && matches!(
                                    (&value.kind, key),
                                    (BindingKind::Ident(ident), PropertyKey::Ident(k))
                                        if self.name(ident) == k.as_str()
                                );
                            if !keeps_shorthand {
                                self.emit_property_key(key);
                                self.emit(":");
                                self.emit_space();
                            }
                            self.emit_binding(value);
                            if let Some(default) = default {
                                self.emit_assign_eq();
                                self.emit_expr_with_prec(default, PREC_ASSIGN);
                            }
                        }
                        ObjectPatternProp::Rest(binding) => {
                            self.emit("...");
                            self.emit_binding(binding);
                        }
                    }
                }
                self.emit_space();
                self.emit("}");
            }
        }
    }

    fn emit_params(&mut self, params: &[Param]) {
        self.emit("(");
        for (i, param) in params.iter().enumerate() {
            if i > 0 {
                self.emit_comma();
            }
            if param.rest {
                self.emit("...");
            }
            self.emit_binding(&param.binding);
            if let Some(default) = &param.default {
                self.emit_assign_eq();
                self.emit_expr_with_prec(default, PREC_ASSIGN);
            }
        }
        self.emit(")");
    }

    // =========================================================================
    // Functions and Classes
    // =========================================================================

    fn emit_function(&mut self, func: &Function) {
        if func.is_async {
            self.emit("async ");
        }
        self.emit("function");
        if func.is_generator {
            self.emit("*");
        }
        if let Some(id) = &func.id {
            if func.is_generator {
                self.emit_space();
            } else {
                self.emit(" ");
            }
            self.emit_ident(id);
        }
        self.emit_params(&func.params);
        self.emit_space();
        self.emit_block(&func.body);
    }

    /// Method signature and body. The key has already been written.
    fn emit_method_tail(&mut self, func: &Function) {
        self.emit_params(&func.params);
        self.emit_space();
        self.emit_block(&func.body);
    }

    fn emit_method_prefix(&mut self, func: &Function) {
        if func.is_async {
            self.emit("async ");
        }
        if func.is_generator {
            self.emit("*");
        }
    }

    fn emit_arrow(&mut self, arrow: &ArrowFunction) {
        if arrow.is_async {
            self.emit("async");
            self.emit_space();
        }
        self.emit_params(&arrow.params);
        self.emit_space();
        self.emit("=>");
        self.emit_space();
        match &arrow.body {
            ArrowBody::Expr(expr) => {
                if matches!(leftmost(expr).kind, ExprKind::Object(_)) {
                    self.emit("(");
                    self.emit_expr_with_prec(expr, PREC_ASSIGN);
                    self.emit(")");
                } else {
                    self.emit_expr_with_prec(expr, PREC_ASSIGN);
                }
            }
            ArrowBody::Block(stmts) => self.emit_block(stmts),
        }
    }

    fn emit_class(&mut self, class: &Class) {
        self.emit("class");
        if let Some(id) = &class.id {
            self.emit(" ");
            self.emit_ident(id);
        }
        if let Some(super_class) = &class.super_class {
            self.emit(" extends ");
            self.emit_expr_with_prec(super_class, PREC_CALL);
        }
        self.emit_space();
        if class.body.is_empty() {
            self.emit("{}");
            return;
        }
        self.emit("{");
        self.indent();
        for member in &class.body {
            self.emit_newline();
            self.emit_class_member(member);
        }
        self.dedent();
        self.emit_newline();
        self.emit("}");
    }

    fn emit_class_member(&mut self, member: &ClassMember) {
        match member {
            ClassMember::Method {
                key,
                value,
                kind,
                is_static,
            } => {
                if *is_static {
                    self.emit("static ");
                }
                match kind {
                    MethodKind::Get => self.emit("get "),
                    MethodKind::Set => self.emit("set "),
                    MethodKind::Method | MethodKind::Constructor => self.emit_method_prefix(value),
                }
                self.emit_property_key(key);
                self.emit_method_tail(value);
            }
            ClassMember::Property {
                key,
                value,
                is_static,
            } => {
                if *is_static {
                    self.emit("static ");
                }
                self.emit_property_key(key);
                if let Some(value) = value {
                    self.emit_assign_eq();
                    self.emit_expr_with_prec(value, PREC_ASSIGN);
                }
                // Class fields always take an explicit `;`
                self.emit(";");
            }
            ClassMember::StaticBlock(stmts) => {
                self.emit("static");
                self.emit_space();
                self.emit_block(stmts);
            }
        }
    }

    // =========================================================================
    // Modules
    // =========================================================================

    fn emit_import(&mut self, decl: &ImportDecl) {
        self.emit("import");

        if decl.specifiers.is_empty() {
            self.emit_space();
            self.emit_str_lit(&decl.source);
            self.emit_semicolon();
            return;
        }

        self.emit_space();
        let mut wrote_any = false;
        let mut named = Vec::new();
        for spec in &decl.specifiers {
            match spec {
                ImportSpecifier::Default(local) => {
                    if wrote_any {
                        self.emit_comma();
                    }
                    self.emit_ident(local);
                    wrote_any = true;
                }
                ImportSpecifier::Namespace(local) => {
                    if wrote_any {
                        self.emit_comma();
                    }
                    self.emit("*");
                    self.emit_word("as");
                    self.emit_ident(local);
                    wrote_any = true;
                }
                ImportSpecifier::Named { imported, local } => named.push((imported, local)),
            }
        }

        if !named.is_empty() {
            if wrote_any {
                self.emit_comma();
            }
            self.emit("{");
            self.emit_space();
            for (i, (imported, local)) in named.into_iter().enumerate() {
                if i > 0 {
                    self.emit_comma();
                }
                let local_name = self.name(local);
                if local_name != imported.as_str() {
                    self.emit_module_export_name(imported);
                    self.emit(" as ");
                }
                self.emit(local_name);
            }
            self.emit_space();
            self.emit("}");
        }

        self.emit_word("from");
        self.emit_str_lit(&decl.source);
        self.emit_semicolon();
    }

    fn emit_export(&mut self, decl: &ExportDecl) {
        self.emit("export");
        match decl {
            ExportDecl::Named { specifiers, source } => {
                self.emit_space();
                if specifiers.is_empty() {
                    self.emit("{}");
                } else {
                    self.emit("{");
                    self.emit_space();
                    for (i, spec) in specifiers.iter().enumerate() {
                        if i > 0 {
                            self.emit_comma();
                        }
                        let local_name = self.name(&spec.local);
                        self.emit_module_export_name(local_name);
                        if local_name != spec.exported {
                            self.emit(" as ");
                            self.emit_module_export_name(&spec.exported);
                        }
                    }
                    self.emit_space();
                    self.emit("}");
                }
                if let Some(source) = source {
                    self.emit_word("from");
                    self.emit_str_lit(source);
                }
                self.emit_semicolon();
            }
            ExportDecl::Default(default) => {
                self.emit(" default ");
                match default {
                    ExportDefault::Expr(expr) => {
                        self.mark_stmt_start();
                        self.emit_expr_with_prec(expr, PREC_ASSIGN);
                        self.emit_semicolon();
                    }
                    ExportDefault::Function(func) => self.emit_function(func),
                    ExportDefault::Class(class) => self.emit_class(class),
                }
            }
            ExportDecl::Decl(stmt) => {
                self.emit(" ");
                self.emit_stmt(stmt);
            }
            ExportDecl::All { exported, source } => {
                self.emit_space();
                self.emit("*");
                if let Some(exported) = exported {
                    self.emit_word("as");
                    self.emit_module_export_name(exported);
                }
                self.emit_word("from");
                self.emit_str_lit(source);
                self.emit_semicolon();
            }
        }
    }

    /// Names in import/export clauses may be arbitrary strings.
    fn emit_module_export_name(&mut self, name: &str) {
        if is_identifier_name(name) {
            self.emit(name);
        } else {
            self.emit(&format!("\"{}\"", escape_string(name)));
        }
    }

    // =========================================================================
    // Expression Emission
    // =========================================================================

    fn emit_expr(&mut self, expr: &Expr) {
        self.emit_expr_with_prec(expr, PREC_SEQUENCE);
    }

    fn emit_expr_with_prec(&mut self, expr: &Expr, min_prec: u8) {
        let wrap = expr_precedence(expr) < min_prec
            || (self.forbid_in && matches!(expr.kind, ExprKind::Binary { op: BinaryOp::In, .. }));
        if wrap {
            let saved = std::mem::replace(&mut self.forbid_in, false);
            self.emit("(");
            self.emit_expr_kind(expr);
            self.emit(")");
            self.forbid_in = saved;
        } else {
            self.emit_expr_kind(expr);
        }
    }

    fn emit_expr_kind(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Null => self.emit("null"),
            ExprKind::Bool(true) => self.emit("true"),
            ExprKind::Bool(false) => self.emit("false"),
            ExprKind::Number { value, raw } => match raw {
                Some(raw) => self.emit(raw),
                None => self.emit(&format_number(*value)),
            },
            ExprKind::BigInt(raw) => self.emit(raw),
            ExprKind::String(lit) => self.emit_str_lit(lit),
            ExprKind::Regex { pattern, flags } => {
                self.emit("/");
                self.write(pattern);
                self.write("/");
                self.write(flags);
            }
            ExprKind::Template(template) => self.emit_template(template),
            ExprKind::TaggedTemplate { tag, quasi } => {
                self.emit_expr_with_prec(tag, PREC_CALL);
                self.emit_template(quasi);
            }

            ExprKind::Ident(ident) => self.emit_ident(ident),
            ExprKind::PrivateName(name) => self.emit(name),
            ExprKind::This => self.emit("this"),
            ExprKind::Super => self.emit("super"),

            ExprKind::Array(elements) => {
                self.emit("[");
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.emit_comma();
                    }
                    if let Some(element) = element {
                        self.emit_expr_with_prec(element, PREC_ASSIGN);
                    }
                }
                if matches!(elements.last(), Some(None)) {
                    self.emit(",");
                }
                self.emit("]");
            }
            ExprKind::Object(members) => self.emit_object(members),
            ExprKind::Function(func) => {
                if self.at_stmt_start() {
                    self.emit("(");
                    self.emit_function(func);
                    self.emit(")");
                } else {
                    self.emit_function(func);
                }
            }
            ExprKind::Arrow(arrow) => self.emit_arrow(arrow),
            ExprKind::Class(class) => {
                if self.at_stmt_start() {
                    self.emit("(");
                    self.emit_class(class);
                    self.emit(")");
                } else {
                    self.emit_class(class);
                }
            }

            ExprKind::Unary { op, arg } => {
                self.emit(op.as_str());
                if matches!(op, UnaryOp::Typeof | UnaryOp::Void | UnaryOp::Delete) {
                    self.emit_space();
                }
                self.emit_expr_with_prec(arg, PREC_UNARY);
            }
            ExprKind::Binary { op, left, right } => {
                let prec = PREC_CONDITIONAL + op.precedence();
                let (mut left_min, mut right_min) = if *op == BinaryOp::Exp {
                    (PREC_POSTFIX, prec)
                } else {
                    (prec, prec + 1)
                };
                // `??` cannot be mixed with `||`/`&&` without parentheses
                if *op == BinaryOp::Nullish {
                    if is_and_or(left) {
                        left_min = PREC_ALWAYS_WRAP;
                    }
                    if is_and_or(right) {
                        right_min = PREC_ALWAYS_WRAP;
                    }
                }
                self.emit_expr_with_prec(left, left_min);
                self.emit_word(op.as_str());
                self.emit_expr_with_prec(right, right_min);
            }
            ExprKind::Assign { op, left, right } => {
                self.emit_expr_with_prec(left, PREC_POSTFIX);
                self.emit_word(op.as_str());
                self.emit_expr_with_prec(right, PREC_ASSIGN);
            }
            ExprKind::Update { op, prefix, arg } => {
                if *prefix {
                    self.emit(op.as_str());
                    self.emit_expr_with_prec(arg, PREC_UNARY);
                } else {
                    self.emit_expr_with_prec(arg, PREC_POSTFIX);
                    self.emit(op.as_str());
                }
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.emit_expr_with_prec(test, PREC_CONDITIONAL + 1);
                self.emit_word("?");
                self.emit_expr_with_prec(consequent, PREC_ASSIGN);
                self.emit_word(":");
                self.emit_expr_with_prec(alternate, PREC_ASSIGN);
            }
            ExprKind::Sequence(exprs) => {
                for (i, e) in exprs.iter().enumerate() {
                    if i > 0 {
                        self.emit_comma();
                    }
                    self.emit_expr_with_prec(e, PREC_ASSIGN);
                }
            }

            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                self.emit_member_object(object);
                self.emit(if *optional { "?." } else { "." });
                self.emit(property);
            }
            ExprKind::Index {
                object,
                index,
                optional,
            } => {
                self.emit_member_object(object);
                if *optional {
                    self.emit("?.");
                }
                self.emit("[");
                self.emit_expr(index);
                self.emit("]");
            }

            ExprKind::Call {
                callee,
                args,
                optional,
            } => {
                self.emit_expr_with_prec(callee, PREC_CALL);
                if *optional {
                    self.emit("?.");
                }
                self.emit_args(args);
            }
            ExprKind::New { callee, args } => {
                self.emit("new ");
                let min = if contains_call(callee) {
                    PREC_ALWAYS_WRAP
                } else {
                    PREC_CALL
                };
                self.emit_expr_with_prec(callee, min);
                self.emit_args(args);
            }
            ExprKind::Import(arg) => {
                self.emit("import(");
                self.emit_expr_with_prec(arg, PREC_ASSIGN);
                self.emit(")");
            }
            ExprKind::MetaProperty { meta, property } => {
                self.emit(meta);
                self.emit(".");
                self.emit(property);
            }

            ExprKind::Spread(arg) => {
                self.emit("...");
                self.emit_expr_with_prec(arg, PREC_ASSIGN);
            }
            ExprKind::Yield { arg, delegate } => {
                self.emit("yield");
                if *delegate {
                    self.emit("*");
                }
                if let Some(arg) = arg {
                    self.emit_space();
                    self.emit_expr_with_prec(arg, PREC_ASSIGN);
                }
            }
            ExprKind::Await(arg) => {
                self.emit("await");
                self.emit_space();
                self.emit_expr_with_prec(arg, PREC_UNARY);
            }
        }
    }

    fn emit_member_object(&mut self, object: &Expr) {
        // `1.toString()` would lex as a malformed number
        let min = if matches!(object.kind, ExprKind::Number { .. }) {
            PREC_ALWAYS_WRAP
        } else {
            PREC_CALL
        };
        self.emit_expr_with_prec(object, min);
    }

    fn emit_args(&mut self, args: &[Expr]) {
        self.emit("(");
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.emit_comma();
            }
            self.emit_expr_with_prec(arg, PREC_ASSIGN);
        }
        self.emit(")");
    }

    fn emit_template(&mut self, template: &Template) {
        self.emit("`");
        for (i, quasi) in template.quasis.iter().enumerate() {
            self.write(quasi);
            if let Some(expr) = template.exprs.get(i) {
                self.write("${");
                self.emit_expr(expr);
                self.emit("}");
            }
        }
        self.write("`");
    }

    fn emit_str_lit(&mut self, lit: &StrLit) {
        match &lit.raw {
            Some(raw) => self.emit(raw),
            None => self.emit(&format!("\"{}\"", escape_string(&lit.value))),
        }
    }

    fn emit_object(&mut self, members: &[ObjectMember]) {
        if members.is_empty() {
            self.emit("{}");
            return;
        }
        self.emit("{");
        self.emit_space();
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                self.emit_comma();
            }
            match member {
                ObjectMember::Property(prop) => self.emit_object_property(prop),
                ObjectMember::Spread(expr) => {
                    self.emit("...");
                    self.emit_expr_with_prec(expr, PREC_ASSIGN);
                }
            }
        }
        self.emit_space();
        self.emit("}");
    }

    fn emit_object_property(&mut self, prop: &Property) {
        match prop.kind {
            PropertyKind::Get | PropertyKind::Set | PropertyKind::Method => {
                let ExprKind::Function(func) = &prop.value.kind else {
                    // Parser always produces a function for methods
                    self.emit_property_key(&prop.key);
                    self.emit(":");
                    self.emit_space();
                    self.emit_expr_with_prec(&prop.value, PREC_ASSIGN);
                    return;
                };
                match prop.kind {
                    PropertyKind::Get => self.emit("get "),
                    PropertyKind::Set => self.emit("set "),
                    _ => self.emit_method_prefix(func),
                }
                self.emit_property_key(&prop.key);
                self.emit_method_tail(func);
            }
            PropertyKind::Init => {
                if prop.shorthand {
                    if let PropertyKey::Ident(key) = &prop.key {
                        if self.emit_shorthand_value(key, &prop.value) {
                            return;
                        }
                    }
                }
                self.emit_property_key(&prop.key);
                self.emit(":");
                self.emit_space();
                self.emit_expr_with_prec(&prop.value, PREC_ASSIGN);
            }
        }
    }

    /// `{ a }` / `{ a = 1 }` stay short while the binding keeps the key's
    /// name and become `{ a: b }` / `{ a: b = 1 }` once it is renamed.
    /// Returns false if the value is not a shorthand form.
    fn emit_shorthand_value(&mut self, key: &str, value: &Expr) -> bool {
        let (ident, default) = match &value.kind {
            ExprKind::Ident(ident) => (ident, None),
            ExprKind::Assign {
                op: AssignOp::Assign,
                left,
                right,
            } => match &left.kind {
                ExprKind::Ident(ident) => (ident, Some(right)),
                _ => return false,
            },
            _ => return false,
        };

        let name = self.name(ident);
        if name != key {
            self.emit(key);
            self.emit(":");
            self.emit_space();
        }
        self.emit(name);
        if let Some(default) = default {
            self.emit_assign_eq();
            self.emit_expr_with_prec(default, PREC_ASSIGN);
        }
        true
    }

    fn emit_property_key(&mut self, key: &PropertyKey) {
        match key {
            PropertyKey::Ident(name) | PropertyKey::Private(name) => self.emit(name),
            PropertyKey::String(lit) => self.emit_str_lit(lit),
            PropertyKey::Number { value, raw } => match raw {
                Some(raw) => self.emit(raw),
                None => self.emit(&format_number(*value)),
            },
            PropertyKey::Computed(expr) => {
                self.emit("[");
                self.emit_expr_with_prec(expr, PREC_ASSIGN);
                self.emit("]");
            }
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn expr_precedence(expr: &Expr) -> u8 {
    match &expr.kind {
        ExprKind::Sequence(_) => PREC_SEQUENCE,
        ExprKind::Assign { .. }
        | ExprKind::Arrow(_)
        | ExprKind::Yield { .. }
        | ExprKind::Spread(_) => PREC_ASSIGN,
        ExprKind::Conditional { .. } => PREC_CONDITIONAL,
        ExprKind::Binary { op, .. } => PREC_CONDITIONAL + op.precedence(),
        ExprKind::Unary { .. } | ExprKind::Await(_) => PREC_UNARY,
        ExprKind::Update { prefix: true, .. } => PREC_UNARY,
        ExprKind::Update { prefix: false, .. } => PREC_POSTFIX,
        ExprKind::Call { .. }
        | ExprKind::New { .. }
        | ExprKind::Member { .. }
        | ExprKind::Index { .. }
        | ExprKind::TaggedTemplate { .. }
        | ExprKind::Import(_)
        | ExprKind::MetaProperty { .. } => PREC_CALL,
        // Folded negative values print with a leading `-`
        ExprKind::Number { value, raw: None } if value.is_sign_negative() => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

fn is_and_or(expr: &Expr) -> bool {
    matches!(
        expr.kind,
        ExprKind::Binary {
            op: BinaryOp::And | BinaryOp::Or,
            ..
        }
    )
}

/// The expression printed first when `expr` is written out.
fn leftmost(expr: &Expr) -> &Expr {
    match &expr.kind {
        ExprKind::Binary { left, .. } | ExprKind::Assign { left, .. } => leftmost(left),
        ExprKind::Conditional { test, .. } => leftmost(test),
        ExprKind::Sequence(exprs) => exprs.first().map(leftmost).unwrap_or(expr),
        ExprKind::Member { object, .. } | ExprKind::Index { object, .. } => leftmost(object),
        ExprKind::Call { callee, .. } => leftmost(callee),
        ExprKind::TaggedTemplate { tag, .. } => leftmost(tag),
        ExprKind::Update {
            prefix: false, arg, ..
        } => leftmost(arg),
        _ => expr,
    }
}

/// `new a().b()` and `new (a().b)()` differ; a call in the callee chain
/// needs parentheses.
fn contains_call(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { .. } => true,
        ExprKind::Member { object, .. } | ExprKind::Index { object, .. } => contains_call(object),
        ExprKind::TaggedTemplate { tag, .. } => contains_call(tag),
        _ => false,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '\\' || !c.is_ascii()
}

/// Two tokens written back to back would merge (`a` `b`, `+` `+x`, `/` `/re/`).
fn needs_separator(prev: char, next: char) -> bool {
    (is_ident_char(prev) && is_ident_char(next))
        || (prev == '+' && next == '+')
        || (prev == '-' && next == '-')
        || (prev == '/' && next == '/')
}

fn is_identifier_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        let s = format!("{}", n);
        // Use shorter exponential notation if beneficial
        let exp = format!("{:e}", n);
        if exp.len() < s.len() {
            exp
        } else {
            s
        }
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => result.push_str("\\0"),
            '\u{2028}' => result.push_str("\\u2028"),
            '\u{2029}' => result.push_str("\\u2029"),
            c if c.is_control() => {
                result.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Parser, ParserOptions};

    fn parse(source: &str) -> Program {
        Parser::new(source, ParserOptions::default()).parse().unwrap()
    }

    fn roundtrip(source: &str) -> String {
        let program = parse(source);
        Codegen::new(&program, CodegenOptions::default()).generate()
    }

    fn minify(source: &str) -> String {
        let program = parse(source);
        let options = CodegenOptions {
            minify: true,
            ..Default::default()
        };
        Codegen::new(&program, options).generate()
    }

    fn rename_first(source: &str, new_name: &str) -> String {
        let mut program = parse(source);
        program.idents.set(IdentId(0), new_name);
        Codegen::new(&program, CodegenOptions::default()).generate()
    }

    #[test]
    fn test_variable_declaration() {
        assert_eq!(roundtrip("var a = 3"), "var a = 3;\n");
        assert_eq!(roundtrip("let x = 1, y;"), "let x = 1, y;\n");
    }

    #[test]
    fn test_function_declaration() {
        assert_eq!(
            roundtrip("function foo(a, b) { return a + b; }"),
            "function foo(a, b) {\n  return a + b;\n}\n"
        );
        assert_eq!(roundtrip("function _default() {}"), "function _default() {}\n");
    }

    #[test]
    fn test_class() {
        assert_eq!(
            roundtrip("class A extends B { static x = 1; get y() { return 2; } }"),
            "class A extends B {\n  static x = 1;\n  get y() {\n    return 2;\n  }\n}\n"
        );
    }

    #[test]
    fn test_control_flow() {
        assert_eq!(
            roundtrip("if (a) { b(); } else c();"),
            "if (a) {\n  b();\n} else c();\n"
        );
        assert_eq!(
            roundtrip("for (let i = 0; i < n; i++) {}"),
            "for (let i = 0; i < n; i++) {}\n"
        );
        assert_eq!(roundtrip("for (;;) x();"), "for (;;) x();\n");
        assert_eq!(
            roundtrip("for (const [k, v] of map) {}"),
            "for (const [k, v] of map) {}\n"
        );
        assert_eq!(
            roundtrip("switch (x) { case 1: break; default: y(); }"),
            "switch (x) {\n  case 1:\n    break;\n  default:\n    y();\n}\n"
        );
        assert_eq!(
            roundtrip("try { a(); } catch (e) {} finally {}"),
            "try {\n  a();\n} catch (e) {} finally {}\n"
        );
    }

    #[test]
    fn test_string_quotes_are_preserved() {
        assert_eq!(roundtrip("import * as a from 'main';"), "import * as a from 'main';\n");
        assert_eq!(roundtrip("x = \"q\";"), "x = \"q\";\n");
    }

    #[test]
    fn test_template_is_verbatim() {
        assert_eq!(roundtrip("var a = `3`;"), "var a = `3`;\n");
        assert_eq!(roundtrip("f(`a${b + 1}\\n${c}`);"), "f(`a${b + 1}\\n${c}`);\n");
    }

    #[test]
    fn test_precedence_parentheses() {
        assert_eq!(roundtrip("(a + b) * c;"), "(a + b) * c;\n");
        assert_eq!(roundtrip("a + (b + c);"), "a + (b + c);\n");
        assert_eq!(roundtrip("a ?? (b || c);"), "a ?? (b || c);\n");
        assert_eq!(roundtrip("(-a) ** b;"), "(-a) ** b;\n");
        assert_eq!(roundtrip("a ** b ** c;"), "a ** b ** c;\n");
        assert_eq!(roundtrip("(a, b) ? c : d;"), "(a, b) ? c : d;\n");
        assert_eq!(roundtrip("(1).toString();"), "(1).toString();\n");
        assert_eq!(roundtrip("new (a())();"), "new (a())();\n");
        assert_eq!(roundtrip("new a.b();"), "new a.b();\n");
    }

    #[test]
    fn test_statement_level_parentheses() {
        assert_eq!(roundtrip("(function () {})();"), "(function() {})();\n");
        assert_eq!(roundtrip("({ a } = b);"), "({ a } = b);\n");
        assert_eq!(roundtrip("f = () => ({});"), "f = () => ({});\n");
    }

    #[test]
    fn test_object_literals() {
        assert_eq!(roundtrip("x = {};"), "x = {};\n");
        assert_eq!(
            roundtrip("x = { a, b: 1, [c]: 2, ...d, m() {} };"),
            "x = { a, b: 1, [c]: 2, ...d, m() {} };\n"
        );
    }

    #[test]
    fn test_renamed_object_pattern_shorthand() {
        assert_eq!(
            rename_first("var { name } = obj;", "renamed"),
            "var { name: renamed } = obj;\n"
        );
        assert_eq!(
            rename_first("var { name: other } = obj;", "renamed"),
            "var { name: renamed } = obj;\n"
        );
        assert_eq!(
            rename_first("var { name = 1 } = obj;", "n"),
            "var { name: n = 1 } = obj;\n"
        );
    }

    #[test]
    fn test_renamed_object_literal_shorthand() {
        let mut program = parse("var name = 1; x = { name };");
        program.idents.set(IdentId(0), "a");
        program.idents.set(IdentId(2), "a");
        let output = Codegen::new(&program, CodegenOptions::default()).generate();
        assert_eq!(output, "var a = 1;\nx = { name: a };\n");
    }

    #[test]
    fn test_renamed_imports() {
        assert_eq!(
            rename_first("import { name } from 'main';", "renamed"),
            "import { name as renamed } from 'main';\n"
        );
        assert_eq!(
            rename_first("import { cc as name } from 'main';", "renamed"),
            "import { cc as renamed } from 'main';\n"
        );
        assert_eq!(
            rename_first("import name from 'main';", "renamed"),
            "import renamed from 'main';\n"
        );
        assert_eq!(
            rename_first("import { name } from 'main';", "name"),
            "import { name } from 'main';\n"
        );
    }

    #[test]
    fn test_renamed_exports() {
        assert_eq!(
            rename_first("export { name };", "renamed"),
            "export { renamed as name };\n"
        );
        assert_eq!(
            rename_first("export { name as foo };", "renamed"),
            "export { renamed as foo };\n"
        );
        assert_eq!(
            roundtrip("export * as ns from './a';"),
            "export * as ns from './a';\n"
        );
        assert_eq!(roundtrip("export default a = 3;"), "export default a = 3;\n");
    }

    #[test]
    fn test_minify() {
        assert_eq!(minify("let x = 1;\nlet y = 2;"), "let x=1;let y=2;");
        assert_eq!(minify("function f() { return x; }"), "function f(){return x}");
        assert_eq!(minify("a - -b;"), "a- -b;");
        assert_eq!(minify("if (a) b(); else c();"), "if(a)b();else c();");
        assert_eq!(minify("typeof x === 'y';"), "typeof x==='y';");
        assert_eq!(
            minify("import { a as b } from 'c';"),
            "import{a as b}from'c';"
        );
    }

    #[test]
    fn test_source_mappings() {
        let program = parse("var a = 1;\nfunction f() {\n  return a;\n}\nf();");
        let options = CodegenOptions {
            source_map: true,
            ..Default::default()
        };
        let (output, mappings) = Codegen::new(&program, options).generate_with_mappings();

        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings[0], SourceMapping { gen_line: 0, gen_col: 0, orig_offset: 0 });
        assert_eq!(mappings[1].gen_line, 1);
        assert_eq!(mappings[1].orig_offset, 11);
        assert_eq!(mappings[2].gen_line, 4);
        assert!(output.ends_with("f();\n"));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(1e21), "1e21");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("a\"b\n"), "a\\\"b\\n");
    }
}
