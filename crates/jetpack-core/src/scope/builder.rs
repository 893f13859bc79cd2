//! Builds a [`ScopeTree`] from a parsed program.
//!
//! Declarations are recorded while walking; references are resolved after
//! the walk so that hoisted functions and `var`s, and closures that use a
//! binding declared further down, resolve to the right scope.

use super::{ScopeId, ScopeKind, ScopeTree, VariableKind};
use jetpack_parser::*;

/// Walk `program` and build its scope tree.
#[must_use]
pub fn build_scope_tree(program: &Program) -> ScopeTree {
    let mut builder = ScopeBuilder {
        program,
        tree: ScopeTree::new(),
        current: ScopeId::ROOT,
        pending: Vec::new(),
    };
    builder.visit_stmts(&program.body);

    let ScopeBuilder {
        mut tree, pending, ..
    } = builder;
    for (scope, ident) in pending {
        tree.reference(scope, program.name(&ident), ident.id);
    }
    tree
}

struct ScopeBuilder<'p> {
    program: &'p Program,
    tree: ScopeTree,
    current: ScopeId,
    /// References waiting for every declaration to be known.
    pending: Vec<(ScopeId, Ident)>,
}

impl ScopeBuilder<'_> {
    fn with_scope(&mut self, kind: ScopeKind, f: impl FnOnce(&mut Self)) {
        let parent = self.current;
        self.current = self.tree.add_scope(kind, parent);
        f(self);
        self.current = parent;
    }

    /// Nearest enclosing function or module scope, where `var` lands.
    fn var_scope(&self) -> ScopeId {
        let mut id = self.current;
        loop {
            let scope = self.tree.get(id);
            match (scope.kind, scope.parent) {
                (ScopeKind::Function | ScopeKind::Module, _) | (_, None) => return id,
                (_, Some(parent)) => id = parent,
            }
        }
    }

    fn declare(&mut self, scope: ScopeId, ident: Ident, kind: VariableKind) {
        let name = self.program.name(&ident);
        self.tree.declare(scope, name, kind, ident.id);
    }

    fn reference(&mut self, ident: Ident) {
        self.pending.push((self.current, ident));
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn visit_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Var(decl) => self.visit_var_decl(decl),
            StmtKind::Function(func) => {
                if let Some(id) = func.id {
                    self.declare(self.current, id, VariableKind::Function);
                }
                self.visit_function(func, false);
            }
            StmtKind::Class(class) => {
                if let Some(id) = class.id {
                    self.declare(self.current, id, VariableKind::Class);
                }
                self.visit_class(class, false);
            }
            StmtKind::Expr(expr) => self.visit_expr(expr),
            StmtKind::Block(body) => self.with_scope(ScopeKind::Block, |b| b.visit_stmts(body)),
            StmtKind::Empty
            | StmtKind::Debugger
            | StmtKind::Break(_)
            | StmtKind::Continue(_) => {}
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => {
                self.visit_expr(test);
                self.visit_stmt(consequent);
                if let Some(alternate) = alternate {
                    self.visit_stmt(alternate);
                }
            }
            StmtKind::Switch {
                discriminant,
                cases,
            } => {
                self.visit_expr(discriminant);
                self.with_scope(ScopeKind::Block, |b| {
                    for case in cases {
                        if let Some(test) = &case.test {
                            b.visit_expr(test);
                        }
                        b.visit_stmts(&case.body);
                    }
                });
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
            } => self.with_scope(ScopeKind::Block, |b| {
                match init {
                    Some(ForInit::Var(decl)) => b.visit_var_decl(decl),
                    Some(ForInit::Expr(expr)) => b.visit_expr(expr),
                    None => {}
                }
                if let Some(test) = test {
                    b.visit_expr(test);
                }
                if let Some(update) = update {
                    b.visit_expr(update);
                }
                b.visit_stmt(body);
            }),
            StmtKind::ForIn { left, right, body }
            | StmtKind::ForOf {
                left, right, body, ..
            } => {
                self.visit_expr(right);
                self.with_scope(ScopeKind::Block, |b| {
                    b.visit_for_head(left);
                    b.visit_stmt(body);
                });
            }
            StmtKind::While { test, body } | StmtKind::DoWhile { body, test } => {
                self.visit_expr(test);
                self.visit_stmt(body);
            }
            StmtKind::Return(arg) => {
                if let Some(arg) = arg {
                    self.visit_expr(arg);
                }
            }
            StmtKind::Throw(arg) => self.visit_expr(arg),
            StmtKind::Try {
                block,
                handler,
                finalizer,
            } => {
                self.with_scope(ScopeKind::Block, |b| b.visit_stmts(block));
                if let Some(handler) = handler {
                    self.with_scope(ScopeKind::Catch, |b| {
                        if let Some(param) = &handler.param {
                            b.visit_binding(param, b.current, VariableKind::CatchParam);
                        }
                        b.visit_stmts(&handler.body);
                    });
                }
                if let Some(finalizer) = finalizer {
                    self.with_scope(ScopeKind::Block, |b| b.visit_stmts(finalizer));
                }
            }
            StmtKind::Labeled { body, .. } => self.visit_stmt(body),
            StmtKind::With { object, body } => {
                self.visit_expr(object);
                // Names inside `with` may resolve dynamically.
                self.tree.mark_eval(self.current);
                self.visit_stmt(body);
            }
            StmtKind::Import(decl) => {
                for specifier in &decl.specifiers {
                    self.declare(ScopeId::ROOT, specifier.local(), VariableKind::Import);
                }
            }
            StmtKind::Export(decl) => self.visit_export(decl),
        }
    }

    fn visit_export(&mut self, decl: &ExportDecl) {
        match decl {
            ExportDecl::Named {
                specifiers,
                source: None,
            } => {
                for specifier in specifiers {
                    self.reference(specifier.local);
                }
            }
            // Re-exports name bindings of another module.
            ExportDecl::Named { source: Some(_), .. } | ExportDecl::All { .. } => {}
            ExportDecl::Default(ExportDefault::Expr(expr)) => self.visit_expr(expr),
            ExportDecl::Default(ExportDefault::Function(func)) => {
                if let Some(id) = func.id {
                    self.declare(self.current, id, VariableKind::Function);
                }
                self.visit_function(func, false);
            }
            ExportDecl::Default(ExportDefault::Class(class)) => {
                if let Some(id) = class.id {
                    self.declare(self.current, id, VariableKind::Class);
                }
                self.visit_class(class, false);
            }
            ExportDecl::Decl(stmt) => self.visit_stmt(stmt),
        }
    }

    fn visit_var_decl(&mut self, decl: &VarDecl) {
        let (scope, kind) = match decl.kind {
            jetpack_parser::VarKind::Var => (self.var_scope(), VariableKind::Var),
            jetpack_parser::VarKind::Let => (self.current, VariableKind::Let),
            jetpack_parser::VarKind::Const => (self.current, VariableKind::Const),
        };
        for declarator in &decl.decls {
            self.visit_binding(&declarator.binding, scope, kind);
            if let Some(init) = &declarator.init {
                self.visit_expr(init);
            }
        }
    }

    fn visit_for_head(&mut self, head: &ForHead) {
        match head {
            ForHead::Var { kind, binding } => {
                let (scope, kind) = match kind {
                    jetpack_parser::VarKind::Var => (self.var_scope(), VariableKind::Var),
                    jetpack_parser::VarKind::Let => (self.current, VariableKind::Let),
                    jetpack_parser::VarKind::Const => (self.current, VariableKind::Const),
                };
                self.visit_binding(binding, scope, kind);
            }
            ForHead::Target(expr) => self.visit_expr(expr),
        }
    }

    /// Declare every name bound by `binding` in `scope` and visit the
    /// default values and computed keys inside it.
    fn visit_binding(&mut self, binding: &Binding, scope: ScopeId, kind: VariableKind) {
        match &binding.kind {
            BindingKind::Ident(ident) => self.declare(scope, *ident, kind),
            BindingKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    self.visit_binding(&element.binding, scope, kind);
                    if let Some(default) = &element.default {
                        self.visit_expr(default);
                    }
                }
            }
            BindingKind::Object(props) => {
                for prop in props {
                    match prop {
                        ObjectPatternProp::KeyValue {
                            key,
                            value,
                            default,
                            ..
                        } => {
                            self.visit_property_key(key);
                            self.visit_binding(value, scope, kind);
                            if let Some(default) = default {
                                self.visit_expr(default);
                            }
                        }
                        ObjectPatternProp::Rest(binding) => {
                            self.visit_binding(binding, scope, kind);
                        }
                    }
                }
            }
        }
    }

    // =========================================================================
    // Functions and classes
    // =========================================================================

    /// `is_expression` puts the function's own name inside its scope.
    fn visit_function(&mut self, func: &Function, is_expression: bool) {
        self.with_scope(ScopeKind::Function, |b| {
            if is_expression {
                if let Some(id) = func.id {
                    b.declare(b.current, id, VariableKind::Function);
                }
            }
            b.visit_params(&func.params);
            b.visit_stmts(&func.body);
        });
    }

    fn visit_params(&mut self, params: &[Param]) {
        for param in params {
            self.visit_binding(&param.binding, self.current, VariableKind::Param);
            if let Some(default) = &param.default {
                self.visit_expr(default);
            }
        }
    }

    fn visit_arrow(&mut self, arrow: &ArrowFunction) {
        self.with_scope(ScopeKind::Function, |b| {
            b.visit_params(&arrow.params);
            match &arrow.body {
                ArrowBody::Expr(expr) => b.visit_expr(expr),
                ArrowBody::Block(body) => b.visit_stmts(body),
            }
        });
    }

    fn visit_class(&mut self, class: &Class, is_expression: bool) {
        if let Some(super_class) = &class.super_class {
            self.visit_expr(super_class);
        }
        self.with_scope(ScopeKind::Class, |b| {
            if is_expression {
                if let Some(id) = class.id {
                    b.declare(b.current, id, VariableKind::Class);
                }
            }
            for member in &class.body {
                match member {
                    ClassMember::Method { key, value, .. } => {
                        b.visit_property_key(key);
                        b.visit_function(value, false);
                    }
                    ClassMember::Property { key, value, .. } => {
                        b.visit_property_key(key);
                        if let Some(value) = value {
                            b.visit_expr(value);
                        }
                    }
                    ClassMember::StaticBlock(body) => {
                        b.with_scope(ScopeKind::Function, |b| b.visit_stmts(body));
                    }
                }
            }
        });
    }

    fn visit_property_key(&mut self, key: &PropertyKey) {
        if let PropertyKey::Computed(expr) = key {
            self.visit_expr(expr);
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn visit_exprs(&mut self, exprs: &[Expr]) {
        for expr in exprs {
            self.visit_expr(expr);
        }
    }

    fn visit_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Ident(ident) => self.reference(*ident),
            ExprKind::Null
            | ExprKind::Bool(_)
            | ExprKind::Number { .. }
            | ExprKind::BigInt(_)
            | ExprKind::String(_)
            | ExprKind::Regex { .. }
            | ExprKind::PrivateName(_)
            | ExprKind::This
            | ExprKind::Super
            | ExprKind::MetaProperty { .. } => {}
            ExprKind::Template(template) => self.visit_exprs(&template.exprs),
            ExprKind::TaggedTemplate { tag, quasi } => {
                self.visit_expr(tag);
                self.visit_exprs(&quasi.exprs);
            }
            ExprKind::Array(elements) => {
                for element in elements.iter().flatten() {
                    self.visit_expr(element);
                }
            }
            ExprKind::Object(members) => {
                for member in members {
                    match member {
                        ObjectMember::Property(prop) => {
                            self.visit_property_key(&prop.key);
                            self.visit_expr(&prop.value);
                        }
                        ObjectMember::Spread(arg) => self.visit_expr(arg),
                    }
                }
            }
            ExprKind::Function(func) => self.visit_function(func, true),
            ExprKind::Arrow(arrow) => self.visit_arrow(arrow),
            ExprKind::Class(class) => self.visit_class(class, true),
            ExprKind::Unary { arg, .. }
            | ExprKind::Update { arg, .. }
            | ExprKind::Spread(arg)
            | ExprKind::Await(arg)
            | ExprKind::Import(arg) => self.visit_expr(arg),
            ExprKind::Binary { left, right, .. } | ExprKind::Assign { left, right, .. } => {
                self.visit_expr(left);
                self.visit_expr(right);
            }
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.visit_expr(test);
                self.visit_expr(consequent);
                self.visit_expr(alternate);
            }
            ExprKind::Sequence(exprs) => self.visit_exprs(exprs),
            ExprKind::Member { object, .. } => self.visit_expr(object),
            ExprKind::Index { object, index, .. } => {
                self.visit_expr(object);
                self.visit_expr(index);
            }
            ExprKind::Call { callee, args, .. } => {
                if let ExprKind::Ident(ident) = &callee.kind {
                    if self.program.name(ident) == "eval" {
                        self.tree.mark_eval(self.current);
                    }
                }
                self.visit_expr(callee);
                self.visit_exprs(args);
            }
            ExprKind::New { callee, args } => {
                self.visit_expr(callee);
                self.visit_exprs(args);
            }
            ExprKind::Yield { arg, .. } => {
                if let Some(arg) = arg {
                    self.visit_expr(arg);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeKind;

    fn tree_of(source: &str) -> ScopeTree {
        let program = Parser::new(source, ParserOptions::default()).parse().unwrap();
        build_scope_tree(&program)
    }

    #[test]
    fn test_var_hoists_to_function_scope() {
        let tree = tree_of("function f() { if (x) { var a = 1; let b = 2; } }");
        let f = tree.get(tree.root().children[0]);
        assert_eq!(f.kind, ScopeKind::Function);
        assert!(f.own_variables.contains_key("a"));
        assert!(!f.own_variables.contains_key("b"));
        assert!(tree.root().own_variables.contains_key("f"));
    }

    #[test]
    fn test_function_hoisting_resolves_early_reference() {
        let program = Parser::new("go();\nfunction go() {}", ParserOptions::default())
            .parse()
            .unwrap();
        let tree = build_scope_tree(&program);
        let go = &tree.root().own_variables["go"];
        assert_eq!(go.decls.len(), 1);
        assert_eq!(go.refs.len(), 1);
        assert!(tree.unresolved().is_empty());
    }

    #[test]
    fn test_catch_param_and_block_scopes() {
        let tree = tree_of("try { let a; } catch (err) { err; }");
        let kinds: Vec<_> = tree.root().children.iter().map(|&id| tree.get(id).kind).collect();
        assert_eq!(kinds, vec![ScopeKind::Block, ScopeKind::Catch]);
        let catch = tree.get(tree.root().children[1]);
        assert_eq!(catch.own_variables["err"].kind, VariableKind::CatchParam);
        assert_eq!(catch.own_variables["err"].refs.len(), 1);
    }

    #[test]
    fn test_named_function_expression_binds_inside() {
        let tree = tree_of("const f = function inner() { return inner; };");
        assert!(!tree.root().own_variables.contains_key("inner"));
        let scope = tree.get(tree.root().children[0]);
        assert_eq!(scope.own_variables["inner"].refs.len(), 1);
    }

    #[test]
    fn test_imports_and_exports() {
        let tree = tree_of(
            "import a, { b as c } from './x';\nexport { c };\nexport { d } from './y';",
        );
        let root = tree.root();
        assert_eq!(root.own_variables["a"].kind, VariableKind::Import);
        assert_eq!(root.own_variables["c"].refs.len(), 1);
        // `d` belongs to './y'
        assert!(!tree.unresolved().contains("d"));
    }

    #[test]
    fn test_destructuring_defaults_are_references() {
        let tree = tree_of("let fallback = 1;\nconst { a = fallback, [key]: b } = obj;");
        let root = tree.root();
        assert_eq!(root.own_variables["fallback"].refs.len(), 1);
        assert!(root.own_variables.contains_key("a"));
        assert!(root.own_variables.contains_key("b"));
        assert!(tree.unresolved().contains("key"));
        assert!(tree.unresolved().contains("obj"));
    }

    #[test]
    fn test_with_statement_blocks_renaming() {
        let tree = tree_of("function f(o) { with (o) { x; } }");
        assert!(tree.get(tree.root().children[0]).has_eval);
    }
}
