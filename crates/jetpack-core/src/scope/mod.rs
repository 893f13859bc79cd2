//! Lexical scope tree of one module.
//!
//! Scopes live in an arena owned by [`ScopeTree`]; parents are referenced by
//! index only. Every variable records the identifier slots of its
//! declarations and references, so renaming a variable is a matter of
//! rewriting those slots in the program's [`IdentTable`].

mod builder;

pub use builder::build_scope_tree;

use indexmap::IndexMap;
use jetpack_parser::{IdentId, IdentTable};
use rustc_hash::FxHashSet as HashSet;

/// Index of a scope in its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The module scope is always the first one.
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Block,
    Catch,
    Class,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    Var,
    Let,
    Const,
    Function,
    Class,
    Param,
    CatchParam,
    Import,
}

/// A declared symbol.
#[derive(Debug, Clone)]
pub struct Variable {
    /// Current name. Changes when the variable is renamed.
    pub name: String,
    /// Name as written in the source.
    pub original: String,
    pub kind: VariableKind,
    /// Slots of declaring identifiers. Redeclarations (`var x; var x;`)
    /// add to the same variable.
    pub decls: Vec<IdentId>,
    /// Slots of identifiers resolved to this variable.
    pub refs: Vec<IdentId>,
}

impl Variable {
    fn new(name: &str, kind: VariableKind) -> Self {
        Self {
            name: name.to_string(),
            original: name.to_string(),
            kind,
            decls: Vec::new(),
            refs: Vec::new(),
        }
    }

    fn slots(&self) -> impl Iterator<Item = IdentId> + '_ {
        self.decls.iter().chain(self.refs.iter()).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Child scopes in source order.
    pub children: Vec<ScopeId>,
    /// Variables declared directly in this scope, in declaration order.
    pub own_variables: IndexMap<String, Variable>,
    /// A direct `eval` (or `with`) appears in this scope or a descendant.
    pub has_eval: bool,
}

/// All scopes of a module plus the names it uses without declaring.
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    unresolved: HashSet<String>,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only an empty module scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                id: ScopeId::ROOT,
                kind: ScopeKind::Module,
                parent: None,
                children: Vec::new(),
                own_variables: IndexMap::new(),
                has_eval: false,
            }],
            unresolved: HashSet::default(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Scope {
        &self.scopes[0]
    }

    /// # Panics
    ///
    /// Panics if `id` does not belong to this tree.
    #[must_use]
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Names referenced in the module that no scope declares.
    #[must_use]
    pub fn unresolved(&self) -> &HashSet<String> {
        &self.unresolved
    }

    /// Current names of every variable declared outside the module scope.
    #[must_use]
    pub fn inner_declared_names(&self) -> HashSet<String> {
        self.scopes[1..]
            .iter()
            .flat_map(|scope| scope.own_variables.keys().cloned())
            .collect()
    }

    /// Find a module-scope variable by the name it had in the source.
    #[must_use]
    pub fn root_variable_by_original(&self, original: &str) -> Option<&Variable> {
        let root = self.root();
        root.own_variables
            .get(original)
            .filter(|var| var.original == original)
            .or_else(|| root.own_variables.values().find(|var| var.original == original))
    }

    pub(crate) fn add_scope(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            kind,
            parent: Some(parent),
            children: Vec::new(),
            own_variables: IndexMap::new(),
            has_eval: false,
        });
        self.get_mut(parent).children.push(id);
        id
    }

    /// Record a declaration of `name` in `scope`.
    pub(crate) fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: VariableKind,
        slot: IdentId,
    ) {
        let variables = &mut self.get_mut(scope).own_variables;
        variables
            .entry(name.to_string())
            .or_insert_with(|| Variable::new(name, kind))
            .decls
            .push(slot);
    }

    /// Resolve a reference from `scope` outwards. Names nobody declares are
    /// collected as unresolved.
    pub(crate) fn reference(&mut self, scope: ScopeId, name: &str, slot: IdentId) {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get_mut(id);
            if let Some(var) = scope.own_variables.get_mut(name) {
                var.refs.push(slot);
                return;
            }
            current = scope.parent;
        }
        self.unresolved.insert(name.to_string());
    }

    /// Flag `scope` and its ancestors as containing a direct `eval`.
    pub(crate) fn mark_eval(&mut self, scope: ScopeId) {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get_mut(id);
            scope.has_eval = true;
            current = scope.parent;
        }
    }

    /// Apply `changes` (old name, new name) to the variables of `scope`,
    /// rewriting every declaration and reference slot in `idents`.
    ///
    /// A pair whose old name is not declared in `scope`, or whose new name
    /// would clash with a variable that keeps its name, is skipped. Returns
    /// `true` only if every pair was applied. Variables keep their position
    /// in `own_variables`.
    pub fn batch_rename_symbols(
        &mut self,
        scope: ScopeId,
        idents: &mut IdentTable,
        changes: &[(String, String)],
    ) -> bool {
        let variables = &self.get(scope).own_variables;

        let mut all_applied = true;
        let mut renames: Vec<(&str, &str)> = Vec::with_capacity(changes.len());
        for (old, new) in changes {
            let seen = renames.iter().any(|&(o, _)| o == old.as_str());
            if seen || !variables.contains_key(old) {
                all_applied = false;
                continue;
            }
            renames.push((old.as_str(), new.as_str()));
        }

        // The resulting key set must stay unique.
        let mut final_names: HashSet<&str> = variables
            .keys()
            .map(String::as_str)
            .filter(|&key| !renames.iter().any(|&(old, _)| old == key))
            .collect();
        renames.retain(|&(_, new)| {
            let fresh = final_names.insert(new);
            all_applied &= fresh;
            fresh
        });

        if renames.is_empty() {
            return all_applied;
        }

        let renames: Vec<(String, String)> = renames
            .into_iter()
            .map(|(old, new)| (old.to_string(), new.to_string()))
            .collect();
        let old_variables = std::mem::take(&mut self.get_mut(scope).own_variables);
        let mut rebuilt = IndexMap::with_capacity(old_variables.len());
        for (key, mut var) in old_variables {
            match renames.iter().find(|(old, _)| *old == key) {
                Some((_, new)) => {
                    for slot in var.slots() {
                        idents.set(slot, new.as_str());
                    }
                    var.name.clone_from(new);
                    rebuilt.insert(new.clone(), var);
                }
                None => {
                    rebuilt.insert(key, var);
                }
            }
        }
        self.get_mut(scope).own_variables = rebuilt;

        all_applied
    }

    /// Point every slot of the variable `name` in `scope` at `new` without
    /// re-keying it. Used when two bindings must print as the same name.
    pub(crate) fn alias_variable(
        &self,
        scope: ScopeId,
        name: &str,
        idents: &mut IdentTable,
        new: &str,
    ) -> bool {
        let Some(var) = self.get(scope).own_variables.get(name) else {
            return false;
        };
        for slot in var.slots() {
            idents.set(slot, new);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jetpack_parser::{Codegen, CodegenOptions, Parser, ParserOptions, Program};

    fn parse(source: &str) -> (Program, ScopeTree) {
        let program = Parser::new(source, ParserOptions::default()).parse().unwrap();
        let tree = build_scope_tree(&program);
        (program, tree)
    }

    fn rename(program: &mut Program, tree: &mut ScopeTree, old: &str, new: &str) -> bool {
        let changes = vec![(old.to_string(), new.to_string())];
        tree.batch_rename_symbols(ScopeId::ROOT, &mut program.idents, &changes)
    }

    fn gen(program: &Program) -> String {
        Codegen::new(program, CodegenOptions::default()).generate()
    }

    #[test]
    fn test_collect() {
        let (_, tree) = parse("var name = 3;");
        assert_eq!(tree.root().own_variables.len(), 1);
        assert!(tree.root().own_variables.contains_key("name"));
    }

    #[test]
    fn test_rename_var() {
        let (mut program, mut tree) = parse("var name = 3;\n");
        assert!(rename(&mut program, &mut tree, "name", "new_name"));

        assert_eq!(tree.root().own_variables.len(), 1);
        assert!(!tree.root().own_variables.contains_key("name"));
        assert_eq!(gen(&program), "var new_name = 3;\n");
    }

    #[test]
    fn test_rename_import_namespace() {
        let (mut program, mut tree) = parse("import * as name from 'main';\n");
        assert!(rename(&mut program, &mut tree, "name", "new_name"));

        assert_eq!(tree.root().own_variables.len(), 1);
        assert_eq!(gen(&program), "import * as new_name from 'main';\n");
    }

    #[test]
    fn test_rename_reaches_nested_function() {
        let (mut program, mut tree) =
            parse("var name = 3;\nfunction ok() {\n  console.log(name);\n}\n");
        assert!(rename(&mut program, &mut tree, "name", "new_name"));
        assert_eq!(
            gen(&program),
            "var new_name = 3;\nfunction ok() {\n  console.log(new_name);\n}\n"
        );
    }

    #[test]
    fn test_rename_function_name() {
        let (mut program, mut tree) =
            parse("var name = 3;\nfunction ok() {\n  console.log(name);\n}\n");
        assert!(rename(&mut program, &mut tree, "ok", "ok1"));
        assert_eq!(
            gen(&program),
            "var name = 3;\nfunction ok1() {\n  console.log(name);\n}\n"
        );
    }

    #[test]
    fn test_rename_skips_shadowing_param() {
        let (mut program, mut tree) =
            parse("var name = 3;\nfunction ok(name) {\n  console.log(name);\n}\n");
        assert!(rename(&mut program, &mut tree, "name", "rename"));
        assert_eq!(
            gen(&program),
            "var rename = 3;\nfunction ok(name) {\n  console.log(name);\n}\n"
        );
    }

    #[test]
    fn test_rename_object_pattern_alias() {
        let (mut program, mut tree) = parse("var { name: other } = obj;\n");
        assert!(rename(&mut program, &mut tree, "other", "renamed"));
        assert_eq!(gen(&program), "var { name: renamed } = obj;\n");
    }

    #[test]
    fn test_rename_object_pattern_key_is_not_a_variable() {
        let (mut program, mut tree) = parse("var { name: other } = obj;\n");
        assert!(!rename(&mut program, &mut tree, "name", "ok1"));
        assert_eq!(gen(&program), "var { name: other } = obj;\n");
    }

    #[test]
    fn test_rename_object_pattern_shorthand() {
        let (mut program, mut tree) = parse("var { name } = obj;\n");
        assert!(rename(&mut program, &mut tree, "name", "renamed"));
        assert_eq!(gen(&program), "var { name: renamed } = obj;\n");
    }

    #[test]
    fn test_rename_leaves_class_method_names() {
        let source = "const print = 'hello world';\nclass A {  print() {\n    console.log(print);\n  }\n}\n";
        let (mut program, mut tree) = parse(source);
        assert!(rename(&mut program, &mut tree, "print", "renamed"));
        assert_eq!(
            gen(&program),
            "const renamed = 'hello world';\nclass A {\n  print() {\n    console.log(renamed);\n  }\n}\n"
        );
    }

    #[test]
    fn test_rename_import() {
        let (mut program, mut tree) = parse("import { name } from 'main';\n");
        assert!(rename(&mut program, &mut tree, "name", "renamed"));
        assert_eq!(gen(&program), "import { name as renamed } from 'main';\n");
    }

    #[test]
    fn test_rename_import_updates_specifier_local() {
        let source = "import { a, fun, ooo } from './a';\n\nvar b = 44444;\n\nexport default a + 3 + b + fun();";
        let (mut program, mut tree) = parse(source);
        assert!(rename(&mut program, &mut tree, "a", "p"));

        let jetpack_parser::StmtKind::Import(decl) = &program.body[0].kind else {
            panic!("expected import declaration");
        };
        assert_eq!(program.name(&decl.specifiers[0].local()), "p");
    }

    #[test]
    fn test_rename_import_default() {
        let (mut program, mut tree) = parse("import React from 'react';\n");
        assert!(rename(&mut program, &mut tree, "React", "Angular"));
        assert_eq!(gen(&program), "import Angular from 'react';\n");
    }

    #[test]
    fn test_rename_import_alias() {
        let (mut program, mut tree) =
            parse("import { cc as name } from 'main';\nconsole.log(name);\n");
        assert!(rename(&mut program, &mut tree, "name", "renamed"));
        assert_eq!(
            gen(&program),
            "import { cc as renamed } from 'main';\nconsole.log(renamed);\n"
        );
    }

    #[test]
    fn test_rename_export_alias() {
        let (mut program, mut tree) = parse("const name = 3;\nexport { name as foo };\n");
        assert!(rename(&mut program, &mut tree, "name", "renamed"));
        assert_eq!(gen(&program), "const renamed = 3;\nexport { renamed as foo };\n");
    }

    #[test]
    fn test_rename_export_shorthand() {
        let (mut program, mut tree) = parse("const name = 3;\nexport { name };\n");
        assert!(rename(&mut program, &mut tree, "name", "renamed"));
        assert_eq!(gen(&program), "const renamed = 3;\nexport { renamed as name };\n");
    }

    #[test]
    fn test_batch_rename_swaps_names() {
        let (mut program, mut tree) = parse("let a = 1;\nlet b = a;\n");
        let changes = vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "a".to_string()),
        ];
        assert!(tree.batch_rename_symbols(ScopeId::ROOT, &mut program.idents, &changes));
        assert_eq!(gen(&program), "let b = 1;\nlet a = b;\n");
        let keys: Vec<_> = tree.root().own_variables.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_batch_rename_rejects_clash() {
        let (mut program, mut tree) = parse("let a = 1;\nlet b = 2;\n");
        let changes = vec![("a".to_string(), "b".to_string())];
        assert!(!tree.batch_rename_symbols(ScopeId::ROOT, &mut program.idents, &changes));
        assert_eq!(gen(&program), "let a = 1;\nlet b = 2;\n");
    }

    #[test]
    fn test_unresolved_and_eval() {
        let (_, tree) = parse("function f() { eval('x'); return y; }\nlet z = console;");
        assert!(tree.unresolved().contains("y"));
        assert!(tree.unresolved().contains("console"));
        assert!(tree.unresolved().contains("eval"));
        assert!(!tree.unresolved().contains("z"));
        let f_scope = tree.get(tree.root().children[0]);
        assert!(f_scope.has_eval);
        assert!(tree.root().has_eval);
    }

    #[test]
    fn test_original_name_survives_rename() {
        let (mut program, mut tree) = parse("var name = 3;\n");
        rename(&mut program, &mut tree, "name", "x");
        let var = tree.root_variable_by_original("name").unwrap();
        assert_eq!(var.name, "x");
    }
}
