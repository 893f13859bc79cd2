//! One module of the graph.

use crate::config::{BundleConfig, BundleFlags};
use crate::error::{Error, Result};
use crate::fold::fold_program;
use crate::name_generator::{NameGenerator, MODULE_VAR_PREFIX};
use crate::provider::ModuleProvider;
use crate::resolver::normalize_export_default;
use crate::scope::{build_scope_tree, ScopeId, ScopeTree};
use indexmap::IndexMap;
use jetpack_parser::{ExportDecl, ImportSpecifier, Parser, Program, StmtKind};
use jetpack_util::hash::ContentHash;
use rustc_hash::FxHashSet as HashSet;
use std::fmt;

/// Index of a module in its session. Ids are dense and start at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl ModuleId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a module within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    /// Slot claimed in the graph, nothing loaded yet.
    Discovered,
    Loading,
    Parsed,
    /// Every dependency has been matched to a graph node (or left external).
    LinkResolved,
    Renamed,
    Emitted,
    Failed,
}

impl ModuleState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Loading => "loading",
            Self::Parsed => "parsed",
            Self::LinkResolved => "link-resolved",
            Self::Renamed => "renamed",
            Self::Emitted => "emitted",
            Self::Failed => "failed",
        }
    }
}

/// A module this one imports from or re-exports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub specifier: String,
    /// `None` while undiscovered, or when the specifier stays external.
    pub target: Option<ModuleId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportedName {
    /// `import { name }`; default imports use `"default"`.
    Named(String),
    /// `import * as ns`
    Namespace,
}

/// A local binding created by an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportBinding {
    /// Local name as written in the source.
    pub local: String,
    pub source: String,
    pub imported: ImportedName,
}

/// What an exported name refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntry {
    /// A binding of this module, by its source name.
    Local(String),
    /// `export { imported as name } from 'source'`
    ReExport { source: String, imported: String },
    /// `export * as name from 'source'`
    Namespace { source: String },
}

/// One module of the graph with everything learned about it.
#[derive(Debug)]
pub struct ModuleFile {
    id: ModuleId,
    path: String,
    provider: usize,
    source: Option<String>,
    hash: Option<ContentHash>,
    pub(crate) ast: Option<Program>,
    pub(crate) scope: ScopeTree,
    pub(crate) dependencies: Vec<Dependency>,
    imports: Vec<ImportBinding>,
    exports: IndexMap<String, ExportEntry>,
    star_exports: Vec<String>,
    state: ModuleState,
    generator: Option<NameGenerator>,
    error: Option<Error>,
}

impl ModuleFile {
    /// A freshly discovered module served by provider number `provider`.
    #[must_use]
    pub fn new(id: ModuleId, path: impl Into<String>, provider: usize) -> Self {
        Self {
            id,
            path: path.into(),
            provider,
            source: None,
            hash: None,
            ast: None,
            scope: ScopeTree::new(),
            dependencies: Vec::new(),
            imports: Vec::new(),
            exports: IndexMap::new(),
            star_exports: Vec::new(),
            state: ModuleState::Discovered,
            generator: None,
            error: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ModuleId) {
        self.id = id;
    }

    /// Path as returned by the provider that matched this module.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn provider_index(&self) -> usize {
        self.provider
    }

    #[must_use]
    pub fn state(&self) -> ModuleState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ModuleState) {
        tracing::trace!(module = %self.path, state = state.as_str(), "module state");
        self.state = state;
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn content_hash(&self) -> Option<&ContentHash> {
        self.hash.as_ref()
    }

    #[must_use]
    pub fn ast(&self) -> Option<&Program> {
        self.ast.as_ref()
    }

    #[must_use]
    pub fn scope(&self) -> &ScopeTree {
        &self.scope
    }

    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    #[must_use]
    pub fn imports(&self) -> &[ImportBinding] {
        &self.imports
    }

    #[must_use]
    pub fn exports(&self) -> &IndexMap<String, ExportEntry> {
        &self.exports
    }

    /// Sources of `export * from '...'`, in order.
    #[must_use]
    pub fn star_exports(&self) -> &[String] {
        &self.star_exports
    }

    /// Generator returned by the last inner-scope rename.
    #[must_use]
    pub fn generator(&self) -> Option<&NameGenerator> {
        self.generator.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    pub(crate) fn take_error(&mut self) -> Option<Error> {
        self.error.take()
    }

    pub(crate) fn fail(&mut self, error: Error) {
        tracing::warn!(module = %self.path, error = %error, "module failed");
        self.error = Some(error);
        self.set_state(ModuleState::Failed);
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.state == ModuleState::Failed
    }

    /// Target of the dependency with `specifier`.
    #[must_use]
    pub fn dependency_target(&self, specifier: &str) -> Option<ModuleId> {
        self.dependencies
            .iter()
            .find(|dep| dep.specifier == specifier)
            .and_then(|dep| dep.target)
    }

    /// The import binding whose local is `local` (source name).
    #[must_use]
    pub fn import_binding(&self, local: &str) -> Option<&ImportBinding> {
        self.imports.iter().find(|binding| binding.local == local)
    }

    /// Synthetic variable standing for the whole module, e.g. in place of
    /// a namespace import.
    #[must_use]
    pub fn module_var_name(&self) -> String {
        format!("{MODULE_VAR_PREFIX}{}", self.id)
    }

    /// Fetch the source through `provider`. Only the first call reads.
    pub fn load(&mut self, provider: &dyn ModuleProvider) -> Result<&str> {
        if self.source.is_none() {
            self.set_state(ModuleState::Loading);
            let content = provider.resolve(&self.path)?;
            self.hash = Some(ContentHash::of(content.as_bytes()));
            self.source = Some(content);
        }
        Ok(self.source.as_deref().unwrap_or_default())
    }

    /// Parse the loaded source, normalize `export default`, build the scope
    /// tree and collect import and export records.
    pub fn parse(&mut self, config: &BundleConfig) -> Result<()> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| Error::other(format!("{} parsed before it was loaded", self.path)))?;
        let mut program = Parser::new(source, config.parser_options())
            .parse()
            .map_err(|err| Error::parse(&self.path, err))?;

        if config.flags.contains(BundleFlags::CONSTANT_FOLDING) {
            fold_program(&mut program);
        }
        let default_local = normalize_export_default(&mut program);

        self.scope = build_scope_tree(&program);
        self.collect_records(&program);
        if let Some(local) = default_local {
            self.exports
                .insert("default".to_string(), ExportEntry::Local(local));
        }
        self.ast = Some(program);
        self.set_state(ModuleState::Parsed);
        Ok(())
    }

    fn add_dependency(&mut self, specifier: &str) {
        if !self.dependencies.iter().any(|dep| dep.specifier == specifier) {
            self.dependencies.push(Dependency {
                specifier: specifier.to_string(),
                target: None,
            });
        }
    }

    fn collect_records(&mut self, program: &Program) {
        for stmt in &program.body {
            match &stmt.kind {
                StmtKind::Import(decl) => {
                    let source = decl.source.value.as_str();
                    self.add_dependency(source);
                    for specifier in &decl.specifiers {
                        let imported = match specifier {
                            ImportSpecifier::Default(_) => ImportedName::Named("default".into()),
                            ImportSpecifier::Namespace(_) => ImportedName::Namespace,
                            ImportSpecifier::Named { imported, .. } => {
                                ImportedName::Named(imported.clone())
                            }
                        };
                        self.imports.push(ImportBinding {
                            local: program.name(&specifier.local()).to_string(),
                            source: source.to_string(),
                            imported,
                        });
                    }
                }
                StmtKind::Export(decl) => match decl.as_ref() {
                    ExportDecl::Named {
                        specifiers,
                        source: None,
                    } => {
                        for specifier in specifiers {
                            let local = program.name(&specifier.local).to_string();
                            self.exports
                                .insert(specifier.exported.clone(), ExportEntry::Local(local));
                        }
                    }
                    ExportDecl::Named {
                        specifiers,
                        source: Some(source),
                    } => {
                        self.add_dependency(&source.value);
                        for specifier in specifiers {
                            self.exports.insert(
                                specifier.exported.clone(),
                                ExportEntry::ReExport {
                                    source: source.value.clone(),
                                    imported: program.name(&specifier.local).to_string(),
                                },
                            );
                        }
                    }
                    ExportDecl::All { exported, source } => {
                        self.add_dependency(&source.value);
                        match exported {
                            Some(name) => {
                                self.exports.insert(
                                    name.clone(),
                                    ExportEntry::Namespace {
                                        source: source.value.clone(),
                                    },
                                );
                            }
                            None => self.star_exports.push(source.value.clone()),
                        }
                    }
                    ExportDecl::Decl(inner) => {
                        for ident in declared_idents(inner) {
                            let name = program.name(&ident).to_string();
                            self.exports.insert(name.clone(), ExportEntry::Local(name));
                        }
                    }
                    // Normalized away before records are collected.
                    ExportDecl::Default(_) => {}
                },
                _ => {}
            }
        }
    }

    /// Rename every variable below the module scope to short names.
    ///
    /// Scopes are visited post-order: each scope merges the generators of
    /// its children and draws names for its own variables from the result,
    /// so no name is reused between a scope and any of its descendants.
    /// Names of module-level bindings, unresolved globals and variables of
    /// scopes containing `eval` are never issued. Returns the generator of
    /// the whole module, which has claimed every inner name.
    pub fn rename_inner_scopes(&mut self) -> NameGenerator {
        let Some(program) = self.ast.as_mut() else {
            return NameGenerator::new();
        };

        let base = NameGenerator::with_blocked(preserved_names(&self.scope));
        let children = self.scope.root().children.clone();
        let generators: Vec<NameGenerator> = children
            .into_iter()
            .map(|child| rename_scope(&mut self.scope, &mut program.idents, child, &base))
            .collect();

        let merged = NameGenerator::merge(generators.iter().chain(std::iter::once(&base)));
        tracing::debug!(
            module = %self.path,
            names = merged.claimed().len(),
            "renamed inner scopes"
        );
        self.generator = Some(merged.clone());
        merged
    }
}

/// Names inner renaming must leave alone.
fn preserved_names(tree: &ScopeTree) -> HashSet<String> {
    let mut names: HashSet<String> = tree.unresolved().iter().cloned().collect();
    names.extend(tree.root().own_variables.keys().cloned());
    for scope in tree.iter().filter(|scope| scope.has_eval) {
        names.extend(scope.own_variables.keys().cloned());
    }
    names
}

fn rename_scope(
    tree: &mut ScopeTree,
    idents: &mut jetpack_parser::IdentTable,
    id: ScopeId,
    base: &NameGenerator,
) -> NameGenerator {
    let children = tree.get(id).children.clone();
    let generators: Vec<NameGenerator> = children
        .into_iter()
        .map(|child| rename_scope(tree, idents, child, base))
        .collect();
    let mut generator = NameGenerator::merge(generators.iter().chain(std::iter::once(base)));

    let scope = tree.get(id);
    if scope.has_eval {
        for name in scope.own_variables.keys() {
            generator.claim(name.as_str());
        }
        return generator;
    }

    let changes: Vec<(String, String)> = scope
        .own_variables
        .keys()
        .filter_map(|name| generator.next(name).map(|new| (name.clone(), new)))
        .collect();
    tree.batch_rename_symbols(id, idents, &changes);
    generator
}

/// Identifiers declared by a `var`/`let`/`const`/`function`/`class` statement.
fn declared_idents(stmt: &jetpack_parser::Stmt) -> Vec<jetpack_parser::Ident> {
    match &stmt.kind {
        StmtKind::Var(decl) => decl
            .decls
            .iter()
            .flat_map(|declarator| declarator.binding.idents())
            .collect(),
        StmtKind::Function(func) => func.id.into_iter().collect(),
        StmtKind::Class(class) => class.id.into_iter().collect(),
        _ => Vec::new(),
    }
}
