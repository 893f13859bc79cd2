//! Cross-module linking: export resolution and the module-level rename.
//!
//! After this pass every import local of a bundled module prints as the
//! final name of the binding it refers to, and no two module-level bindings
//! of the bundle share a name.

use crate::module_file::{ExportEntry, ImportedName, ModuleFile, ModuleId};
use crate::name_generator::{is_module_var, NameGenerator};
use crate::scope::{ScopeId, Variable};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// What an import or export ultimately refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedBinding {
    /// A module-level binding, by its source name.
    Local { module: ModuleId, original: String },
    /// The namespace object of a module.
    Namespace(ModuleId),
}

/// A module that made it into the bundle.
fn live(modules: &[ModuleFile], id: ModuleId) -> Option<&ModuleFile> {
    modules
        .get(id.index())
        .filter(|module| !module.is_failed() && module.ast().is_some())
}

/// Resolve the export `name` of `module`, following re-exports and
/// `export *`. `None` for unknown names, external modules and cycles.
#[must_use]
pub fn resolve_export(modules: &[ModuleFile], module: ModuleId, name: &str) -> Option<ResolvedBinding> {
    resolve_export_in(modules, module, name, &mut HashSet::default())
}

/// Resolve the module-level binding `local` (source name) of `module`.
/// Import locals resolve to what they import.
#[must_use]
pub fn resolve_local(modules: &[ModuleFile], module: ModuleId, local: &str) -> Option<ResolvedBinding> {
    resolve_local_in(modules, module, local, &mut HashSet::default())
}

fn resolve_export_in(
    modules: &[ModuleFile],
    id: ModuleId,
    name: &str,
    visited: &mut HashSet<(ModuleId, String)>,
) -> Option<ResolvedBinding> {
    if !visited.insert((id, name.to_string())) {
        return None;
    }
    let module = live(modules, id)?;
    match module.exports().get(name) {
        Some(ExportEntry::Local(local)) => resolve_local_in(modules, id, local, visited),
        Some(ExportEntry::ReExport { source, imported }) => {
            let target = module.dependency_target(source)?;
            resolve_export_in(modules, target, imported, visited)
        }
        Some(ExportEntry::Namespace { source }) => module
            .dependency_target(source)
            .filter(|&target| live(modules, target).is_some())
            .map(ResolvedBinding::Namespace),
        // `export *` never forwards `default`
        None if name == "default" => None,
        None => module
            .star_exports()
            .iter()
            .filter_map(|source| module.dependency_target(source))
            .find_map(|target| resolve_export_in(modules, target, name, visited)),
    }
}

fn resolve_local_in(
    modules: &[ModuleFile],
    id: ModuleId,
    local: &str,
    visited: &mut HashSet<(ModuleId, String)>,
) -> Option<ResolvedBinding> {
    let module = live(modules, id)?;
    let Some(binding) = module.import_binding(local) else {
        return Some(ResolvedBinding::Local {
            module: id,
            original: local.to_string(),
        });
    };
    let target = module.dependency_target(&binding.source)?;
    live(modules, target)?;
    match &binding.imported {
        ImportedName::Namespace => Some(ResolvedBinding::Namespace(target)),
        ImportedName::Named(name) => resolve_export_in(modules, target, name, visited),
    }
}

/// Every name `module` exports, including names reached through
/// `export *`, in declaration order.
#[must_use]
pub fn export_names(modules: &[ModuleFile], module: ModuleId) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::default();
    let mut visited = HashSet::default();
    collect_export_names(modules, module, true, &mut names, &mut seen, &mut visited);
    names
}

fn collect_export_names(
    modules: &[ModuleFile],
    id: ModuleId,
    with_default: bool,
    names: &mut Vec<String>,
    seen: &mut HashSet<String>,
    visited: &mut HashSet<ModuleId>,
) {
    if !visited.insert(id) {
        return;
    }
    let Some(module) = live(modules, id) else {
        return;
    };
    for name in module.exports().keys() {
        if (with_default || name != "default") && seen.insert(name.clone()) {
            names.push(name.clone());
        }
    }
    for source in module.star_exports() {
        if let Some(target) = module.dependency_target(source) {
            collect_export_names(modules, target, false, names, seen, visited);
        }
    }
}

/// Current name of a resolved binding.
#[must_use]
pub fn binding_name(modules: &[ModuleFile], binding: &ResolvedBinding) -> Option<String> {
    match binding {
        ResolvedBinding::Local { module, original } => {
            let module = live(modules, *module)?;
            let var = module.scope().root_variable_by_original(original);
            Some(var.map_or_else(|| original.clone(), |var| var.name.clone()))
        }
        ResolvedBinding::Namespace(module) => Some(live(modules, *module)?.module_var_name()),
    }
}

/// Renames to apply to one module.
#[derive(Debug, Default)]
struct ModulePlan {
    root: Vec<(String, String)>,
    /// Import locals whose final name is already held by another local of
    /// the same binding. Only their slots are rewritten.
    aliases: Vec<(String, String)>,
    inner: Vec<(ScopeId, Vec<(String, String)>)>,
}

/// Rename every module-level binding of the bundle. Returns warnings.
pub(crate) fn rename_root_level(modules: &mut [ModuleFile], minify: bool) -> Vec<String> {
    let (plans, mut warnings) = plan_root_level(modules, minify);

    for (module, plan) in modules.iter_mut().zip(plans) {
        let path = module.path().to_string();
        let Some(program) = module.ast.as_mut() else {
            continue;
        };
        if !module.scope.batch_rename_symbols(ScopeId::ROOT, &mut program.idents, &plan.root) {
            warnings.push(format!("some module-level renames in {path} were rejected"));
        }
        for (old, new) in &plan.aliases {
            if !module.scope.alias_variable(ScopeId::ROOT, old, &mut program.idents, new) {
                warnings.push(format!("'{old}' in {path} could not be renamed to '{new}'"));
            }
        }
        for (scope, changes) in &plan.inner {
            if !module.scope.batch_rename_symbols(*scope, &mut program.idents, changes) {
                warnings.push(format!("some renames inside {path} were rejected"));
            }
        }
        tracing::trace!(
            module = %path,
            root = plan.root.len(),
            aliases = plan.aliases.len(),
            inner = plan.inner.len(),
            "applied module-level renames"
        );
    }
    warnings
}

/// First of `name_1`, `name_2`, ... that `is_free` accepts. Module variable
/// names are never returned, so `mod` continues as `mod__1`.
fn suffixed(name: &str, is_free: impl Fn(&str) -> bool) -> String {
    let stem = if is_module_var(&format!("{name}_1")) {
        format!("{name}_")
    } else {
        name.to_string()
    };
    let mut n = 1u32;
    loop {
        let candidate = format!("{stem}_{n}");
        if !is_module_var(&candidate) && is_free(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn plan_root_level(modules: &[ModuleFile], minify: bool) -> (Vec<ModulePlan>, Vec<String>) {
    let mut warnings = Vec::new();
    let bundled: Vec<&ModuleFile> = modules
        .iter()
        .filter(|module| live(modules, module.id()).is_some())
        .collect();

    let globals: HashSet<String> = bundled
        .iter()
        .flat_map(|module| module.scope().unresolved().iter().cloned())
        .collect();
    let root_originals: HashSet<String> = bundled
        .iter()
        .flat_map(|module| module.scope().root().own_variables.values())
        .map(|var| var.original.clone())
        .collect();

    // Import locals that point into the bundle.
    let mut linked: HashMap<(ModuleId, String), ResolvedBinding> = HashMap::default();
    for module in &bundled {
        for binding in module.imports() {
            match resolve_local(modules, module.id(), &binding.local) {
                Some(resolved) => {
                    linked.insert((module.id(), binding.local.clone()), resolved);
                }
                None => {
                    let target = module
                        .dependency_target(&binding.source)
                        .and_then(|target| live(modules, target));
                    if let (Some(target), ImportedName::Named(name)) = (target, &binding.imported) {
                        warnings.push(format!(
                            "'{name}' is not exported by {} (imported by {})",
                            target.path(),
                            module.path()
                        ));
                    }
                }
            }
        }
    }

    // Final names of the module-level bindings each module owns.
    let mut finals: HashMap<(ModuleId, String), String> = HashMap::default();
    let mut taken: HashSet<String> = HashSet::default();
    let owned = |module: &ModuleFile| {
        let id = module.id();
        module
            .scope()
            .root()
            .own_variables
            .values()
            .filter(|var| !linked.contains_key(&(id, var.original.clone())))
            .map(|var| (var.name.clone(), var.original.clone()))
            .collect::<Vec<_>>()
    };

    if minify {
        let mut generator = NameGenerator::merge(bundled.iter().filter_map(|module| module.generator()));
        for module in &bundled {
            for scope in module.scope().iter() {
                for name in scope.own_variables.keys() {
                    generator.block(name.clone());
                }
            }
        }
        for global in &globals {
            generator.block(global.clone());
        }

        // Modules with a module-level `eval` keep their names, except ones
        // shaped like `mod_<id>`.
        for module in bundled.iter().filter(|module| module.scope().root().has_eval) {
            let declared = module.scope().inner_declared_names();
            for (name, original) in owned(module) {
                let kept = if taken.contains(&name) || is_module_var(&name) {
                    suffixed(&name, |c| {
                        !taken.contains(c) && !globals.contains(c) && !declared.contains(c)
                    })
                } else {
                    name
                };
                generator.claim(kept.clone());
                taken.insert(kept.clone());
                finals.insert((module.id(), original), kept);
            }
        }
        for module in bundled.iter().filter(|module| !module.scope().root().has_eval) {
            for (name, original) in owned(module) {
                let fresh = generator.next(&name).unwrap_or_else(|| {
                    tracing::warn!(name = %name, "name space exhausted, keeping name");
                    name
                });
                taken.insert(fresh.clone());
                finals.insert((module.id(), original), fresh);
            }
        }
    } else {
        // First module wins; later ones get a numeric suffix. `mod_<id>`
        // belongs to namespace objects.
        for module in &bundled {
            let declared = module.scope().inner_declared_names();
            for (name, original) in owned(module) {
                let clashes =
                    taken.contains(&name) || globals.contains(&name) || is_module_var(&name);
                let kept = if clashes {
                    suffixed(&original, |c| {
                        !taken.contains(c)
                            && !globals.contains(c)
                            && !declared.contains(c)
                            && !root_originals.contains(c)
                    })
                } else {
                    name
                };
                taken.insert(kept.clone());
                finals.insert((module.id(), original), kept);
            }
        }
    }

    let mut plans: Vec<ModulePlan> = modules.iter().map(|_| ModulePlan::default()).collect();
    for module in &bundled {
        let id = module.id();
        let plan = &mut plans[id.index()];
        let root = &module.scope().root().own_variables;

        let binding_of = |var: &Variable| {
            linked
                .get(&(id, var.original.clone()))
                .cloned()
                .unwrap_or_else(|| ResolvedBinding::Local {
                    module: id,
                    original: var.original.clone(),
                })
        };

        // Names kept as they are, then the renames. Two locals of one
        // binding share a name, so the later one becomes an alias.
        let mut holders: HashMap<String, ResolvedBinding> = HashMap::default();
        let mut moving = Vec::new();
        for var in root.values() {
            let final_name = match linked.get(&(id, var.original.clone())) {
                None => finals.get(&(id, var.original.clone())).cloned(),
                Some(ResolvedBinding::Local { module, original }) => finals
                    .get(&(*module, original.clone()))
                    .cloned()
                    .or_else(|| binding_name(modules, &ResolvedBinding::Local {
                        module: *module,
                        original: original.clone(),
                    })),
                Some(namespace @ ResolvedBinding::Namespace(_)) => binding_name(modules, namespace),
            };
            match final_name.filter(|name| *name != var.name) {
                Some(final_name) => moving.push((var, final_name)),
                None => {
                    holders.insert(var.name.clone(), binding_of(var));
                }
            }
        }
        for (var, final_name) in moving {
            let binding = binding_of(var);
            match holders.get(&final_name) {
                Some(holder) if *holder == binding => {
                    plan.aliases.push((var.name.clone(), final_name));
                }
                Some(_) => warnings.push(format!(
                    "'{}' in {} cannot take the name '{final_name}' of another binding",
                    var.original,
                    module.path()
                )),
                None => {
                    holders.insert(final_name.clone(), binding);
                    plan.root.push((var.name.clone(), final_name));
                }
            }
        }

        // An import renamed to a name an inner scope declares would be
        // shadowed there; move the inner variable out of the way.
        let mut declared: HashSet<String> = module
            .scope()
            .iter()
            .flat_map(|scope| scope.own_variables.keys().cloned())
            .collect();
        let mut import_finals: Vec<String> = plan
            .root
            .iter()
            .chain(&plan.aliases)
            .filter(|(old, _)| {
                root.get(old)
                    .is_some_and(|var| linked.contains_key(&(id, var.original.clone())))
            })
            .map(|(_, new)| new.clone())
            .collect();
        import_finals.sort();
        import_finals.dedup();
        for scope in module.scope().iter().skip(1) {
            let mut changes = Vec::new();
            for name in &import_finals {
                if !scope.own_variables.contains_key(name) {
                    continue;
                }
                if scope.has_eval {
                    warnings.push(format!(
                        "'{name}' in {} is shadowed inside a scope using eval",
                        module.path()
                    ));
                    continue;
                }
                let fresh = suffixed(name, |c| {
                    !taken.contains(c)
                        && !globals.contains(c)
                        && !declared.contains(c)
                        && !root_originals.contains(c)
                });
                declared.insert(fresh.clone());
                changes.push((name.clone(), fresh));
            }
            if !changes.is_empty() {
                plan.inner.push((scope.id, changes));
            }
        }
    }

    tracing::debug!(
        modules = bundled.len(),
        bindings = finals.len(),
        imports = linked.len(),
        "planned module-level renames"
    );
    (plans, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BundleConfig;
    use crate::module_file::ModuleState;
    use crate::provider::MemoryModuleProvider;
    use jetpack_parser::{Codegen, CodegenOptions};

    /// Modules parsed from `sources`, each linked to the others by
    /// specifier `./<index>`.
    fn graph(sources: &[&str]) -> Vec<ModuleFile> {
        let config = BundleConfig::new(".");
        sources
            .iter()
            .enumerate()
            .map(|(i, source)| {
                let provider = MemoryModuleProvider::new(format!("./{i}"), *source);
                let mut module = ModuleFile::new(ModuleId(i as u32), format!("{i}.js"), 0);
                module.load(&provider).unwrap();
                module.parse(&config).unwrap();
                for dep in &mut module.dependencies {
                    dep.target = dep
                        .specifier
                        .strip_prefix("./")
                        .and_then(|n| n.parse().ok())
                        .map(ModuleId);
                }
                module.set_state(ModuleState::LinkResolved);
                module
            })
            .collect()
    }

    fn root_names(module: &ModuleFile) -> Vec<String> {
        module.scope().root().own_variables.keys().cloned().collect()
    }

    #[test]
    fn test_resolve_through_reexport_chain() {
        let modules = graph(&[
            "export const value = 1;",
            "export { value as renamed } from './0';",
            "export * from './1';",
            "import { renamed } from './2';",
        ]);
        assert_eq!(
            resolve_local(&modules, ModuleId(3), "renamed"),
            Some(ResolvedBinding::Local {
                module: ModuleId(0),
                original: "value".into()
            })
        );
    }

    #[test]
    fn test_star_export_skips_default() {
        let modules = graph(&["export default 1; export const a = 2;", "export * from './0';"]);
        assert_eq!(resolve_export(&modules, ModuleId(1), "default"), None);
        assert!(resolve_export(&modules, ModuleId(1), "a").is_some());
        assert_eq!(export_names(&modules, ModuleId(1)), vec!["a"]);
    }

    #[test]
    fn test_cyclic_reexports_terminate() {
        let modules = graph(&["export * from './1';", "export * from './0';"]);
        assert_eq!(resolve_export(&modules, ModuleId(0), "missing"), None);
    }

    #[test]
    fn test_namespace_import_resolves_to_module() {
        let modules = graph(&["export const a = 1;", "import * as ns from './0';"]);
        assert_eq!(
            resolve_local(&modules, ModuleId(1), "ns"),
            Some(ResolvedBinding::Namespace(ModuleId(0)))
        );
    }

    #[test]
    fn test_first_module_wins() {
        let mut modules = graph(&["var a = 1;", "var a = 2;", "var a = 3;"]);
        let warnings = rename_root_level(&mut modules, false);
        assert!(warnings.is_empty());
        assert_eq!(root_names(&modules[0]), vec!["a"]);
        assert_eq!(root_names(&modules[1]), vec!["a_1"]);
        assert_eq!(root_names(&modules[2]), vec!["a_2"]);
    }

    #[test]
    fn test_import_takes_final_name() {
        let mut modules = graph(&[
            "var shared = 1;",
            "var shared = 2; export { shared };",
            "import { shared as local } from './1'; local;",
        ]);
        rename_root_level(&mut modules, false);
        assert_eq!(root_names(&modules[1]), vec!["shared_1"]);
        assert_eq!(root_names(&modules[2]), vec!["shared_1"]);
    }

    #[test]
    fn test_namespace_import_becomes_module_var() {
        let mut modules = graph(&["export const a = 1;", "import * as ns from './0'; ns.a;"]);
        rename_root_level(&mut modules, false);
        assert_eq!(root_names(&modules[1]), vec!["mod_0"]);
    }

    #[test]
    fn test_global_is_never_taken() {
        let mut modules = graph(&["var console = 1;", "console.log(1);"]);
        rename_root_level(&mut modules, false);
        assert_eq!(root_names(&modules[0]), vec!["console_1"]);
    }

    #[test]
    fn test_shadowing_inner_variable_is_moved() {
        let mut modules = graph(&[
            "export function helper() {}",
            "import { helper as h } from './0';\nfunction run() { let helper = 1; return h(helper); }",
        ]);
        rename_root_level(&mut modules, false);
        let module = &modules[1];
        let inner: Vec<String> = module
            .scope()
            .iter()
            .skip(1)
            .flat_map(|scope| scope.own_variables.keys().cloned())
            .collect();
        assert!(inner.contains(&"helper_1".to_string()));
        assert_eq!(root_names(module), vec!["helper", "run"]);
    }

    #[test]
    fn test_minify_names_are_unique_across_modules() {
        let mut modules = graph(&[
            "export const first = 1; function inner(x) { return x; }",
            "import { first } from './0'; const second = first;",
        ]);
        for module in &mut modules {
            module.rename_inner_scopes();
        }
        rename_root_level(&mut modules, true);

        let name_of = |module: &ModuleFile, original: &str| {
            module.scope().root_variable_by_original(original).unwrap().name.clone()
        };
        let first = name_of(&modules[0], "first");
        let inner = name_of(&modules[0], "inner");
        let second = name_of(&modules[1], "second");
        // The import prints as the exporter's name.
        assert_eq!(name_of(&modules[1], "first"), first);
        assert_ne!(first, inner);
        assert_ne!(second, first);
        assert_ne!(second, inner);
        // Never the parameter's inner name.
        assert!(![&first, &inner, &second].contains(&&"a".to_string()));
        for name in [&first, &inner, &second] {
            assert!(name.len() <= 2, "{name} is not minified");
        }
    }

    #[test]
    fn test_second_import_of_kept_name_is_aliased() {
        let mut modules = graph(&[
            "export const a = 1;",
            "import { a } from './0';\nimport { a as b } from './0';\na;\nb;",
        ]);
        let warnings = rename_root_level(&mut modules, false);
        assert!(warnings.is_empty(), "{warnings:?}");

        let module = &modules[1];
        assert_eq!(root_names(module), vec!["a", "b"]);
        let code = Codegen::new(module.ast().unwrap(), CodegenOptions::default()).generate();
        assert!(code.ends_with("a;\na;\n"), "{code}");
    }

    #[test]
    fn test_aliased_import_moves_shadowing_inner_variable() {
        let mut modules = graph(&[
            "export const a = 1;",
            "import { a } from './0';\nimport { a as b } from './0';\nfunction f() { let a = 2; return b + a; }",
        ]);
        rename_root_level(&mut modules, false);
        let inner: Vec<String> = modules[1]
            .scope()
            .iter()
            .skip(1)
            .flat_map(|scope| scope.own_variables.keys().cloned())
            .collect();
        assert!(inner.contains(&"a_1".to_string()), "{inner:?}");
    }

    #[test]
    fn test_suffixes_skip_module_vars() {
        assert_eq!(suffixed("mod", |_| true), "mod__1");
        assert_eq!(suffixed("mod_1", |_| true), "mod_1_1");
        assert_eq!(suffixed("value", |c| c != "value_1"), "value_2");
    }

    #[test]
    fn test_source_module_var_names_are_moved() {
        let mut modules = graph(&[
            "var mod_1 = 'mine'; mod_1;",
            "export const x = 1;",
            "import * as ns from './1'; ns.x;",
        ]);
        let warnings = rename_root_level(&mut modules, false);
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(root_names(&modules[0]), vec!["mod_1_1"]);
        assert_eq!(root_names(&modules[2]), vec!["mod_1"]);
    }

    #[test]
    fn test_eval_module_gives_up_module_var_names() {
        let mut modules = graph(&["var mod_0 = 1; eval('mod_0');"]);
        for module in &mut modules {
            module.rename_inner_scopes();
        }
        rename_root_level(&mut modules, true);
        assert_eq!(root_names(&modules[0]), vec!["mod_0_1"]);
    }

    #[test]
    fn test_missing_export_warns() {
        let mut modules = graph(&["export const a = 1;", "import { b } from './0';"]);
        let warnings = rename_root_level(&mut modules, false);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'b' is not exported by 0.js"));
    }
}
