//! Module resolution and bundling sessions.
//!
//! ## Phases
//!
//! 1. **Discovery** - fetch and parse the entry, then fan out over its
//!    dependencies on the rayon pool. A path is claimed in the shared graph
//!    before it is fetched, so every module is loaded exactly once even in
//!    cycles and diamonds.
//! 2. **Linking** - ids are reassigned in depth-first order from the entry so
//!    that output never depends on thread timing.
//! 3. **Renaming** - inner scopes of every module in parallel (minify only),
//!    then module-level bindings across the whole graph.
//! 4. **Emission** - see [`BundleOutput`].

mod emit;
mod link;
mod normalize;

pub use emit::BundleOutput;
pub use link::{binding_name, export_names, resolve_export, resolve_local, ResolvedBinding};
pub use normalize::normalize_export_default;

use crate::config::{BundleConfig, FailurePolicy};
use crate::error::{Error, Result};
use crate::module_file::{ModuleFile, ModuleId, ModuleState};
use crate::provider::{FileModuleProvider, MemoryModuleProvider, ModuleProvider, MEMORY_MODULE_TOKEN};
use crate::trace::TraceRecorder;
use jetpack_util::path::{normalize, to_slash};
use rayon::prelude::*;
use rustc_hash::FxHashMap as HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// State owned by one session. Never shared between resolvers.
#[derive(Debug, Default)]
pub struct SessionContext {
    next_id: AtomicU32,
}

impl SessionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next module id.
    pub fn next_module_id(&self) -> ModuleId {
        ModuleId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    #[must_use]
    pub fn module_count(&self) -> u32 {
        self.next_id.load(Ordering::Relaxed)
    }
}

/// The module graph while discovery is running.
#[derive(Default)]
struct Graph {
    by_path: HashMap<String, ModuleId>,
    /// Indexed by id. A slot is empty while a worker owns the module.
    modules: Vec<Option<ModuleFile>>,
    /// Non-fatal failures under [`FailurePolicy::Continue`].
    reports: Vec<(ModuleId, Error)>,
}

struct Discovery<'a> {
    graph: Mutex<Graph>,
    providers: &'a [Box<dyn ModuleProvider>],
    config: &'a BundleConfig,
    context: &'a SessionContext,
}

impl Discovery<'_> {
    fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `path`. Returns its id and whether the caller has to visit it.
    fn claim(&self, path: String, provider: usize) -> (ModuleId, bool) {
        let mut graph = self.lock();
        if let Some(&id) = graph.by_path.get(&path) {
            return (id, false);
        }
        let id = self.context.next_module_id();
        tracing::trace!(module = %path, id = id.0, "discovered");
        graph.by_path.insert(path.clone(), id);
        graph.modules.push(Some(ModuleFile::new(id, path, provider)));
        (id, true)
    }

    fn checkout(&self, id: ModuleId) -> Option<ModuleFile> {
        self.lock().modules.get_mut(id.index()).and_then(Option::take)
    }

    fn checkin(&self, module: ModuleFile) {
        let mut graph = self.lock();
        if let Some(slot) = graph.modules.get_mut(module.id().index()) {
            *slot = Some(module);
        }
    }

    fn report(&self, id: ModuleId, error: Error) {
        self.lock().reports.push((id, error));
    }

    fn into_graph(self) -> Graph {
        self.graph.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// First provider that serves `specifier`, with the resolved path.
fn match_specifier(
    providers: &[Box<dyn ModuleProvider>],
    importer: &str,
    specifier: &str,
) -> Option<(String, usize)> {
    providers
        .iter()
        .enumerate()
        .find_map(|(i, provider)| provider.match_path(importer, specifier).map(|path| (path, i)))
}

/// Load and parse module `id`, then claim and spawn its dependencies.
fn visit<'s>(scope: &rayon::Scope<'s>, discovery: &'s Discovery<'s>, id: ModuleId) {
    let Some(mut module) = discovery.checkout(id) else {
        return;
    };
    let provider = &discovery.providers[module.provider_index()];
    tracing::trace!(module = %module.path(), provider = provider.name(), "loading");

    let loaded = module.load(provider.as_ref()).map(|_| ());
    if let Err(err) = loaded.and_then(|()| module.parse(discovery.config)) {
        module.fail(err);
        discovery.checkin(module);
        return;
    }

    let importer = module.path().to_string();
    let mut unresolved = None;
    for dep in &mut module.dependencies {
        if let Some((path, provider)) = match_specifier(discovery.providers, &importer, &dep.specifier) {
            let (target, fresh) = discovery.claim(path, provider);
            dep.target = Some(target);
            if fresh {
                scope.spawn(move |scope| visit(scope, discovery, target));
            }
            continue;
        }

        let err = Error::UnresolvedImport {
            specifier: dep.specifier.clone(),
            importer: importer.clone(),
        };
        match discovery.config.failure_policy {
            FailurePolicy::Abort => {
                unresolved.get_or_insert(err);
            }
            FailurePolicy::Continue => {
                tracing::warn!(module = %importer, specifier = %dep.specifier, "import left unresolved");
                discovery.report(id, err);
            }
        }
    }

    if let Some(err) = unresolved {
        module.fail(err);
    }
    discovery.checkin(module);
}

/// Drives one bundling session: discovery, renaming and emission.
///
/// ```ignore
/// let mut resolver = ModuleResolver::new(BundleConfig::new("app"));
/// resolver.begin_from_entry("src/index.js")?;
/// let output = resolver.bundle("bundle.js")?;
/// ```
pub struct ModuleResolver {
    config: BundleConfig,
    providers: Vec<Box<dyn ModuleProvider>>,
    context: SessionContext,
    modules: Vec<ModuleFile>,
    entry: Option<ModuleId>,
    failures: Vec<Error>,
    warnings: Vec<String>,
    trace: TraceRecorder,
}

impl ModuleResolver {
    /// A resolver serving files under `config.base_path`.
    #[must_use]
    pub fn new(mut config: BundleConfig) -> Self {
        config.base_path = absolute_base(&config.base_path);
        let providers: Vec<Box<dyn ModuleProvider>> =
            vec![Box::new(FileModuleProvider::new(config.base_path.clone()))];
        Self {
            config,
            providers,
            context: SessionContext::new(),
            modules: Vec::new(),
            entry: None,
            failures: Vec::new(),
            warnings: Vec::new(),
            trace: TraceRecorder::new(),
        }
    }

    /// Add a provider. Providers are asked in registration order.
    #[must_use]
    pub fn with_provider(mut self, provider: Box<dyn ModuleProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    #[must_use]
    pub fn config(&self) -> &BundleConfig {
        &self.config
    }

    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Every discovered module, indexed by id.
    #[must_use]
    pub fn modules(&self) -> &[ModuleFile] {
        &self.modules
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&ModuleFile> {
        self.modules.get(id.index())
    }

    #[must_use]
    pub fn module_by_path(&self, path: &str) -> Option<&ModuleFile> {
        self.modules.iter().find(|module| module.path() == path)
    }

    #[must_use]
    pub fn entry(&self) -> Option<ModuleId> {
        self.entry
    }

    /// Failures collected under [`FailurePolicy::Continue`], in module order.
    #[must_use]
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    /// Warnings from linking and emission.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Discover the graph starting at the file `path`, absolute or relative
    /// to the base directory.
    pub fn begin_from_entry(&mut self, path: impl AsRef<Path>) -> Result<ModuleId> {
        let path = path.as_ref();
        let not_found = || Error::EntryNotFound {
            path: path.display().to_string(),
        };
        let relative = if path.is_absolute() {
            normalize(path)
                .strip_prefix(&self.config.base_path)
                .map(Path::to_path_buf)
                .map_err(|_| not_found())?
        } else {
            path.to_path_buf()
        };
        let specifier = format!("./{}", to_slash(&relative));
        let (resolved, provider) =
            match_specifier(&self.providers, "", &specifier).ok_or_else(not_found)?;
        self.discover(resolved, provider)
    }

    /// Discover the graph starting at an in-memory module. Its relative
    /// imports resolve against the base directory.
    pub fn begin_from_entry_string(&mut self, source: impl Into<String>) -> Result<ModuleId> {
        self.providers
            .insert(0, Box::new(MemoryModuleProvider::new(MEMORY_MODULE_TOKEN, source)));
        let (resolved, provider) = match_specifier(&self.providers, "", MEMORY_MODULE_TOKEN)
            .ok_or_else(|| Error::EntryNotFound {
                path: MEMORY_MODULE_TOKEN.to_string(),
            })?;
        self.discover(resolved, provider)
    }

    fn discover(&mut self, path: String, provider: usize) -> Result<ModuleId> {
        if self.entry.is_some() {
            return Err(Error::other("a session can only have one entry"));
        }
        let _span = tracing::info_span!("discover", entry = %path).entered();
        let started = self.trace.start();

        let discovery = Discovery {
            graph: Mutex::new(Graph::default()),
            providers: &self.providers,
            config: &self.config,
            context: &self.context,
        };
        let (root, _) = discovery.claim(path, provider);
        rayon::scope(|scope| visit(scope, &discovery, root));
        let graph = discovery.into_graph();

        let entry = self.link(graph, root)?;
        self.trace.finish("discover", started);
        tracing::info!(
            modules = self.modules.len(),
            failures = self.failures.len(),
            "discovery finished"
        );
        Ok(entry)
    }

    /// Reassign ids in depth-first preorder from `root` and settle failures.
    fn link(&mut self, graph: Graph, root: ModuleId) -> Result<ModuleId> {
        let mut slots = graph.modules;

        let mut order = Vec::with_capacity(slots.len());
        let mut seen = vec![false; slots.len()];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.index()], true) {
                continue;
            }
            order.push(id);
            if let Some(module) = &slots[id.index()] {
                stack.extend(module.dependencies().iter().rev().filter_map(|dep| dep.target));
            }
        }
        order.extend((0..slots.len() as u32).map(ModuleId).filter(|id| !seen[id.index()]));

        let mut new_ids = vec![ModuleId(0); slots.len()];
        for (new, old) in order.iter().enumerate() {
            new_ids[old.index()] = ModuleId(new as u32);
        }

        let mut modules = Vec::with_capacity(order.len());
        for old in &order {
            let Some(mut module) = slots[old.index()].take() else {
                continue;
            };
            module.set_id(new_ids[old.index()]);
            for dep in &mut module.dependencies {
                dep.target = dep.target.map(|target| new_ids[target.index()]);
            }
            if !module.is_failed() {
                module.set_state(ModuleState::LinkResolved);
            }
            modules.push(module);
        }

        let mut failures: Vec<(ModuleId, Error)> = graph
            .reports
            .into_iter()
            .map(|(id, err)| (new_ids[id.index()], err))
            .collect();
        for module in &mut modules {
            if let Some(err) = module.take_error() {
                let path = module.path().to_string();
                failures.push((module.id(), err.in_module(path)));
            }
        }
        failures.sort_by_key(|(id, _)| *id);

        let entry = new_ids[root.index()];
        let entry_failed = modules.get(entry.index()).map_or(true, ModuleFile::is_failed);
        self.modules = modules;
        self.entry = Some(entry);

        let abort = entry_failed || self.config.failure_policy == FailurePolicy::Abort;
        let mut failures = failures.into_iter().map(|(_, err)| err);
        if abort {
            if let Some(err) = failures.next() {
                return Err(err);
            }
        }
        self.failures = failures.collect();
        Ok(entry)
    }

    /// Rename every scope below module level, all modules in parallel.
    pub fn rename_all_inner_scopes(&mut self) {
        let _span = tracing::info_span!("rename_inner_scopes", modules = self.modules.len()).entered();
        let started = self.trace.start();
        self.modules
            .par_iter_mut()
            .filter(|module| !module.is_failed())
            .for_each(|module| {
                module.rename_inner_scopes();
            });
        self.trace.finish("rename_inner_scopes", started);
    }

    /// Give every module-level binding of the graph its final name and
    /// point import locals at the bindings they import.
    pub fn rename_all_root_level_variables(&mut self) {
        let _span = tracing::info_span!("rename_root_level").entered();
        let started = self.trace.start();
        let warnings = link::rename_root_level(&mut self.modules, self.config.minify());
        for module in self.modules.iter_mut().filter(|module| !module.is_failed()) {
            module.set_state(ModuleState::Renamed);
        }
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        self.warnings.extend(warnings);
        self.trace.finish("rename_root_level", started);
    }

    /// Exported names of the entry module with the local name each one
    /// currently refers to.
    #[must_use]
    pub fn all_export_vars(&self) -> Vec<(String, String)> {
        let Some(entry) = self.entry else {
            return Vec::new();
        };
        export_names(&self.modules, entry)
            .into_iter()
            .filter_map(|name| {
                let binding = resolve_export(&self.modules, entry, &name)?;
                let local = binding_name(&self.modules, &binding)?;
                Some((name, local))
            })
            .collect()
    }

    /// Rename and emit the bundle. `file_name` is recorded in the source map.
    pub fn bundle(&mut self, file_name: &str) -> Result<BundleOutput> {
        let entry = self
            .entry
            .ok_or_else(|| Error::other("no entry module; call begin_from_entry first"))?;
        if self.modules.iter().any(|module| module.state() == ModuleState::Emitted) {
            return Err(Error::other("bundle was already emitted for this session"));
        }

        if self.config.minify() {
            self.rename_all_inner_scopes();
        }
        self.rename_all_root_level_variables();

        let _span = tracing::info_span!("emit", file = file_name).entered();
        let started = self.trace.start();
        let mut output = emit::emit_bundle(&mut self.modules, entry, &self.config, file_name)?;
        self.trace.finish("emit", started);

        let mut warnings = self.warnings.clone();
        warnings.append(&mut output.warnings);
        output.warnings = warnings;
        Ok(output)
    }
}

fn absolute_base(base: &Path) -> PathBuf {
    if base.is_absolute() {
        return normalize(base);
    }
    std::env::current_dir().map_or_else(|_| normalize(base), |cwd| normalize(&cwd.join(base)))
}
