//! One-call entry points used by the CLI.

use crate::config::{BundleConfig, BundleFlags, FailurePolicy};
use crate::error::{Error, Result};
use crate::module_file::ModuleFile;
use crate::resolver::{BundleOutput, ModuleResolver};
use jetpack_parser::{CodegenOptions, ParserOptions};
use jetpack_util::fs::atomic_write;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// What analysis learned about one module.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModuleSummary {
    pub id: u32,
    pub path: String,
    /// Name of the module's namespace variable.
    pub module_var: String,
    /// Short BLAKE3 digest of the source.
    pub hash: Option<String>,
    pub state: &'static str,
    /// Import and re-export specifiers, in source order.
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub error: Option<String>,
}

impl ModuleSummary {
    fn of(module: &ModuleFile) -> Self {
        Self {
            id: module.id().0,
            path: module.path().to_string(),
            module_var: module.module_var_name(),
            hash: module.content_hash().map(|hash| hash.short()),
            state: module.state().as_str(),
            imports: module
                .dependencies()
                .iter()
                .map(|dep| dep.specifier.clone())
                .collect(),
            exports: module.exports().keys().cloned().collect(),
            error: module.error().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AnalyzeReport {
    pub entry: String,
    pub modules: Vec<ModuleSummary>,
    /// Failures that did not stop the analysis.
    pub failures: Vec<String>,
}

/// Discover the graph of `path` without emitting anything. Modules that
/// fail are reported instead of aborting, unless the entry itself fails.
pub fn analyze_module(
    path: impl AsRef<Path>,
    flags: BundleFlags,
    base_path: impl Into<PathBuf>,
) -> Result<AnalyzeReport> {
    let config = BundleConfig::new(base_path)
        .with_flags(flags)
        .with_failure_policy(FailurePolicy::Continue);
    analyze(config, path)
}

/// [`analyze_module`] with a full config.
pub fn analyze(config: BundleConfig, path: impl AsRef<Path>) -> Result<AnalyzeReport> {
    let mut resolver = ModuleResolver::new(config);
    let entry = resolver.begin_from_entry(path)?;
    let entry_path = resolver
        .module(entry)
        .map(|module| module.path().to_string())
        .unwrap_or_default();

    Ok(AnalyzeReport {
        entry: entry_path,
        modules: resolver.modules().iter().map(ModuleSummary::of).collect(),
        failures: resolver.failures().iter().map(ToString::to_string).collect(),
    })
}

/// Bundle `path` into `out_path`.
pub fn bundle_module(
    path: impl AsRef<Path>,
    out_path: impl AsRef<Path>,
    flags: BundleFlags,
    base_path: impl Into<PathBuf>,
) -> Result<BundleOutput> {
    bundle(BundleConfig::new(base_path).with_flags(flags), path, out_path)
}

/// [`bundle_module`] with a full config.
///
/// Writes the bundle, plus `<out>.map` with [`BundleFlags::SOURCEMAP`] and
/// `<out>.trace.json` with [`BundleFlags::TRACE_FILE`]. Nothing is written
/// when the session fails. Every file is rendered before the first write,
/// and the bundle itself is written last.
pub fn bundle(config: BundleConfig, path: impl AsRef<Path>, out_path: impl AsRef<Path>) -> Result<BundleOutput> {
    let out_path = out_path.as_ref();
    let file_name = out_path
        .file_name()
        .map_or_else(|| "bundle.js".to_string(), |name| name.to_string_lossy().into_owned());
    let flags = config.flags;

    let mut resolver = ModuleResolver::new(config);
    resolver.begin_from_entry(path)?;
    let mut output = resolver.bundle(&file_name)?;

    let mut extra = Vec::new();
    if flags.contains(BundleFlags::TRACE_FILE) {
        let trace = resolver
            .trace()
            .to_json()
            .map_err(|err| Error::other(format!("Failed to render trace: {err}")))?;
        extra.push((with_extension_suffix(out_path, ".trace.json"), trace));
    }
    if let Some(map) = &output.map {
        if !output.code.is_empty() && !output.code.ends_with('\n') {
            output.code.push('\n');
        }
        output
            .code
            .push_str(&format!("//# sourceMappingURL={file_name}.map\n"));
        extra.push((with_extension_suffix(out_path, ".map"), map.clone()));
    }

    for (path, contents) in &extra {
        write_file(path, contents.as_bytes())?;
    }
    write_file(out_path, output.code.as_bytes())?;

    tracing::info!(
        out = %out_path.display(),
        modules = output.modules.len(),
        bytes = output.code.len(),
        "bundle written"
    );
    Ok(output)
}

/// Parse `source` and print it back.
pub fn parse_and_codegen(
    source: &str,
    parser_options: ParserOptions,
    codegen_options: CodegenOptions,
) -> Result<String> {
    jetpack_parser::transform(source, parser_options, codegen_options)
        .map_err(|err| Error::parse("<input>", err))
}

fn with_extension_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    atomic_write(path, bytes).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_and_codegen() {
        let output = parse_and_codegen(
            "let   a =  1 ;",
            ParserOptions::default(),
            CodegenOptions::default(),
        )
        .unwrap();
        assert_eq!(output, "let a = 1;\n");
    }

    #[test]
    fn test_parse_and_codegen_reports_parse_error() {
        let err = parse_and_codegen("let = ;", ParserOptions::default(), CodegenOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Parse { ref path, .. } if path == "<input>"));
    }

    #[test]
    fn test_analyze_module() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "import { a } from './a';\nexport default a;").unwrap();
        fs::write(dir.path().join("a.js"), "export const a = 1;").unwrap();

        let report = analyze_module("index.js", BundleFlags::empty(), dir.path()).unwrap();
        assert_eq!(report.entry, "index.js");
        assert_eq!(report.modules.len(), 2);
        assert_eq!(report.modules[0].imports, vec!["./a"]);
        assert_eq!(report.modules[0].exports, vec!["default"]);
        assert_eq!(report.modules[1].module_var, "mod_1");
        assert_eq!(report.modules[1].hash.as_ref().map(String::len), Some(16));
        assert!(report.failures.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["modules"][1]["path"], "a.js");
    }

    #[test]
    fn test_bundle_module_writes_outputs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "import { a } from './a';\nconsole.log(a);").unwrap();
        fs::write(dir.path().join("a.js"), "export const a = 1;").unwrap();
        let out = dir.path().join("dist/out.js");

        let flags = BundleFlags::SOURCEMAP | BundleFlags::TRACE_FILE;
        let output = bundle_module("index.js", &out, flags, dir.path()).unwrap();

        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written, output.code);
        assert_eq!(
            written,
            "const a = 1;\nconsole.log(a);\n//# sourceMappingURL=out.js.map\n"
        );

        let map: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("dist/out.js.map")).unwrap()).unwrap();
        assert_eq!(map["sources"], serde_json::json!(["a.js", "index.js"]));
        // One statement per module, on consecutive lines.
        let mappings = map["mappings"].as_str().unwrap();
        assert_eq!(mappings.split(';').count(), 2);
        assert!(mappings.starts_with("AAA"));

        let trace: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("dist/out.js.trace.json")).unwrap())
                .unwrap();
        assert!(!trace["traceEvents"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_failed_bundle_writes_nothing() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "import './missing';").unwrap();
        let out = dir.path().join("out.js");

        let err = bundle_module("index.js", &out, BundleFlags::empty(), dir.path()).unwrap_err();
        assert!(matches!(err.root_cause(), Error::UnresolvedImport { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn test_bundle_is_not_written_when_a_side_file_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.js"), "console.log(1);").unwrap();
        let out = dir.path().join("out.js");
        // A directory where the trace file should go.
        fs::create_dir(dir.path().join("out.js.trace.json")).unwrap();

        let flags = BundleFlags::SOURCEMAP | BundleFlags::TRACE_FILE;
        let err = bundle_module("index.js", &out, flags, dir.path()).unwrap_err();
        assert!(matches!(err, Error::Write { ref path, .. } if path.ends_with("out.js.trace.json")));
        assert!(!out.exists());
        assert!(!dir.path().join("out.js.map").exists());
    }
}
