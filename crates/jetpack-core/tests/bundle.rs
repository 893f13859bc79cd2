//! Integration tests: bundle small module graphs from temp directories.

use jetpack_core::{
    BundleConfig, BundleFlags, BundleOutput, Error, FailurePolicy, ModuleResolver, ModuleState,
    VariableKind,
};
use serial_test::serial;
use std::fs;
use std::path::Path;
use tempfile::{tempdir, TempDir};

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    for (path, content) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn bundle_with(entry: &str, config: BundleConfig) -> BundleOutput {
    let mut resolver = ModuleResolver::new(config);
    resolver.begin_from_entry(entry).unwrap();
    resolver.bundle("out.js").unwrap()
}

fn bundle(dir: &Path, entry: &str) -> BundleOutput {
    bundle_with(entry, BundleConfig::new(dir))
}

#[test]
fn test_diamond_is_emitted_once() {
    let dir = project(&[
        (
            "index.js",
            "import { left } from './left';\nimport { right } from './right';\nconsole.log(left + right);",
        ),
        ("left.js", "import { base } from './base';\nexport const left = base + 1;"),
        ("right.js", "import { base } from './base';\nexport const right = base + 2;"),
        ("base.js", "export const base = 40;"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(output.modules, vec!["base.js", "left.js", "right.js", "index.js"]);
    assert_eq!(
        output.code,
        "const base = 40;\nconst left = base + 1;\nconst right = base + 2;\nconsole.log(left + right);\n"
    );
}

#[test]
fn test_cycle_terminates() {
    let dir = project(&[
        ("index.js", "import { a } from './a';\nconsole.log(a());"),
        ("a.js", "import { b } from './b';\nexport function a() { return b(); }"),
        ("b.js", "import { a } from './a';\nexport function b() { return typeof a; }"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(output.modules, vec!["b.js", "a.js", "index.js"]);
    assert_eq!(output.code.matches("function a()").count(), 1);
    assert_eq!(output.code.matches("function b()").count(), 1);
}

#[test]
fn test_conflicting_module_names_get_suffixes() {
    let dir = project(&[
        ("index.js", "import { a } from './a';\nimport { b } from './b';\nconsole.log(a, b);"),
        ("a.js", "const value = 1;\nexport const a = value;"),
        ("b.js", "const value = 2;\nexport const b = value;"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(
        output.code,
        "const value = 1;\nconst a = value;\nconst value_1 = 2;\nconst b = value_1;\nconsole.log(a, b);\n"
    );
}

#[test]
fn test_default_import_uses_normalized_binding() {
    let dir = project(&[
        ("index.js", "import greet from './greet';\ngreet();"),
        ("greet.js", "export default function () { return 'hi'; }"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(output.code, "function _default() {\n  return 'hi';\n}\n_default();\n");
}

#[test]
fn test_namespace_import_becomes_object() {
    let dir = project(&[
        ("index.js", "import * as util from './util';\nconsole.log(util.double(2));"),
        ("util.js", "export function double(n) { return n * 2; }\nexport const name = 'util';"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(
        output.code,
        "function double(n) {\n  return n * 2;\n}\nconst name = 'util';\nvar mod_1 = { double, name };\nconsole.log(mod_1.double(2));\n"
    );
}

#[test]
fn test_one_file_under_two_specifiers() {
    let dir = project(&[
        (
            "index.js",
            "import { a } from './a';\nimport { a as b } from './lib/../a.js';\nconsole.log(a, b);",
        ),
        ("a.js", "export const a = 1;"),
    ]);
    let mut resolver = ModuleResolver::new(BundleConfig::new(dir.path()));
    resolver.begin_from_entry("index.js").unwrap();
    let output = resolver.bundle("out.js").unwrap();

    assert_eq!(resolver.modules().len(), 2);
    assert_eq!(output.modules, vec!["a.js", "index.js"]);
    assert_eq!(output.code, "const a = 1;\nconsole.log(a, a);\n");
    assert!(output.warnings.is_empty(), "{:?}", output.warnings);
}

#[test]
fn test_one_file_under_two_specifiers_minified() {
    let dir = project(&[
        (
            "index.js",
            "import { value } from './a';\nimport { value as other } from './a.js';\nconsole.log(value, other);",
        ),
        ("a.js", "export const value = 1;"),
    ]);
    let config = BundleConfig::new(dir.path()).with_flags(BundleFlags::MINIFY);
    let output = bundle_with("index.js", config);

    assert!(!output.code.contains("value"), "{}", output.code);
    assert!(!output.code.contains("other"), "{}", output.code);
    let name = output.code.strip_prefix("const ").unwrap().split('=').next().unwrap();
    assert!(output.code.contains(&format!("console.log({name},{name})")), "{}", output.code);
}

#[test]
fn test_source_names_never_shadow_namespace_objects() {
    let dir = project(&[
        ("index.js", "import * as ns from './a';\nvar mod = 3;\nconsole.log(ns.x, mod);"),
        ("a.js", "export var x = 1;\nvar mod = 2;"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(
        output.code,
        "var x = 1;\nvar mod__1 = 2;\nvar mod_1 = { x };\nvar mod = 3;\nconsole.log(mod_1.x, mod);\n"
    );
}

#[test]
fn test_source_module_var_is_renamed() {
    let dir = project(&[
        ("index.js", "import * as ns from './a';\nvar mod_1 = 'mine';\nconsole.log(ns.x, mod_1);"),
        ("a.js", "export const x = 1;"),
    ]);
    let output = bundle(dir.path(), "index.js");

    assert_eq!(
        output.code,
        "const x = 1;\nvar mod_1 = { x };\nvar mod_1_1 = 'mine';\nconsole.log(mod_1.x, mod_1_1);\n"
    );
    assert_eq!(output.code.matches("var mod_1 =").count(), 1);
}

#[test]
fn test_specifier_suffix_fallback_with_jsx() {
    let dir = project(&[
        ("index.js", "import { View } from './view';\nconsole.log(View());"),
        ("view.jsx", "export const View = () => <div />;"),
    ]);
    let config = BundleConfig::new(dir.path()).with_flags(BundleFlags::JSX);
    let output = bundle_with("index.js", config);

    assert_eq!(output.modules, vec!["view.jsx", "index.js"]);
    assert!(output.code.contains("React.createElement(\"div\""));
}

#[test]
fn test_imports_cannot_escape_base() {
    let dir = project(&[
        ("app/index.js", "import { secret } from '../outside';\nconsole.log(secret);"),
        ("outside.js", "export const secret = 1;"),
    ]);
    let mut resolver = ModuleResolver::new(BundleConfig::new(dir.path().join("app")));
    let err = resolver.begin_from_entry("index.js").unwrap_err();

    assert!(matches!(
        err.root_cause(),
        Error::UnresolvedImport { specifier, .. } if specifier == "../outside"
    ));
}

#[test]
#[serial]
fn test_entry_from_string_minified() {
    let mut resolver = ModuleResolver::new(BundleConfig::new(".").with_flags(BundleFlags::MINIFY));
    resolver
        .begin_from_entry_string(
            "function add(first, second) { return first + second; }\nconsole.log(add(1, 2));",
        )
        .unwrap();
    let output = resolver.bundle("out.js").unwrap();

    assert!(!output.code.contains("first"));
    assert!(!output.code.contains("add"));
    assert!(output.code.starts_with("function c("));
    assert!(output.code.contains("console.log(c(1,2))"));
    assert!(!output.code.contains('\n'));
}

#[test]
fn test_minified_modules_share_one_namespace() {
    let dir = project(&[
        (
            "index.js",
            "import { scale } from './math';\nfunction run(value) { return scale(value); }\nconsole.log(run(2));",
        ),
        ("math.js", "const factor = 3;\nexport function scale(value) { return value * factor; }"),
    ]);
    let config = BundleConfig::new(dir.path()).with_flags(BundleFlags::MINIFY);
    let mut resolver = ModuleResolver::new(config);
    resolver.begin_from_entry("index.js").unwrap();
    let output = resolver.bundle("out.js").unwrap();

    let mut roots = Vec::new();
    for module in resolver.modules() {
        assert_eq!(module.state(), ModuleState::Emitted);
        roots.extend(
            module
                .scope()
                .root()
                .own_variables
                .values()
                .filter(|var| var.kind != VariableKind::Import)
                .map(|var| var.name.clone()),
        );
    }
    let unique: std::collections::HashSet<_> = roots.iter().collect();
    assert_eq!(unique.len(), roots.len(), "{roots:?}");
    for word in ["factor", "scale", "run", "value"] {
        assert!(!output.code.contains(word), "{word} survived in {}", output.code);
    }
}

#[test]
fn test_library_mode_keeps_entry_exports() {
    let dir = project(&[
        (
            "index.js",
            "export { helper } from './util';\nexport const version = 1;\nexport default function main() {}",
        ),
        ("util.js", "export function helper() {}"),
    ]);
    let config = BundleConfig::new(dir.path()).with_flags(BundleFlags::LIBRARY);
    let output = bundle_with("index.js", config);

    assert_eq!(
        output.code,
        "function helper() {}\nconst version = 1;\nfunction main() {}\nvar _default = main;\nexport { helper, version, main as default };\n"
    );
}

#[test]
fn test_continue_keeps_failed_imports() {
    let dir = project(&[
        (
            "index.js",
            "import { x } from './broken';\nimport { y } from './ok';\nconsole.log(x, y);",
        ),
        ("broken.js", "let = ;"),
        ("ok.js", "export const y = 2;"),
    ]);
    let config = BundleConfig::new(dir.path()).with_failure_policy(FailurePolicy::Continue);
    let mut resolver = ModuleResolver::new(config);
    resolver.begin_from_entry("index.js").unwrap();

    assert_eq!(resolver.failures().len(), 1);
    assert!(matches!(resolver.failures()[0].root_cause(), Error::Parse { path, .. } if path == "broken.js"));

    let output = resolver.bundle("out.js").unwrap();
    assert_eq!(
        output.code,
        "const y = 2;\nimport { x } from './broken';\nconsole.log(x, y);\n"
    );
}

#[test]
fn test_abort_reports_first_failure() {
    let dir = project(&[
        ("index.js", "import './broken';"),
        ("broken.js", "let = ;"),
    ]);
    let mut resolver = ModuleResolver::new(BundleConfig::new(dir.path()));
    let err = resolver.begin_from_entry("index.js").unwrap_err();

    assert!(matches!(err, Error::ModuleFailed { ref path, .. } if path == "broken.js"));
    assert!(matches!(err.root_cause(), Error::Parse { .. }));
}

#[test]
fn test_output_is_deterministic() {
    let mut files = vec![];
    let mut index = String::new();
    for i in 0..12 {
        index.push_str(&format!("import {{ v{i} }} from './m{i}';\n"));
        files.push((format!("m{i}.js"), format!("const local = {i};\nexport const v{i} = local;")));
    }
    index.push_str("console.log(v0, v11);");
    files.push(("index.js".to_string(), index));
    let refs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    let dir = project(&refs);

    let first = bundle(dir.path(), "index.js");
    for _ in 0..5 {
        let again = bundle(dir.path(), "index.js");
        assert_eq!(again.code, first.code);
        assert_eq!(again.modules, first.modules);
    }
    assert!(first.code.contains("const local_11 = 11;"));
}

#[test]
#[serial]
fn test_relative_base_follows_working_directory() {
    let dir = project(&[
        ("src/index.js", "import { n } from './n';\nconsole.log(n);"),
        ("src/n.js", "export const n = 1;"),
    ]);
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let result = std::panic::catch_unwind(|| {
        let mut resolver = ModuleResolver::new(BundleConfig::new("src"));
        resolver.begin_from_entry("index.js").unwrap();
        (resolver.config().base_path.clone(), resolver.bundle("out.js").unwrap())
    });
    std::env::set_current_dir(previous).unwrap();

    let (base, output) = result.unwrap();
    assert!(base.is_absolute());
    assert!(base.ends_with("src"));
    assert_eq!(output.code, "const n = 1;\nconsole.log(n);\n");
}
