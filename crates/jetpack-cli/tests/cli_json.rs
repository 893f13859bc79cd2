//! Integration tests for `jetpack --json` output.
//!
//! These tests verify:
//! - JSON output is always valid JSON on stdout
//! - `ok` boolean is present and the exit code follows it
//! - Error codes are SCREAMING_SNAKE_CASE
//! - Output files are only written for successful bundles

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "jetpack-cli", "--bin", "jetpack", "--"]);
    cmd
}

fn write(dir: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let path = dir.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

fn run_json(dir: &Path, args: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .args(args)
        .args(["--json", "--cwd"])
        .arg(dir)
        .output()
        .expect("Failed to run jetpack");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json = serde_json::from_str(&stdout)
        .unwrap_or_else(|err| panic!("stdout should be valid JSON ({err}): {stdout}"));
    (output, json)
}

#[test]
fn test_version_json() {
    let dir = tempdir().unwrap();
    let (output, json) = run_json(dir.path(), &["version"]);

    assert!(output.status.success());
    assert_eq!(json["name"], "jetpack");
    assert!(json["version"].as_str().is_some_and(|v| !v.is_empty()));
}

#[test]
fn test_bundle_json_writes_outfile() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        &[
            ("src/index.js", "import { greet } from './greet';\ngreet('world');"),
            ("src/greet.js", "export function greet(name) { console.log(name); }"),
        ],
    );

    let (output, json) = run_json(
        dir.path(),
        &["bundle", "src/index.js", "-o", "dist/out.js", "--sourcemap"],
    );

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(json["ok"], true);
    assert_eq!(json["modules"], serde_json::json!(["src/greet.js", "src/index.js"]));
    assert!(json.get("code").is_none());

    let code = fs::read_to_string(dir.path().join("dist/out.js")).unwrap();
    assert!(code.starts_with("function greet(name) {"));
    assert!(code.ends_with("//# sourceMappingURL=out.js.map\n"));
    assert!(dir.path().join("dist/out.js.map").exists());
    assert!(!dir.path().join("dist/out.js.trace.json").exists());
}

#[test]
fn test_bundle_json_without_outfile_returns_code() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        &[
            ("index.js", "import { a } from './a';\nconsole.log(a);"),
            ("a.js", "export const a = 1;"),
        ],
    );

    let (output, json) = run_json(dir.path(), &["bundle", "index.js"]);

    assert!(output.status.success());
    assert_eq!(json["code"], "const a = 1;\nconsole.log(a);\n");
    assert_eq!(json["size_bytes"], 29);
}

#[test]
fn test_bundle_json_base_restricts_imports() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        &[
            ("app/index.js", "import { secret } from '../secret';\nconsole.log(secret);"),
            ("secret.js", "export const secret = 1;"),
        ],
    );

    let (output, json) = run_json(
        dir.path(),
        &["bundle", "app/index.js", "--base", "app", "-o", "out.js"],
    );

    assert!(!output.status.success());
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "UNRESOLVED_IMPORT");
    assert_eq!(json["error"]["path"], "index.js");
    assert!(!dir.path().join("out.js").exists());
}

#[test]
fn test_bundle_json_error_code_is_screaming_snake_case() {
    let dir = tempdir().unwrap();
    write(dir.path(), &[("index.js", "let = ;")]);

    let (output, json) = run_json(dir.path(), &["bundle", "index.js"]);

    assert!(!output.status.success());
    let code = json["error"]["code"].as_str().unwrap();
    assert_eq!(code, "PARSE_ERROR");
    assert!(code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c == '_'));
}

#[test]
fn test_bundle_missing_entry() {
    let dir = tempdir().unwrap();

    let (output, json) = run_json(dir.path(), &["bundle", "nope.js"]);

    assert!(!output.status.success());
    assert_eq!(json["error"]["code"], "ENTRY_NOT_FOUND");
}

#[test]
fn test_analyze_json_continues_past_failures() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        &[
            ("index.js", "import { a } from './a';\nimport b from './b';\nexport default a + b;"),
            ("a.js", "export const a = 1;"),
            ("b.js", "export default ;"),
        ],
    );

    let (output, json) = run_json(dir.path(), &["analyze", "index.js"]);

    assert!(output.status.success());
    assert_eq!(json["ok"], true);
    let modules = json["report"]["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 3);
    assert_eq!(modules[0]["path"], "index.js");
    assert_eq!(modules[0]["imports"], serde_json::json!(["./a", "./b"]));
    assert_eq!(modules[1]["module_var"], "mod_1");
    assert_eq!(modules[2]["state"], "failed");
    assert_eq!(json["report"]["failures"].as_array().unwrap().len(), 1);
}

#[test]
fn test_print_human_output() {
    let dir = tempdir().unwrap();
    write(dir.path(), &[("a.js", "const  x = 1 + 2;")]);

    let output = cargo_bin()
        .args(["print", "a.js", "--constant-folding", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run jetpack");

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "const x = 3;\n");
}

#[test]
fn test_print_reports_parse_position() {
    let dir = tempdir().unwrap();
    write(dir.path(), &[("a.js", "let ok = 1;\nlet = ;")]);

    let output = cargo_bin()
        .args(["print", "a.js", "--cwd"])
        .arg(dir.path())
        .output()
        .expect("Failed to run jetpack");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("a.js:2:"), "stderr: {stderr}");
}
