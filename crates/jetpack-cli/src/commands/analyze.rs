//! `jetpack analyze` command implementation.
//!
//! Discovers the module graph of an entry without emitting anything and
//! describes every module: id, path, namespace variable, content hash,
//! imports and exports.

use super::ErrorJson;
use jetpack_core::{AnalyzeReport, BundleConfig};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

#[derive(Serialize)]
struct AnalyzeResultJson {
    ok: bool,
    entry: String,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<AnalyzeReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

/// Run the analyze command.
pub fn run(entry: &Path, config: BundleConfig, json: bool) -> Result<()> {
    let start = Instant::now();
    let result = jetpack_core::analyze(config, entry);
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(report) => {
            if json {
                let out = AnalyzeResultJson {
                    ok: true,
                    entry: report.entry.clone(),
                    duration_ms,
                    report: Some(report),
                    error: None,
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
            } else {
                print_report(&report, duration_ms);
            }
            Ok(())
        }
        Err(err) => {
            if json {
                let out = AnalyzeResultJson {
                    ok: false,
                    entry: entry.display().to_string(),
                    duration_ms,
                    report: None,
                    error: Some(ErrorJson::of(&err)),
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
                std::process::exit(1);
            }
            Err(err)
                .into_diagnostic()
                .wrap_err(format!("Failed to analyze {}", entry.display()))
        }
    }
}

fn print_report(report: &AnalyzeReport, duration_ms: u64) {
    println!(
        "  {} ({} modules, {}ms)",
        report.entry,
        report.modules.len(),
        duration_ms
    );
    for module in &report.modules {
        println!(
            "    [{}] {} {} {} ({})",
            module.id,
            module.path,
            module.module_var,
            module.hash.as_deref().unwrap_or("-"),
            module.state
        );
        if !module.imports.is_empty() {
            println!("        imports: {}", module.imports.join(", "));
        }
        if !module.exports.is_empty() {
            println!("        exports: {}", module.exports.join(", "));
        }
    }
    for failure in &report.failures {
        eprintln!("  warning: {failure}");
    }
}
