//! `jetpack bundle` command implementation.
//!
//! Bundles an entry module and everything it imports into a single file.
//! Without `--outfile` the bundle is printed to stdout and no source map or
//! trace is written.

use super::ErrorJson;
use jetpack_core::{BundleConfig, BundleFlags, BundleOutput, ModuleResolver};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Bundle command action.
#[derive(Debug, Clone)]
pub struct BundleAction {
    /// Entry point file.
    pub entry: PathBuf,
    /// Output file (if None, prints to stdout).
    pub outfile: Option<PathBuf>,
    pub config: BundleConfig,
}

/// JSON output for bundle command.
#[derive(Serialize)]
struct BundleResultJson {
    ok: bool,
    entry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outfile: Option<String>,
    flags: u32,
    modules: Vec<String>,
    warnings: Vec<String>,
    size_bytes: usize,
    duration_ms: u64,
    /// Bundle code, only when there is no output file.
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

fn bundle_to_string(action: &BundleAction) -> jetpack_core::Result<BundleOutput> {
    let side_files = BundleFlags::SOURCEMAP | BundleFlags::TRACE_FILE;
    if action.config.flags.intersects(side_files) {
        tracing::warn!("--sourcemap and --trace need --outfile; skipping them");
    }
    let mut config = action.config.clone();
    config.flags.remove(side_files);

    let mut resolver = ModuleResolver::new(config);
    resolver.begin_from_entry(&action.entry)?;
    resolver.bundle("bundle.js")
}

/// Run the bundle command.
pub fn run(action: BundleAction, json: bool) -> Result<()> {
    let start = Instant::now();
    let result = match &action.outfile {
        Some(outfile) => jetpack_core::bundle(action.config.clone(), &action.entry, outfile),
        None => bundle_to_string(&action),
    };
    let duration_ms = start.elapsed().as_millis() as u64;
    let flags = action.config.flags.bits();

    match result {
        Ok(output) => {
            let size_bytes = output.code.len();
            if json {
                let out = BundleResultJson {
                    ok: true,
                    entry: action.entry.display().to_string(),
                    outfile: action.outfile.as_ref().map(|p| p.display().to_string()),
                    flags,
                    modules: output.modules,
                    warnings: output.warnings,
                    size_bytes,
                    duration_ms,
                    code: action.outfile.is_none().then_some(output.code),
                    error: None,
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
                return Ok(());
            }

            match &action.outfile {
                Some(outfile) => {
                    println!(
                        "  {} -> {} ({} modules, {:.1}KB, {}ms)",
                        action.entry.display(),
                        outfile.display(),
                        output.modules.len(),
                        size_bytes as f64 / 1024.0,
                        duration_ms
                    );
                    if output.map.is_some() {
                        println!("    + {}.map", outfile.display());
                    }
                }
                None => print!("{}", output.code),
            }
            for warning in &output.warnings {
                eprintln!("  warning: {warning}");
            }
            Ok(())
        }
        Err(err) => {
            if json {
                let out = BundleResultJson {
                    ok: false,
                    entry: action.entry.display().to_string(),
                    outfile: action.outfile.as_ref().map(|p| p.display().to_string()),
                    flags,
                    modules: Vec::new(),
                    warnings: Vec::new(),
                    size_bytes: 0,
                    duration_ms,
                    code: None,
                    error: Some(ErrorJson::of(&err)),
                };
                println!("{}", serde_json::to_string(&out).into_diagnostic()?);
                std::process::exit(1);
            }
            Err(err)
                .into_diagnostic()
                .wrap_err(format!("Failed to bundle {}", action.entry.display()))
        }
    }
}
