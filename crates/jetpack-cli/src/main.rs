#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod commands;
mod logging;

use clap::Parser;
use jetpack_core::{BundleConfig, BundleFlags, FailurePolicy};
use miette::Result;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "jetpack")]
#[command(author, version, about = "A JavaScript bundler with cross-module renaming", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON formatted output (stable, machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Switches shared by every command that runs a bundling session.
#[derive(clap::Args, Debug, Clone)]
struct SessionArgs {
    /// Parse JSX and lower it to React.createElement calls
    #[arg(long)]
    jsx: bool,

    /// Fold constant expressions
    #[arg(long)]
    constant_folding: bool,

    /// Shorten names and compact the output
    #[arg(long)]
    minify: bool,

    /// Write <out>.map next to the bundle
    #[arg(long)]
    sourcemap: bool,

    /// Keep the entry module's exports in the bundle
    #[arg(long)]
    library: bool,

    /// Write a Chrome trace of the session to <out>.trace.json
    #[arg(long)]
    trace: bool,

    /// Directory every module must live under (defaults to the working directory)
    #[arg(long, value_name = "DIR")]
    base: Option<PathBuf>,

    /// Report failed modules instead of stopping at the first one
    #[arg(long)]
    continue_on_error: bool,
}

impl SessionArgs {
    fn flags(&self) -> BundleFlags {
        let mut flags = BundleFlags::empty();
        flags.set(BundleFlags::JSX, self.jsx);
        flags.set(BundleFlags::CONSTANT_FOLDING, self.constant_folding);
        flags.set(BundleFlags::MINIFY, self.minify);
        flags.set(BundleFlags::SOURCEMAP, self.sourcemap);
        flags.set(BundleFlags::LIBRARY, self.library);
        flags.set(BundleFlags::TRACE_FILE, self.trace);
        flags
    }

    fn config(&self, cwd: &Path) -> BundleConfig {
        let base = self
            .base
            .as_ref()
            .map_or_else(|| cwd.to_path_buf(), |base| absolute(cwd, base));
        let policy = if self.continue_on_error {
            FailurePolicy::Continue
        } else {
            FailurePolicy::Abort
        };
        BundleConfig::new(base)
            .with_flags(self.flags())
            .with_failure_policy(policy)
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Print version information
    Version,

    /// Discover the module graph of an entry and describe every module
    Analyze {
        /// Entry point file
        entry: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Bundle an entry and everything it imports
    Bundle {
        /// Entry point file
        entry: PathBuf,

        /// Output file (if not specified, prints to stdout)
        #[arg(long, short = 'o')]
        outfile: Option<PathBuf>,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Parse one file and print the regenerated code
    Print {
        /// File to print
        file: PathBuf,

        /// Parse JSX
        #[arg(long)]
        jsx: bool,

        /// Fold constant expressions
        #[arg(long)]
        constant_folding: bool,

        /// Compact output
        #[arg(long)]
        minify: bool,
    },
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose, cli.json);

    let _span = tracing::info_span!("jetpack", cwd = %cwd.display()).entered();

    match cli.command {
        Some(Commands::Version) => commands::version::run(cli.json),
        Some(Commands::Analyze { entry, session }) => commands::analyze::run(
            &absolute(&cwd, &entry),
            session.config(&cwd),
            cli.json,
        ),
        Some(Commands::Bundle {
            entry,
            outfile,
            session,
        }) => commands::bundle::run(
            commands::bundle::BundleAction {
                entry: absolute(&cwd, &entry),
                outfile: outfile.map(|outfile| absolute(&cwd, &outfile)),
                config: session.config(&cwd),
            },
            cli.json,
        ),
        Some(Commands::Print {
            file,
            jsx,
            constant_folding,
            minify,
        }) => commands::print::run(&absolute(&cwd, &file), jsx, constant_folding, minify),
        None => {
            println!("jetpack {}", jetpack_core::VERSION);
            println!("Run 'jetpack --help' for usage information.");
            Ok(())
        }
    }
}
