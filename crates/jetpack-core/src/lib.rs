#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Core of the jetpack bundler.
//!
//! Builds a module graph from an entry file, renames identifiers across
//! every scope of every module so that the modules can share one scope,
//! and emits the merged bundle.

pub mod api;
pub mod config;
pub mod error;
pub mod fold;
pub mod module_file;
pub mod name_generator;
pub mod provider;
pub mod resolver;
pub mod scope;
pub mod sourcemap;
pub mod trace;

pub use api::{analyze, analyze_module, bundle, bundle_module, parse_and_codegen, AnalyzeReport, ModuleSummary};
pub use config::{BundleConfig, BundleFlags, FailurePolicy};
pub use error::{Error, Result};
pub use module_file::{ModuleFile, ModuleId, ModuleState};
pub use name_generator::NameGenerator;
pub use provider::{FileModuleProvider, MemoryModuleProvider, ModuleProvider, MEMORY_MODULE_TOKEN};
pub use resolver::{BundleOutput, ModuleResolver, SessionContext};
pub use scope::{ScopeTree, VariableKind};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
