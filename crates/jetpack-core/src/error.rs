use std::path::PathBuf;

use jetpack_parser::{ParseError, Span};
use thiserror::Error;

/// Core error type for bundling sessions.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot resolve '{specifier}' imported from {importer}")]
    UnresolvedImport { specifier: String, importer: String },

    #[error("Entry module not found: {path}")]
    EntryNotFound { path: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse {
        path: String,
        message: String,
        span: Span,
    },

    #[error("Module {path} failed: {source}")]
    ModuleFailed {
        path: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Wrap a parser error for the module at `path`.
    #[must_use]
    pub fn parse(path: impl Into<String>, err: ParseError) -> Self {
        Self::Parse {
            path: path.into(),
            message: err.message,
            span: err.span,
        }
    }

    /// Wrap this error with the module it happened in.
    #[must_use]
    pub fn in_module(self, path: impl Into<String>) -> Self {
        match self {
            already @ Self::ModuleFailed { .. } => already,
            source => Self::ModuleFailed {
                path: path.into(),
                source: Box::new(source),
            },
        }
    }

    /// The innermost error, skipping `ModuleFailed` wrappers.
    #[must_use]
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::ModuleFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
