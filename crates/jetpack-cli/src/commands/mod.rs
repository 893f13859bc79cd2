pub mod analyze;
pub mod bundle;
pub mod print;
pub mod version;

use jetpack_core::Error;
use serde::Serialize;

/// Error object shared by the JSON outputs of every command.
#[derive(Serialize)]
pub struct ErrorJson {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl ErrorJson {
    pub fn of(err: &Error) -> Self {
        let module = match err {
            Error::ModuleFailed { path, .. } => Some(path.clone()),
            _ => None,
        };
        let (code, path) = match err.root_cause() {
            Error::UnresolvedImport { importer, .. } => ("UNRESOLVED_IMPORT", Some(importer.clone())),
            Error::EntryNotFound { path } => ("ENTRY_NOT_FOUND", Some(path.clone())),
            Error::Io { path, .. } => ("IO_ERROR", Some(path.display().to_string())),
            Error::Parse { path, .. } => ("PARSE_ERROR", Some(path.clone())),
            Error::Write { path, .. } => ("WRITE_ERROR", Some(path.display().to_string())),
            Error::ModuleFailed { .. } | Error::Other(_) => ("BUNDLE_FAILED", None),
        };
        Self {
            code,
            message: err.to_string(),
            path: module.or(path),
        }
    }
}
