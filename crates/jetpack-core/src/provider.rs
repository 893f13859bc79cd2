//! Module providers: where module source comes from.
//!
//! A provider answers two questions. `match_path` decides whether it can
//! serve an import specifier and returns the canonical path it resolves to;
//! `resolve` returns the content for a path it matched earlier. Providers are
//! shared by every discovery worker, so they only take `&self`.

use crate::error::{Error, Result};
use jetpack_util::path::{is_relative_specifier, is_within, normalize, parent_dir, to_slash};
use std::path::{Path, PathBuf};

/// Token under which [`MemoryModuleProvider`] registers its content.
pub const MEMORY_MODULE_TOKEN: &str = "memory0";

/// Source of module content.
pub trait ModuleProvider: Send + Sync {
    /// Resolve `specifier`, imported from `current_module_path`, to a path
    /// this provider can serve. `None` means "not mine".
    fn match_path(&self, current_module_path: &str, specifier: &str) -> Option<String>;

    /// Content of a path returned by [`ModuleProvider::match_path`].
    fn resolve(&self, resolved_path: &str) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Serves files under a base directory.
///
/// Resolved paths are relative to the base directory with `/` separators.
/// Specifiers that normalize to a path outside the base directory never
/// match.
///
/// The containment check is lexical (`normalize` then `is_within`) and does
/// not resolve symlinks: a link under the base directory that points
/// outside of it is served like any other file.
#[derive(Debug, Clone)]
pub struct FileModuleProvider {
    base: PathBuf,
}

impl FileModuleProvider {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: normalize(&base.into()),
        }
    }

    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path of `candidate` relative to the base, if the file exists.
    fn existing(&self, candidate: &Path) -> Option<String> {
        if !candidate.is_file() {
            return None;
        }
        candidate
            .strip_prefix(&self.base)
            .ok()
            .map(to_slash)
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut os = path.as_os_str().to_owned();
        os.push(suffix);
        PathBuf::from(os)
    }
}

impl ModuleProvider for FileModuleProvider {
    fn match_path(&self, current_module_path: &str, specifier: &str) -> Option<String> {
        if !is_relative_specifier(specifier) {
            return None;
        }

        let joined = match specifier.strip_prefix('/') {
            // `/x` is rooted at the base directory
            Some(rooted) => self.base.join(rooted),
            None => self.base.join(parent_dir(current_module_path)).join(specifier),
        };
        let path = normalize(&joined);
        if !is_within(&self.base, &path) {
            return None;
        }

        if let Some(found) = self.existing(&path) {
            return Some(found);
        }
        let display = path.to_string_lossy();
        if !display.ends_with(".js") {
            if let Some(found) = self.existing(&Self::with_suffix(&path, ".js")) {
                return Some(found);
            }
        }
        if !display.ends_with(".jsx") {
            if let Some(found) = self.existing(&Self::with_suffix(&path, ".jsx")) {
                return Some(found);
            }
        }
        None
    }

    fn resolve(&self, resolved_path: &str) -> Result<String> {
        let path = self.base.join(resolved_path);
        jetpack_util::fs::read_source(&path).map_err(|source| Error::Io { path, source })
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Serves one in-memory module under a fixed token.
#[derive(Debug, Clone)]
pub struct MemoryModuleProvider {
    token: String,
    content: String,
}

impl MemoryModuleProvider {
    #[must_use]
    pub fn new(token: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl ModuleProvider for MemoryModuleProvider {
    fn match_path(&self, _current_module_path: &str, specifier: &str) -> Option<String> {
        (specifier == self.token).then(|| self.token.clone())
    }

    fn resolve(&self, _resolved_path: &str) -> Result<String> {
        Ok(self.content.clone())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> (tempfile::TempDir, FileModuleProvider) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/lib")).unwrap();
        fs::write(dir.path().join("src/index.js"), "import './lib/a';").unwrap();
        fs::write(dir.path().join("src/lib/a.js"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("src/view.jsx"), "export default 1;").unwrap();
        fs::write(dir.path().join("src/data.json.js"), "export default {};").unwrap();
        let provider = FileModuleProvider::new(dir.path());
        (dir, provider)
    }

    #[test]
    fn test_match_relative_to_importer() {
        let (_dir, provider) = fixture();
        assert_eq!(
            provider.match_path("src/index.js", "./lib/a.js").as_deref(),
            Some("src/lib/a.js")
        );
        assert_eq!(
            provider.match_path("src/lib/a.js", "../index.js").as_deref(),
            Some("src/index.js")
        );
    }

    #[test]
    fn test_match_suffix_fallback() {
        let (_dir, provider) = fixture();
        assert_eq!(
            provider.match_path("src/index.js", "./lib/a").as_deref(),
            Some("src/lib/a.js")
        );
        assert_eq!(
            provider.match_path("src/index.js", "./view").as_deref(),
            Some("src/view.jsx")
        );
        assert_eq!(
            provider.match_path("src/index.js", "./data.json").as_deref(),
            Some("src/data.json.js")
        );
        assert_eq!(provider.match_path("src/index.js", "./missing"), None);
    }

    #[test]
    fn test_match_rooted_specifier() {
        let (_dir, provider) = fixture();
        assert_eq!(
            provider.match_path("src/lib/a.js", "/src/index").as_deref(),
            Some("src/index.js")
        );
    }

    #[test]
    fn test_match_is_sandboxed() {
        let (dir, provider) = fixture();
        let outside = dir.path().parent().unwrap().join("outside.js");
        fs::write(&outside, "secret").ok();

        assert_eq!(provider.match_path("src/index.js", "../../outside.js"), None);
        assert_eq!(provider.match_path("index.js", "../outside"), None);
        fs::remove_file(outside).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_sandbox_check_is_lexical() {
        let (dir, provider) = fixture();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("real.js"), "export const real = 1;").unwrap();
        std::os::unix::fs::symlink(outside.path().join("real.js"), dir.path().join("src/link.js"))
            .unwrap();

        assert_eq!(
            provider.match_path("src/index.js", "./link").as_deref(),
            Some("src/link.js")
        );
        assert_eq!(provider.resolve("src/link.js").unwrap(), "export const real = 1;");
    }

    #[test]
    fn test_bare_specifiers_are_not_files() {
        let (_dir, provider) = fixture();
        assert_eq!(provider.match_path("src/index.js", "react"), None);
    }

    #[test]
    fn test_resolve_reads_content() {
        let (_dir, provider) = fixture();
        assert_eq!(provider.resolve("src/lib/a.js").unwrap(), "export const a = 1;");
    }

    #[test]
    fn test_resolve_missing_file_is_io_error() {
        let (dir, provider) = fixture();
        let err = provider.resolve("src/gone.js").unwrap_err();
        let Error::Io { path, .. } = err else {
            panic!("expected Io error");
        };
        assert_eq!(path, normalize(dir.path()).join("src/gone.js"));
    }

    #[test]
    fn test_memory_provider() {
        let provider = MemoryModuleProvider::new(MEMORY_MODULE_TOKEN, "let a = 1;");
        assert_eq!(provider.match_path("", "memory0").as_deref(), Some("memory0"));
        assert_eq!(provider.match_path("", "./memory0"), None);
        assert_eq!(provider.resolve("memory0").unwrap(), "let a = 1;");
    }
}
