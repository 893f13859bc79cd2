//! Lexical path helpers.
//!
//! Module paths are resolved without touching the filesystem: `.` and `..`
//! are folded textually, so a specifier cannot escape the bundle root
//! through a symlink-free `..` chain.

use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` components. A `..` that would climb above the start
/// of a relative path is kept.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => result.push(".."),
            },
            other => result.push(other),
        }
    }
    result
}

/// True if `path` lies inside `base` after lexical normalization.
#[must_use]
pub fn is_within(base: &Path, path: &Path) -> bool {
    let base = normalize(base);
    let path = normalize(path);
    path.starts_with(&base) && !path.components().any(|c| c == Component::ParentDir)
}

/// Render a relative path with `/` separators.
#[must_use]
pub fn to_slash(path: &Path) -> String {
    let parts: Vec<_> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect();
    parts.join("/")
}

/// Directory part of a `/`-separated module path (`"src/a.js"` → `"src"`).
#[must_use]
pub fn parent_dir(module_path: &str) -> &str {
    module_path.rfind('/').map_or("", |i| &module_path[..i])
}

/// True for `./x`, `../x` and `/x` specifiers.
#[must_use]
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("src/./a/../b.js")), PathBuf::from("src/b.js"));
        assert_eq!(normalize(Path::new("../x.js")), PathBuf::from("../x.js"));
        assert_eq!(normalize(Path::new("a/../../x.js")), PathBuf::from("../x.js"));
        assert_eq!(normalize(Path::new("/../x.js")), PathBuf::from("/x.js"));
    }

    #[test]
    fn test_is_within() {
        assert!(is_within(Path::new("/root/app"), Path::new("/root/app/src/a.js")));
        assert!(is_within(Path::new("/root/app"), Path::new("/root/app/src/../a.js")));
        assert!(!is_within(Path::new("/root/app"), Path::new("/root/app/../secret.js")));
        assert!(!is_within(Path::new("/root/app"), Path::new("/etc/passwd")));
        assert!(!is_within(Path::new("."), Path::new("./../x.js")));
        assert!(is_within(Path::new("."), Path::new("./src/x.js")));
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("src").join("lib").join("a.js").as_path()), "src/lib/a.js");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("src/lib/a.js"), "src/lib");
        assert_eq!(parent_dir("a.js"), "");
    }

    #[test]
    fn test_relative_specifiers() {
        assert!(is_relative_specifier("./a"));
        assert!(is_relative_specifier("../a"));
        assert!(is_relative_specifier("/a"));
        assert!(!is_relative_specifier("react"));
        assert!(!is_relative_specifier("memory0"));
    }
}
