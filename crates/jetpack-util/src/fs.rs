use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Read a module source file.
///
/// Invalid UTF-8 sequences are replaced with the replacement character and a
/// leading byte order mark is dropped, so spans always index valid text.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_source(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(&bytes);
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// Missing parent directories are created. The file will either have the
/// old contents or the new contents, never a partial write.
///
/// # Errors
/// Returns an error if the directory cannot be created or the write or
/// rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // Same directory as the target, so the rename stays on one filesystem
    let temp_path = parent.join(format!(
        ".{}.jetpack-tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("out"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists. Try copy + remove as fallback.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_source_strips_bom() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, b"\xEF\xBB\xBFvar a = 1;").unwrap();

        assert_eq!(read_source(&path).unwrap(), "var a = 1;");
    }

    #[test]
    fn test_read_source_invalid_utf8() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, [b'x', b'=', 0x80, b';']).unwrap();

        let source = read_source(&path).unwrap();
        assert!(source.starts_with("x="));
        assert!(source.contains('\u{FFFD}'));
    }

    #[test]
    fn test_read_source_missing_file() {
        assert!(read_source(Path::new("/nonexistent/jetpack/a.js")).is_err());
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dist").join("bundle.js");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        // No temp files should remain
        let entries: Vec<_> = fs::read_dir(dir.path().join("dist")).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
