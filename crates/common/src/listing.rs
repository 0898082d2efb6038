//! One-shot directory listing
//!
//! Lists the regular files directly inside a directory. The result is an
//! owned, eagerly collected snapshot; nothing is re-evaluated lazily.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ListError {
    #[error("directory not found: {0}")]
    NotFound(PathBuf),
    #[error("directory unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ListError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => ListError::NotFound(path.to_path_buf()),
            _ => ListError::Unreadable {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// List the names of regular files in `dir`, sorted by name.
///
/// Subdirectories are skipped. Symlinks are followed, so a link to a regular
/// file is listed and a link to a directory is not. Names that are not valid
/// UTF-8 cannot be put in a URL and are skipped.
pub fn list_files(dir: &Path) -> Result<Vec<String>, ListError> {
    let entries = std::fs::read_dir(dir).map_err(|e| ListError::from_io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ListError::from_io(dir, e))?;

        // file_type() does not follow symlinks; metadata() does.
        let is_file = match entry.file_type() {
            Ok(ft) if ft.is_symlink() => std::fs::metadata(entry.path())
                .map(|m| m.is_file())
                .unwrap_or(false),
            Ok(ft) => ft.is_file(),
            Err(_) => false,
        };
        if !is_file {
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => files.push(name),
            Err(name) => {
                tracing::debug!(dir = %dir.display(), ?name, "Skipping non UTF-8 file name");
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_only_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.jpg"), b"c").unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec!["a.jpg".to_string(), "b.jpg".to_string()]);
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        match list_files(&missing) {
            Err(ListError::NotFound(path)) => assert_eq!(path, missing),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_file_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        std::fs::write(&file, b"x").unwrap();

        assert!(list_files(&file).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_followed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.jpg");
        std::fs::write(&target, b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("link.jpg")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("sub"), dir.path().join("linkdir")).unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files, vec!["link.jpg".to_string(), "real.jpg".to_string()]);
    }
}
