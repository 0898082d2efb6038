//! Random lines from a JSON array of strings
//!
//! A line source is a file containing a JSON array of strings (quotes,
//! jokes, ...). By default the file is re-read on every call; a store can
//! also be preloaded once and served from memory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;

#[derive(Debug, thiserror::Error)]
pub enum LineError {
    #[error("could not read {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse JSON from {path}: {source}")]
    ParseFailure {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no lines found in {0}")]
    EmptyCollection(PathBuf),
}

/// Read and parse a JSON array of strings.
pub fn load_lines(path: &Path) -> Result<Vec<String>, LineError> {
    let content = std::fs::read(path).map_err(|source| LineError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&content).map_err(|source| LineError::ParseFailure {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `path` and return one of its lines at random.
pub fn random_line(path: &Path) -> Result<String, LineError> {
    let lines = load_lines(path)?;
    choose(&lines).ok_or_else(|| LineError::EmptyCollection(path.to_path_buf()))
}

fn choose(lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let idx = rand::rng().random_range(0..lines.len());
    Some(lines[idx].clone())
}

/// How a [`LineStore`] gets its lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineMode {
    /// Re-read and re-parse the source on every call
    #[default]
    Fresh,
    /// Serve from lines loaded by [`LineStore::preload`]
    Cached,
}

/// A configured line source.
#[derive(Debug, Clone)]
pub struct LineStore {
    path: PathBuf,
    mode: LineMode,
    cached: Arc<RwLock<Option<Arc<[String]>>>>,
}

impl LineStore {
    pub fn new(path: impl Into<PathBuf>, mode: LineMode) -> Self {
        Self {
            path: path.into(),
            mode,
            cached: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LineMode {
        self.mode
    }

    /// Load the source into memory. Only meaningful in cached mode; a fresh
    /// store ignores the loaded lines and keeps re-reading.
    pub fn preload(&self) -> Result<usize, LineError> {
        let lines = load_lines(&self.path)?;
        let count = lines.len();
        *self.cached.write() = Some(lines.into());
        Ok(count)
    }

    /// One random line. Performs blocking I/O in fresh mode.
    pub fn random_line(&self) -> Result<String, LineError> {
        match self.mode {
            LineMode::Fresh => random_line(&self.path),
            LineMode::Cached => {
                let lines = self.cached.read().clone();
                lines
                    .as_deref()
                    .and_then(choose)
                    .ok_or_else(|| LineError::EmptyCollection(self.path.clone()))
            }
        }
    }

    /// Number of lines currently available.
    pub fn count(&self) -> Result<usize, LineError> {
        match self.mode {
            LineMode::Fresh => load_lines(&self.path).map(|lines| lines.len()),
            LineMode::Cached => Ok(self.cached.read().as_ref().map(|l| l.len()).unwrap_or(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_source(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("lines.json");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_single_line_always_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), r#"["a"]"#);

        for _ in 0..20 {
            assert_eq!(random_line(&path).unwrap(), "a");
        }
    }

    #[test]
    fn test_line_is_member() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), r#"["one", "two \"quoted\"", "three\nlines"]"#);
        let expected = load_lines(&path).unwrap();

        for _ in 0..50 {
            assert!(expected.contains(&random_line(&path).unwrap()));
        }
    }

    #[test]
    fn test_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), "[]");

        assert!(matches!(
            random_line(&path),
            Err(LineError::EmptyCollection(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), r#"["unterminated"#);

        assert!(matches!(
            random_line(&path),
            Err(LineError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_wrong_shape_is_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), r#"{"quote": "nope"}"#);

        assert!(matches!(
            random_line(&path),
            Err(LineError::ParseFailure { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();

        assert!(matches!(
            random_line(&dir.path().join("missing.json")),
            Err(LineError::ReadFailure { .. })
        ));
    }

    #[test]
    fn test_fresh_store_sees_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), r#"["old"]"#);
        let store = LineStore::new(&path, LineMode::Fresh);
        assert_eq!(store.random_line().unwrap(), "old");

        std::fs::write(&path, r#"["new"]"#).unwrap();
        assert_eq!(store.random_line().unwrap(), "new");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_cached_store_keeps_preloaded_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_source(dir.path(), r#"["old"]"#);
        let store = LineStore::new(&path, LineMode::Cached);

        // Nothing loaded yet
        assert!(matches!(
            store.random_line(),
            Err(LineError::EmptyCollection(_))
        ));

        assert_eq!(store.preload().unwrap(), 1);
        std::fs::write(&path, r#"["new"]"#).unwrap();
        assert_eq!(store.random_line().unwrap(), "old");
        assert_eq!(store.count().unwrap(), 1);
    }
}
