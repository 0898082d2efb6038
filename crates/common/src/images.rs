//! In-memory cache of image bytes
//!
//! Small images are kept in memory once read so repeated picks skip the
//! filesystem. Entries are keyed by path and stamped with the file's size
//! and modification time when read. Every listing rebuild of a directory
//! drops entries whose file left the listing or whose stamp no longer
//! matches. Content-only rewrites do not trigger a rebuild on their own, so
//! such a file may be served stale until the next rebuild of its directory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Files smaller than this are cached by default
pub const DEFAULT_MAX_CACHED_IMAGE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Stamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl Stamp {
    fn of(metadata: &std::fs::Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    data: Bytes,
    stamp: Stamp,
}

/// Totals reported by [`ImageCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// Shared byte cache. Cheap to clone; clones share entries.
#[derive(Debug, Clone)]
pub struct ImageCache {
    entries: Arc<RwLock<HashMap<PathBuf, Entry>>>,
    max_entry_size: u64,
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_IMAGE_SIZE)
    }
}

impl ImageCache {
    /// Cache files strictly smaller than `max_entry_size` bytes. Zero
    /// disables caching.
    pub fn new(max_entry_size: u64) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            max_entry_size,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_entry_size > 0
    }

    fn accepts(&self, len: u64) -> bool {
        len < self.max_entry_size
    }

    pub fn get(&self, path: &Path) -> Option<Bytes> {
        self.entries.read().get(path).map(|entry| entry.data.clone())
    }

    fn insert(&self, path: &Path, data: Bytes, stamp: Stamp) -> bool {
        if !self.accepts(stamp.len) {
            return false;
        }
        self.entries
            .write()
            .insert(path.to_path_buf(), Entry { data, stamp });
        true
    }

    /// Bytes of `path`, from memory when cached, otherwise read from disk
    /// and cached when small enough.
    pub async fn load(&self, path: &Path) -> std::io::Result<Bytes> {
        if let Some(data) = self.get(path) {
            return Ok(data);
        }

        let metadata = tokio::fs::metadata(path).await?;
        let data = Bytes::from(tokio::fs::read(path).await?);
        if self.is_enabled() {
            self.insert(path, data.clone(), Stamp::of(&metadata));
        }
        Ok(data)
    }

    /// Read every cacheable file among `names` in `dir`. Blocking; returns
    /// the number of files cached.
    pub fn preload(&self, dir: &Path, names: &[String]) -> usize {
        if !self.is_enabled() {
            return 0;
        }

        let mut loaded = 0;
        for name in names {
            let path = dir.join(name);
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            if !self.accepts(metadata.len()) {
                continue;
            }
            match std::fs::read(&path) {
                Ok(data) => {
                    if self.insert(&path, Bytes::from(data), Stamp::of(&metadata)) {
                        loaded += 1;
                    }
                }
                Err(e) => {
                    tracing::debug!(path = %path.display(), "Skipping preload: {}", e);
                }
            }
        }
        loaded
    }

    /// Drop entries under `dir` that are not in `listing` (sorted) or whose
    /// file changed since it was cached. Blocking. Returns the number of
    /// entries dropped.
    pub fn refresh_dir(&self, dir: &Path, listing: &[String]) -> usize {
        let candidates: Vec<(PathBuf, Stamp)> = self
            .entries
            .read()
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, entry)| (path.clone(), entry.stamp.clone()))
            .collect();

        let stale: Vec<PathBuf> = candidates
            .into_iter()
            .filter(|(path, stamp)| {
                let listed = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| listing.binary_search_by(|n| n.as_str().cmp(name)).is_ok());
                let unchanged = std::fs::metadata(path)
                    .map(|metadata| Stamp::of(&metadata) == *stamp)
                    .unwrap_or(false);
                !(listed && unchanged)
            })
            .map(|(path, _)| path)
            .collect();

        if stale.is_empty() {
            return 0;
        }

        let mut entries = self.entries.write();
        for path in &stale {
            entries.remove(path);
        }
        tracing::debug!(dir = %dir.display(), dropped = stale.len(), "Dropped stale cached images");
        stale.len()
    }

    pub fn stats(&self) -> ImageCacheStats {
        let entries = self.entries.read();
        ImageCacheStats {
            entries: entries.len(),
            bytes: entries.values().map(|entry| entry.data.len() as u64).sum(),
        }
    }
}
