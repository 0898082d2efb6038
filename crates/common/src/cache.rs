//! In-memory file name cache
//!
//! Holds one immutable listing snapshot per namespace. A rebuild scans the
//! directory without holding any lock and then swaps the new snapshot in;
//! readers only ever clone the current `Arc`, so they see either the old
//! listing or the new one, never something in between.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::images::ImageCache;
use crate::listing::{list_files, ListError};
use crate::picker;

/// An immutable listing of file names taken at one instant.
pub type Snapshot = Arc<[String]>;

/// A named image collection backed by a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Logical name, e.g. "gary"
    pub name: String,
    /// Directory whose regular files make up the collection
    pub dir: PathBuf,
    /// File name returned when the collection is empty or unavailable
    pub fallback: String,
}

impl Namespace {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>, fallback: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
            fallback: fallback.into(),
        }
    }
}

/// Result of a random pick from a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Picked {
    /// A name taken from the current listing
    Listed(String),
    /// The namespace fallback; the listing was empty or absent
    Fallback(String),
}

impl Picked {
    pub fn name(&self) -> &str {
        match self {
            Picked::Listed(name) | Picked::Fallback(name) => name,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Picked::Fallback(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error("listing failed: {0}")]
    Listing(#[from] ListError),
}

#[derive(Debug)]
struct Slot {
    namespace: Namespace,
    listing: RwLock<Option<Snapshot>>,
}

/// Concurrency-safe map from namespace name to its current listing.
///
/// Cheap to clone; clones share the same slots.
#[derive(Debug, Clone)]
pub struct FileNameCache {
    slots: Arc<BTreeMap<String, Slot>>,
    images: Option<ImageCache>,
}

impl FileNameCache {
    /// Create a cache for the given namespaces. Every listing starts absent.
    pub fn new(namespaces: impl IntoIterator<Item = Namespace>) -> Self {
        let slots = namespaces
            .into_iter()
            .map(|namespace| {
                (
                    namespace.name.clone(),
                    Slot {
                        namespace,
                        listing: RwLock::new(None),
                    },
                )
            })
            .collect();

        Self {
            slots: Arc::new(slots),
            images: None,
        }
    }

    /// Keep `images` consistent with the listings: every rebuild drops the
    /// cached bytes of files that left or changed in that directory.
    pub fn with_images(mut self, images: ImageCache) -> Self {
        self.images = Some(images);
        self
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.slots.get(name).map(|slot| &slot.namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &Namespace> {
        self.slots.values().map(|slot| &slot.namespace)
    }

    /// Re-scan the namespace directory and replace its listing.
    ///
    /// On failure the previous listing is left untouched. Performs blocking
    /// filesystem I/O; call it from a blocking context.
    pub fn rebuild(&self, name: &str) -> Result<usize, CacheError> {
        let slot = self.slot(name)?;

        let files = list_files(&slot.namespace.dir)?;
        let count = files.len();
        if let Some(images) = &self.images {
            images.refresh_dir(&slot.namespace.dir, &files);
        }
        Self::publish(slot, files);

        tracing::debug!(namespace = %name, count, "Rebuilt file name cache");
        Ok(count)
    }

    /// Populate every namespace. Failures are logged and leave that
    /// namespace absent so requests fall back.
    pub fn rebuild_all(&self) {
        for name in self.slots.keys() {
            match self.rebuild(name) {
                Ok(count) => {
                    tracing::info!(namespace = %name, count, "Loaded file names");
                }
                Err(e) => {
                    tracing::warn!(namespace = %name, "Failed to load file names: {}", e);
                }
            }
        }
    }

    /// Current listing for `name`. Never touches the filesystem.
    pub fn snapshot(&self, name: &str) -> Option<Snapshot> {
        self.slots
            .get(name)
            .and_then(|slot| slot.listing.read().clone())
    }

    /// Pick a random file name, falling back to the namespace default.
    ///
    /// Returns `None` only for an unknown namespace.
    pub fn pick(&self, name: &str) -> Option<Picked> {
        let slot = self.slots.get(name)?;
        let snapshot = slot.listing.read().clone();
        let fallback = &slot.namespace.fallback;

        Some(match snapshot.as_deref() {
            Some(names) if !names.is_empty() => Picked::Listed(picker::pick(Some(names), fallback)),
            _ => Picked::Fallback(fallback.clone()),
        })
    }

    /// Number of names in the cached listing (0 when absent).
    pub fn count(&self, name: &str) -> usize {
        self.snapshot(name).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of files found by a fresh scan, without touching the cache.
    pub fn live_count(&self, name: &str) -> Result<usize, CacheError> {
        let slot = self.slot(name)?;
        Ok(list_files(&slot.namespace.dir)?.len())
    }

    fn slot(&self, name: &str) -> Result<&Slot, CacheError> {
        self.slots
            .get(name)
            .ok_or_else(|| CacheError::UnknownNamespace(name.to_string()))
    }

    fn publish(slot: &Slot, files: Vec<String>) {
        let snapshot: Snapshot = files.into();
        *slot.listing.write() = Some(snapshot);
    }
}
