//! Core of the gary service: a watched, in-memory cache of directory
//! listings and uniform random selection over it.
//!
//! - [`listing`]: one-shot listing of the regular files in a directory
//! - [`cache`]: per-namespace immutable snapshots, swapped atomically
//! - [`watcher`]: background task rebuilding a namespace on directory changes
//! - [`picker`]: random choice with fallback, number extraction
//! - [`images`]: in-memory bytes of small images, kept in step with rebuilds
//! - [`lines`]: random lines from a JSON array of strings

pub mod cache;
pub mod images;
pub mod lines;
pub mod listing;
pub mod picker;
pub mod version;
pub mod watcher;

pub use cache::{CacheError, FileNameCache, Namespace, Picked, Snapshot};
pub use images::{ImageCache, ImageCacheStats, DEFAULT_MAX_CACHED_IMAGE_SIZE};
pub use lines::{LineError, LineMode, LineStore};
pub use listing::{list_files, ListError};
pub use picker::{extract_leading_number, pick};
pub use watcher::{DirectoryWatcher, WatcherConfig, WatcherError, WatcherHandle, WatcherStatus};
