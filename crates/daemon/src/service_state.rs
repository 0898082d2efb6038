use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use common::{
    DirectoryWatcher, FileNameCache, ImageCache, LineMode, LineStore, WatcherError,
    WatcherHandle, WatcherStatus,
};

use crate::http_server::metrics::RequestMetrics;

use crate::service_config::{Config, ConfigError, NamespaceConfig};

/// Main service state shared by every handler
#[derive(Clone)]
pub struct State {
    config: Arc<Config>,
    cache: FileNameCache,
    images: ImageCache,
    quotes: Option<LineStore>,
    jokes: Option<LineStore>,
    metrics: Arc<RequestMetrics>,
    watchers: Arc<Mutex<BTreeMap<String, WatcherHandle>>>,
}

impl State {
    /// Validate the config and load every namespace listing.
    ///
    /// Unreadable directories are logged and served from their fallback.
    /// Watchers are not started here, see [`State::spawn_watchers`].
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        config.validate()?;

        let images = ImageCache::new(config.image_cache_max_size);
        let cache = FileNameCache::new(
            config
                .namespaces
                .iter()
                .map(NamespaceConfig::cache_namespace),
        )
        .with_images(images.clone());
        let loader = cache.clone();
        tokio::task::spawn_blocking(move || loader.rebuild_all()).await?;

        if config.preload_images && images.is_enabled() {
            for ns in &config.namespaces {
                let Some(names) = cache.snapshot(&ns.name) else {
                    continue;
                };
                let images = images.clone();
                let dir = ns.dir.clone();
                let loaded =
                    tokio::task::spawn_blocking(move || images.preload(&dir, &names)).await?;
                tracing::info!(namespace = %ns.name, loaded, "Preloaded images");
            }
        }

        let quotes = config
            .quotes_file
            .as_ref()
            .map(|path| LineStore::new(path, config.line_mode));
        let jokes = config
            .jokes_file
            .as_ref()
            .map(|path| LineStore::new(path, config.line_mode));

        if config.line_mode == LineMode::Cached {
            for store in quotes.iter().chain(jokes.iter()) {
                let store = store.clone();
                let path = store.path().display().to_string();
                match tokio::task::spawn_blocking(move || store.preload()).await? {
                    Ok(count) => tracing::info!(%path, count, "Preloaded lines"),
                    Err(e) => tracing::error!(%path, "Failed to preload lines: {}", e),
                }
            }
        }

        Ok(Self {
            config: Arc::new(config.clone()),
            cache,
            images,
            quotes,
            jokes,
            metrics: Arc::new(RequestMetrics::default()),
            watchers: Arc::new(Mutex::new(BTreeMap::new())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &FileNameCache {
        &self.cache
    }

    pub fn images(&self) -> &ImageCache {
        &self.images
    }

    pub fn metrics(&self) -> &RequestMetrics {
        &self.metrics
    }

    pub fn quotes(&self) -> Option<&LineStore> {
        self.quotes.as_ref()
    }

    pub fn jokes(&self) -> Option<&LineStore> {
        self.jokes.as_ref()
    }

    /// Start one directory watcher per namespace that is not watched yet.
    pub fn spawn_watchers(&self) -> Result<(), StateSetupError> {
        let mut watchers = self.watchers.lock();
        for ns in &self.config.namespaces {
            if watchers.contains_key(&ns.name) {
                continue;
            }
            let handle =
                DirectoryWatcher::spawn(self.cache.clone(), &ns.name, self.config.watcher.clone())?;
            tracing::debug!(namespace = %ns.name, dir = %ns.dir.display(), "Watcher spawned");
            watchers.insert(ns.name.clone(), handle);
        }
        Ok(())
    }

    /// Stop every watcher and wait for their tasks to finish.
    pub async fn stop_watchers(&self) {
        let handles = std::mem::take(&mut *self.watchers.lock());
        for (name, handle) in handles {
            handle.stop().await;
            tracing::debug!(namespace = %name, "Watcher stopped");
        }
    }

    /// Current status of each configured namespace's watcher, `None` when
    /// no watcher is running for it.
    pub fn watcher_statuses(&self) -> BTreeMap<String, Option<WatcherStatus>> {
        let watchers = self.watchers.lock();
        self.config
            .namespaces
            .iter()
            .map(|ns| {
                let status = watchers.get(&ns.name).map(WatcherHandle::status);
                (ns.name.clone(), status)
            })
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),
    #[error("setup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
