//! Service configuration
//!
//! Built by the `daemon` CLI op from flags and environment variables and
//! validated once before anything is started.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use common::{LineMode, Namespace, WatcherConfig, DEFAULT_MAX_CACHED_IMAGE_SIZE};

/// Top-level routes owned by the service itself
const RESERVED_ROUTES: &[&str] = &["_status", "quote", "joke"];

/// Where `/{namespace}/count` gets its number from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    /// Length of the cached listing
    #[default]
    Cached,
    /// Fresh directory scan on every request
    Live,
}

/// One image collection served by the daemon.
#[derive(Debug, Clone)]
pub struct NamespaceConfig {
    /// Route segment and cache key, e.g. "gary"
    pub name: String,
    pub dir: PathBuf,
    /// Public base URL used to build `/{name}` responses
    pub base_url: Url,
    pub fallback: String,
    /// Directory holding the fallback file. Defaults to `dir`.
    pub fallback_dir: Option<PathBuf>,
    /// Path prefix the directory is served under, e.g. "/Gary"
    pub static_prefix: String,
}

impl NamespaceConfig {
    /// Namespace with the conventional static prefix (capitalized name).
    pub fn new(
        name: impl Into<String>,
        dir: impl Into<PathBuf>,
        base_url: Url,
        fallback: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let static_prefix = format!("/{}", capitalize(&name));
        Self {
            name,
            dir: dir.into(),
            base_url,
            fallback: fallback.into(),
            fallback_dir: None,
            static_prefix,
        }
    }

    pub fn fallback_path(&self) -> PathBuf {
        self.fallback_dir
            .as_deref()
            .unwrap_or(&self.dir)
            .join(&self.fallback)
    }

    /// Public URL for a file in this namespace. The file name is
    /// percent-encoded as a single path segment.
    pub fn public_url(&self, file: &str) -> String {
        let mut url = self.base_url.clone();
        match url.path_segments_mut() {
            Ok(mut segments) => {
                segments.pop_if_empty().push(file);
            }
            // cannot-be-a-base URLs have no path to extend
            Err(()) => {
                return format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), file);
            }
        }
        url.into()
    }

    pub fn cache_namespace(&self) -> Namespace {
        Namespace::new(&self.name, &self.dir, &self.fallback)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub namespaces: Vec<NamespaceConfig>,
    /// JSON array of strings served by `/quote`; route disabled when unset
    pub quotes_file: Option<PathBuf>,
    /// JSON array of strings served by `/joke`; route disabled when unset
    pub jokes_file: Option<PathBuf>,
    /// HTML page served at `/`; route disabled when unset
    pub docs_file: Option<PathBuf>,
    pub count_mode: CountMode,
    pub line_mode: LineMode,
    pub watcher: WatcherConfig,
    /// Image files up to this size are kept in memory once read; 0 disables
    /// the byte cache
    pub image_cache_max_size: u64,
    /// Read every cacheable image into memory at startup
    pub preload_images: bool,
    pub log_level: tracing::Level,
    /// Also write daily rotated logs here
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn new(listen_addr: SocketAddr, namespaces: Vec<NamespaceConfig>) -> Self {
        Self {
            listen_addr,
            namespaces,
            quotes_file: None,
            jokes_file: None,
            docs_file: None,
            count_mode: CountMode::default(),
            line_mode: LineMode::default(),
            watcher: WatcherConfig::default(),
            image_cache_max_size: DEFAULT_MAX_CACHED_IMAGE_SIZE,
            preload_images: false,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }

    pub fn namespace(&self, name: &str) -> Option<&NamespaceConfig> {
        self.namespaces.iter().find(|ns| ns.name == name)
    }

    /// Check everything that can be checked without touching the
    /// filesystem. Missing directories are not an error; they are served
    /// from the fallback until they appear.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespaces.is_empty() {
            return Err(ConfigError::NoNamespaces);
        }

        let mut seen = std::collections::BTreeSet::new();
        for ns in &self.namespaces {
            let valid_name = ns
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if ns.name.is_empty() || !valid_name {
                return Err(ConfigError::InvalidNamespace(ns.name.clone()));
            }
            if !seen.insert(ns.name.as_str()) {
                return Err(ConfigError::DuplicateNamespace(ns.name.clone()));
            }
            if ns.dir.as_os_str().is_empty() {
                return Err(ConfigError::EmptyDirectory(ns.name.clone()));
            }
            if !is_plain_file_name(&ns.fallback) {
                return Err(ConfigError::InvalidFallback {
                    namespace: ns.name.clone(),
                    fallback: ns.fallback.clone(),
                });
            }
            if !is_valid_static_prefix(&ns.static_prefix) {
                return Err(ConfigError::InvalidStaticPrefix(ns.static_prefix.clone()));
            }
        }

        // Namespace routes own their first path segment. A static prefix may
        // not start inside one, nor nest inside another prefix.
        let mut claimed: std::collections::BTreeSet<&str> =
            RESERVED_ROUTES.iter().copied().collect();
        for ns in &self.namespaces {
            if !claimed.insert(ns.name.as_str()) {
                return Err(ConfigError::RouteConflict(format!("/{}", ns.name)));
            }
        }
        for (i, ns) in self.namespaces.iter().enumerate() {
            let prefix = &ns.static_prefix;
            let first = prefix.trim_start_matches('/').split('/').next().unwrap_or_default();
            let nested = self.namespaces[..i]
                .iter()
                .any(|other| prefixes_overlap(&other.static_prefix, prefix));
            if claimed.contains(first) || nested {
                return Err(ConfigError::RouteConflict(prefix.clone()));
            }
        }

        if self.watcher.debounce.is_zero() {
            return Err(ConfigError::ZeroDebounce);
        }
        if self.watcher.rescan_interval == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroRescanInterval);
        }
        if self.watcher.resubscribe_interval.is_zero() {
            return Err(ConfigError::ZeroResubscribeInterval);
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no namespaces configured")]
    NoNamespaces,
    #[error("invalid namespace name: {0:?}")]
    InvalidNamespace(String),
    #[error("namespace configured twice: {0}")]
    DuplicateNamespace(String),
    #[error("empty directory path for namespace {0}")]
    EmptyDirectory(String),
    #[error("fallback for {namespace} must be a bare file name, got {fallback:?}")]
    InvalidFallback { namespace: String, fallback: String },
    #[error("invalid static prefix: {0:?}")]
    InvalidStaticPrefix(String),
    #[error("route {0} collides with another route")]
    RouteConflict(String),
    #[error("invalid base url {url:?}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("debounce window must be greater than zero")]
    ZeroDebounce,
    #[error("rescan interval must be greater than zero")]
    ZeroRescanInterval,
    #[error("resubscribe interval must be greater than zero")]
    ZeroResubscribeInterval,
}

/// `/seg[/seg...]` with no empty segments and no router syntax.
fn is_valid_static_prefix(prefix: &str) -> bool {
    let Some(rest) = prefix.strip_prefix('/') else {
        return false;
    };
    !rest.is_empty()
        && rest
            .split('/')
            .all(|seg| !seg.is_empty() && !seg.contains(['*', ':', '{', '}']))
}

/// True when one prefix equals the other or contains it segment-wise.
fn prefixes_overlap(a: &str, b: &str) -> bool {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    long == short || long.starts_with(&format!("{}/", short))
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && Path::new(name).file_name().map(|f| f == name).unwrap_or(false)
        && !name.contains(['/', '\\'])
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(url: &str) -> Url {
        Url::parse(url).unwrap()
    }

    fn sample_config() -> Config {
        Config::new(
            "127.0.0.1:8080".parse().unwrap(),
            vec![
                NamespaceConfig::new(
                    "gary",
                    "gary_images",
                    base("http://localhost:8080/Gary"),
                    "Gary76.jpg",
                ),
                NamespaceConfig::new(
                    "goober",
                    "goober_images",
                    base("http://localhost:8080/Goober"),
                    "goober8.jpg",
                ),
            ],
        )
    }

    #[test]
    fn test_defaults_validate() {
        let config = sample_config();
        config.validate().unwrap();
        assert_eq!(config.count_mode, CountMode::Cached);
        assert_eq!(config.line_mode, LineMode::Fresh);
        assert_eq!(config.namespace("goober").unwrap().static_prefix, "/Goober");
    }

    #[test]
    fn test_public_url_trims_trailing_slash() {
        let with_slash = NamespaceConfig::new("gary", "d", base("http://cdn.test/Gary/"), "f.jpg");
        let without = NamespaceConfig::new("gary", "d", base("http://cdn.test/Gary"), "f.jpg");

        assert_eq!(with_slash.public_url("A.jpg"), "http://cdn.test/Gary/A.jpg");
        assert_eq!(without.public_url("A.jpg"), "http://cdn.test/Gary/A.jpg");
    }

    #[test]
    fn test_public_url_encodes_file_name() {
        let ns = NamespaceConfig::new("gary", "d", base("http://cdn.test/Gary"), "f.jpg");

        assert_eq!(ns.public_url("my pic.jpg"), "http://cdn.test/Gary/my%20pic.jpg");
        assert_eq!(ns.public_url("a#1.jpg"), "http://cdn.test/Gary/a%231.jpg");
        assert_eq!(ns.public_url("q?.jpg"), "http://cdn.test/Gary/q%3F.jpg");

        let root = NamespaceConfig::new("gary", "d", base("http://cdn.test"), "f.jpg");
        assert_eq!(root.public_url("A.jpg"), "http://cdn.test/A.jpg");
    }

    #[test]
    fn test_fallback_path() {
        let mut ns = NamespaceConfig::new("gary", "/srv/gary", base("http://x/Gary"), "Gary76.jpg");
        assert_eq!(ns.fallback_path(), PathBuf::from("/srv/gary/Gary76.jpg"));

        ns.fallback_dir = Some(PathBuf::from("/srv/fallback"));
        assert_eq!(ns.fallback_path(), PathBuf::from("/srv/fallback/Gary76.jpg"));
    }

    #[test]
    fn test_rejects_fallback_with_separator() {
        let mut config = sample_config();
        config.namespaces[0].fallback = "../secret.jpg".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidFallback { .. })
        ));

        config.namespaces[0].fallback = "..".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_and_invalid_namespaces() {
        let mut config = sample_config();
        config.namespaces[1].name = "gary".to_string();
        config.namespaces[1].static_prefix = "/Gary2".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateNamespace(_))
        ));

        let mut config = sample_config();
        config.namespaces[0].name = "ga/ry".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNamespace(_))
        ));

        let mut config = sample_config();
        config.namespaces.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoNamespaces)));
    }

    #[test]
    fn test_rejects_static_prefix_shadowing_namespace() {
        let mut config = sample_config();
        config.namespaces[0].static_prefix = "/gary".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RouteConflict(_))
        ));
    }

    #[test]
    fn test_rejects_namespace_on_reserved_route() {
        for reserved in ["quote", "joke", "_status"] {
            let mut config = sample_config();
            config.namespaces[1].name = reserved.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::RouteConflict(_))),
                "{} should be rejected",
                reserved
            );
        }
    }

    #[test]
    fn test_rejects_static_prefix_shadowing_other_routes() {
        let mut config = sample_config();
        config.namespaces[1].static_prefix = "/gary".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RouteConflict(_))
        ));

        let mut config = sample_config();
        config.namespaces[1].static_prefix = "/Gary".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RouteConflict(_))
        ));

        let mut config = sample_config();
        config.namespaces[0].static_prefix = "/quote/images".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RouteConflict(_))
        ));

        let mut config = sample_config();
        config.namespaces[0].static_prefix = "/static".to_string();
        config.namespaces[1].static_prefix = "/static/goober".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RouteConflict(_))
        ));

        // Siblings under a shared parent are fine
        let mut config = sample_config();
        config.namespaces[0].static_prefix = "/static/gary".to_string();
        config.namespaces[1].static_prefix = "/static/goober".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_malformed_static_prefix() {
        for prefix in ["Gary", "/", "/Gary/", "/*rest", "/:name", "/a//b"] {
            let mut config = sample_config();
            config.namespaces[0].static_prefix = prefix.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidStaticPrefix(_))),
                "{:?} should be rejected",
                prefix
            );
        }

        let mut config = sample_config();
        config.namespaces[0].static_prefix = "/images/gary".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_durations() {
        let mut config = sample_config();
        config.watcher.debounce = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDebounce)));

        let mut config = sample_config();
        config.watcher.rescan_interval = Some(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroRescanInterval)
        ));

        let mut config = sample_config();
        config.watcher.resubscribe_interval = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroResubscribeInterval)
        ));
    }

    #[test]
    fn test_count_mode_parses_lowercase() {
        let mode: CountMode = serde_json::from_str("\"live\"").unwrap();
        assert_eq!(mode, CountMode::Live);
    }
}
