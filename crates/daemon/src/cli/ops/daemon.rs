use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use common::{LineMode, WatcherConfig, DEFAULT_MAX_CACHED_IMAGE_SIZE};
use gary_daemon::{spawn_service, ConfigError, CountMode, NamespaceConfig, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Directory of Gary images
    #[arg(long, env = "GARY_DIR", default_value = "gary_images")]
    pub gary_dir: PathBuf,

    /// Directory of Goober images
    #[arg(long, env = "GOOBER_DIR", default_value = "goober_images")]
    pub goober_dir: PathBuf,

    /// Public base URL for Gary images
    #[arg(long, env = "GARYURL", default_value = "http://localhost:8080/Gary")]
    pub gary_url: String,

    /// Public base URL for Goober images
    #[arg(long, env = "GOOBERURL", default_value = "http://localhost:8080/Goober")]
    pub goober_url: String,

    /// Served when the Gary directory is empty or unreadable
    #[arg(long, env = "GARY_FALLBACK", default_value = "Gary76.jpg")]
    pub gary_fallback: String,

    /// Served when the Goober directory is empty or unreadable
    #[arg(long, env = "GOOBER_FALLBACK", default_value = "goober8.jpg")]
    pub goober_fallback: String,

    /// Directory holding the fallback images (default: each image directory)
    #[arg(long, env = "FALLBACK_DIR")]
    pub fallback_dir: Option<PathBuf>,

    /// JSON array of quotes; `/quote` is disabled without it
    #[arg(long, env = "QUOTES_FILE")]
    pub quotes_file: Option<PathBuf>,

    /// JSON array of jokes; `/joke` is disabled without it
    #[arg(long, env = "JOKES_FILE")]
    pub jokes_file: Option<PathBuf>,

    /// HTML page served at `/`
    #[arg(long, env = "DOCS_FILE")]
    pub docs_file: Option<PathBuf>,

    /// Source of the `/{namespace}/count` number
    #[arg(long, env = "COUNT_MODE", value_enum, default_value_t = CountMode::Cached)]
    pub count_mode: CountMode,

    /// Load quotes and jokes once at startup instead of on every request
    #[arg(long, env = "CACHE_LINES")]
    pub cache_lines: bool,

    /// Quiet period before a burst of file events triggers a rebuild
    #[arg(long, env = "WATCH_DEBOUNCE_MS", default_value_t = 150)]
    pub debounce_ms: u64,

    /// Also rescan every directory on this interval
    #[arg(long, env = "RESCAN_SECS")]
    pub rescan_secs: Option<u64>,

    /// Keep images smaller than this many bytes in memory once read (0 disables)
    #[arg(long, env = "IMAGE_CACHE_MAX_SIZE", default_value_t = DEFAULT_MAX_CACHED_IMAGE_SIZE)]
    pub image_cache_max_size: u64,

    /// Read every cacheable image into memory at startup
    #[arg(long, env = "PRELOAD_IMAGES")]
    pub preload_images: bool,

    /// Write daily rotated log files to this directory
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Default log level, overridden by RUST_LOG
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: tracing::Level,
}

impl Daemon {
    pub fn service_config(&self) -> Result<ServiceConfig, ConfigError> {
        let mut gary = NamespaceConfig::new(
            "gary",
            &self.gary_dir,
            parse_base_url(&self.gary_url)?,
            &self.gary_fallback,
        );
        let mut goober = NamespaceConfig::new(
            "goober",
            &self.goober_dir,
            parse_base_url(&self.goober_url)?,
            &self.goober_fallback,
        );
        gary.fallback_dir = self.fallback_dir.clone();
        goober.fallback_dir = self.fallback_dir.clone();

        let mut config = ServiceConfig::new(
            SocketAddr::new(self.bind_address, self.port),
            vec![gary, goober],
        );
        config.quotes_file = self.quotes_file.clone();
        config.jokes_file = self.jokes_file.clone();
        config.docs_file = self.docs_file.clone();
        config.count_mode = self.count_mode;
        config.line_mode = if self.cache_lines {
            LineMode::Cached
        } else {
            LineMode::Fresh
        };
        config.watcher = WatcherConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            rescan_interval: self.rescan_secs.map(Duration::from_secs),
            ..WatcherConfig::default()
        };
        config.image_cache_max_size = self.image_cache_max_size;
        config.preload_images = self.preload_images;
        config.log_level = self.log_level;
        config.log_dir = self.log_dir.clone();

        config.validate()?;
        Ok(config)
    }
}

fn parse_base_url(url: &str) -> Result<Url, ConfigError> {
    Url::parse(url).map_err(|source| ConfigError::InvalidBaseUrl {
        url: url.to_string(),
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("daemon failed: {0}")]
    Service(#[from] gary_daemon::ServiceError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = self.service_config()?;
        spawn_service(&config).await?;
        Ok("daemon ended".to_string())
    }
}
