//! Shared fixtures for daemon integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use url::Url;

use gary_daemon::{NamespaceConfig, ServiceConfig};

/// Install a test subscriber once; repeated calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Temporary image directories plus a fallback directory.
pub struct Fixture {
    pub root: TempDir,
    pub gary_dir: PathBuf,
    pub goober_dir: PathBuf,
    pub fallback_dir: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let gary_dir = root.path().join("gary_images");
        let goober_dir = root.path().join("goober_images");
        let fallback_dir = root.path().join("fallback");
        for dir in [&gary_dir, &goober_dir, &fallback_dir] {
            std::fs::create_dir(dir).unwrap();
        }
        std::fs::write(fallback_dir.join("Gary76.jpg"), b"gary fallback").unwrap();
        std::fs::write(fallback_dir.join("goober8.jpg"), b"goober fallback").unwrap();

        Self {
            root,
            gary_dir,
            goober_dir,
            fallback_dir,
        }
    }

    pub fn write(&self, dir: &Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> ServiceConfig {
        let namespace = |name: &str, dir: &Path, base: &str, fallback: &str| {
            let mut ns = NamespaceConfig::new(name, dir, Url::parse(base).unwrap(), fallback);
            ns.fallback_dir = Some(self.fallback_dir.clone());
            ns
        };

        let mut config = ServiceConfig::new(
            "127.0.0.1:0".parse().unwrap(),
            vec![
                namespace("gary", &self.gary_dir, "http://localhost:8080/Gary", "Gary76.jpg"),
                namespace(
                    "goober",
                    &self.goober_dir,
                    "http://localhost:8080/Goober",
                    "goober8.jpg",
                ),
            ],
        );
        config.watcher.debounce = Duration::from_millis(50);
        config
    }
}

/// Poll `check` until it holds or five seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    check()
}
