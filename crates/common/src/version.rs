//! Build metadata reported by the service and the CLI

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
    pub build_profile: String,
}

impl BuildInfo {
    /// Build info for this crate. Binaries should override `name` and
    /// `version` with their own package metadata.
    pub fn new() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_profile: if cfg!(debug_assertions) {
                "debug".to_string()
            } else {
                "release".to_string()
            },
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version, self.build_profile)
    }
}

/// Build info for the calling crate.
#[macro_export]
macro_rules! build_info {
    () => {{
        let mut info = $crate::version::BuildInfo::new();
        info.name = env!("CARGO_PKG_NAME").to_string();
        info.version = env!("CARGO_PKG_VERSION").to_string();
        info
    }};
}
