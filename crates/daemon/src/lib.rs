// Service modules
pub mod http_server;
pub mod process;
pub mod service_config;
pub mod service_state;

pub use process::{spawn_service, start_service, ServiceError, ShutdownHandle};
pub use service_config::{Config as ServiceConfig, ConfigError, CountMode, NamespaceConfig};
pub use service_state::{State as ServiceState, StateSetupError};

/// Build info reporting the daemon package rather than `common`.
pub fn build_info() -> common::version::BuildInfo {
    common::build_info!()
}
