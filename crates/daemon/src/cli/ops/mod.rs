pub mod daemon;
pub mod health;
pub mod version;

pub use daemon::Daemon;
pub use health::Health;
pub use version::Version;
