//! Service lifecycle: start, serve, shut down

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::http_server;
use crate::service_config::Config;
use crate::service_state::{State, StateSetupError};

const LOG_FILE_PREFIX: &str = "gary.log";

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("state setup failed: {0}")]
    Setup(#[from] StateSetupError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Handle to a running service.
pub struct ShutdownHandle {
    shutdown_tx: watch::Sender<()>,
    server: JoinHandle<Result<(), std::io::Error>>,
    local_addr: SocketAddr,
    state: State,
}

impl ShutdownHandle {
    /// Address the HTTP server actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the server to stop accepting connections.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Wait for the server to drain, then stop the watchers.
    pub async fn wait(self) -> Result<(), ServiceError> {
        let result = match self.server.await {
            Ok(result) => result.map_err(ServiceError::from),
            Err(e) => {
                tracing::error!("HTTP server task failed: {}", e);
                Ok(())
            }
        };

        self.state.stop_watchers().await;
        tracing::info!("Service stopped");
        result
    }
}

/// Load state, start watchers and bind the HTTP server.
///
/// Listings are loaded before the listener is bound, so the first request
/// already sees them.
pub async fn start_service(config: &Config) -> Result<(State, ShutdownHandle), ServiceError> {
    let state = State::from_config(config).await?;
    state.spawn_watchers()?;

    let listener = match TcpListener::bind(config.listen_addr).await {
        Ok(listener) => listener,
        Err(source) => {
            state.stop_watchers().await;
            return Err(ServiceError::Bind {
                addr: config.listen_addr,
                source,
            });
        }
    };
    let local_addr = listener.local_addr()?;
    tracing::info!("Listening on http://{}", local_addr);

    let (shutdown_tx, mut shutdown_rx) = watch::channel(());
    let router = http_server::router(state.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
                tracing::info!("Shutting down HTTP server");
            })
            .await
    });

    let handle = ShutdownHandle {
        shutdown_tx,
        server,
        local_addr,
        state: state.clone(),
    };
    Ok((state, handle))
}

/// Run the service until Ctrl-C.
pub async fn spawn_service(config: &Config) -> Result<(), ServiceError> {
    let _guard = init_logging(config);

    let (_state, handle) = start_service(config).await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
    handle.shutdown();
    handle.wait().await
}

/// Install the global subscriber. `RUST_LOG` overrides the configured
/// level. The returned guard must be held for file logs to be flushed.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let env_filter = || {
        EnvFilter::builder()
            .with_default_directive(config.log_level.into())
            .from_env_lossy()
    };

    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(env_filter());

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }

    guard
}
