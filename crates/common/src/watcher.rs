//! Directory watcher that keeps a [`FileNameCache`] namespace fresh
//!
//! Each watched namespace gets its own `notify` watcher and a tokio task.
//! Notifications are bridged into the task over a bounded flume channel.
//! Bursts of events are coalesced: the task waits until no name-changing
//! event has arrived for the debounce window and then does a single full
//! rebuild. A burst that never goes quiet is cut off after
//! `MAX_DEBOUNCE_FACTOR` debounce windows, so the cache never lags far
//! behind the last event it has seen.
//!
//! The task rebuilds once right after subscribing, which covers changes made
//! between the initial listing and the subscription.
//!
//! Failures never take the process down. A directory that cannot be watched,
//! an error from the notification backend or a failed rebuild all leave the
//! last good listing in place and are reported through [`WatcherStatus`].

use std::path::PathBuf;
use std::time::Duration;

use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

use crate::cache::FileNameCache;

/// Default quiet period before a burst of events is turned into a rebuild
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Default delay between attempts to re-watch a directory that went away
pub const DEFAULT_RESUBSCRIBE_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on a coalesced burst, in debounce windows
const MAX_DEBOUNCE_FACTOR: u32 = 10;

/// Capacity of the channel bridging the notify thread to the watcher task
const CHANNEL_CAPACITY: usize = 512;

/// Observable health of a single watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatcherStatus {
    /// Registered but not yet subscribed
    Starting,
    /// Receiving notifications; the last rebuild succeeded
    Watching,
    /// Serving the last good listing; notifications or rebuilds are failing
    Degraded(String),
    /// Stop signal received, task finished
    Stopped,
}

impl WatcherStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, WatcherStatus::Watching)
    }
}

impl std::fmt::Display for WatcherStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatcherStatus::Starting => write!(f, "starting"),
            WatcherStatus::Watching => write!(f, "watching"),
            WatcherStatus::Degraded(reason) => write!(f, "degraded: {}", reason),
            WatcherStatus::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period used to coalesce bursts of events
    pub debounce: Duration,
    /// Rebuild on this interval even without events. Also retries the
    /// subscription when the directory could not be watched.
    pub rescan_interval: Option<Duration>,
    /// While the directory is not watched (missing, removed, not yet
    /// created), retry the subscription on this interval and rebuild once
    /// it succeeds.
    pub resubscribe_interval: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            rescan_interval: None,
            resubscribe_interval: DEFAULT_RESUBSCRIBE_INTERVAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
}

/// Message sent from the notify callback thread to the watcher task
#[derive(Debug)]
enum Signal {
    Event(notify::Event),
    Error(String),
}

/// Handle to a running watcher task.
///
/// Dropping the handle also stops the task.
#[derive(Debug)]
pub struct WatcherHandle {
    namespace: String,
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<WatcherStatus>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn status(&self) -> WatcherStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<WatcherStatus> {
        self.status_rx.clone()
    }

    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(namespace = %self.namespace, "Watcher task failed: {}", e);
        }
    }
}

pub struct DirectoryWatcher;

impl DirectoryWatcher {
    /// Start watching the directory of `namespace` and rebuild `cache` on
    /// changes. Must be called from within a tokio runtime.
    ///
    /// Only an unknown namespace is an error. If the directory cannot be
    /// watched the task still runs, reports [`WatcherStatus::Degraded`] and
    /// keeps serving whatever the cache already holds.
    pub fn spawn(
        cache: FileNameCache,
        namespace: &str,
        config: WatcherConfig,
    ) -> Result<WatcherHandle, WatcherError> {
        let dir = cache
            .namespace(namespace)
            .map(|ns| ns.dir.clone())
            .ok_or_else(|| WatcherError::UnknownNamespace(namespace.to_string()))?;

        let (status_tx, status_rx) = watch::channel(WatcherStatus::Starting);
        let (stop_tx, stop_rx) = watch::channel(false);
        let (bridge_tx, bridge_rx) = flume::bounded::<Signal>(CHANNEL_CAPACITY);

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let signal = match res {
                    Ok(event) => Signal::Event(event),
                    Err(e) => Signal::Error(e.to_string()),
                };
                // A full queue already holds pending events and every rebuild
                // is a full relist, so dropping here loses nothing.
                let _ = bridge_tx.try_send(signal);
            },
            notify::Config::default(),
        );

        let mut task = WatchTask {
            namespace: namespace.to_string(),
            dir,
            cache,
            config,
            watcher: None,
            subscribed: false,
            status_tx,
        };

        match watcher {
            Ok(watcher) => {
                task.watcher = Some(watcher);
                task.subscribe();
            }
            Err(e) => {
                tracing::error!(namespace = %namespace, "Failed to create file watcher: {}", e);
                task.set_status(WatcherStatus::Degraded(format!(
                    "failed to create watcher: {}",
                    e
                )));
            }
        }

        let task = tokio::spawn(task.run(bridge_rx, stop_rx));

        Ok(WatcherHandle {
            namespace: namespace.to_string(),
            stop_tx,
            status_rx,
            task,
        })
    }
}

struct WatchTask {
    namespace: String,
    dir: PathBuf,
    cache: FileNameCache,
    config: WatcherConfig,
    // Must stay alive: dropping it deregisters the OS watch.
    watcher: Option<RecommendedWatcher>,
    subscribed: bool,
    status_tx: watch::Sender<WatcherStatus>,
}

impl WatchTask {
    async fn run(mut self, bridge_rx: flume::Receiver<Signal>, mut stop_rx: watch::Receiver<bool>) {
        let mut rescan = self.config.rescan_interval.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval
        });

        tracing::debug!(namespace = %self.namespace, dir = %self.dir.display(), "Watcher task started");

        // Anything that changed before the subscription went live.
        self.rebuild().await;

        let mut channel_open = true;
        loop {
            let resubscribe = !self.subscribed && self.watcher.is_some();
            let retry_after = self.config.resubscribe_interval;

            tokio::select! {
                _ = stop_signal(&mut stop_rx) => break,
                _ = tokio::time::sleep(retry_after), if resubscribe => {
                    if self.dir.is_dir() {
                        self.subscribe();
                        if self.subscribed {
                            self.rebuild().await;
                        }
                    }
                }
                _ = next_tick(&mut rescan) => {
                    if !self.subscribed {
                        self.subscribe();
                    }
                    self.rebuild().await;
                }
                signal = bridge_rx.recv_async(), if channel_open => {
                    let Ok(signal) = signal else {
                        // No sender left: the notify watcher is gone. Only
                        // periodic rescans can refresh the cache from here.
                        channel_open = false;
                        self.set_status(WatcherStatus::Degraded(
                            "notification channel closed".to_string(),
                        ));
                        continue;
                    };

                    if !self.handle_signal(signal) {
                        continue;
                    }

                    self.drain(&bridge_rx).await;
                    self.rebuild().await;
                }
            }
        }

        self.set_status(WatcherStatus::Stopped);
        tracing::debug!(namespace = %self.namespace, "Watcher task stopped");
    }

    /// Returns true when the signal calls for a rebuild.
    fn handle_signal(&mut self, signal: Signal) -> bool {
        match signal {
            Signal::Event(event) => {
                let relevant = is_relevant(&event.kind);
                tracing::trace!(
                    namespace = %self.namespace,
                    kind = ?event.kind,
                    paths = ?event.paths,
                    relevant,
                    "Watch event"
                );
                relevant
            }
            Signal::Error(e) => {
                // Events may have been lost; a rebuild resynchronises.
                tracing::warn!(namespace = %self.namespace, "File watcher error: {}", e);
                self.set_status(WatcherStatus::Degraded(format!("watcher error: {}", e)));
                true
            }
        }
    }

    /// Keep consuming events until no relevant one has arrived for the
    /// debounce window, or the burst has run for `MAX_DEBOUNCE_FACTOR`
    /// windows. Irrelevant events are consumed without extending the wait.
    async fn drain(&mut self, bridge_rx: &flume::Receiver<Signal>) {
        let started = Instant::now();
        let cutoff = started + self.config.debounce * MAX_DEBOUNCE_FACTOR;
        let mut quiet_at = started + self.config.debounce;
        let mut coalesced = 0usize;

        loop {
            let deadline = quiet_at.min(cutoff);
            match tokio::time::timeout_at(deadline, bridge_rx.recv_async()).await {
                Ok(Ok(signal)) => {
                    if self.handle_signal(signal) {
                        quiet_at = Instant::now() + self.config.debounce;
                        coalesced += 1;
                    }
                }
                // Closed channel is picked up by the main loop.
                Ok(Err(_)) | Err(_) => break,
            }
        }

        if quiet_at > cutoff {
            tracing::debug!(namespace = %self.namespace, coalesced, "Event burst cut off, rebuilding");
        } else if coalesced > 0 {
            tracing::trace!(namespace = %self.namespace, coalesced, "Coalesced watch events");
        }
    }

    async fn rebuild(&mut self) {
        let cache = self.cache.clone();
        let namespace = self.namespace.clone();
        let result = tokio::task::spawn_blocking(move || cache.rebuild(&namespace)).await;

        match result {
            Ok(Ok(count)) => {
                tracing::info!(namespace = %self.namespace, count, "Cache rebuilt");
                if self.subscribed {
                    self.set_status(WatcherStatus::Watching);
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    "Rebuild failed, keeping previous listing: {}",
                    e
                );
                self.set_status(WatcherStatus::Degraded(format!("rebuild failed: {}", e)));
                // A removed directory takes its OS watch with it.
                if !self.dir.is_dir() {
                    self.unsubscribe();
                }
            }
            Err(e) => {
                tracing::error!(namespace = %self.namespace, "Rebuild task panicked: {}", e);
                self.set_status(WatcherStatus::Degraded("rebuild task panicked".to_string()));
            }
        }
    }

    fn subscribe(&mut self) {
        let Some(watcher) = self.watcher.as_mut() else {
            return;
        };

        match watcher.watch(&self.dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::info!(namespace = %self.namespace, dir = %self.dir.display(), "Watching directory");
                self.subscribed = true;
                self.set_status(WatcherStatus::Watching);
            }
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    dir = %self.dir.display(),
                    "Failed to watch directory, serving cached listing only: {}",
                    e
                );
                self.subscribed = false;
                self.set_status(WatcherStatus::Degraded(format!(
                    "failed to watch {}: {}",
                    self.dir.display(),
                    e
                )));
            }
        }
    }

    fn unsubscribe(&mut self) {
        if let Some(watcher) = self.watcher.as_mut() {
            let _ = watcher.unwatch(&self.dir);
        }
        self.subscribed = false;
    }

    fn set_status(&self, status: WatcherStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Create, remove and rename change the set of names; content writes and
/// access events do not.
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Any
            | EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
    )
}

/// Resolves when stop is requested or the handle is dropped.
async fn stop_signal(stop_rx: &mut watch::Receiver<bool>) {
    while !*stop_rx.borrow_and_update() {
        if stop_rx.changed().await.is_err() {
            return;
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
