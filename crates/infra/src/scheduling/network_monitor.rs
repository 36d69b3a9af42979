//! Network monitor that fires background sync sessions.
//!
//! Watches the connectivity feed and starts a background drain whenever the
//! device goes from disconnected to connected. An optional retry tick
//! re-scans the pending set while connected. Sessions are spawned and never
//! cancelled; stopping the monitor only ends the watch loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fieldvisit_domain::Connectivity;
//! use fieldvisit_infra::scheduling::{
//!     BackgroundSync, NetworkMonitor, NetworkMonitorConfig, WatchConnectivity,
//! };
//!
//! # type BoxError = Box<dyn std::error::Error>;
//! # async fn example(sync: Arc<dyn BackgroundSync>) -> Result<(), BoxError> {
//! let connectivity = Arc::new(WatchConnectivity::new(Connectivity::Disconnected));
//! let config = NetworkMonitorConfig::default();
//! let mut monitor = NetworkMonitor::new(sync, connectivity.clone(), config);
//!
//! monitor.start()?;
//! connectivity.set(Connectivity::Connected); // fires a background session
//! monitor.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldvisit_core::sync::LoggingObserver;
use fieldvisit_core::{ConnectivitySource, SyncOrchestrator};
use fieldvisit_domain::{Config, Connectivity, Result as DomainResult, SyncMode, SyncOutcome};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Something that can run a silent background drain.
#[async_trait]
pub trait BackgroundSync: Send + Sync + 'static {
    fn is_running(&self) -> bool;

    async fn run_background(&self) -> DomainResult<SyncOutcome>;
}

#[async_trait]
impl BackgroundSync for SyncOrchestrator {
    fn is_running(&self) -> bool {
        SyncOrchestrator::is_running(self)
    }

    async fn run_background(&self) -> DomainResult<SyncOutcome> {
        self.sync_pending(SyncMode::Background, Arc::new(LoggingObserver)).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkMonitorConfig {
    /// Re-scan the pending set this often while connected
    pub retry_interval: Option<Duration>,
    /// How long `stop` waits for the watch loop to finish
    pub join_timeout: Duration,
}

impl Default for NetworkMonitorConfig {
    fn default() -> Self {
        Self { retry_interval: None, join_timeout: Duration::from_secs(5) }
    }
}

impl NetworkMonitorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self { retry_interval: config.sync.interval(), ..Self::default() }
    }
}

pub struct NetworkMonitor {
    sync: Arc<dyn BackgroundSync>,
    connectivity: Arc<dyn ConnectivitySource>,
    config: NetworkMonitorConfig,
    cancellation_token: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl NetworkMonitor {
    pub fn new(
        sync: Arc<dyn BackgroundSync>,
        connectivity: Arc<dyn ConnectivitySource>,
        config: NetworkMonitorConfig,
    ) -> Self {
        Self {
            sync,
            connectivity,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Spawn the watch loop.
    ///
    /// # Errors
    ///
    /// `SchedulerError::AlreadyRunning` if the loop is active.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        // Fresh token so the monitor can be restarted after a stop.
        self.cancellation_token = CancellationToken::new();

        // The baseline is read here so a change right after `start` is seen as an edge.
        let mut receiver = self.connectivity.subscribe();
        let initial = *receiver.borrow_and_update();
        let sync = Arc::clone(&self.sync);
        let retry_interval = self.config.retry_interval;
        let cancel = self.cancellation_token.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::watch_loop(sync, receiver, initial, retry_interval, cancel).await;
        }));

        info!(retry_interval = ?retry_interval, "network monitor started");
        Ok(())
    }

    /// Cancel the watch loop and wait for it to finish.
    ///
    /// # Errors
    ///
    /// `NotRunning` if the loop was never started or already stopped,
    /// `Timeout` if it does not finish within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        self.cancellation_token.cancel();
        let duration = self.config.join_timeout;
        tokio::time::timeout(duration, handle)
            .await
            .map_err(|_| SchedulerError::Timeout { duration })??;

        info!("network monitor stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    async fn watch_loop(
        sync: Arc<dyn BackgroundSync>,
        mut receiver: watch::Receiver<Connectivity>,
        initial: Connectivity,
        retry_interval: Option<Duration>,
        cancel: CancellationToken,
    ) {
        let mut last = initial;
        let mut ticker = retry_interval.map(|period| {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("network monitor loop cancelled");
                    break;
                }
                changed = receiver.changed() => {
                    if changed.is_err() {
                        warn!("connectivity source closed, network monitor exiting");
                        break;
                    }
                    let current = *receiver.borrow_and_update();
                    let regained =
                        last == Connectivity::Disconnected && current == Connectivity::Connected;
                    last = current;
                    if regained {
                        Self::fire(&sync, "connectivity regained");
                    }
                }
                () = next_tick(&mut ticker) => {
                    if last == Connectivity::Connected {
                        Self::fire(&sync, "retry tick");
                    }
                }
            }
        }
    }

    /// Start a detached background session unless one is already running.
    fn fire(sync: &Arc<dyn BackgroundSync>, reason: &'static str) {
        if sync.is_running() {
            debug!(reason, "sync session already running, trigger ignored");
            return;
        }

        let sync = Arc::clone(sync);
        tokio::spawn(async move {
            match sync.run_background().await {
                Ok(SyncOutcome::Completed(report)) => info!(
                    reason,
                    synced = report.synced,
                    failed = report.failed,
                    rejected = report.rejected.len(),
                    "background sync finished"
                ),
                Ok(SyncOutcome::Skipped) => debug!(reason, "background sync skipped"),
                Err(err) => warn!(reason, error = %err, "background sync failed"),
            }
        });
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("NetworkMonitor dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
