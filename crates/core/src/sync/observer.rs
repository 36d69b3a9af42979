//! Stock `SyncObserver` implementations

use fieldvisit_domain::{SyncMode, SyncProgress};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::ports::SyncObserver;

/// Logs progress at debug level; used for silent background sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl SyncObserver for LoggingObserver {
    fn on_progress(&self, progress: &SyncProgress) {
        debug!(
            mode = %progress.mode,
            percent = progress.percent,
            step = ?progress.step,
            "sync progress"
        );
    }

    fn on_message(&self, mode: SyncMode, message: &str) {
        info!(mode = %mode, "{message}");
    }
}

/// Forwards progress samples into a channel, e.g. for a UI progress bar.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<SyncProgress>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl SyncObserver for ChannelObserver {
    fn on_progress(&self, progress: &SyncProgress) {
        // The receiver may be gone if the UI stopped listening.
        let _ = self.sender.send(progress.clone());
    }

    fn on_message(&self, mode: SyncMode, message: &str) {
        debug!(mode = %mode, "{message}");
    }
}
