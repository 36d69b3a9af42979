//! Synchronization of local records with the remote visit service

pub mod observer;
pub mod orchestrator;
pub mod ports;
pub mod progress;

pub use observer::{ChannelObserver, LoggingObserver};
pub use orchestrator::{ManualSyncHandle, SyncOrchestrator, SyncSettings};
pub use ports::{ConnectivitySource, LocalDurableStore, RemoteVisitService, SyncObserver};
pub use progress::{ProgressTracker, DRAIN_WEIGHTS, INITIAL_SYNC_WEIGHTS};
