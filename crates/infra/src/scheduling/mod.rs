//! Background monitors for automated sync
//!
//! - Connectivity feed (`watch` channel the platform layer pushes into)
//! - Network monitor (fires background drains on reconnect and retry ticks)
//!
//! Monitors follow the same lifecycle rules:
//! - Explicit start/stop
//! - Join handle kept for the spawned loop
//! - Cancellation token support
//! - Timeout on the join when stopping

pub mod connectivity;
pub mod error;
pub mod network_monitor;

pub use connectivity::WatchConnectivity;
pub use error::{SchedulerError, SchedulerResult};
pub use network_monitor::{BackgroundSync, NetworkMonitor, NetworkMonitorConfig};
