//! # FieldVisit Infrastructure
//!
//! Infrastructure implementations of the core ports.
//!
//! This crate contains:
//! - SQLite repositories and the durable sync store
//! - The HTTP adapter for the remote visit service
//! - Configuration loading
//! - The connectivity feed and network monitor
//!
//! ## Architecture
//! - Implements traits defined in `fieldvisit-core`
//! - Contains all "impure" code (I/O, network, clocks driving background work)

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod scheduling;

// Re-export commonly used items
pub use database::{
    DbManager, RecordLocks, SqliteAnchorRepository, SqliteCustomerRepository, SqliteDurableStore,
    SqliteScheduleCache, SqliteVisitRepository,
};
pub use errors::InfraError;
pub use http::{HttpClient, HttpRemoteService};
pub use scheduling::{
    BackgroundSync, NetworkMonitor, NetworkMonitorConfig, SchedulerError, WatchConnectivity,
};
