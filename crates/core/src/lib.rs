//! # FieldVisit Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Geofence math
//! - The visit service and the schedule/local merge
//! - The sync orchestrator with weighted progress reporting
//! - Port/adapter interfaces (traits)
//!
//! ## Architecture Principles
//! - Only depends on `fieldvisit-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod geo;
pub mod ids;
pub mod sync;
pub mod visits;

pub use ids::LocalIdGenerator;
pub use sync::ports::{ConnectivitySource, LocalDurableStore, RemoteVisitService, SyncObserver};
pub use sync::{ManualSyncHandle, SyncOrchestrator, SyncSettings};
pub use visits::ports::{
    Clock, CustomerRepository, GeofenceAnchorRepository, LocationProvider, ScheduleCache,
    SystemClock, VisitRepository,
};
pub use visits::{VisitPorts, VisitService, VisitSettings};
