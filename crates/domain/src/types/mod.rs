//! Domain types and models

pub mod anchor;
pub mod customer;
pub mod geo;
pub mod remote;
pub mod schedule;
pub mod sync;
pub mod visit;

pub use anchor::GeofenceAnchor;
pub use customer::{NewCustomer, NewCustomerDraft};
pub use geo::{GeofenceCheck, GeofenceVerdict, GpsFix};
pub use remote::{
    AnchorPayload, BulkVisitAck, CustomerPayload, RemoteCustomer, RemoteVisit, VisitPayload,
};
pub use schedule::{DateRange, ScheduleEntry};
pub use sync::{
    Connectivity, EntityType, PendingRecord, RejectedRecord, SyncMeta, SyncMode, SyncOutcome,
    SyncProgress, SyncReport, SyncStatus, SyncStep,
};
pub use visit::{
    duration_minutes, CheckInEvidence, CheckInRequest, CheckOutEvidence, CheckOutRequest,
    UnscheduledVisitRequest, VisitKey, VisitKind, VisitPatch, VisitRecord, VisitState,
};
