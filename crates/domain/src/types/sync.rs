//! Sync bookkeeping shared by every entity that leaves the device

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::anchor::GeofenceAnchor;
use super::customer::NewCustomer;
use super::visit::VisitRecord;

/// Delivery status of the current revision of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
}

crate::impl_domain_status_conversions!(SyncStatus {
    Pending => "pending",
    Synced => "synced",
});

/// Per-record sync bookkeeping.
///
/// `revision` grows with every business mutation. The sync engine only flips
/// a record to `Synced` for the revision it actually submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMeta {
    pub status: SyncStatus,
    pub revision: u32,
    pub remote_id: Option<String>,
    pub attempt_count: u32,
    pub last_error: Option<String>,
    /// Set when the remote refused the record; it is held back until the next
    /// local edit.
    pub rejected_reason: Option<String>,
}

impl SyncMeta {
    /// Bookkeeping for a record created on the device.
    pub fn new_pending() -> Self {
        Self {
            status: SyncStatus::Pending,
            revision: 1,
            remote_id: None,
            attempt_count: 0,
            last_error: None,
            rejected_reason: None,
        }
    }

    /// Bookkeeping for data that came from the server.
    pub fn confirmed() -> Self {
        Self { status: SyncStatus::Synced, revision: 0, ..Self::new_pending() }
    }

    /// Start a new pending revision after a business mutation.
    pub fn open_revision(&mut self) {
        self.status = SyncStatus::Pending;
        self.revision += 1;
        self.attempt_count = 0;
        self.last_error = None;
        self.rejected_reason = None;
    }

    pub fn is_pending(&self) -> bool {
        self.status == SyncStatus::Pending
    }

    pub fn is_parked(&self) -> bool {
        self.rejected_reason.is_some()
    }

    /// Pending and not held back by a rejection.
    pub fn is_deliverable(&self) -> bool {
        self.is_pending() && !self.is_parked()
    }
}

impl Default for SyncMeta {
    fn default() -> Self {
        Self::new_pending()
    }
}

/// Entity families that carry pending mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    GeofenceAnchor,
    Visit,
    NewCustomer,
}

crate::impl_domain_status_conversions!(EntityType {
    GeofenceAnchor => "geofence_anchor",
    Visit => "visit",
    NewCustomer => "new_customer",
});

impl EntityType {
    /// Order in which a drain session processes entity families.
    pub const SYNC_ORDER: [EntityType; 3] =
        [EntityType::GeofenceAnchor, EntityType::Visit, EntityType::NewCustomer];
}

/// A record waiting for delivery, tagged with its entity family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "record", rename_all = "snake_case")]
pub enum PendingRecord {
    GeofenceAnchor(GeofenceAnchor),
    Visit(VisitRecord),
    NewCustomer(NewCustomer),
}

impl PendingRecord {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Self::GeofenceAnchor(_) => EntityType::GeofenceAnchor,
            Self::Visit(_) => EntityType::Visit,
            Self::NewCustomer(_) => EntityType::NewCustomer,
        }
    }

    pub fn local_id(&self) -> &str {
        match self {
            Self::GeofenceAnchor(anchor) => &anchor.local_id,
            Self::Visit(visit) => &visit.local_id,
            Self::NewCustomer(customer) => &customer.local_id,
        }
    }

    pub fn sync(&self) -> &SyncMeta {
        match self {
            Self::GeofenceAnchor(anchor) => &anchor.sync,
            Self::Visit(visit) => &visit.sync,
            Self::NewCustomer(customer) => &customer.sync,
        }
    }
}

/// Network reachability as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Connected,
    Disconnected,
}

crate::impl_domain_status_conversions!(Connectivity {
    Connected => "connected",
    Disconnected => "disconnected",
});

/// What started a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    InitialFull,
    Background,
    Manual,
}

crate::impl_domain_status_conversions!(SyncMode {
    InitialFull => "initial_full",
    Background => "background",
    Manual => "manual",
});

/// Weighted steps of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStep {
    Schedule,
    GeofenceAnchors,
    Visits,
    NewCustomers,
}

crate::impl_domain_status_conversions!(SyncStep {
    Schedule => "schedule",
    GeofenceAnchors => "geofence_anchors",
    Visits => "visits",
    NewCustomers => "new_customers",
});

impl From<EntityType> for SyncStep {
    fn from(entity: EntityType) -> Self {
        match entity {
            EntityType::GeofenceAnchor => SyncStep::GeofenceAnchors,
            EntityType::Visit => SyncStep::Visits,
            EntityType::NewCustomer => SyncStep::NewCustomers,
        }
    }
}

/// One progress sample, `percent` in `0.0..=100.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub mode: SyncMode,
    pub percent: f64,
    pub step: Option<SyncStep>,
    pub message: Option<String>,
}

/// A record the remote refused; needs manual correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub entity_type: EntityType,
    pub local_id: String,
    pub reason: String,
}

/// Summary of one finished session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub synced: usize,
    pub failed: usize,
    pub rejected: Vec<RejectedRecord>,
    /// Entries received from the schedule step, initial sync only.
    pub schedule_entries: Option<usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.rejected.is_empty()
    }
}

/// Result of asking for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum SyncOutcome {
    Completed(SyncReport),
    /// Another session was already running; the trigger was dropped.
    Skipped,
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Skipped => None,
        }
    }
}
