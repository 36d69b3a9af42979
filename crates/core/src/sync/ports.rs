//! Port interfaces for sync operations

use async_trait::async_trait;
use fieldvisit_domain::{
    AnchorPayload, BulkVisitAck, Connectivity, CustomerPayload, EntityType, PendingRecord,
    RemoteCustomer, RemoteVisit, Result, ScheduleEntry, SyncMode, SyncProgress, VisitPayload,
};
use tokio::sync::watch;

/// Pending-set view of the durable store used by the sync engine
///
/// The engine only ever flips sync bookkeeping; business fields are never
/// written through this port.
#[async_trait]
pub trait LocalDurableStore: Send + Sync {
    /// Deliverable records of one entity family, oldest first
    async fn query_pending(&self, entity: EntityType) -> Result<Vec<PendingRecord>>;

    /// Every record of one entity family, whatever its status
    async fn query_all(&self, entity: EntityType) -> Result<Vec<PendingRecord>>;

    /// Mark `revision` of a record as delivered.
    ///
    /// Returns `false` when the record moved on to a newer revision in the
    /// meantime; it then stays pending. A `remote_id` of `None` keeps the
    /// stored one.
    async fn mark_synced(
        &self,
        entity: EntityType,
        local_id: &str,
        revision: u32,
        remote_id: Option<&str>,
    ) -> Result<bool>;

    /// Record a retryable delivery failure
    async fn record_failure(&self, entity: EntityType, local_id: &str, error: &str) -> Result<()>;

    /// Hold a record back until its next local edit
    async fn record_rejection(&self, entity: EntityType, local_id: &str, reason: &str)
        -> Result<()>;

    /// Records still waiting for delivery, parked ones included
    async fn count_pending(&self) -> Result<usize>;
}

/// Remote authoritative visit service
#[async_trait]
pub trait RemoteVisitService: Send + Sync {
    async fn fetch_schedule(&self, sales_rep_id: &str) -> Result<Vec<ScheduleEntry>>;

    /// Create a visit; repeated calls with the same dedupe key return the
    /// same remote visit.
    async fn create_visit(&self, payload: &VisitPayload) -> Result<RemoteVisit>;

    async fn update_visit(&self, remote_id: &str, payload: &VisitPayload) -> Result<()>;

    async fn bulk_sync_visits(&self, payloads: &[VisitPayload]) -> Result<Vec<BulkVisitAck>>;

    async fn upsert_geofence_anchor(&self, payload: &AnchorPayload) -> Result<()>;

    async fn create_customer(&self, payload: &CustomerPayload) -> Result<RemoteCustomer>;
}

/// Receives progress and messages of a sync session
pub trait SyncObserver: Send + Sync {
    fn on_progress(&self, progress: &SyncProgress);

    fn on_message(&self, _mode: SyncMode, _message: &str) {}
}

/// Platform connectivity feed
pub trait ConnectivitySource: Send + Sync {
    /// Receiver holding the latest connectivity state
    fn subscribe(&self) -> watch::Receiver<Connectivity>;
}
