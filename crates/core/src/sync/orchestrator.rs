//! Sync orchestrator
//!
//! Drains the durable store against the remote service. Sessions are
//! mutually exclusive: a trigger arriving while one runs is dropped and
//! reported as `SyncOutcome::Skipped`. Every record is committed on its own,
//! so an interrupted session needs no rollback; the next one re-scans the
//! pending set.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fieldvisit_domain::constants::MAX_ERROR_REASON_LENGTH;
use fieldvisit_domain::{
    AnchorPayload, Config, CustomerPayload, EntityType, FieldVisitError, PendingRecord,
    RejectedRecord, Result, SyncMode, SyncOutcome, SyncProgress, SyncReport, SyncStep,
    VisitPayload, VisitRecord,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::observer::ChannelObserver;
use super::ports::{LocalDurableStore, RemoteVisitService, SyncObserver};
use super::progress::ProgressTracker;
use crate::visits::ports::{Clock, ScheduleCache};

/// Tunables of the sync orchestrator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    /// Send visits through the bulk endpoint in batches of this size
    pub bulk_visit_batch_size: Option<usize>,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self { bulk_visit_batch_size: config.sync.bulk_visit_batch_size }
    }
}

/// A manual sync running in the background
pub struct ManualSyncHandle {
    /// Progress samples; closes when the session ends
    pub progress: mpsc::UnboundedReceiver<SyncProgress>,
    pub task: JoinHandle<Result<SyncOutcome>>,
}

/// Outcome of delivering one record
enum Delivery {
    Delivered { remote_id: Option<String> },
    Failed(FieldVisitError),
}

/// Per-session tallies
struct Session {
    report: SyncReport,
    bookkeeping_errors: Vec<String>,
}

pub struct SyncOrchestrator {
    store: Arc<dyn LocalDurableStore>,
    schedule: Arc<dyn ScheduleCache>,
    remote: Arc<dyn RemoteVisitService>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    session: Mutex<()>,
    initial_sync_done: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn LocalDurableStore>,
        schedule: Arc<dyn ScheduleCache>,
        remote: Arc<dyn RemoteVisitService>,
        clock: Arc<dyn Clock>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            store,
            schedule,
            remote,
            clock,
            settings,
            session: Mutex::new(()),
            initial_sync_done: AtomicBool::new(false),
        }
    }

    /// Whether a session currently holds the sync lock
    pub fn is_running(&self) -> bool {
        self.session.try_lock().is_err()
    }

    pub fn initial_sync_completed(&self) -> bool {
        self.initial_sync_done.load(Ordering::Acquire)
    }

    /// Full sync run once right after authentication.
    ///
    /// Waits for any running session, refreshes the schedule cache and then
    /// drains the pending set. Returns `Skipped` once an earlier initial sync
    /// has succeeded; a failed one may be repeated.
    #[instrument(skip(self, observer))]
    pub async fn initial_full_sync(
        &self,
        sales_rep_id: &str,
        observer: Arc<dyn SyncObserver>,
    ) -> Result<SyncOutcome> {
        let _guard = self.session.lock().await;
        if self.initial_sync_completed() {
            debug!("initial sync already completed");
            return Ok(SyncOutcome::Skipped);
        }

        let mut tracker = ProgressTracker::for_mode(SyncMode::InitialFull, observer);
        let mut session = self.open_session(SyncMode::InitialFull);

        tracker.begin_step(SyncStep::Schedule);
        let entries = self.remote.fetch_schedule(sales_rep_id).await.map_err(|err| {
            warn!(error = %err, "schedule fetch failed");
            match err {
                FieldVisitError::RemoteUnavailable(_) => err,
                other => FieldVisitError::RemoteUnavailable(other.to_string()),
            }
        })?;
        self.schedule.replace_schedule(&entries).await?;
        session.report.schedule_entries = Some(entries.len());
        tracker.message(format!("{} schedule entries received", entries.len()));

        self.drain(&mut tracker, &mut session).await?;
        let report = self.close_session(session, &mut tracker)?;

        self.initial_sync_done.store(true, Ordering::Release);
        Ok(SyncOutcome::Completed(report))
    }

    /// Drain the pending set unless a session is already running.
    #[instrument(skip(self, observer))]
    pub async fn sync_pending(
        &self,
        mode: SyncMode,
        observer: Arc<dyn SyncObserver>,
    ) -> Result<SyncOutcome> {
        let Ok(_guard) = self.session.try_lock() else {
            debug!(mode = %mode, "sync session already running, trigger dropped");
            return Ok(SyncOutcome::Skipped);
        };

        let mut tracker = ProgressTracker::for_mode(mode, observer);
        let mut session = self.open_session(mode);

        self.drain(&mut tracker, &mut session).await?;
        let report = self.close_session(session, &mut tracker)?;
        Ok(SyncOutcome::Completed(report))
    }

    /// Run a manual drain in the background and stream its progress.
    pub fn trigger_manual_sync(self: &Arc<Self>) -> ManualSyncHandle {
        let (observer, progress) = ChannelObserver::new();
        let orchestrator = Arc::clone(self);
        let task = tokio::spawn(async move {
            orchestrator.sync_pending(SyncMode::Manual, Arc::new(observer)).await
        });

        ManualSyncHandle { progress, task }
    }

    fn open_session(&self, mode: SyncMode) -> Session {
        let now = self.clock.now();
        Session {
            report: SyncReport {
                mode,
                synced: 0,
                failed: 0,
                rejected: Vec::new(),
                schedule_entries: None,
                started_at: now,
                finished_at: now,
            },
            bookkeeping_errors: Vec::new(),
        }
    }

    fn close_session(
        &self,
        session: Session,
        tracker: &mut ProgressTracker,
    ) -> Result<SyncReport> {
        let Session { mut report, bookkeeping_errors } = session;
        report.finished_at = self.clock.now();

        if !bookkeeping_errors.is_empty() {
            return Err(FieldVisitError::DurableWriteFailure(bookkeeping_errors.join("; ")));
        }

        tracker.finish();
        info!(
            mode = %report.mode,
            synced = report.synced,
            failed = report.failed,
            rejected = report.rejected.len(),
            "sync session completed"
        );
        Ok(report)
    }

    async fn drain(&self, tracker: &mut ProgressTracker, session: &mut Session) -> Result<()> {
        for entity in EntityType::SYNC_ORDER {
            tracker.begin_step(entity.into());
            let pending = self.store.query_pending(entity).await?;
            if pending.is_empty() {
                tracker.advance(0, 0);
                continue;
            }

            info!(entity = %entity, count = pending.len(), "syncing pending records");
            match (entity, self.settings.bulk_visit_batch_size) {
                (EntityType::Visit, Some(batch_size)) => {
                    self.sync_visits_in_bulk(pending, batch_size, tracker, session).await;
                }
                _ => self.sync_one_by_one(pending, tracker, session).await,
            }
        }
        tracker.complete_step();
        Ok(())
    }

    async fn sync_one_by_one(
        &self,
        pending: Vec<PendingRecord>,
        tracker: &mut ProgressTracker,
        session: &mut Session,
    ) {
        let total = pending.len();
        for (index, record) in pending.iter().enumerate() {
            let delivery = match self.deliver(record).await {
                Ok(remote_id) => Delivery::Delivered { remote_id },
                Err(err) => Delivery::Failed(err),
            };
            self.settle(record, delivery, session).await;
            tracker.advance(index + 1, total);
        }
    }

    async fn sync_visits_in_bulk(
        &self,
        pending: Vec<PendingRecord>,
        batch_size: usize,
        tracker: &mut ProgressTracker,
        session: &mut Session,
    ) {
        let total = pending.len();
        let mut done = 0;

        for batch in pending.chunks(batch_size.max(1)) {
            let payloads: Vec<VisitPayload> = batch
                .iter()
                .filter_map(|record| match record {
                    PendingRecord::Visit(visit) => Some(VisitPayload::from(visit)),
                    _ => None,
                })
                .collect();

            match self.remote.bulk_sync_visits(&payloads).await {
                Ok(acks) => {
                    let mut acks: HashMap<String, _> =
                        acks.into_iter().map(|ack| (ack.dedupe_key.clone(), ack)).collect();

                    for record in batch {
                        let delivery = match acks.remove(record.local_id()) {
                            Some(ack) if ack.is_ok() => Delivery::Delivered { remote_id: ack.id },
                            Some(ack) => {
                                let reason = ack.error.unwrap_or_default();
                                if ack.rejected {
                                    Delivery::Failed(FieldVisitError::RemoteRejected(reason))
                                } else {
                                    Delivery::Failed(FieldVisitError::RemoteUnavailable(reason))
                                }
                            }
                            None => Delivery::Failed(FieldVisitError::RemoteUnavailable(
                                "no acknowledgement in bulk response".into(),
                            )),
                        };
                        self.settle(record, delivery, session).await;
                    }
                }
                Err(err) => {
                    // Batch-level errors cannot be attributed to a single
                    // record, so every record stays retryable.
                    warn!(error = %err, batch = batch.len(), "bulk visit sync failed");
                    let reason = FieldVisitError::RemoteUnavailable(err.to_string());
                    for record in batch {
                        self.settle(record, Delivery::Failed(reason.clone()), session).await;
                    }
                }
            }

            done += batch.len();
            tracker.advance(done, total);
        }
    }

    /// Send one record with its local id as dedupe key.
    async fn deliver(&self, record: &PendingRecord) -> Result<Option<String>> {
        match record {
            PendingRecord::GeofenceAnchor(anchor) => {
                self.remote.upsert_geofence_anchor(&AnchorPayload::from(anchor)).await?;
                Ok(None)
            }
            PendingRecord::Visit(visit) => self.deliver_visit(visit).await,
            PendingRecord::NewCustomer(customer) => {
                if customer.customer_code().is_some() {
                    return Ok(None);
                }
                let created = self.remote.create_customer(&CustomerPayload::from(customer)).await?;
                Ok(Some(created.customer_key))
            }
        }
    }

    async fn deliver_visit(&self, visit: &VisitRecord) -> Result<Option<String>> {
        let payload = VisitPayload::from(visit);
        match visit.sync.remote_id.as_deref() {
            Some(remote_id) => {
                self.remote.update_visit(remote_id, &payload).await?;
                Ok(None)
            }
            None => Ok(Some(self.remote.create_visit(&payload).await?.id)),
        }
    }

    /// Write the delivery outcome back to the store.
    async fn settle(&self, record: &PendingRecord, delivery: Delivery, session: &mut Session) {
        let entity = record.entity_type();
        let local_id = record.local_id();

        let bookkeeping = match delivery {
            Delivery::Delivered { remote_id } => {
                let revision = record.sync().revision;
                match self.store.mark_synced(entity, local_id, revision, remote_id.as_deref()).await
                {
                    Ok(true) => {
                        debug!(entity = %entity, local_id, revision, "record synced");
                        session.report.synced += 1;
                        Ok(())
                    }
                    Ok(false) => {
                        debug!(entity = %entity, local_id, revision, "record superseded in flight");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            }
            Delivery::Failed(FieldVisitError::RemoteRejected(reason)) => {
                warn!(entity = %entity, local_id, reason = %reason, "record rejected by remote");
                let reason = truncate_reason(&reason);
                let result = self.store.record_rejection(entity, local_id, &reason).await;
                session.report.rejected.push(RejectedRecord {
                    entity_type: entity,
                    local_id: local_id.to_string(),
                    reason,
                });
                result
            }
            Delivery::Failed(err) => {
                warn!(entity = %entity, local_id, error = %err, "record delivery failed");
                session.report.failed += 1;
                let reason = truncate_reason(&err.to_string());
                self.store.record_failure(entity, local_id, &reason).await
            }
        };

        if let Err(err) = bookkeeping {
            warn!(entity = %entity, local_id, error = %err, "sync bookkeeping failed");
            session.bookkeeping_errors.push(format!("{entity} {local_id}: {err}"));
        }
    }
}

fn truncate_reason(reason: &str) -> String {
    if reason.chars().count() <= MAX_ERROR_REASON_LENGTH {
        return reason.to_string();
    }

    let mut truncated =
        reason.chars().take(MAX_ERROR_REASON_LENGTH.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
