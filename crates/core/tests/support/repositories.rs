//! In-memory implementations of the storage and location ports
//!
//! `InMemoryStore` backs every repository port and the durable store port
//! with one lock, mirroring the per-record semantics of the SQLite store.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use fieldvisit_core::{
    CustomerRepository, GeofenceAnchorRepository, LocalDurableStore, LocationProvider,
    ScheduleCache, VisitRepository,
};
use fieldvisit_domain::{
    DateRange, EntityType, FieldVisitError, GeofenceAnchor, GpsFix, NewCustomer, PendingRecord,
    Result as DomainResult, ScheduleEntry, SyncMeta, SyncStatus, VisitKey, VisitPatch,
    VisitRecord,
};
use parking_lot::Mutex;

#[derive(Default)]
struct Tables {
    visits: Vec<VisitRecord>,
    schedule: Vec<ScheduleEntry>,
    anchors: Vec<GeofenceAnchor>,
    customers: Vec<NewCustomer>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    writes: Mutex<usize>,
}

impl InMemoryStore {
    pub fn with_schedule(entries: Vec<ScheduleEntry>) -> Self {
        let store = Self::default();
        store.tables.lock().schedule = entries;
        store
    }

    pub fn seed_schedule(&self, entries: Vec<ScheduleEntry>) {
        self.tables.lock().schedule = entries;
    }

    pub fn seed_visit(&self, visit: VisitRecord) {
        self.tables.lock().visits.push(visit);
    }

    pub fn seed_customer(&self, customer: NewCustomer) {
        self.tables.lock().customers.push(customer);
    }

    /// Overwrite a stored visit wholesale, as a concurrent local edit would.
    pub fn replace_visit(&self, visit: VisitRecord) {
        let mut tables = self.tables.lock();
        if let Some(stored) = tables.visits.iter_mut().find(|v| v.local_id == visit.local_id) {
            *stored = visit;
        }
    }

    pub fn seed_anchor(&self, anchor: GeofenceAnchor) {
        self.tables.lock().anchors.push(anchor);
    }

    pub fn visits(&self) -> Vec<VisitRecord> {
        self.tables.lock().visits.clone()
    }

    pub fn visit(&self, key: &VisitKey) -> Option<VisitRecord> {
        self.tables.lock().visits.iter().find(|v| &v.key == key).cloned()
    }

    pub fn anchors(&self) -> Vec<GeofenceAnchor> {
        self.tables.lock().anchors.clone()
    }

    pub fn customers(&self) -> Vec<NewCustomer> {
        self.tables.lock().customers.clone()
    }

    pub fn schedule(&self) -> Vec<ScheduleEntry> {
        self.tables.lock().schedule.clone()
    }

    /// Number of business writes (inserts and patches).
    pub fn write_count(&self) -> usize {
        *self.writes.lock()
    }

    fn bump_writes(&self) {
        *self.writes.lock() += 1;
    }

    fn with_meta<T>(
        &self,
        entity: EntityType,
        local_id: &str,
        apply: impl FnOnce(&mut SyncMeta) -> T,
    ) -> Option<T> {
        let mut tables = self.tables.lock();
        let meta = match entity {
            EntityType::Visit => {
                tables.visits.iter_mut().find(|v| v.local_id == local_id).map(|v| &mut v.sync)
            }
            EntityType::GeofenceAnchor => {
                tables.anchors.iter_mut().find(|a| a.local_id == local_id).map(|a| &mut a.sync)
            }
            EntityType::NewCustomer => {
                tables.customers.iter_mut().find(|c| c.local_id == local_id).map(|c| &mut c.sync)
            }
        };

        meta.map(apply)
    }

    fn records(&self, entity: EntityType) -> Vec<PendingRecord> {
        let tables = self.tables.lock();
        match entity {
            EntityType::Visit => tables.visits.iter().cloned().map(PendingRecord::Visit).collect(),
            EntityType::GeofenceAnchor => {
                tables.anchors.iter().cloned().map(PendingRecord::GeofenceAnchor).collect()
            }
            EntityType::NewCustomer => {
                tables.customers.iter().cloned().map(PendingRecord::NewCustomer).collect()
            }
        }
    }
}

#[async_trait]
impl VisitRepository for InMemoryStore {
    async fn insert_visit(&self, visit: &VisitRecord) -> DomainResult<()> {
        let mut tables = self.tables.lock();
        if tables.visits.iter().any(|v| v.key == visit.key || v.local_id == visit.local_id) {
            return Err(FieldVisitError::InvalidInput(format!("visit {} exists", visit.key)));
        }
        if visit.is_open() {
            if let Some(open) = tables.visits.iter().find(|v| v.is_open()) {
                return Err(FieldVisitError::ConcurrentVisitConflict {
                    open_visit: open.key.to_string(),
                });
            }
        }
        tables.visits.push(visit.clone());
        drop(tables);
        self.bump_writes();
        Ok(())
    }

    async fn update_visit(&self, local_id: &str, patch: VisitPatch) -> DomainResult<VisitRecord> {
        let mut tables = self.tables.lock();
        let visit = tables
            .visits
            .iter_mut()
            .find(|v| v.local_id == local_id)
            .ok_or_else(|| FieldVisitError::NotFound(format!("visit {local_id}")))?;

        let mut updated = visit.clone();
        updated.apply_patch(patch)?;
        *visit = updated.clone();
        drop(tables);
        self.bump_writes();
        Ok(updated)
    }

    async fn find_visit(&self, key: &VisitKey) -> DomainResult<Option<VisitRecord>> {
        Ok(self.visit(key))
    }

    async fn find_open_visit(&self) -> DomainResult<Option<VisitRecord>> {
        Ok(self.tables.lock().visits.iter().find(|v| v.is_open()).cloned())
    }

    async fn list_visits(&self, range: &DateRange) -> DomainResult<Vec<VisitRecord>> {
        Ok(self
            .tables
            .lock()
            .visits
            .iter()
            .filter(|v| range.contains(v.scheduled_date))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ScheduleCache for InMemoryStore {
    async fn replace_schedule(&self, entries: &[ScheduleEntry]) -> DomainResult<()> {
        self.tables.lock().schedule = entries.to_vec();
        Ok(())
    }

    async fn load_schedule(&self, range: &DateRange) -> DomainResult<Vec<ScheduleEntry>> {
        Ok(self
            .tables
            .lock()
            .schedule
            .iter()
            .filter(|e| range.contains(e.scheduled_date))
            .cloned()
            .collect())
    }

    async fn find_entry(&self, key: &VisitKey) -> DomainResult<Option<ScheduleEntry>> {
        Ok(self.tables.lock().schedule.iter().find(|e| &e.key() == key).cloned())
    }
}

#[async_trait]
impl GeofenceAnchorRepository for InMemoryStore {
    async fn find_anchor(&self, customer_code: &str) -> DomainResult<Option<GeofenceAnchor>> {
        Ok(self.tables.lock().anchors.iter().find(|a| a.customer_code == customer_code).cloned())
    }

    async fn save_anchor(&self, anchor: &GeofenceAnchor) -> DomainResult<bool> {
        let mut tables = self.tables.lock();
        match tables.anchors.iter_mut().find(|a| a.customer_code == anchor.customer_code) {
            Some(existing) if !anchor.is_newer_than(existing) => return Ok(false),
            Some(existing) => *existing = anchor.clone(),
            None => tables.anchors.push(anchor.clone()),
        }
        Ok(true)
    }
}

#[async_trait]
impl CustomerRepository for InMemoryStore {
    async fn insert_customer(&self, customer: &NewCustomer) -> DomainResult<()> {
        self.tables.lock().customers.push(customer.clone());
        Ok(())
    }

    async fn find_customer(&self, local_id: &str) -> DomainResult<Option<NewCustomer>> {
        Ok(self.tables.lock().customers.iter().find(|c| c.local_id == local_id).cloned())
    }

    async fn list_customers(&self) -> DomainResult<Vec<NewCustomer>> {
        Ok(self.customers())
    }
}

#[async_trait]
impl LocalDurableStore for InMemoryStore {
    async fn query_pending(&self, entity: EntityType) -> DomainResult<Vec<PendingRecord>> {
        Ok(self.records(entity).into_iter().filter(|r| r.sync().is_deliverable()).collect())
    }

    async fn query_all(&self, entity: EntityType) -> DomainResult<Vec<PendingRecord>> {
        Ok(self.records(entity))
    }

    async fn mark_synced(
        &self,
        entity: EntityType,
        local_id: &str,
        revision: u32,
        remote_id: Option<&str>,
    ) -> DomainResult<bool> {
        Ok(self.with_meta(entity, local_id, |meta| {
            if meta.remote_id.is_none() {
                meta.remote_id = remote_id.map(str::to_string);
            }
            if meta.revision != revision {
                return false;
            }
            meta.status = SyncStatus::Synced;
            meta.last_error = None;
            true
        })
        .unwrap_or(false))
    }

    async fn record_failure(
        &self,
        entity: EntityType,
        local_id: &str,
        error: &str,
    ) -> DomainResult<()> {
        self.with_meta(entity, local_id, |meta| {
            meta.attempt_count += 1;
            meta.last_error = Some(error.to_string());
        });
        Ok(())
    }

    async fn record_rejection(
        &self,
        entity: EntityType,
        local_id: &str,
        reason: &str,
    ) -> DomainResult<()> {
        self.with_meta(entity, local_id, |meta| {
            meta.attempt_count += 1;
            meta.rejected_reason = Some(reason.to_string());
        });
        Ok(())
    }

    async fn count_pending(&self) -> DomainResult<usize> {
        let mut count = 0;
        for entity in EntityType::SYNC_ORDER {
            count += self.records(entity).iter().filter(|r| r.sync().is_pending()).count();
        }
        Ok(count)
    }
}

/// What the scripted location provider does on one call.
#[derive(Debug, Clone)]
pub enum FixScript {
    Fix(GpsFix),
    Fail,
    Hang,
}

/// Location provider replaying a script; repeats a default fix when empty.
#[derive(Default)]
pub struct ScriptedLocation {
    script: Mutex<VecDeque<FixScript>>,
    fallback: Mutex<Option<GpsFix>>,
    calls: Mutex<usize>,
}

impl ScriptedLocation {
    pub fn always(&self, fix: GpsFix) {
        *self.fallback.lock() = Some(fix);
    }

    pub fn push(&self, step: FixScript) {
        self.script.lock().push_back(step);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocation {
    async fn current_fix(&self) -> DomainResult<GpsFix> {
        *self.calls.lock() += 1;
        let step = self.script.lock().pop_front();
        let step = match step {
            Some(step) => step,
            None => match *self.fallback.lock() {
                Some(fix) => FixScript::Fix(fix),
                None => FixScript::Fail,
            },
        };

        match step {
            FixScript::Fix(fix) => Ok(fix),
            FixScript::Fail => Err(FieldVisitError::Internal("no satellites".into())),
            FixScript::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Err(FieldVisitError::Internal("unreachable".into()))
            }
        }
    }
}
