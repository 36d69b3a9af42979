//! Fake remote visit service
//!
//! Applies creations idempotently by dedupe key, like the real server, and
//! lets tests inject outages and rejections.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use fieldvisit_core::RemoteVisitService;
use fieldvisit_domain::{
    AnchorPayload, BulkVisitAck, CustomerPayload, FieldVisitError, RemoteCustomer, RemoteVisit,
    Result as DomainResult, ScheduleEntry, VisitPayload,
};
use parking_lot::Mutex;

#[derive(Default)]
struct State {
    schedule: Option<Vec<ScheduleEntry>>,
    /// dedupe key -> remote id
    visits: HashMap<String, String>,
    visit_updates: Vec<(String, VisitPayload)>,
    anchors: Vec<AnchorPayload>,
    customers: HashMap<String, String>,
    calls: usize,
    /// Visit writes accepted before the remote goes dark
    visit_budget: Option<usize>,
    rejected_keys: HashSet<String>,
    bulk_calls: usize,
    /// Visit writes accepted before every further visit call hangs
    hang_after: Option<usize>,
    /// Entity kind and dedupe key of every write, in call order
    journal: Vec<(String, String)>,
}

type CreateHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<State>,
    /// Runs once, after the next visit creation is applied and before it is acknowledged
    on_create: Mutex<Option<CreateHook>>,
}

impl FakeRemote {
    pub fn with_schedule(entries: Vec<ScheduleEntry>) -> Self {
        let remote = Self::default();
        remote.state.lock().schedule = Some(entries);
        remote
    }

    /// Accept `n` more visit writes, then answer every visit call as
    /// unavailable.
    pub fn fail_visits_after(&self, n: usize) {
        self.state.lock().visit_budget = Some(n);
    }

    /// Accept `n` more visit writes, then never answer another visit call.
    pub fn hang_visits_after(&self, n: usize) {
        self.state.lock().hang_after = Some(n);
    }

    /// Run `hook` while the next visit creation is still in flight.
    pub fn during_next_create(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_create.lock() = Some(Box::new(hook));
    }

    pub fn recover(&self) {
        let mut state = self.state.lock();
        state.visit_budget = None;
        state.hang_after = None;
    }

    pub fn journal(&self) -> Vec<(String, String)> {
        self.state.lock().journal.clone()
    }

    /// Dedupe keys of the visit writes, in call order.
    pub fn visit_writes(&self) -> Vec<String> {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|(kind, _)| kind == "visit")
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn set_schedule(&self, entries: Option<Vec<ScheduleEntry>>) {
        self.state.lock().schedule = entries;
    }

    pub fn reject(&self, dedupe_key: &str) {
        self.state.lock().rejected_keys.insert(dedupe_key.to_string());
    }

    /// Distinct visits the remote knows about.
    pub fn remote_visit_count(&self) -> usize {
        self.state.lock().visits.len()
    }

    pub fn remote_customer_count(&self) -> usize {
        self.state.lock().customers.len()
    }

    pub fn visit_updates(&self) -> Vec<(String, VisitPayload)> {
        self.state.lock().visit_updates.clone()
    }

    pub fn anchors(&self) -> Vec<AnchorPayload> {
        self.state.lock().anchors.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    pub fn bulk_calls(&self) -> usize {
        self.state.lock().bulk_calls
    }

    /// Whether this visit call should hang instead of answering.
    fn should_hang(&self) -> bool {
        let mut state = self.state.lock();
        match state.hang_after.as_mut() {
            Some(0) => true,
            Some(left) => {
                *left -= 1;
                false
            }
            None => false,
        }
    }

    fn take_visit_budget(state: &mut State) -> DomainResult<()> {
        match state.visit_budget.as_mut() {
            Some(0) => Err(FieldVisitError::RemoteUnavailable("connection reset".into())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn apply_create(state: &mut State, payload: &VisitPayload) -> DomainResult<String> {
        if state.rejected_keys.contains(&payload.dedupe_key) {
            return Err(FieldVisitError::RemoteRejected("unknown schedule".into()));
        }
        Self::take_visit_budget(state)?;
        state.journal.push(("visit".into(), payload.dedupe_key.clone()));
        let next = format!("srv-{}", state.visits.len() + 1);
        Ok(state.visits.entry(payload.dedupe_key.clone()).or_insert(next).clone())
    }
}

#[async_trait]
impl RemoteVisitService for FakeRemote {
    async fn fetch_schedule(&self, _sales_rep_id: &str) -> DomainResult<Vec<ScheduleEntry>> {
        let mut state = self.state.lock();
        state.calls += 1;
        state
            .schedule
            .clone()
            .ok_or_else(|| FieldVisitError::RemoteUnavailable("schedule endpoint down".into()))
    }

    async fn create_visit(&self, payload: &VisitPayload) -> DomainResult<RemoteVisit> {
        if self.should_hang() {
            std::future::pending::<()>().await;
        }
        let id = {
            let mut state = self.state.lock();
            state.calls += 1;
            Self::apply_create(&mut state, payload)?
        };
        if let Some(hook) = self.on_create.lock().take() {
            hook();
        }
        Ok(RemoteVisit { id })
    }

    async fn update_visit(&self, remote_id: &str, payload: &VisitPayload) -> DomainResult<()> {
        if self.should_hang() {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock();
        state.calls += 1;
        if state.rejected_keys.contains(&payload.dedupe_key) {
            return Err(FieldVisitError::RemoteRejected("visit closed on server".into()));
        }
        Self::take_visit_budget(&mut state)?;
        state.journal.push(("visit".into(), payload.dedupe_key.clone()));
        state.visit_updates.push((remote_id.to_string(), payload.clone()));
        Ok(())
    }

    async fn bulk_sync_visits(
        &self,
        payloads: &[VisitPayload],
    ) -> DomainResult<Vec<BulkVisitAck>> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.bulk_calls += 1;

        Ok(payloads
            .iter()
            .map(|payload| match Self::apply_create(&mut state, payload) {
                Ok(id) => BulkVisitAck {
                    dedupe_key: payload.dedupe_key.clone(),
                    id: Some(id),
                    error: None,
                    rejected: false,
                },
                Err(err) => BulkVisitAck {
                    dedupe_key: payload.dedupe_key.clone(),
                    id: None,
                    rejected: matches!(err, FieldVisitError::RemoteRejected(_)),
                    error: Some(err.to_string()),
                },
            })
            .collect())
    }

    async fn upsert_geofence_anchor(&self, payload: &AnchorPayload) -> DomainResult<()> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.journal.push(("anchor".into(), payload.dedupe_key.clone()));
        state.anchors.push(payload.clone());
        Ok(())
    }

    async fn create_customer(&self, payload: &CustomerPayload) -> DomainResult<RemoteCustomer> {
        let mut state = self.state.lock();
        state.calls += 1;
        state.journal.push(("customer".into(), payload.dedupe_key.clone()));
        let next = format!("CUST-{}", state.customers.len() + 100);
        let key = state.customers.entry(payload.dedupe_key.clone()).or_insert(next).clone();
        Ok(RemoteCustomer { customer_key: key })
    }
}
