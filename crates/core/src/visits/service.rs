//! Visit lifecycle service - core business logic
//!
//! Check-in and check-out are local-first: they validate, write to the
//! durable store and return without touching the network. Delivery is left
//! to the sync orchestrator.

use std::sync::Arc;
use std::time::Duration;

use fieldvisit_domain::constants::UNSCHEDULED_CODE_PREFIX;
use fieldvisit_domain::{
    CheckInEvidence, CheckInRequest, CheckOutEvidence, CheckOutRequest, Config, DateRange,
    FieldVisitError, GeofenceAnchor, GeofenceCheck, GeofenceVerdict, GpsFix, NewCustomer,
    NewCustomerDraft, Result, UnscheduledVisitRequest, VisitKey, VisitKind, VisitPatch,
    VisitRecord, VisitState,
};
use tracing::{debug, info, instrument, warn};

use super::merge::merge;
use super::ports::{
    Clock, CustomerRepository, GeofenceAnchorRepository, LocationProvider, ScheduleCache,
    VisitRepository,
};
use crate::geo;
use crate::ids::LocalIdGenerator;

/// Collaborators of the visit service
#[derive(Clone)]
pub struct VisitPorts {
    pub visits: Arc<dyn VisitRepository>,
    pub schedule: Arc<dyn ScheduleCache>,
    pub anchors: Arc<dyn GeofenceAnchorRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub location: Arc<dyn LocationProvider>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables of the visit service
#[derive(Debug, Clone, PartialEq)]
pub struct VisitSettings {
    pub geofence_radius_meters: f64,
    pub gps_attempt_timeout: Duration,
    pub gps_max_attempts: u32,
}

impl VisitSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            geofence_radius_meters: config.geofence.radius_meters,
            gps_attempt_timeout: config.gps.attempt_timeout(),
            gps_max_attempts: config.gps.max_attempts,
        }
    }
}

impl Default for VisitSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Record a check-in would act on, before any evidence is captured.
#[derive(Debug, Clone)]
struct CheckInTarget {
    record: VisitRecord,
    /// No local record exists yet; the visit is only a schedule projection.
    projected: bool,
}

/// Visit lifecycle service
pub struct VisitService {
    ports: VisitPorts,
    settings: VisitSettings,
    ids: Arc<LocalIdGenerator>,
}

impl VisitService {
    /// Create a new visit service
    pub fn new(ports: VisitPorts, settings: VisitSettings) -> Self {
        Self { ports, settings, ids: Arc::new(LocalIdGenerator::new()) }
    }

    /// Share an id generator with other components writing local records.
    pub fn with_id_generator(mut self, ids: Arc<LocalIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn settings(&self) -> &VisitSettings {
        &self.settings
    }

    /// Server schedule merged with local records for `range`.
    pub async fn unified_visit_list(&self, range: &DateRange) -> Result<Vec<VisitRecord>> {
        let schedule = self.ports.schedule.load_schedule(range).await?;
        let local = self.ports.visits.list_visits(range).await?;
        merge(&schedule, &local)
    }

    /// Preflight run before the camera or GPS is opened.
    ///
    /// Performs every check that does not need evidence: the single open
    /// visit rule, the transition itself and the schedule date.
    pub async fn ensure_can_check_in(&self, key: &VisitKey) -> Result<()> {
        self.check_in_target(key).await.map(|_| ())
    }

    #[instrument(skip(self, request), fields(visit = %request.key))]
    pub async fn check_in(&self, request: CheckInRequest) -> Result<VisitRecord> {
        let CheckInTarget { mut record, projected } = self.check_in_target(&request.key).await?;

        let fix = self.resolve_fix(request.fix).await?;
        let check = self.evaluate_geofence(&request.key.customer_code, &fix).await?;
        Self::require_geofence_ack(&check, request.confirm_outside_geofence)?;

        let evidence = self.arrival_evidence(&fix, request.photo_ref, &check);
        let stored = if projected {
            record.local_id = self.ids.next_id("visit", self.ports.clock.now());
            record.check_in(evidence)?;
            self.ports.visits.insert_visit(&record).await?;
            record
        } else {
            let before = record.clone();
            record.check_in(evidence)?;
            self.ports
                .visits
                .update_visit(&before.local_id, VisitPatch::between(&before, &record))
                .await?
        };

        self.seed_anchor_if_missing(&stored.key.customer_code, &check, &fix).await;

        info!(
            local_id = %stored.local_id,
            within_geofence = check.within_geofence(),
            distance_meters = ?check.distance_meters,
            "visit checked in"
        );
        Ok(stored)
    }

    #[instrument(skip(self, request), fields(visit = %request.key))]
    pub async fn check_out(&self, request: CheckOutRequest) -> Result<VisitRecord> {
        let Some(mut record) = self.ports.visits.find_visit(&request.key).await? else {
            let from = match self.ports.schedule.find_entry(&request.key).await? {
                Some(entry) if entry.completed => VisitState::Completed,
                _ => VisitState::Scheduled,
            };
            return Err(FieldVisitError::InvalidTransition {
                visit: request.key.to_string(),
                from: from.to_string(),
                action: "check out".into(),
            });
        };

        if record.state != VisitState::CheckedIn {
            return Err(FieldVisitError::InvalidTransition {
                visit: record.key.to_string(),
                from: record.state.to_string(),
                action: "check out".into(),
            });
        }

        let fix = self.resolve_fix(request.fix).await?;
        let evidence = CheckOutEvidence {
            timestamp: self.ports.clock.now(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy_meters: fix.accuracy_meters,
        };

        let before = record.clone();
        record.check_out(evidence)?;
        let stored = self
            .ports
            .visits
            .update_visit(&before.local_id, VisitPatch::between(&before, &record))
            .await?;

        info!(
            local_id = %stored.local_id,
            duration_minutes = ?stored.duration_minutes,
            "visit checked out"
        );
        Ok(stored)
    }

    /// Start a visit for a customer that is not on the schedule.
    ///
    /// A schedule code is generated on the device; the record enters
    /// `CheckedIn` directly.
    #[instrument(skip(self, request), fields(customer = %request.customer_code))]
    pub async fn start_unscheduled_visit(
        &self,
        request: UnscheduledVisitRequest,
    ) -> Result<VisitRecord> {
        if request.customer_code.trim().is_empty() {
            return Err(FieldVisitError::InvalidInput("customer code is required".into()));
        }
        self.ensure_no_open_visit(None).await?;

        let fix = self.resolve_fix(request.fix).await?;
        let check = self.evaluate_geofence(&request.customer_code, &fix).await?;
        Self::require_geofence_ack(&check, request.confirm_outside_geofence)?;

        let now = self.ports.clock.now();
        let schedule_code = self.ids.next_id(UNSCHEDULED_CODE_PREFIX, now);
        let key = VisitKey::new(schedule_code, request.customer_code.clone());
        let evidence = self.arrival_evidence(&fix, request.photo_ref, &check);

        let record = VisitRecord::start_unscheduled(
            self.ids.next_id("visit", now),
            key,
            request.customer_name,
            request.customer_address,
            self.ports.clock.today(),
            evidence,
        );
        self.ports.visits.insert_visit(&record).await?;
        self.seed_anchor_if_missing(&request.customer_code, &check, &fix).await;

        info!(local_id = %record.local_id, visit = %record.key, "unscheduled visit started");
        Ok(record)
    }

    /// Register a customer offline; it is created remotely on the next sync.
    pub async fn register_customer(&self, draft: NewCustomerDraft) -> Result<NewCustomer> {
        draft.validate()?;
        let now = self.ports.clock.now();
        let customer = NewCustomer::from_draft(self.ids.next_id("customer", now), draft, now);
        self.ports.customers.insert_customer(&customer).await?;

        info!(local_id = %customer.local_id, "customer registered");
        Ok(customer)
    }

    /// Explicitly pin the customer location to a fix.
    ///
    /// Returns the anchor in effect afterwards, which is the cached one when
    /// it is at least as recent as the fix.
    pub async fn save_geofence_anchor(
        &self,
        customer_code: &str,
        fix: Option<GpsFix>,
    ) -> Result<GeofenceAnchor> {
        let fix = self.resolve_fix(fix).await?;
        let anchor = GeofenceAnchor::from_fix(
            self.ids.next_id("anchor", self.ports.clock.now()),
            customer_code,
            &fix,
        );

        if self.ports.anchors.save_anchor(&anchor).await? {
            info!(customer = customer_code, "geofence anchor saved");
            return Ok(anchor);
        }

        debug!(customer = customer_code, "newer anchor already cached");
        self.ports
            .anchors
            .find_anchor(customer_code)
            .await?
            .ok_or_else(|| FieldVisitError::NotFound(format!("anchor for {customer_code}")))
    }

    /// Obtain a fix, bounded by the per-attempt timeout and attempt count.
    ///
    /// Nothing is written when every attempt fails.
    pub async fn acquire_fix(&self) -> Result<GpsFix> {
        let attempts = self.settings.gps_max_attempts.max(1);

        for attempt in 1..=attempts {
            match tokio::time::timeout(
                self.settings.gps_attempt_timeout,
                self.ports.location.current_fix(),
            )
            .await
            {
                Ok(Ok(fix)) if fix.is_valid() => return Ok(fix),
                Ok(Ok(fix)) => {
                    warn!(
                        attempt,
                        latitude = fix.latitude,
                        longitude = fix.longitude,
                        "invalid GPS fix"
                    );
                }
                Ok(Err(err)) => warn!(attempt, error = %err, "GPS fix failed"),
                Err(_) => warn!(attempt, "GPS fix timed out"),
            }
        }

        Err(FieldVisitError::GpsUnavailable { attempts })
    }

    async fn check_in_target(&self, key: &VisitKey) -> Result<CheckInTarget> {
        self.ensure_no_open_visit(Some(key)).await?;

        let (record, projected) = match self.ports.visits.find_visit(key).await? {
            Some(record) => (record, false),
            None => {
                let entry = self
                    .ports
                    .schedule
                    .find_entry(key)
                    .await?
                    .ok_or_else(|| FieldVisitError::NotFound(format!("visit {key}")))?;
                (VisitRecord::from_schedule(&entry), true)
            }
        };

        if record.state != VisitState::Scheduled {
            return Err(FieldVisitError::InvalidTransition {
                visit: key.to_string(),
                from: record.state.to_string(),
                action: "check in".into(),
            });
        }

        let today = self.ports.clock.today();
        if record.kind == VisitKind::Scheduled && record.scheduled_date != today {
            return Err(FieldVisitError::ScheduleMismatch {
                visit: key.to_string(),
                scheduled: record.scheduled_date.to_string(),
                today: today.to_string(),
            });
        }

        Ok(CheckInTarget { record, projected })
    }

    /// Fail when a visit other than `key` is checked in.
    async fn ensure_no_open_visit(&self, key: Option<&VisitKey>) -> Result<()> {
        match self.ports.visits.find_open_visit().await? {
            Some(open) if Some(&open.key) != key => {
                Err(FieldVisitError::ConcurrentVisitConflict { open_visit: open.key.to_string() })
            }
            _ => Ok(()),
        }
    }

    async fn resolve_fix(&self, fix: Option<GpsFix>) -> Result<GpsFix> {
        match fix {
            Some(fix) if fix.is_valid() => Ok(fix),
            Some(_) => Err(FieldVisitError::InvalidInput("GPS fix is out of range".into())),
            None => self.acquire_fix().await,
        }
    }

    async fn evaluate_geofence(&self, customer_code: &str, fix: &GpsFix) -> Result<GeofenceCheck> {
        let anchor = self.ports.anchors.find_anchor(customer_code).await?;
        Ok(geo::evaluate(anchor.as_ref(), fix, self.settings.geofence_radius_meters))
    }

    fn require_geofence_ack(check: &GeofenceCheck, confirmed: bool) -> Result<()> {
        match (check.verdict, check.distance_meters) {
            (GeofenceVerdict::Outside, Some(distance_meters)) if !confirmed => {
                Err(FieldVisitError::GeofenceWarning {
                    distance_meters,
                    radius_meters: check.radius_meters,
                })
            }
            _ => Ok(()),
        }
    }

    fn arrival_evidence(
        &self,
        fix: &GpsFix,
        photo_ref: Option<String>,
        check: &GeofenceCheck,
    ) -> CheckInEvidence {
        CheckInEvidence {
            timestamp: self.ports.clock.now(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy_meters: fix.accuracy_meters,
            photo_ref,
            within_geofence: check.within_geofence(),
            distance_meters: check.distance_meters,
        }
    }

    /// The first visit to a customer without an anchor pins its location.
    async fn seed_anchor_if_missing(
        &self,
        customer_code: &str,
        check: &GeofenceCheck,
        fix: &GpsFix,
    ) {
        if check.verdict != GeofenceVerdict::NoAnchor {
            return;
        }

        let anchor = GeofenceAnchor::from_fix(
            self.ids.next_id("anchor", self.ports.clock.now()),
            customer_code,
            fix,
        );
        if let Err(err) = self.ports.anchors.save_anchor(&anchor).await {
            warn!(customer = customer_code, error = %err, "failed to seed geofence anchor");
        }
    }
}
