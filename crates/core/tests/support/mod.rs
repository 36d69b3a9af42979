//! Shared test helpers for `fieldvisit-core` integration tests.
//!
//! In-memory fakes for every core port plus fixture builders, so that the
//! service and orchestrator tests can focus on behaviour instead of
//! boilerplate.

#![allow(dead_code)]

pub mod remote;
pub mod repositories;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fieldvisit_core::{Clock, VisitPorts, VisitService, VisitSettings};
use fieldvisit_domain::{GpsFix, ScheduleEntry};
use parking_lot::Mutex;

pub use remote::FakeRemote;
pub use repositories::{InMemoryStore, ScriptedLocation};

/// Clock frozen at a settable instant.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(now) })
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn today(&self) -> NaiveDate {
        self.now.lock().date_naive()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 14).unwrap()
}

pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 14, 8, 30, 0).unwrap()
}

/// Anchor position most fixtures are measured from.
pub const SHOP: (f64, f64) = (-6.175, 106.827);

/// Point `meters` due north of `origin`.
pub fn north_of(origin: (f64, f64), meters: f64) -> (f64, f64) {
    let degrees = (meters / fieldvisit_domain::constants::EARTH_RADIUS_METERS).to_degrees();
    (origin.0 + degrees, origin.1)
}

pub fn fix_at(point: (f64, f64)) -> GpsFix {
    GpsFix::new(point.0, point.1, 6.0, morning())
}

pub fn schedule_entry(schedule: &str, customer: &str, date: NaiveDate) -> ScheduleEntry {
    ScheduleEntry {
        schedule_code: schedule.into(),
        customer_code: customer.into(),
        customer_name: format!("Customer {customer}"),
        customer_address: format!("Jl. Sudirman {customer}"),
        scheduled_date: date,
        completed: false,
    }
}

/// Service wired to in-memory fakes.
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub location: Arc<ScriptedLocation>,
    pub clock: Arc<FixedClock>,
    pub service: VisitService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(VisitSettings {
            geofence_radius_meters: 100.0,
            gps_attempt_timeout: std::time::Duration::from_millis(50),
            gps_max_attempts: 3,
        })
    }

    pub fn with_settings(settings: VisitSettings) -> Self {
        let store = Arc::new(InMemoryStore::default());
        let location = Arc::new(ScriptedLocation::default());
        let clock = FixedClock::at(morning());

        let ports = VisitPorts {
            visits: store.clone(),
            schedule: store.clone(),
            anchors: store.clone(),
            customers: store.clone(),
            location: location.clone(),
            clock: clock.clone(),
        };

        Self { service: VisitService::new(ports, settings), store, location, clock }
    }
}
