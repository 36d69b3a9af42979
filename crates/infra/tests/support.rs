//! Shared fixtures for infra integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fieldvisit_domain::{
    CheckInEvidence, CheckOutEvidence, GeofenceAnchor, GpsFix, NewCustomer, NewCustomerDraft,
    ScheduleEntry, VisitRecord,
};
use fieldvisit_infra::database::{
    DbManager, RecordLocks, SqliteAnchorRepository, SqliteCustomerRepository, SqliteDurableStore,
    SqliteScheduleCache, SqliteVisitRepository,
};
use tempfile::TempDir;

/// Migrated database in a temporary directory, with every repository bound
/// to it through one shared lock table.
pub struct DbHarness {
    _temp_dir: TempDir,
    pub manager: Arc<DbManager>,
    pub locks: RecordLocks,
}

impl DbHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temporary directory should be created");
        let db_path = temp_dir.path().join("fieldvisit-test.db");

        let manager =
            Arc::new(DbManager::new(&db_path, 4).expect("database manager should initialise"));
        manager.run_migrations().expect("schema should apply");

        Self { _temp_dir: temp_dir, manager, locks: RecordLocks::new() }
    }

    pub fn visits(&self) -> SqliteVisitRepository {
        SqliteVisitRepository::new(Arc::clone(&self.manager), self.locks.clone())
    }

    pub fn schedule(&self) -> SqliteScheduleCache {
        SqliteScheduleCache::new(Arc::clone(&self.manager))
    }

    pub fn anchors(&self) -> SqliteAnchorRepository {
        SqliteAnchorRepository::new(Arc::clone(&self.manager), self.locks.clone())
    }

    pub fn customers(&self) -> SqliteCustomerRepository {
        SqliteCustomerRepository::new(Arc::clone(&self.manager))
    }

    pub fn store(&self) -> SqliteDurableStore {
        SqliteDurableStore::new(Arc::clone(&self.manager), self.locks.clone())
    }
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
}

pub fn at(d: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, d, hour, minute, 0).unwrap()
}

pub fn entry(schedule: &str, customer: &str, date: NaiveDate) -> ScheduleEntry {
    ScheduleEntry {
        schedule_code: schedule.into(),
        customer_code: customer.into(),
        customer_name: format!("Toko {customer}"),
        customer_address: format!("Jl. {customer} No. 1"),
        scheduled_date: date,
        completed: false,
    }
}

pub fn check_in_evidence(timestamp: DateTime<Utc>) -> CheckInEvidence {
    CheckInEvidence {
        timestamp,
        latitude: -6.175,
        longitude: 106.827,
        accuracy_meters: 8.0,
        photo_ref: Some("photos/storefront.jpg".into()),
        within_geofence: true,
        distance_meters: Some(12.5),
    }
}

pub fn check_out_evidence(timestamp: DateTime<Utc>) -> CheckOutEvidence {
    CheckOutEvidence { timestamp, latitude: -6.175, longitude: 106.827, accuracy_meters: 9.0 }
}

/// Scheduled visit checked in at `checked_in_at`, revision 1 pending.
pub fn checked_in_visit(
    schedule: &str,
    customer: &str,
    checked_in_at: DateTime<Utc>,
) -> VisitRecord {
    let mut visit =
        VisitRecord::from_schedule(&entry(schedule, customer, checked_in_at.date_naive()));
    visit.local_id = format!("visit-{schedule}-{customer}");
    visit.check_in(check_in_evidence(checked_in_at)).unwrap();
    visit
}

pub fn anchor(local_id: &str, customer: &str, captured_at: DateTime<Utc>) -> GeofenceAnchor {
    GeofenceAnchor::from_fix(
        local_id.into(),
        customer,
        &GpsFix::new(-6.175, 106.827, 6.0, captured_at),
    )
}

pub fn customer(local_id: &str, name: &str, created_at: DateTime<Utc>) -> NewCustomer {
    NewCustomer::from_draft(
        local_id.into(),
        NewCustomerDraft {
            name: name.into(),
            address: "Pasar Baru Blok C".into(),
            phone: Some("+62 812 0000 1111".into()),
            latitude: None,
            longitude: None,
        },
        created_at,
    )
}
