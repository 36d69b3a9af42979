//! Port interfaces for the visit lifecycle
//!
//! These traits define the boundaries between the visit business rules and
//! the storage, location and time sources behind them.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use fieldvisit_domain::{
    DateRange, GeofenceAnchor, GpsFix, NewCustomer, Result, ScheduleEntry, VisitKey, VisitPatch,
    VisitRecord,
};

/// Durable storage of visit records
#[async_trait]
pub trait VisitRepository: Send + Sync {
    /// Persist a new record; fails if one already exists for its key.
    async fn insert_visit(&self, visit: &VisitRecord) -> Result<()>;

    /// Apply a transition patch under the per-record guard and return the
    /// stored result.
    async fn update_visit(&self, local_id: &str, patch: VisitPatch) -> Result<VisitRecord>;

    /// Find the record for a composite key
    async fn find_visit(&self, key: &VisitKey) -> Result<Option<VisitRecord>>;

    /// The visit currently in `CheckedIn`, if any
    async fn find_open_visit(&self) -> Result<Option<VisitRecord>>;

    /// Every local record whose scheduled date falls in `range`
    async fn list_visits(&self, range: &DateRange) -> Result<Vec<VisitRecord>>;
}

/// Offline copy of the server schedule
#[async_trait]
pub trait ScheduleCache: Send + Sync {
    /// Replace the cached schedule wholesale
    async fn replace_schedule(&self, entries: &[ScheduleEntry]) -> Result<()>;

    async fn load_schedule(&self, range: &DateRange) -> Result<Vec<ScheduleEntry>>;

    async fn find_entry(&self, key: &VisitKey) -> Result<Option<ScheduleEntry>>;
}

/// Cached customer locations
#[async_trait]
pub trait GeofenceAnchorRepository: Send + Sync {
    async fn find_anchor(&self, customer_code: &str) -> Result<Option<GeofenceAnchor>>;

    /// Store `anchor` unless a newer or equally recent one is already cached.
    ///
    /// Returns `true` when the anchor was written.
    async fn save_anchor(&self, anchor: &GeofenceAnchor) -> Result<bool>;
}

/// Customers registered on the device
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn insert_customer(&self, customer: &NewCustomer) -> Result<()>;

    async fn find_customer(&self, local_id: &str) -> Result<Option<NewCustomer>>;

    async fn list_customers(&self) -> Result<Vec<NewCustomer>>;
}

/// Device location source
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Produce a single fix; may block until the receiver locks on.
    async fn current_fix(&self) -> Result<GpsFix>;
}

/// Time source, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date the sales rep is working on.
    fn today(&self) -> NaiveDate;
}

/// Wall clock, using the device's local date for "today".
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
