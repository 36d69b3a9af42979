//! Local identifier generation
//!
//! Identifiers are UUIDv7 values whose millisecond component strictly
//! increases across calls, even when the wall clock stalls or steps back.
//! They sort by creation order and double as remote dedupe keys.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::{NoContext, Timestamp, Uuid};

#[derive(Debug, Default)]
pub struct LocalIdGenerator {
    last_millis: Mutex<u64>,
}

impl LocalIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next identifier for a clock reading of `now`.
    pub fn next_uuid(&self, now: DateTime<Utc>) -> Uuid {
        let wall = u64::try_from(now.timestamp_millis()).unwrap_or(0);

        let millis = {
            let mut last = self.last_millis.lock();
            let next = wall.max(*last + 1);
            *last = next;
            next
        };

        let subsec_nanos = u32::try_from((millis % 1_000) * 1_000_000).unwrap_or(0);
        Uuid::new_v7(Timestamp::from_unix(NoContext, millis / 1_000, subsec_nanos))
    }

    /// Prefixed identifier, e.g. `visit-0190c3b2-...`.
    pub fn next_id(&self, prefix: &str, now: DateTime<Utc>) -> String {
        format!("{prefix}-{}", self.next_uuid(now))
    }
}
