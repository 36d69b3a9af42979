//! Server schedule entries

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::visit::VisitKey;

/// A planned visit as returned by `fetch_schedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(rename = "visitKey")]
    pub schedule_code: String,
    #[serde(rename = "customerKey")]
    pub customer_code: String,
    #[serde(rename = "customerName")]
    pub customer_name: String,
    #[serde(rename = "address")]
    pub customer_address: String,
    #[serde(rename = "scheduledDate")]
    pub scheduled_date: NaiveDate,
    #[serde(rename = "completedFlag", default)]
    pub completed: bool,
}

impl ScheduleEntry {
    pub fn key(&self) -> VisitKey {
        VisitKey::new(&self.schedule_code, &self.customer_code)
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}
