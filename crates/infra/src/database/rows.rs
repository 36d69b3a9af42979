//! Column encoding shared by the SQLite repositories
//!
//! Instants are stored as epoch milliseconds, calendar dates as ISO
//! `YYYY-MM-DD` text (so that range filters compare lexically) and visit
//! evidence as JSON.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use fieldvisit_domain::{EntityType, SyncMeta, SyncStatus};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::Serialize;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Sync bookkeeping columns, in the order [`read_sync_meta`] expects them.
pub const SYNC_COLUMNS: &str =
    "sync_status, revision, remote_id, attempt_count, last_error, rejected_reason";

pub fn table_for(entity: EntityType) -> &'static str {
    match entity {
        EntityType::GeofenceAnchor => "geofence_anchors",
        EntityType::Visit => "visits",
        EntityType::NewCustomer => "new_customers",
    }
}

/// Key under which writers to one record are serialized.
pub fn lock_key(entity: EntityType, local_id: &str) -> String {
    format!("{entity}:{local_id}")
}

pub fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub fn date_to_sql(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, message.into())
}

pub fn millis_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp {millis}")))
}

pub fn optional_millis_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => millis_at(row, idx).map(Some),
        None => Ok(None),
    }
}

pub fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| conversion_error(idx, Type::Text, format!("date {raw}: {e}")))
}

/// Parse a status label written through `Display`.
pub fn label_at<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, Type::Text, e))
}

pub fn json_at<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| conversion_error(idx, Type::Text, e.to_string())),
        None => Ok(None),
    }
}

pub fn to_json<T: Serialize>(value: Option<&T>) -> serde_json::Result<Option<String>> {
    value.map(serde_json::to_string).transpose()
}

/// Read [`SYNC_COLUMNS`] starting at column `start`.
pub fn read_sync_meta(row: &Row<'_>, start: usize) -> rusqlite::Result<SyncMeta> {
    Ok(SyncMeta {
        status: label_at::<SyncStatus>(row, start)?,
        revision: row.get(start + 1)?,
        remote_id: row.get(start + 2)?,
        attempt_count: row.get(start + 3)?,
        last_error: row.get(start + 4)?,
        rejected_reason: row.get(start + 5)?,
    })
}
