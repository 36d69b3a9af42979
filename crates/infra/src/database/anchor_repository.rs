//! Cached geofence anchors, one per customer.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fieldvisit_core::GeofenceAnchorRepository;
use fieldvisit_domain::{GeofenceAnchor, Result as DomainResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use super::manager::{map_sql_error, DbManager};
use super::record_locks::RecordLocks;
use super::rows::{millis_at, read_sync_meta, to_millis};
use crate::errors::{durable_write_error, map_join_error};

pub(crate) const ANCHOR_COLUMNS: &str = "local_id, customer_code, latitude, longitude, \
     captured_at, sync_status, revision, remote_id, attempt_count, last_error, rejected_reason";

pub struct SqliteAnchorRepository {
    db: Arc<DbManager>,
    locks: RecordLocks,
}

impl SqliteAnchorRepository {
    pub fn new(db: Arc<DbManager>, locks: RecordLocks) -> Self {
        Self { db, locks }
    }

    fn select_by_customer(
        conn: &Connection,
        customer_code: &str,
    ) -> DomainResult<Option<GeofenceAnchor>> {
        let sql = format!("SELECT {ANCHOR_COLUMNS} FROM geofence_anchors WHERE customer_code = ?1");
        conn.query_row(&sql, params![customer_code], map_anchor_row)
            .optional()
            .map_err(map_sql_error)
    }

    /// Insert or replace the customer's anchor; the replacement starts a fresh
    /// pending record under its own local id.
    fn upsert(conn: &Connection, anchor: &GeofenceAnchor) -> DomainResult<()> {
        let sync = &anchor.sync;
        conn.execute(
            "INSERT INTO geofence_anchors (
                customer_code, local_id, latitude, longitude, captured_at, created_at,
                sync_status, revision, remote_id, attempt_count, last_error, rejected_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(customer_code) DO UPDATE SET
                local_id = excluded.local_id,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                captured_at = excluded.captured_at,
                created_at = excluded.created_at,
                sync_status = excluded.sync_status,
                revision = excluded.revision,
                remote_id = excluded.remote_id,
                attempt_count = excluded.attempt_count,
                last_error = excluded.last_error,
                rejected_reason = excluded.rejected_reason",
            params![
                anchor.customer_code,
                anchor.local_id,
                anchor.latitude,
                anchor.longitude,
                to_millis(anchor.captured_at),
                to_millis(Utc::now()),
                sync.status.to_string(),
                sync.revision,
                sync.remote_id,
                sync.attempt_count,
                sync.last_error,
                sync.rejected_reason,
            ],
        )
        .map_err(durable_write_error)?;
        Ok(())
    }
}

#[async_trait]
impl GeofenceAnchorRepository for SqliteAnchorRepository {
    async fn find_anchor(&self, customer_code: &str) -> DomainResult<Option<GeofenceAnchor>> {
        let db = Arc::clone(&self.db);
        let customer_code = customer_code.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<GeofenceAnchor>> {
            let conn = db.get_connection()?;
            Self::select_by_customer(&conn, &customer_code)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_anchor(&self, anchor: &GeofenceAnchor) -> DomainResult<bool> {
        let _guard = self.locks.acquire(format!("anchor-customer:{}", anchor.customer_code)).await;
        let db = Arc::clone(&self.db);
        let anchor = anchor.clone();

        task::spawn_blocking(move || -> DomainResult<bool> {
            let written = db.with_write_transaction(|tx| {
                if let Some(existing) = Self::select_by_customer(tx, &anchor.customer_code)? {
                    if !anchor.is_newer_than(&existing) {
                        return Ok(false);
                    }
                }
                Self::upsert(tx, &anchor)?;
                Ok(true)
            })?;
            debug!(customer = %anchor.customer_code, written, "geofence anchor save");
            Ok(written)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Map a row selected with [`ANCHOR_COLUMNS`].
pub(crate) fn map_anchor_row(row: &Row<'_>) -> rusqlite::Result<GeofenceAnchor> {
    Ok(GeofenceAnchor {
        local_id: row.get(0)?,
        customer_code: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        captured_at: millis_at(row, 4)?,
        sync: read_sync_meta(row, 5)?,
    })
}
