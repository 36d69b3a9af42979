//! SQLite-backed visit repository.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fieldvisit_core::VisitRepository;
use fieldvisit_domain::{
    DateRange, EntityType, FieldVisitError, Result as DomainResult, VisitKey, VisitPatch,
    VisitRecord, VisitState,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use super::manager::DbManager;
use super::record_locks::RecordLocks;
use super::rows::{
    date_at, date_to_sql, json_at, label_at, lock_key, optional_millis_at, read_sync_meta,
    to_json, to_millis,
};
use crate::errors::{durable_write_error, map_join_error, InfraError};

pub(crate) const VISIT_COLUMNS: &str = "local_id, schedule_code, customer_code, kind, \
     scheduled_date, customer_name, customer_address, state, check_in_json, check_out_json, \
     duration_minutes, updated_at, \
     sync_status, revision, remote_id, attempt_count, last_error, rejected_reason";

pub struct SqliteVisitRepository {
    db: Arc<DbManager>,
    locks: RecordLocks,
}

impl SqliteVisitRepository {
    pub fn new(db: Arc<DbManager>, locks: RecordLocks) -> Self {
        Self { db, locks }
    }

    fn insert_row(conn: &Connection, visit: &VisitRecord) -> DomainResult<()> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT local_id FROM visits
                 WHERE (schedule_code = ?1 AND customer_code = ?2) OR local_id = ?3",
                params![visit.key.schedule_code, visit.key.customer_code, visit.local_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(read_error)?;
        if let Some(existing) = existing {
            return Err(FieldVisitError::InvalidInput(format!(
                "visit {} already recorded as {existing}",
                visit.key
            )));
        }

        if visit.is_open() {
            Self::ensure_no_other_open(conn, &visit.local_id)?;
        }

        let check_in = to_json(visit.check_in.as_ref()).map_err(durable_write_error)?;
        let check_out = to_json(visit.check_out.as_ref()).map_err(durable_write_error)?;
        let sync = &visit.sync;
        conn.execute(
            "INSERT INTO visits (
                local_id, schedule_code, customer_code, kind, scheduled_date, customer_name,
                customer_address, state, check_in_json, check_out_json, duration_minutes,
                updated_at, created_at, sync_status, revision, remote_id, attempt_count,
                last_error, rejected_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19)",
            params![
                visit.local_id,
                visit.key.schedule_code,
                visit.key.customer_code,
                visit.kind.to_string(),
                date_to_sql(visit.scheduled_date),
                visit.customer_name,
                visit.customer_address,
                visit.state.to_string(),
                check_in,
                check_out,
                visit.duration_minutes,
                visit.updated_at.map(to_millis),
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

    fn patch_row(
        conn: &Connection,
        local_id: &str,
        patch: VisitPatch,
    ) -> DomainResult<VisitRecord> {
        let mut visit = Self::select_one(conn, "local_id = ?1", params![local_id])?
            .ok_or_else(|| FieldVisitError::NotFound(format!("visit {local_id}")))?;

        visit.apply_patch(patch)?;
        if visit.is_open() {
            Self::ensure_no_other_open(conn, local_id)?;
        }

        let check_in = to_json(visit.check_in.as_ref()).map_err(durable_write_error)?;
        let check_out = to_json(visit.check_out.as_ref()).map_err(durable_write_error)?;
        let sync = &visit.sync;
        conn.execute(
            "UPDATE visits SET
                state = ?2, check_in_json = ?3, check_out_json = ?4, duration_minutes = ?5,
                updated_at = ?6, sync_status = ?7, revision = ?8, attempt_count = ?9,
                last_error = ?10, rejected_reason = ?11
             WHERE local_id = ?1",
            params![
                local_id,
                visit.state.to_string(),
                check_in,
                check_out,
                visit.duration_minutes,
                visit.updated_at.map(to_millis),
                sync.status.to_string(),
                sync.revision,
                sync.attempt_count,
                sync.last_error,
                sync.rejected_reason,
            ],
        )
        .map_err(durable_write_error)?;
        Ok(visit)
    }

    fn ensure_no_other_open(conn: &Connection, local_id: &str) -> DomainResult<()> {
        let open: Option<(String, String)> = conn
            .query_row(
                "SELECT schedule_code, customer_code FROM visits
                 WHERE state = ?1 AND local_id <> ?2",
                params![VisitState::CheckedIn.to_string(), local_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(read_error)?;

        match open {
            Some((schedule_code, customer_code)) => Err(FieldVisitError::ConcurrentVisitConflict {
                open_visit: VisitKey::new(schedule_code, customer_code).to_string(),
            }),
            None => Ok(()),
        }
    }

    fn select_one(
        conn: &Connection,
        filter: &str,
        params: impl rusqlite::Params,
    ) -> DomainResult<Option<VisitRecord>> {
        let sql = format!("SELECT {VISIT_COLUMNS} FROM visits WHERE {filter}");
        conn.query_row(&sql, params, map_visit_row).optional().map_err(read_error)
    }

    fn select_range(conn: &Connection, range: &DateRange) -> DomainResult<Vec<VisitRecord>> {
        let sql = format!(
            "SELECT {VISIT_COLUMNS} FROM visits
             WHERE scheduled_date BETWEEN ?1 AND ?2
             ORDER BY scheduled_date, schedule_code, customer_code"
        );
        let mut stmt = conn.prepare(&sql).map_err(read_error)?;
        let rows = stmt
            .query_map(params![date_to_sql(range.start), date_to_sql(range.end)], map_visit_row)
            .map_err(read_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(read_error)
    }
}

#[async_trait]
impl VisitRepository for SqliteVisitRepository {
    async fn insert_visit(&self, visit: &VisitRecord) -> DomainResult<()> {
        let _guard = self.locks.acquire(lock_key(EntityType::Visit, &visit.local_id)).await;
        let db = Arc::clone(&self.db);
        let visit = visit.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            db.with_write_transaction(|tx| Self::insert_row(tx, &visit))?;
            debug!(local_id = %visit.local_id, visit = %visit.key, "visit inserted");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_visit(&self, local_id: &str, patch: VisitPatch) -> DomainResult<VisitRecord> {
        let _guard = self.locks.acquire(lock_key(EntityType::Visit, local_id)).await;
        let db = Arc::clone(&self.db);
        let local_id = local_id.to_string();

        task::spawn_blocking(move || -> DomainResult<VisitRecord> {
            db.with_write_transaction(|tx| Self::patch_row(tx, &local_id, patch))
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_visit(&self, key: &VisitKey) -> DomainResult<Option<VisitRecord>> {
        let db = Arc::clone(&self.db);
        let key = key.clone();

        task::spawn_blocking(move || -> DomainResult<Option<VisitRecord>> {
            let conn = db.get_connection()?;
            Self::select_one(
                &conn,
                "schedule_code = ?1 AND customer_code = ?2",
                params![key.schedule_code, key.customer_code],
            )
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_open_visit(&self) -> DomainResult<Option<VisitRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Option<VisitRecord>> {
            let conn = db.get_connection()?;
            Self::select_one(&conn, "state = ?1", params![VisitState::CheckedIn.to_string()])
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_visits(&self, range: &DateRange) -> DomainResult<Vec<VisitRecord>> {
        let db = Arc::clone(&self.db);
        let range = *range;

        task::spawn_blocking(move || -> DomainResult<Vec<VisitRecord>> {
            let conn = db.get_connection()?;
            Self::select_range(&conn, &range)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Map a row selected with [`VISIT_COLUMNS`].
pub(crate) fn map_visit_row(row: &Row<'_>) -> rusqlite::Result<VisitRecord> {
    Ok(VisitRecord {
        local_id: row.get(0)?,
        key: VisitKey::new(row.get::<_, String>(1)?, row.get::<_, String>(2)?),
        kind: label_at(row, 3)?,
        scheduled_date: date_at(row, 4)?,
        customer_name: row.get(5)?,
        customer_address: row.get(6)?,
        state: label_at(row, 7)?,
        check_in: json_at(row, 8)?,
        check_out: json_at(row, 9)?,
        duration_minutes: row.get(10)?,
        updated_at: optional_millis_at(row, 11)?,
        sync: read_sync_meta(row, 12)?,
    })
}

fn read_error(err: rusqlite::Error) -> FieldVisitError {
    InfraError::from(err).into()
}
