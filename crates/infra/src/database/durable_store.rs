//! Pending-set view of the SQLite store used by the sync engine.
//!
//! Only sync bookkeeping columns are written here. `mark_synced` keeps the
//! first remote id it is given, then runs a compare-and-set on
//! `(local_id, revision)`, so a business edit committed while a delivery was
//! in flight keeps its new pending revision and is later sent as an update.

use std::sync::Arc;

use async_trait::async_trait;
use fieldvisit_core::LocalDurableStore;
use fieldvisit_domain::{EntityType, PendingRecord, Result as DomainResult, SyncStatus};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tokio::task;
use tracing::{debug, warn};

use super::anchor_repository::{map_anchor_row, ANCHOR_COLUMNS};
use super::customer_repository::{map_customer_row, CUSTOMER_COLUMNS};
use super::manager::{map_sql_error, DbManager};
use super::record_locks::RecordLocks;
use super::rows::{lock_key, table_for};
use super::visit_repository::{map_visit_row, VISIT_COLUMNS};
use crate::errors::{durable_write_error, map_join_error};

pub struct SqliteDurableStore {
    db: Arc<DbManager>,
    locks: RecordLocks,
}

impl SqliteDurableStore {
    pub fn new(db: Arc<DbManager>, locks: RecordLocks) -> Self {
        Self { db, locks }
    }

    fn select(
        conn: &Connection,
        entity: EntityType,
        pending_only: bool,
    ) -> DomainResult<Vec<PendingRecord>> {
        let filter = if pending_only {
            format!("WHERE sync_status = '{}' AND rejected_reason IS NULL", SyncStatus::Pending)
        } else {
            String::new()
        };
        let order = "ORDER BY created_at, rowid";

        let records = match entity {
            EntityType::Visit => {
                let sql = format!("SELECT {VISIT_COLUMNS} FROM visits {filter} {order}");
                let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map([], |row| map_visit_row(row).map(PendingRecord::Visit))
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
            EntityType::GeofenceAnchor => {
                let sql =
                    format!("SELECT {ANCHOR_COLUMNS} FROM geofence_anchors {filter} {order}");
                let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map([], |row| map_anchor_row(row).map(PendingRecord::GeofenceAnchor))
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
            EntityType::NewCustomer => {
                let sql =
                    format!("SELECT {CUSTOMER_COLUMNS} FROM new_customers {filter} {order}");
                let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
                let rows = stmt
                    .query_map([], |row| map_customer_row(row).map(PendingRecord::NewCustomer))
                    .map_err(map_sql_error)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
            }
        };
        records.map_err(map_sql_error)
    }

    async fn query(
        &self,
        entity: EntityType,
        pending_only: bool,
    ) -> DomainResult<Vec<PendingRecord>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<PendingRecord>> {
            let conn = db.get_connection()?;
            Self::select(&conn, entity, pending_only)
        })
        .await
        .map_err(map_join_error)?
    }

    /// Run one bookkeeping statement against a record; returns the number of
    /// rows it changed.
    async fn update_bookkeeping(
        &self,
        entity: EntityType,
        local_id: &str,
        sql: String,
        values: Vec<Value>,
    ) -> DomainResult<usize> {
        let _guard = self.locks.acquire(lock_key(entity, local_id)).await;
        let db = Arc::clone(&self.db);
        let local_id = local_id.to_string();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection().map_err(durable_write_error)?;
            let params = std::iter::once(Value::Text(local_id)).chain(values);
            conn.execute(&sql, params_from_iter(params)).map_err(durable_write_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl LocalDurableStore for SqliteDurableStore {
    async fn query_pending(&self, entity: EntityType) -> DomainResult<Vec<PendingRecord>> {
        self.query(entity, true).await
    }

    async fn query_all(&self, entity: EntityType) -> DomainResult<Vec<PendingRecord>> {
        self.query(entity, false).await
    }

    async fn mark_synced(
        &self,
        entity: EntityType,
        local_id: &str,
        revision: u32,
        remote_id: Option<&str>,
    ) -> DomainResult<bool> {
        let _guard = self.locks.acquire(lock_key(entity, local_id)).await;
        let db = Arc::clone(&self.db);
        let local_id_owned = local_id.to_string();
        let remote_id = remote_id.map(str::to_string);

        let changed = task::spawn_blocking(move || -> DomainResult<usize> {
            let table = table_for(entity);
            db.with_write_transaction(|tx| {
                if let Some(remote_id) = &remote_id {
                    tx.execute(
                        &format!(
                            "UPDATE {table} SET remote_id = COALESCE(remote_id, ?2)
                             WHERE local_id = ?1"
                        ),
                        params![local_id_owned, remote_id],
                    )
                    .map_err(durable_write_error)?;
                }
                tx.execute(
                    &format!(
                        "UPDATE {table} SET sync_status = '{}', last_error = NULL
                         WHERE local_id = ?1 AND revision = ?2",
                        SyncStatus::Synced,
                    ),
                    params![local_id_owned, i64::from(revision)],
                )
                .map_err(durable_write_error)
            })
        })
        .await
        .map_err(map_join_error)??;

        if changed == 0 {
            debug!(%entity, local_id, revision, "revision superseded before acknowledgement");
        }
        Ok(changed > 0)
    }

    async fn record_failure(
        &self,
        entity: EntityType,
        local_id: &str,
        error: &str,
    ) -> DomainResult<()> {
        let sql = format!(
            "UPDATE {} SET attempt_count = attempt_count + 1, last_error = ?2
             WHERE local_id = ?1",
            table_for(entity),
        );
        let values = vec![Value::Text(error.to_string())];
        let changed = self.update_bookkeeping(entity, local_id, sql, values).await?;
        if changed == 0 {
            warn!(%entity, local_id, "delivery failure for unknown record ignored");
        }
        Ok(())
    }

    async fn record_rejection(
        &self,
        entity: EntityType,
        local_id: &str,
        reason: &str,
    ) -> DomainResult<()> {
        let sql = format!(
            "UPDATE {} SET attempt_count = attempt_count + 1, rejected_reason = ?2
             WHERE local_id = ?1",
            table_for(entity),
        );
        let values = vec![Value::Text(reason.to_string())];
        let changed = self.update_bookkeeping(entity, local_id, sql, values).await?;
        if changed == 0 {
            warn!(%entity, local_id, "rejection for unknown record ignored");
        }
        Ok(())
    }

    async fn count_pending(&self) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let mut total = 0usize;
            for entity in EntityType::SYNC_ORDER {
                let sql =
                    format!("SELECT COUNT(*) FROM {} WHERE sync_status = ?1", table_for(entity));
                let count: i64 = conn
                    .query_row(&sql, params![SyncStatus::Pending.to_string()], |row| row.get(0))
                    .map_err(map_sql_error)?;
                total += usize::try_from(count).unwrap_or_default();
            }
            Ok(total)
        })
        .await
        .map_err(map_join_error)?
    }
}
