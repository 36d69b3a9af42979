//! Offline copy of the server schedule.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fieldvisit_core::ScheduleCache;
use fieldvisit_domain::{DateRange, Result as DomainResult, ScheduleEntry, VisitKey};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::info;

use super::manager::{map_sql_error, DbManager};
use super::rows::{date_at, date_to_sql, to_millis};
use crate::errors::{durable_write_error, map_join_error};

const SCHEDULE_COLUMNS: &str =
    "schedule_code, customer_code, customer_name, customer_address, scheduled_date, completed";

pub struct SqliteScheduleCache {
    db: Arc<DbManager>,
}

impl SqliteScheduleCache {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ScheduleCache for SqliteScheduleCache {
    async fn replace_schedule(&self, entries: &[ScheduleEntry]) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entries = entries.to_vec();

        task::spawn_blocking(move || -> DomainResult<()> {
            let fetched_at = to_millis(Utc::now());
            db.with_write_transaction(|tx| {
                tx.execute("DELETE FROM schedule_entries", []).map_err(durable_write_error)?;
                let mut stmt = tx
                    .prepare(
                        "INSERT OR IGNORE INTO schedule_entries (
                            schedule_code, customer_code, customer_name, customer_address,
                            scheduled_date, completed, position, fetched_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )
                    .map_err(durable_write_error)?;
                for (position, entry) in entries.iter().enumerate() {
                    stmt.execute(params![
                        entry.schedule_code,
                        entry.customer_code,
                        entry.customer_name,
                        entry.customer_address,
                        date_to_sql(entry.scheduled_date),
                        entry.completed,
                        position as i64,
                        fetched_at,
                    ])
                    .map_err(durable_write_error)?;
                }
                Ok(())
            })?;
            info!(entries = entries.len(), "schedule cache replaced");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn load_schedule(&self, range: &DateRange) -> DomainResult<Vec<ScheduleEntry>> {
        let db = Arc::clone(&self.db);
        let range = *range;

        task::spawn_blocking(move || -> DomainResult<Vec<ScheduleEntry>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedule_entries
                 WHERE scheduled_date BETWEEN ?1 AND ?2
                 ORDER BY position"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt
                .query_map(
                    params![date_to_sql(range.start), date_to_sql(range.end)],
                    map_schedule_row,
                )
                .map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_entry(&self, key: &VisitKey) -> DomainResult<Option<ScheduleEntry>> {
        let db = Arc::clone(&self.db);
        let key = key.clone();

        task::spawn_blocking(move || -> DomainResult<Option<ScheduleEntry>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {SCHEDULE_COLUMNS} FROM schedule_entries
                 WHERE schedule_code = ?1 AND customer_code = ?2"
            );
            conn.query_row(&sql, params![key.schedule_code, key.customer_code], map_schedule_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn map_schedule_row(row: &Row<'_>) -> rusqlite::Result<ScheduleEntry> {
    Ok(ScheduleEntry {
        schedule_code: row.get(0)?,
        customer_code: row.get(1)?,
        customer_name: row.get(2)?,
        customer_address: row.get(3)?,
        scheduled_date: date_at(row, 4)?,
        completed: row.get(5)?,
    })
}
