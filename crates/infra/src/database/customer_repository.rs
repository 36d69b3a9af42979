//! Customers registered on the device.

use std::sync::Arc;

use async_trait::async_trait;
use fieldvisit_core::CustomerRepository;
use fieldvisit_domain::{NewCustomer, Result as DomainResult};
use rusqlite::{params, OptionalExtension, Row};
use tokio::task;
use tracing::debug;

use super::manager::{map_sql_error, DbManager};
use super::rows::{millis_at, read_sync_meta, to_millis};
use crate::errors::{durable_write_error, map_join_error};

pub(crate) const CUSTOMER_COLUMNS: &str = "local_id, name, address, phone, latitude, longitude, \
     created_at, sync_status, revision, remote_id, attempt_count, last_error, rejected_reason";

pub struct SqliteCustomerRepository {
    db: Arc<DbManager>,
}

impl SqliteCustomerRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CustomerRepository for SqliteCustomerRepository {
    async fn insert_customer(&self, customer: &NewCustomer) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let customer = customer.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection().map_err(durable_write_error)?;
            let sync = &customer.sync;
            conn.execute(
                "INSERT INTO new_customers (
                    local_id, name, address, phone, latitude, longitude, created_at,
                    sync_status, revision, remote_id, attempt_count, last_error, rejected_reason
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    customer.local_id,
                    customer.name,
                    customer.address,
                    customer.phone,
                    customer.latitude,
                    customer.longitude,
                    to_millis(customer.created_at),
                    sync.status.to_string(),
                    sync.revision,
                    sync.remote_id,
                    sync.attempt_count,
                    sync.last_error,
                    sync.rejected_reason,
                ],
            )
            .map_err(durable_write_error)?;
            debug!(local_id = %customer.local_id, "customer inserted");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_customer(&self, local_id: &str) -> DomainResult<Option<NewCustomer>> {
        let db = Arc::clone(&self.db);
        let local_id = local_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<NewCustomer>> {
            let conn = db.get_connection()?;
            let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM new_customers WHERE local_id = ?1");
            conn.query_row(&sql, params![local_id], map_customer_row)
                .optional()
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_customers(&self) -> DomainResult<Vec<NewCustomer>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<NewCustomer>> {
            let conn = db.get_connection()?;
            let sql = format!(
                "SELECT {CUSTOMER_COLUMNS} FROM new_customers ORDER BY created_at, local_id"
            );
            let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
            let rows = stmt.query_map([], map_customer_row).map_err(map_sql_error)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

/// Map a row selected with [`CUSTOMER_COLUMNS`].
pub(crate) fn map_customer_row(row: &Row<'_>) -> rusqlite::Result<NewCustomer> {
    Ok(NewCustomer {
        local_id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        phone: row.get(3)?,
        latitude: row.get(4)?,
        longitude: row.get(5)?,
        created_at: millis_at(row, 6)?,
        sync: read_sync_meta(row, 7)?,
    })
}
