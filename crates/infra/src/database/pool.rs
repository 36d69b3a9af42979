//! SQLite connection pool
//!
//! r2d2 pool over `r2d2_sqlite` with per-connection pragmas tuned for a
//! crash-safe local queue: WAL journal with `synchronous=FULL` so an
//! acknowledged commit survives power loss.

use std::path::Path;
use std::time::Duration;

use fieldvisit_domain::{FieldVisitError, Result as DomainResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use tracing::warn;

/// Pool configuration
#[derive(Debug, Clone)]
pub struct SqlitePoolConfig {
    pub max_size: u32,
    pub connection_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for SqlitePoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            connection_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

pub type SqlitePool = Pool<SqliteConnectionManager>;

/// Apply connection-level pragmas
///
/// - WAL journal so UI reads do not block sync writes
/// - FULL synchronous mode: a commit is durable once acknowledged
/// - Foreign key constraints enabled
/// - Busy timeout for lock contention between pooled connections
pub fn apply_connection_pragmas(
    conn: &Connection,
    config: &SqlitePoolConfig,
) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA wal_autocheckpoint=1000;
         PRAGMA synchronous=FULL;
         PRAGMA foreign_keys=ON;",
    )?;
    conn.busy_timeout(config.busy_timeout)
}

/// Build a pool for the database file at `path`.
pub fn create_sqlite_pool(path: &Path, config: SqlitePoolConfig) -> DomainResult<SqlitePool> {
    let pragma_config = config.clone();
    let manager = SqliteConnectionManager::file(path)
        .with_init(move |conn| apply_connection_pragmas(conn, &pragma_config));

    Pool::builder()
        .max_size(config.max_size.max(1))
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .map_err(|e| {
            warn!(db_path = %path.display(), error = %e, "failed to create connection pool");
            FieldVisitError::Database(format!("failed to create pool: {e}"))
        })
}
