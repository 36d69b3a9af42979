//! SQLite durable store
//!
//! One r2d2 pool shared by every repository; blocking work runs on
//! `spawn_blocking` and every write is a single transaction.

pub mod anchor_repository;
pub mod customer_repository;
pub mod durable_store;
pub mod manager;
pub mod pool;
pub mod record_locks;
mod rows;
pub mod schedule_repository;
pub mod visit_repository;

pub use anchor_repository::SqliteAnchorRepository;
pub use customer_repository::SqliteCustomerRepository;
pub use durable_store::SqliteDurableStore;
pub use manager::{DbManager, SqliteConnection};
pub use pool::{create_sqlite_pool, SqlitePool, SqlitePoolConfig};
pub use record_locks::RecordLocks;
pub use schedule_repository::SqliteScheduleCache;
pub use visit_repository::SqliteVisitRepository;
