//! Infrastructure error handling

pub mod conversions;

pub use conversions::{durable_write_error, map_join_error, map_status, InfraError};
