//! # FieldVisit Domain
//!
//! Business domain types and models for FieldVisit.
//!
//! This crate contains:
//! - Visit, customer and geofence anchor data types
//! - The visit lifecycle state machine (pure transitions)
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other FieldVisit crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
