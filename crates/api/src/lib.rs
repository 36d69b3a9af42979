//! # FieldVisit API
//!
//! Application layer - commands and main entry point.
//!
//! This crate contains:
//! - Commands (UI → backend bridge)
//! - Application context (dependency injection)
//! - Logging bootstrap and the headless sync binary
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod adapters;
pub mod commands;
pub mod context;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
