//! Adapters between the host platform and the core ports.

pub mod location;

pub use location::PushedLocation;
