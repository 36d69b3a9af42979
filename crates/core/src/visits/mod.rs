//! Visit lifecycle: merge of schedule and local records, and the service
//! enforcing the check-in/check-out rules.

pub mod merge;
pub mod ports;
pub mod service;

pub use merge::merge;
pub use service::{VisitPorts, VisitService, VisitSettings};
