//! Command surface exposed to the UI
//!
//! Thin wrappers over [`AppContext`](crate::AppContext) that add uniform
//! timing and outcome logging. Errors are returned as the serialisable
//! domain error so the UI can branch on its `type`.

mod customers;
mod sync;
mod visits;

pub use customers::*;
pub use sync::*;
pub use visits::*;
