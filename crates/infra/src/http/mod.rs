//! HTTP plumbing and the remote visit service adapter

pub mod client;
pub mod remote;

pub use client::{HttpClient, HttpClientBuilder, RetryPolicy};
pub use remote::{HttpRemoteService, IDEMPOTENCY_HEADER};
