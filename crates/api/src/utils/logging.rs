use std::time::Duration;

use fieldvisit_domain::FieldVisitError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `default_level`. Set `FIELDVISIT_LOG_JSON=1` for
/// one JSON object per event. Calling this twice is harmless; the second
/// subscriber is ignored.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("FIELDVISIT_LOG_JSON")
        .is_ok_and(|value| matches!(value.as_str(), "1" | "true" | "yes"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let result =
        if json { builder.json().try_init() } else { builder.compact().try_init() };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Log the outcome of a command execution with structured fields.
///
/// `command` is a stable identifier such as `"visits::check_in"`.
#[inline]
pub fn log_command_execution(
    command: &str,
    elapsed: Duration,
    error: Option<&FieldVisitError>,
) {
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    match error {
        None => info!(command, duration_ms, "command_execution_success"),
        Some(err) => warn!(
            command,
            duration_ms,
            error_type = err.label(),
            error = %err,
            "command_execution_failure"
        ),
    }
}
