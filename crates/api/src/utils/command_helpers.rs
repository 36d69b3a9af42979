//! Command execution helpers
//!
//! Every command goes through [`execute_command`] so timing and outcome
//! logging stay uniform across the surface.

use std::future::Future;
use std::time::Instant;

use fieldvisit_domain::Result as DomainResult;

use crate::utils::logging::log_command_execution;

/// Run a command body, then log how long it took and how it ended.
///
/// # Example
///
/// ```rust,ignore
/// pub async fn pending_count(ctx: &AppContext) -> Result<usize> {
///     execute_command("sync::pending_count", || ctx.pending_count()).await
/// }
/// ```
pub async fn execute_command<F, Fut, T>(command_name: &str, command_fn: F) -> DomainResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = DomainResult<T>>,
{
    let start = Instant::now();
    let result = command_fn().await;
    log_command_execution(command_name, start.elapsed(), result.as_ref().err());
    result
}

#[cfg(test)]
mod tests {
    use fieldvisit_domain::FieldVisitError;

    use super::*;

    #[tokio::test]
    async fn passes_results_through_unchanged() {
        let ok = execute_command("test::ok", || async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: DomainResult<()> = execute_command("test::err", || async {
            Err(FieldVisitError::NotFound("visit".into()))
        })
        .await;
        assert!(matches!(err, Err(FieldVisitError::NotFound(_))));
    }
}
