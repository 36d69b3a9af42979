//! FieldVisit - headless sync agent
//!
//! Loads the configuration, runs the initial full sync for the configured
//! sales rep and keeps background sync armed until interrupted.

use std::sync::Arc;

use anyhow::Context as _;
use fieldvisit_api::utils::logging::init_tracing;
use fieldvisit_api::{get_sync_status, require_sales_rep, AppContext};
use fieldvisit_core::sync::LoggingObserver;
use fieldvisit_domain::{Connectivity, SyncOutcome};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file before reading config
    let dotenv = dotenvy::dotenv();

    let config = fieldvisit_infra::config::load().context("failed to load configuration")?;
    init_tracing(&config.log_level);

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => warn!(error = %err, "no .env file loaded"),
    }

    let sales_rep_id = require_sales_rep(&config)?.to_string();
    let ctx = AppContext::new_with_config(config).context("failed to build application context")?;

    // A host without a reachability API is assumed online; the retry tick
    // picks up anything left pending.
    ctx.set_connectivity(Connectivity::Connected);

    match ctx.on_authenticated(&sales_rep_id, Arc::new(LoggingObserver)).await {
        Ok(SyncOutcome::Completed(report)) => info!(
            synced = report.synced,
            failed = report.failed,
            rejected = report.rejected.len(),
            "initial sync finished"
        ),
        Ok(SyncOutcome::Skipped) => info!("initial sync skipped"),
        Err(err) => error!(error = %err, "initial sync failed, will retry in background"),
    }

    let status = get_sync_status(&ctx).await?;
    info!(
        pending = status.pending,
        background = status.background_sync_running,
        "fieldvisit running, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C")?;
    ctx.shutdown().await?;
    info!("fieldvisit stopped");
    Ok(())
}
