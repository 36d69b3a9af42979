//! Sync commands

use std::sync::Arc;

use fieldvisit_core::{ManualSyncHandle, SyncObserver};
use fieldvisit_domain::{Result, SyncOutcome};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

/// Snapshot of the sync machinery for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatusResponse {
    pub pending: usize,
    pub session_running: bool,
    pub initial_sync_completed: bool,
    pub background_sync_running: bool,
}

/// Initial full sync after login; arms background sync afterwards.
pub async fn on_authenticated(
    ctx: &AppContext,
    sales_rep_id: String,
    observer: Arc<dyn SyncObserver>,
) -> Result<SyncOutcome> {
    execute_command("sync::on_authenticated", || ctx.on_authenticated(&sales_rep_id, observer))
        .await
}

/// Start a manual drain and hand back its progress stream.
///
/// Progress values are non-decreasing and the last one is 100. A manual sync
/// requested while another session runs completes as `Skipped`.
pub fn trigger_manual_sync(ctx: &AppContext) -> ManualSyncHandle {
    info!(command = "sync::trigger_manual_sync", "manual sync requested");
    ctx.trigger_manual_sync()
}

pub async fn get_sync_status(ctx: &AppContext) -> Result<SyncStatusResponse> {
    execute_command("sync::get_sync_status", || async {
        Ok(SyncStatusResponse {
            pending: ctx.pending_count().await?,
            session_running: ctx.sync.is_running(),
            initial_sync_completed: ctx.sync.initial_sync_completed(),
            background_sync_running: ctx.is_background_sync_running().await,
        })
    })
    .await
}
