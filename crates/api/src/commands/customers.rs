//! Customer and geofence anchor commands

use fieldvisit_domain::{GeofenceAnchor, GpsFix, NewCustomer, NewCustomerDraft, Result};

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

pub async fn register_customer(ctx: &AppContext, draft: NewCustomerDraft) -> Result<NewCustomer> {
    execute_command("customers::register_customer", || ctx.register_customer(draft)).await
}

/// Pin a customer's location; a newer cached anchor is kept and returned.
pub async fn save_geofence_anchor(
    ctx: &AppContext,
    customer_code: String,
    fix: Option<GpsFix>,
) -> Result<GeofenceAnchor> {
    execute_command("customers::save_geofence_anchor", || {
        ctx.save_geofence_anchor(&customer_code, fix)
    })
    .await
}
