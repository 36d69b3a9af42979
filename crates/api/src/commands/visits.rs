//! Visit lifecycle commands

use fieldvisit_domain::{
    CheckInRequest, CheckOutRequest, DateRange, Result, UnscheduledVisitRequest, VisitRecord,
};

use crate::context::AppContext;
use crate::utils::command_helpers::execute_command;

/// Schedule merged with local visits for the range, in display order.
pub async fn get_unified_visit_list(
    ctx: &AppContext,
    range: DateRange,
) -> Result<Vec<VisitRecord>> {
    execute_command("visits::get_unified_visit_list", || ctx.get_unified_visit_list(&range)).await
}

/// Check in to a scheduled visit.
///
/// Fails with `GeofenceWarning` when the fix is outside the radius and the
/// request does not confirm it; resend with `confirm_outside_geofence` set.
pub async fn check_in(ctx: &AppContext, request: CheckInRequest) -> Result<VisitRecord> {
    execute_command("visits::check_in", || ctx.check_in(request)).await
}

pub async fn check_out(ctx: &AppContext, request: CheckOutRequest) -> Result<VisitRecord> {
    execute_command("visits::check_out", || ctx.check_out(request)).await
}

pub async fn start_unscheduled_visit(
    ctx: &AppContext,
    request: UnscheduledVisitRequest,
) -> Result<VisitRecord> {
    execute_command("visits::start_unscheduled_visit", || ctx.start_unscheduled_visit(request))
        .await
}
