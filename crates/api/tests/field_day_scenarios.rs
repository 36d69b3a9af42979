//! A sales rep's day driven through the command surface.
//!
//! **Coverage:**
//! - Offline check-in, check-out and customer registration
//! - Manual sync progress and at-most-once visit creation
//! - Recovery after an outage through the network monitor
//! - Geofence warnings and the single open visit rule
//!
//! **Infrastructure:** temporary SQLite file, WireMock remote, fixed clock.

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fieldvisit_api::{check_in, check_out, get_unified_visit_list, register_customer};
use fieldvisit_core::sync::LoggingObserver;
use fieldvisit_domain::{
    Connectivity, DateRange, FieldVisitError, GpsFix, NewCustomerDraft, VisitKey, VisitState,
};
use fieldvisit_infra::http::IDEMPOTENCY_HEADER;
use support::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn signed_in() -> Harness {
    let harness = Harness::start().await;
    harness.mount_schedule().await;
    harness.ctx.on_authenticated(SALES_REP, Arc::new(LoggingObserver)).await.unwrap();
    harness
}

#[tokio::test(flavor = "multi_thread")]
async fn full_day_is_recorded_offline_and_synced_once() {
    let harness = signed_in().await;
    harness.mount_accepting_writes().await;
    let ctx = &harness.ctx;

    let visits = get_unified_visit_list(ctx, DateRange::single(today())).await.unwrap();
    assert_eq!(visits.len(), 2);

    let arrived = check_in(ctx, check_in_at("SCH-1", "C-1", SHOP)).await.unwrap();
    assert_eq!(arrived.state, VisitState::CheckedIn);
    assert!(arrived.check_in.as_ref().is_some_and(|evidence| evidence.within_geofence));

    harness.clock.advance(chrono::Duration::minutes(35));
    let left = check_out(ctx, check_out_at("SCH-1", "C-1", SHOP)).await.unwrap();
    assert_eq!(left.state, VisitState::Completed);
    assert_eq!(left.duration_minutes, Some(35));
    assert_eq!(left.local_id, arrived.local_id);

    register_customer(
        ctx,
        NewCustomerDraft {
            name: "Warung Bu Sari".into(),
            address: "Gg. Melati 4".into(),
            phone: Some("0812000111".into()),
            latitude: Some(SHOP.0),
            longitude: Some(SHOP.1),
        },
    )
    .await
    .unwrap();
    assert_eq!(ctx.pending_count().await.unwrap(), 3, "visit, seeded anchor and customer");

    let (samples, report) = run_manual_sync(ctx).await;
    assert_eq!(report.synced, 3);
    assert!(report.is_clean());
    assert_eq!(ctx.pending_count().await.unwrap(), 0);

    let percents: Vec<f64> = samples.iter().map(|sample| sample.percent).collect();
    assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]), "{percents:?}");
    assert_eq!(percents.last().copied(), Some(100.0));

    let posts = harness.requests_to("POST", "/visits").await;
    assert_eq!(posts.len(), 1);
    let key = posts[0].headers.get(IDEMPOTENCY_HEADER).and_then(|value| value.to_str().ok());
    assert_eq!(key, Some(left.local_id.as_str()));

    let (_, rerun) = run_manual_sync(ctx).await;
    assert_eq!(rerun.synced, 0);
    assert_eq!(harness.requests_to("POST", "/visits").await.len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn outage_leaves_records_pending_until_reconnect() {
    let harness = signed_in().await;
    Mock::given(method("POST"))
        .and(path("/visits"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&harness.server)
        .await;
    harness.mount_accepting_writes().await;

    harness.ctx.check_in(check_in_at("SCH-2", "C-2", SHOP)).await.unwrap();

    let (_, report) = run_manual_sync(&harness.ctx).await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.synced, 1, "anchor still goes through");
    assert_eq!(harness.ctx.pending_count().await.unwrap(), 1);

    harness.ctx.set_connectivity(Connectivity::Disconnected);
    harness.ctx.set_connectivity(Connectivity::Connected);
    harness.wait_until_drained(Duration::from_secs(5)).await;

    assert_eq!(harness.requests_to("POST", "/visits").await.len(), 2);
    harness.ctx.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn check_in_far_from_the_anchor_needs_confirmation() {
    let harness = signed_in().await;
    let ctx = &harness.ctx;
    ctx.save_geofence_anchor("C-1", Some(fix_at(SHOP))).await.unwrap();

    let away = north_of(SHOP, 500.0);
    let warning = ctx.check_in(check_in_at("SCH-1", "C-1", away)).await.unwrap_err();
    let FieldVisitError::GeofenceWarning { distance_meters, radius_meters } = &warning else {
        panic!("expected a geofence warning, got {warning:?}");
    };
    assert!((*distance_meters - 500.0).abs() < 1.0, "{distance_meters}");
    assert!(radius_meters < distance_meters);

    let visits = ctx.get_unified_visit_list(&DateRange::single(today())).await.unwrap();
    assert!(visits.iter().all(|visit| visit.state == VisitState::Scheduled), "nothing written");
    assert_eq!(ctx.pending_count().await.unwrap(), 1, "only the anchor");

    let mut confirmed = check_in_at("SCH-1", "C-1", away);
    confirmed.confirm_outside_geofence = true;
    let visit = ctx.check_in(confirmed).await.unwrap();

    let evidence = visit.check_in.expect("check-in evidence");
    assert!(!evidence.within_geofence);
    assert!(evidence.distance_meters.is_some_and(|d| (d - 500.0).abs() < 1.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn second_visit_is_refused_before_waiting_for_gps() {
    let harness = signed_in().await;
    harness.ctx.check_in(check_in_at("SCH-1", "C-1", SHOP)).await.unwrap();

    let mut second = check_in_at("SCH-2", "C-2", SHOP);
    second.fix = None;
    let result = tokio::time::timeout(Duration::from_secs(1), harness.ctx.check_in(second))
        .await
        .expect("conflict is reported without a GPS fix");

    let Err(FieldVisitError::ConcurrentVisitConflict { open_visit }) = &result else {
        panic!("expected a conflict, got {result:?}");
    };
    assert_eq!(*open_visit, VisitKey::new("SCH-1", "C-1").to_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn check_in_without_a_fix_uses_the_pushed_location() {
    let harness = signed_in().await;
    harness.ctx.publish_fix(GpsFix::new(SHOP.0, SHOP.1, 4.0, Utc::now()));

    let mut request = check_in_at("SCH-1", "C-1", SHOP);
    request.fix = None;
    let visit = harness.ctx.check_in(request).await.unwrap();

    let evidence = visit.check_in.expect("check-in evidence");
    assert_eq!(evidence.accuracy_meters, 4.0);
    assert_eq!((evidence.latitude, evidence.longitude), SHOP);
}
