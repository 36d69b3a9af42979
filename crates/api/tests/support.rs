//! Shared harness for application-level scenario tests.
//!
//! Each harness owns a temporary SQLite file, a WireMock server standing in
//! for the remote visit service and a settable clock.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use fieldvisit_api::AppContext;
use fieldvisit_core::{Clock, RemoteVisitService};
use fieldvisit_domain::{
    CheckInRequest, CheckOutRequest, Config, GpsFix, SyncOutcome, SyncProgress, SyncReport,
    VisitKey,
};
use fieldvisit_infra::http::{HttpClient, HttpRemoteService};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SALES_REP: &str = "REP-7";

/// Shop front most fixtures are measured from.
pub const SHOP: (f64, f64) = (-6.175, 106.827);

/// Clock frozen at a settable instant.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(now) })
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn today(&self) -> NaiveDate {
        self.now.lock().date_naive()
    }
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 4, 14).unwrap()
}

pub fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 14, 8, 30, 0).unwrap()
}

/// Point `meters` due north of `origin`.
pub fn north_of(origin: (f64, f64), meters: f64) -> (f64, f64) {
    let degrees = (meters / fieldvisit_domain::constants::EARTH_RADIUS_METERS).to_degrees();
    (origin.0 + degrees, origin.1)
}

pub fn fix_at(point: (f64, f64)) -> GpsFix {
    GpsFix::new(point.0, point.1, 6.0, morning())
}

pub fn check_in_at(schedule: &str, customer: &str, point: (f64, f64)) -> CheckInRequest {
    CheckInRequest {
        key: VisitKey::new(schedule, customer),
        fix: Some(fix_at(point)),
        photo_ref: Some(format!("photos/{customer}.jpg")),
        confirm_outside_geofence: false,
    }
}

pub fn check_out_at(schedule: &str, customer: &str, point: (f64, f64)) -> CheckOutRequest {
    CheckOutRequest { key: VisitKey::new(schedule, customer), fix: Some(fix_at(point)) }
}

pub struct Harness {
    _temp_dir: TempDir,
    pub server: MockServer,
    pub clock: Arc<FixedClock>,
    pub ctx: AppContext,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    /// Build a harness after letting the test adjust the configuration.
    pub async fn start_with(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("temporary directory should be created");
        let server = MockServer::start().await;
        let clock = FixedClock::at(morning());

        let mut config = Config::default();
        config.database.path = temp_dir.path().join("fieldvisit.db").to_string_lossy().into();
        config.remote.base_url = server.uri();
        config.remote.sales_rep_id = Some(SALES_REP.into());
        config.remote.max_attempts = 1;
        config.sync.interval_seconds = 0;
        config.sync.request_timeout_secs = 2;
        adjust(&mut config);

        let http = HttpClient::builder(&config.remote.base_url)
            .timeout(config.sync.request_timeout())
            .max_attempts(config.remote.max_attempts as usize)
            .base_backoff(Duration::from_millis(5))
            .build()
            .expect("http client");
        let remote: Arc<dyn RemoteVisitService> = Arc::new(HttpRemoteService::new(http));

        let ctx = AppContext::with_remote(config, remote, clock.clone())
            .expect("application context should build");

        Self { _temp_dir: temp_dir, server, clock, ctx }
    }

    /// Serve a two-stop schedule for today.
    pub async fn mount_schedule(&self) {
        Mock::given(method("GET"))
            .and(path(format!("/sales-reps/{SALES_REP}/schedule")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "visitKey": "SCH-1",
                    "customerKey": "C-1",
                    "customerName": "Toko Sumber Rejeki",
                    "address": "Jl. Pahlawan 10",
                    "scheduledDate": today()
                },
                {
                    "visitKey": "SCH-2",
                    "customerKey": "C-2",
                    "customerName": "Kedai Kopi Senja",
                    "address": "Jl. Veteran 2",
                    "scheduledDate": today()
                }
            ])))
            .mount(&self.server)
            .await;
    }

    /// Accept every visit, anchor and customer write.
    pub async fn mount_accepting_writes(&self) {
        Mock::given(method("POST"))
            .and(path("/visits"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "srv-visit" })))
            .mount(&self.server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/visits/[^/]+$"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/customers/[^/]+/geofence-anchor$"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
        Mock::given(method("POST"))
            .and(path("/customers"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "customerKey": "CUST-NEW" })),
            )
            .mount(&self.server)
            .await;
    }

    /// Requests received for `method path`.
    pub async fn requests_to(&self, verb: &str, route: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.method.as_str() == verb && request.url.path() == route)
            .collect()
    }

    /// Wait until nothing is left pending, or panic after `limit`.
    pub async fn wait_until_drained(&self, limit: Duration) {
        tokio::time::timeout(limit, async {
            while self.ctx.pending_count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("pending records were not drained in time");
    }
}

/// Drive a manual sync to completion, returning its progress samples.
pub async fn run_manual_sync(ctx: &AppContext) -> (Vec<SyncProgress>, SyncReport) {
    let mut handle = fieldvisit_api::trigger_manual_sync(ctx);
    let mut samples = Vec::new();
    while let Some(progress) = handle.progress.recv().await {
        samples.push(progress);
    }

    match handle.task.await.expect("sync task should not panic").expect("sync should succeed") {
        SyncOutcome::Completed(report) => (samples, report),
        SyncOutcome::Skipped => panic!("manual sync was skipped"),
    }
}
